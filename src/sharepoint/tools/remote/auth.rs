//! App-only (client credential) tokens issued by the SharePoint access
//! control service.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::sharepoint::tools::config::SiteCredentials;
use crate::sharepoint::tools::error::{Result, ToolError};
use crate::sharepoint::tools::remote::SessionContext;

/// Well-known application principal of SharePoint Online.
pub const SHAREPOINT_PRINCIPAL: &str = "00000003-0000-0ff1-ce00-000000000000";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Asks the site which realm (tenant id) it trusts by sending an anonymous
/// bearer challenge.
pub fn discover_realm(http: &Client, site_url: &Url) -> Result<String> {
    let endpoint = format!("{}/_vti_bin/client.svc", site_url.as_str().trim_end_matches('/'));
    let response = http.get(&endpoint).header(AUTHORIZATION, "Bearer").send()?;
    let challenge = response
        .headers()
        .get(WWW_AUTHENTICATE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ToolError::InvalidResponse(format!(
                "{endpoint} answered {} without a WWW-Authenticate challenge",
                response.status()
            ))
        })?;
    let realm = parse_realm(challenge).ok_or_else(|| {
        ToolError::InvalidResponse(format!("no realm in challenge '{challenge}'"))
    })?;
    debug!(%realm, "discovered site realm");
    Ok(realm)
}

/// Extracts `realm="..."` from a `WWW-Authenticate: Bearer ...` header.
pub fn parse_realm(challenge: &str) -> Option<String> {
    let parameters = challenge
        .trim()
        .strip_prefix("Bearer")
        .unwrap_or(challenge);
    parameters.split(',').find_map(|parameter| {
        let (key, value) = parameter.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("realm") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Form fields of the client credential grant for the given site host.
pub fn token_form(
    credentials: &SiteCredentials,
    realm: &str,
    site_url: &Url,
) -> Result<Vec<(&'static str, String)>> {
    let host = site_url
        .host_str()
        .ok_or_else(|| ToolError::InvalidConfig(format!("site URL '{site_url}' has no host")))?;
    let authority = match site_url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(vec![
        ("grant_type", "client_credentials".to_string()),
        ("client_id", format!("{}@{realm}", credentials.client_id())),
        ("client_secret", credentials.client_secret().to_string()),
        (
            "resource",
            format!("{SHAREPOINT_PRINCIPAL}/{authority}@{realm}"),
        ),
    ])
}

/// Exchanges the application credentials for a bearer token bound to the site.
pub fn request_token(
    http: &Client,
    token_endpoint: &str,
    realm: &str,
    credentials: &SiteCredentials,
    site_url: &Url,
) -> Result<SessionContext> {
    let token_url = format!(
        "{}/{realm}/tokens/OAuth/2",
        token_endpoint.trim_end_matches('/')
    );
    let form = token_form(credentials, realm, site_url)?;

    let response = http.post(&token_url).form(&form).send()?;
    let status = response.status();
    let body = response.text()?;
    let parsed: Option<TokenResponse> = serde_json::from_str(&body).ok();

    if !status.is_success() {
        let message = parsed
            .and_then(|token| token.error_description)
            .unwrap_or(body);
        return Err(ToolError::Remote {
            status: status.as_u16(),
            message,
        });
    }

    let token = parsed.ok_or_else(|| {
        ToolError::InvalidResponse("token endpoint returned a non-JSON body".into())
    })?;
    let access_token = token
        .access_token
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ToolError::InvalidResponse("token response missing access_token".into()))?;
    let expires_in = token.expires_in.as_ref().and_then(parse_seconds);

    Ok(SessionContext::new(site_url.clone(), access_token, expires_in))
}

// ACS sends `expires_in` as a string; other issuers use a number.
fn parse_seconds(value: &Value) -> Option<Duration> {
    let seconds = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }?;
    Some(Duration::from_secs(seconds))
}
