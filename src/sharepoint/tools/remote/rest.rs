use std::io::Read;

use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE, IF_MATCH};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::sharepoint::tools::config::{SiteConfig, SiteCredentials};
use crate::sharepoint::tools::error::{Result, ToolError};
use crate::sharepoint::tools::remote::segment::{Segment, SegmentKind, Segments};
use crate::sharepoint::tools::remote::{SessionContext, SiteService, UploadSummary, auth};

const ACCEPT_JSON: &str = "application/json;odata=nometadata";
const VERBOSE_JSON: &str = "application/json;odata=verbose";
const OCTET_STREAM: &str = "application/octet-stream";

/// [`SiteService`] speaking the SharePoint REST API over a blocking client.
pub struct RestSiteService {
    http: Client,
    token_endpoint: String,
    realm: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExistsResponse {
    #[serde(rename = "Exists")]
    exists: bool,
}

impl RestSiteService {
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            token_endpoint: config.token_endpoint.clone(),
            realm: config.realm.clone(),
        })
    }

    /// Builds `<site>/_api/web/<function>` with OData parameter aliases
    /// appended to the query string. Aliases keep paths with quotes, spaces
    /// or `#` out of the URL path.
    fn endpoint(ctx: &SessionContext, function: &str, aliases: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/_api/web/{function}",
            ctx.site_url().as_str().trim_end_matches('/')
        );
        let mut separator = if function.contains('?') { '&' } else { '?' };
        for (name, value) in aliases {
            url.push(separator);
            url.push_str(name);
            url.push('=');
            url.push_str(&odata_string(value));
            separator = '&';
        }
        url
    }

    fn request(&self, method: Method, url: &str, ctx: &SessionContext) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(ctx.access_token())
            .header(ACCEPT, ACCEPT_JSON)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(ToolError::Remote {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    fn exists(&self, ctx: &SessionContext, accessor: &str, path: &str) -> Result<bool> {
        let url = Self::endpoint(
            ctx,
            &format!("{accessor}(decodedurl=@p)?$select=Exists"),
            &[("@p", path)],
        );
        match self.send(self.request(Method::GET, &url, ctx)) {
            Ok(response) => {
                let body: ExistsResponse = response.json()?;
                Ok(body.exists)
            }
            Err(error) if error.status() == Some(404) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn post_bytes(&self, ctx: &SessionContext, url: &str, body: Vec<u8>) -> Result<Response> {
        self.send(
            self.request(Method::POST, url, ctx)
                .header(CONTENT_TYPE, OCTET_STREAM)
                .body(body),
        )
    }

    fn add_file(&self, ctx: &SessionContext, folder: &str, file_name: &str, body: Vec<u8>) -> Result<()> {
        let url = Self::endpoint(
            ctx,
            "GetFolderByServerRelativePath(decodedurl=@p)/Files/add(url=@n,overwrite=true)",
            &[("@p", folder), ("@n", file_name)],
        );
        self.post_bytes(ctx, &url, body)?;
        Ok(())
    }

    fn send_segment(
        &self,
        ctx: &SessionContext,
        folder: &str,
        file_name: &str,
        file_path: &str,
        upload_id: Uuid,
        segment: Segment,
    ) -> Result<()> {
        let function = match segment.kind {
            SegmentKind::Only => return self.add_file(ctx, folder, file_name, segment.data),
            SegmentKind::First => {
                self.add_file(ctx, folder, file_name, Vec::new())?;
                format!("StartUpload(uploadId=guid'{upload_id}')")
            }
            SegmentKind::Middle => format!(
                "ContinueUpload(uploadId=guid'{upload_id}',fileOffset={})",
                segment.offset
            ),
            SegmentKind::Last => format!(
                "FinishUpload(uploadId=guid'{upload_id}',fileOffset={})",
                segment.offset
            ),
        };
        let url = Self::endpoint(
            ctx,
            &format!("GetFileByServerRelativePath(decodedurl=@p)/{function}"),
            &[("@p", file_path)],
        );
        self.post_bytes(ctx, &url, segment.data)?;
        Ok(())
    }

    fn cancel_upload(&self, ctx: &SessionContext, file_path: &str, upload_id: Uuid) {
        let url = Self::endpoint(
            ctx,
            &format!("GetFileByServerRelativePath(decodedurl=@p)/CancelUpload(uploadId=guid'{upload_id}')"),
            &[("@p", file_path)],
        );
        if let Err(error) = self.send(self.request(Method::POST, &url, ctx)) {
            warn!(%upload_id, %error, "failed to cancel upload session");
        }
    }
}

impl SiteService for RestSiteService {
    fn authenticate(&self, site_url: &Url, credentials: &SiteCredentials) -> Result<SessionContext> {
        let realm = match &self.realm {
            Some(realm) => realm.clone(),
            None => auth::discover_realm(&self.http, site_url)?,
        };
        auth::request_token(&self.http, &self.token_endpoint, &realm, credentials, site_url)
    }

    fn folder_exists(&self, ctx: &SessionContext, folder: &str) -> Result<bool> {
        self.exists(ctx, "GetFolderByServerRelativePath", folder)
    }

    fn create_folder(&self, ctx: &SessionContext, folder: &str) -> Result<()> {
        let url = Self::endpoint(ctx, "folders", &[]);
        let body = json!({
            "__metadata": { "type": "SP.Folder" },
            "ServerRelativeUrl": folder,
        });
        self.send(
            self.request(Method::POST, &url, ctx)
                .header(CONTENT_TYPE, VERBOSE_JSON)
                .body(serde_json::to_vec(&body)?),
        )?;
        debug!(folder, "folder created");
        Ok(())
    }

    fn download_file(&self, ctx: &SessionContext, file: &str) -> Result<Vec<u8>> {
        let url = Self::endpoint(
            ctx,
            "GetFileByServerRelativePath(decodedurl=@p)/$value",
            &[("@p", file)],
        );
        let response = self.send(self.request(Method::GET, &url, ctx))?;
        let bytes = response.bytes()?;
        debug!(file, bytes = bytes.len(), "file downloaded");
        Ok(bytes.to_vec())
    }

    fn file_exists(&self, ctx: &SessionContext, file: &str) -> Result<bool> {
        self.exists(ctx, "GetFileByServerRelativePath", file)
    }

    fn delete_file(&self, ctx: &SessionContext, file: &str) -> Result<()> {
        let url = Self::endpoint(
            ctx,
            "GetFileByServerRelativePath(decodedurl=@p)",
            &[("@p", file)],
        );
        self.send(
            self.request(Method::POST, &url, ctx)
                .header("X-HTTP-Method", "DELETE")
                .header(IF_MATCH, "*"),
        )?;
        debug!(file, "file deleted");
        Ok(())
    }

    fn upload_file_chunked(
        &self,
        ctx: &SessionContext,
        folder: &str,
        file_name: &str,
        content: &mut dyn Read,
        chunk_size: usize,
    ) -> Result<UploadSummary> {
        let file_path = format!("{}/{file_name}", folder.trim_end_matches('/'));
        let upload_id = Uuid::new_v4();
        let mut summary = UploadSummary {
            bytes: 0,
            segments: 0,
        };
        let mut session_open = false;

        for segment in Segments::new(content, chunk_size) {
            let result = segment.map_err(ToolError::from).and_then(|segment| {
                let kind = segment.kind;
                let offset = segment.offset;
                let end = segment.end();
                self.send_segment(ctx, folder, file_name, &file_path, upload_id, segment)?;
                // The session exists once StartUpload has been accepted.
                session_open |= kind == SegmentKind::First;
                debug!(?kind, offset, end, "segment uploaded");
                Ok(end)
            });

            match result {
                Ok(end) => {
                    summary.bytes = end;
                    summary.segments += 1;
                }
                Err(error) => {
                    if session_open {
                        self.cancel_upload(ctx, &file_path, upload_id);
                    }
                    return Err(error);
                }
            }
        }

        Ok(summary)
    }
}

/// Quotes a value as an OData string literal and percent-encodes it for the
/// query string.
fn odata_string(value: &str) -> String {
    let literal = format!("'{}'", value.replace('\'', "''"));
    urlencoding::encode(&literal).into_owned()
}

/// Pulls the human-readable message out of an OData error payload.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        let error = value.get("odata.error").or_else(|| value.get("error"))?;
        match error.get("message")? {
            Value::String(text) => Some(text.clone()),
            message => message.get("value")?.as_str().map(str::to_string),
        }
    });
    match message {
        Some(message) => message,
        None if body.trim().is_empty() => "(empty response body)".to_string(),
        None => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odata_strings_escape_quotes_and_spaces() {
        assert_eq!(
            odata_string("/teams/x/Shared Documents/O'Neil.xlsx"),
            "%27%2Fteams%2Fx%2FShared%20Documents%2FO%27%27Neil.xlsx%27"
        );
    }

    #[test]
    fn endpoint_appends_aliases_after_existing_query() {
        let ctx = SessionContext::new(
            Url::parse("https://contoso.sharepoint.com/teams/ops/").expect("url"),
            "token",
            None,
        );
        let url = RestSiteService::endpoint(
            &ctx,
            "GetFileByServerRelativePath(decodedurl=@p)?$select=Exists",
            &[("@p", "/a")],
        );
        assert_eq!(
            url,
            "https://contoso.sharepoint.com/teams/ops/_api/web/GetFileByServerRelativePath(decodedurl=@p)?$select=Exists&@p=%27%2Fa%27"
        );
    }

    #[test]
    fn error_messages_are_extracted_from_odata_payloads() {
        let nometadata = r#"{"odata.error":{"code":"-2130575338, Microsoft.SharePoint.SPException","message":{"lang":"en-US","value":"File Not Found."}}}"#;
        assert_eq!(error_message(nometadata), "File Not Found.");

        let verbose = r#"{"error":{"code":"-2147024891","message":{"lang":"en-US","value":"Access denied."}}}"#;
        assert_eq!(error_message(verbose), "Access denied.");

        assert_eq!(error_message("  "), "(empty response body)");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
