use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::sharepoint::tools::error::{Result, ToolError};

/// Document library every remote path is resolved against.
pub const DEFAULT_LIBRARY: &str = "Shared Documents";
/// Folder inside the library under which new directories are created.
pub const DEFAULT_DIRECTORY_ROOT: &str = "General";
/// Upload segment size. It only affects how content is split on the wire.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;
/// Access control service issuing SharePoint app-only tokens.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://accounts.accesscontrol.windows.net";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Application identity used to obtain app-only tokens for a team site.
#[derive(Clone, PartialEq, Eq)]
pub struct SiteCredentials {
    client_id: String,
    client_secret: String,
    team_name: String,
}

impl SiteCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        team_name: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            team_name: team_name.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn team_name(&self) -> &str {
        &self.team_name
    }
}

impl fmt::Debug for SiteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("team_name", &self.team_name)
            .finish()
    }
}

/// Everything needed to reach one SharePoint team site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub tenant: String,
    pub credentials: SiteCredentials,
    /// Overrides the `https://<tenant>.sharepoint.com/teams/<team>` URL.
    pub site_url: Option<String>,
    /// Tenant realm. Discovered from the site when absent.
    pub realm: Option<String>,
    pub token_endpoint: String,
    pub library: String,
    pub directory_root: String,
    pub chunk_size: usize,
    pub timeout: Duration,
    /// Directory upload content is staged in. The system temp dir when absent.
    pub staging_dir: Option<PathBuf>,
}

impl SiteConfig {
    pub fn new(tenant: impl Into<String>, credentials: SiteCredentials) -> Self {
        Self {
            tenant: tenant.into(),
            credentials,
            site_url: None,
            realm: None,
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            library: DEFAULT_LIBRARY.to_string(),
            directory_root: DEFAULT_DIRECTORY_ROOT.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: DEFAULT_TIMEOUT,
            staging_dir: None,
        }
    }

    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Checks the values that would otherwise only fail halfway through an
    /// operation.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ToolError::InvalidConfig(
                "chunk size must be greater than zero".into(),
            ));
        }
        if self.library.trim_matches('/').trim().is_empty() {
            return Err(ToolError::InvalidConfig(
                "document library must not be empty".into(),
            ));
        }
        if self.credentials.client_id().trim().is_empty()
            || self.credentials.client_secret().trim().is_empty()
        {
            return Err(ToolError::InvalidConfig(
                "client id and client secret must not be empty".into(),
            ));
        }
        self.site_url()?;
        Ok(())
    }

    /// Absolute URL of the team site.
    pub fn site_url(&self) -> Result<Url> {
        let raw = match &self.site_url {
            Some(url) => url.clone(),
            None => {
                if self.tenant.trim().is_empty() || self.credentials.team_name().trim().is_empty()
                {
                    return Err(ToolError::InvalidConfig(
                        "tenant and team name are required to derive the site URL".into(),
                    ));
                }
                format!(
                    "https://{}.sharepoint.com/teams/{}",
                    self.tenant.trim(),
                    urlencoding::encode(self.credentials.team_name().trim())
                )
            }
        };
        let url = Url::parse(raw.trim_end_matches('/'))
            .map_err(|error| ToolError::InvalidConfig(format!("invalid site URL '{raw}': {error}")))?;
        if url.host_str().is_none() {
            return Err(ToolError::InvalidConfig(format!(
                "site URL '{raw}' has no host"
            )));
        }
        Ok(url)
    }

    /// Decoded path of the site URL, e.g. `/teams/finance`.
    pub fn site_path(&self) -> Result<String> {
        let url = self.site_url()?;
        let decoded = urlencoding::decode(url.path())
            .map_err(|error| ToolError::InvalidConfig(format!("invalid site path: {error}")))?;
        Ok(decoded.trim_end_matches('/').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> SiteCredentials {
        SiteCredentials::new("client", "secret", "Finance Team")
    }

    #[test]
    fn derives_team_site_url() {
        let config = SiteConfig::new("contoso", credentials());
        assert_eq!(
            config.site_url().expect("site url").as_str(),
            "https://contoso.sharepoint.com/teams/Finance%20Team"
        );
        assert_eq!(config.site_path().expect("site path"), "/teams/Finance Team");
    }

    #[test]
    fn explicit_site_url_wins() {
        let config = SiteConfig::new("", credentials()).with_site_url("http://127.0.0.1:9000/teams/demo/");
        assert_eq!(config.site_path().expect("site path"), "/teams/demo");
        config.validate().expect("valid without tenant");
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = SiteConfig::new("contoso", credentials()).with_chunk_size(0);
        assert!(matches!(config.validate(), Err(ToolError::InvalidConfig(_))));
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("<redacted>"));
    }
}
