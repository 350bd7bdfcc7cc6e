//! The SharePoint site as seen by the client: an authenticated session and
//! the handful of file and folder calls the tool needs.
//!
//! [`SiteService`] is the seam between the orchestration in
//! [`client`](crate::sharepoint::tools::client) and the wire protocol in
//! [`rest`]. Every path passed to a service is server-relative, e.g.
//! `/teams/finance/Shared Documents/General/report.xlsx`.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use url::Url;

use crate::sharepoint::tools::config::SiteCredentials;
use crate::sharepoint::tools::error::Result;

pub mod auth;
pub mod rest;
pub mod segment;

pub use rest::RestSiteService;
pub use segment::{Segment, SegmentKind, Segments};

/// Authenticated handle bound to one site URL.
///
/// Contexts live for a single operation and are never stored or serialised.
#[derive(Clone)]
pub struct SessionContext {
    site_url: Url,
    access_token: String,
    expires_in: Option<Duration>,
}

impl SessionContext {
    pub fn new(site_url: Url, access_token: impl Into<String>, expires_in: Option<Duration>) -> Self {
        Self {
            site_url,
            access_token: access_token.into(),
            expires_in,
        }
    }

    pub fn site_url(&self) -> &Url {
        &self.site_url
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Lifetime the issuer advertised for the token, if any.
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("site_url", &self.site_url.as_str())
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Outcome of a chunked upload as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub bytes: u64,
    pub segments: usize,
}

/// Remote operations against a SharePoint site.
pub trait SiteService {
    /// Obtains an app-only session for the site.
    fn authenticate(&self, site_url: &Url, credentials: &SiteCredentials) -> Result<SessionContext>;

    fn folder_exists(&self, ctx: &SessionContext, folder: &str) -> Result<bool>;

    fn create_folder(&self, ctx: &SessionContext, folder: &str) -> Result<()>;

    /// Returns the complete content of a file.
    fn download_file(&self, ctx: &SessionContext, file: &str) -> Result<Vec<u8>>;

    fn file_exists(&self, ctx: &SessionContext, file: &str) -> Result<bool>;

    fn delete_file(&self, ctx: &SessionContext, file: &str) -> Result<()>;

    /// Streams `content` into `folder/file_name`, `chunk_size` bytes at a time.
    fn upload_file_chunked(
        &self,
        ctx: &SessionContext,
        folder: &str,
        file_name: &str,
        content: &mut dyn Read,
        chunk_size: usize,
    ) -> Result<UploadSummary>;
}
