use std::io::{Seek, Write};

use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument, warn};

use crate::sharepoint::tools::config::SiteConfig;
use crate::sharepoint::tools::error::{Result, ToolError};
use crate::sharepoint::tools::io::{self, ReadOptions, SpreadsheetFormat};
use crate::sharepoint::tools::model::{FolderOutcome, RemotePath, Table, UploadPayload, UploadReport};
use crate::sharepoint::tools::remote::{RestSiteService, SessionContext, SiteService};

/// Characters SharePoint does not accept in folder names.
const INVALID_NAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '#', '%'];

/// Façade over one SharePoint team site.
///
/// Each operation establishes its own session; nothing is cached between
/// calls.
pub struct SharePointClient<S = RestSiteService> {
    config: SiteConfig,
    service: S,
}

impl SharePointClient<RestSiteService> {
    /// Creates a client speaking the REST API of the configured site.
    pub fn new(config: SiteConfig) -> Result<Self> {
        config.validate()?;
        let service = RestSiteService::new(&config)?;
        Ok(Self { config, service })
    }
}

impl<S: SiteService> SharePointClient<S> {
    /// Creates a client on top of an arbitrary site service.
    pub fn with_service(config: SiteConfig, service: S) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, service })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Authenticates against the site and returns a fresh session.
    #[instrument(level = "debug", skip_all)]
    pub fn establish_context(&self) -> Result<SessionContext> {
        let site_url = self.config.site_url()?;
        match self
            .service
            .authenticate(&site_url, &self.config.credentials)
        {
            Ok(ctx) => {
                debug!(site = %site_url, expires_in = ?ctx.expires_in(), "session established");
                Ok(ctx)
            }
            Err(err) => {
                error!(
                    site = %site_url,
                    kind = err.kind(),
                    error = %err,
                    "failed to establish SharePoint context"
                );
                Err(ToolError::Authentication {
                    site_url: site_url.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }

    /// Creates `<directory root>/<name>` in the document library.
    ///
    /// Invalid names are rejected before the site is contacted. The returned
    /// path is relative to the library root and can be handed straight to
    /// [`read_table`](Self::read_table) or [`write_bytes`](Self::write_bytes).
    #[instrument(level = "info", skip(self))]
    pub fn create_directory(&self, name: &str) -> Result<FolderOutcome> {
        let name = validate_directory_name(name)?;
        let relative = RemotePath::new(&self.config.directory_root)?.join(name)?;
        let server_path = self.server_path(&relative)?;

        let ctx = self.establish_context()?;
        let attempt = self
            .service
            .folder_exists(&ctx, &server_path)
            .and_then(|exists| {
                if exists {
                    return Ok(false);
                }
                self.service.create_folder(&ctx, &server_path)?;
                Ok(true)
            });

        match attempt {
            Ok(true) => {
                info!(path = %relative, "directory created");
                Ok(FolderOutcome::Created(relative))
            }
            Ok(false) => {
                info!(path = %relative, "directory already exists");
                Ok(FolderOutcome::AlreadyExists(relative))
            }
            Err(err) if err.status() == Some(403) => {
                warn!(path = %relative, error = %err, "directory creation denied");
                Ok(FolderOutcome::Denied {
                    path: relative,
                    reason: err.to_string(),
                })
            }
            Err(err) => Err(ToolError::FolderCreation {
                path: relative.to_string(),
                source: Box::new(err),
            }),
        }
    }

    /// Downloads a file, relative to the library root, into memory.
    #[instrument(level = "info", skip(self))]
    pub fn download_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let remote = file_path(path)?;
        self.download(&remote)
    }

    /// Downloads a spreadsheet and parses it into a table.
    ///
    /// The whole file is buffered first; content that is not a spreadsheet
    /// fails while parsing, not while downloading.
    #[instrument(level = "info", skip(self, options))]
    pub fn read_table(&self, path: &str, options: &ReadOptions) -> Result<Table> {
        let remote = file_path(path)?;
        let bytes = self.download(&remote)?;
        let format = options
            .format
            .unwrap_or_else(|| SpreadsheetFormat::from_path(&remote));

        let table = io::parse_table(&bytes, format, options).map_err(|source| ToolError::Parse {
            path: remote.to_string(),
            source: Box::new(source),
        })?;
        info!(
            rows = table.len(),
            columns = table.columns.len(),
            ?format,
            "table parsed"
        );
        Ok(table)
    }

    /// Uploads bytes into a folder, replacing any file of the same name.
    #[instrument(
        level = "info",
        skip_all,
        fields(folder = %payload.target_folder, file = %payload.file_name, bytes = payload.content.len())
    )]
    pub fn write_bytes(&self, payload: &UploadPayload) -> Result<UploadReport> {
        let file_name = validate_file_name(&payload.file_name)?;
        let target = payload.target_folder.join(file_name)?;
        let folder_path = self.server_path(&payload.target_folder)?;
        let file_path = self.server_path(&target)?;

        let ctx = self.establish_context()?;
        let wrap = |source: ToolError| ToolError::Upload {
            path: target.to_string(),
            source: Box::new(source),
        };

        let mut staged = self.stage(&payload.content).map_err(wrap)?;
        debug!(staged = %staged.path().display(), "content staged");

        let replaced = self
            .service
            .file_exists(&ctx, &file_path)
            .map_err(wrap)?;
        if replaced {
            self.service
                .delete_file(&ctx, &file_path)
                .map_err(wrap)?;
            info!(path = %target, "removed existing file");
        }

        let summary = self
            .service
            .upload_file_chunked(
                &ctx,
                &folder_path,
                file_name,
                &mut staged,
                self.config.chunk_size,
            )
            .map_err(wrap)?;

        info!(
            path = %target,
            bytes = summary.bytes,
            segments = summary.segments,
            replaced,
            "upload complete"
        );
        Ok(UploadReport {
            path: target,
            bytes: summary.bytes,
            segments: summary.segments,
            replaced,
        })
    }

    /// Encodes a table by the extension of `file_name` and uploads it.
    #[instrument(level = "info", skip(self, table), fields(rows = table.len()))]
    pub fn write_table(&self, folder: &str, file_name: &str, table: &Table) -> Result<UploadReport> {
        let target_folder = RemotePath::new(folder)?;
        let format = SpreadsheetFormat::from_path(&target_folder.join(file_name)?);
        let content = io::encode_table(table, format)?;
        self.write_bytes(&UploadPayload::new(target_folder, file_name, content))
    }

    fn download(&self, remote: &RemotePath) -> Result<Vec<u8>> {
        let server_path = self.server_path(remote)?;
        let ctx = self.establish_context()?;
        let bytes = self
            .service
            .download_file(&ctx, &server_path)
            .map_err(|source| ToolError::Download {
                path: remote.to_string(),
                source: Box::new(source),
            })?;
        debug!(path = %remote, bytes = bytes.len(), "download complete");
        Ok(bytes)
    }

    fn server_path(&self, path: &RemotePath) -> Result<String> {
        Ok(path.server_relative(&self.config.site_path()?, &self.config.library))
    }

    // The temp file is removed when the returned handle is dropped.
    fn stage(&self, content: &[u8]) -> Result<NamedTempFile> {
        let mut staged = match &self.config.staging_dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };
        staged.write_all(content)?;
        staged.flush()?;
        staged.rewind()?;
        Ok(staged)
    }
}

fn validate_directory_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.contains(INVALID_NAME_CHARS) || matches!(trimmed, "." | "..") {
        return Err(ToolError::InvalidDirectoryName(name.to_string()));
    }
    Ok(trimmed)
}

fn validate_file_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) || matches!(trimmed, "." | "..") {
        return Err(ToolError::InvalidPath(name.to_string()));
    }
    Ok(trimmed)
}

fn file_path(path: &str) -> Result<RemotePath> {
    let remote = RemotePath::new(path)?;
    if remote.is_root() {
        return Err(ToolError::InvalidPath(path.to_string()));
    }
    Ok(remote)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_names_are_validated_locally() {
        assert_eq!(validate_directory_name("  Reports ").expect("valid"), "Reports");
        for name in ["", "   ", "a/b", "50%", "what?", ".."] {
            assert!(
                matches!(
                    validate_directory_name(name),
                    Err(ToolError::InvalidDirectoryName(_))
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn file_names_must_be_single_segments() {
        assert_eq!(validate_file_name(" file_name.csv ").expect("valid"), "file_name.csv");
        assert!(validate_file_name("nested/file.csv").is_err());
        assert!(validate_file_name(" ").is_err());
    }
}
