use std::fmt;
use std::str::FromStr;

use crate::sharepoint::tools::error::{Result, ToolError};

/// Path of a folder or file relative to the root of a document library.
///
/// Leading, trailing and repeated separators are dropped on construction and
/// backslashes are treated as separators. `.` and `..` segments are rejected
/// so a path can never climb out of the library it is resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl RemotePath {
    pub fn new(path: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for segment in path.split(['/', '\\']) {
            let segment = segment.trim();
            match segment {
                "" => continue,
                "." | ".." => return Err(ToolError::InvalidPath(path.to_string())),
                other => segments.push(other.to_string()),
            }
        }
        Ok(Self { segments })
    }

    /// The library root itself.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Appends a relative path to this one.
    pub fn join(&self, child: &str) -> Result<Self> {
        let child = RemotePath::new(child)?;
        let mut segments = self.segments.clone();
        segments.extend(child.segments);
        Ok(Self { segments })
    }

    /// Last segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Everything but the last segment.
    pub fn parent(&self) -> Option<RemotePath> {
        let (_, parent) = self.segments.split_last()?;
        Some(Self {
            segments: parent.to_vec(),
        })
    }

    /// Lower-cased extension of the last segment.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name()?;
        let (stem, extension) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Some(extension.to_ascii_lowercase())
    }

    /// Server-relative URL of this path inside `library` of the site mounted
    /// at `site_path` (for example `/teams/finance`).
    pub fn server_relative(&self, site_path: &str, library: &str) -> String {
        let mut url = String::from("/");
        for part in site_path.split('/').filter(|part| !part.is_empty()) {
            url.push_str(part);
            url.push('/');
        }
        url.push_str(library.trim_matches('/'));
        for segment in &self.segments {
            url.push('/');
            url.push_str(segment);
        }
        url
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for RemotePath {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self> {
        RemotePath::new(value)
    }
}
