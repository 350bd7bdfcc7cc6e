pub mod client;
pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod remote;

pub use client::SharePointClient;
pub use config::{SiteConfig, SiteCredentials};
pub use error::{Result, ToolError};
