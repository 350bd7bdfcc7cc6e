//! Core library for the sharepoint-tools command line application.
//!
//! The library wraps a SharePoint Online team site behind a small façade,
//! [`SharePointClient`], offering three operations: creating a folder,
//! reading a spreadsheet into a [`Table`](model::Table) and uploading bytes
//! with overwrite semantics. Remote calls go through the
//! [`SiteService`](remote::SiteService) trait, implemented over the REST API
//! in [`remote::rest`]; file conversions live under [`io`], plain data
//! types in [`model`] and settings in [`config`].

pub mod sharepoint;

pub use sharepoint::tools::{
    Result, SharePointClient, SiteConfig, SiteCredentials, ToolError, client, config, error, io,
    model, remote,
};
