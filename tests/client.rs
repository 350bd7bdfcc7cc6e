use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::Mutex;

use sharepoint_tools::io::ReadOptions;
use sharepoint_tools::model::{
    CellValue, ColumnType, ColumnTypes, FolderOutcome, RemotePath, Table, UploadPayload,
};
use sharepoint_tools::remote::{Segments, SessionContext, SiteService, UploadSummary};
use sharepoint_tools::{Result, SharePointClient, SiteConfig, SiteCredentials, ToolError};
use tempfile::tempdir;
use url::Url;

const SITE: &str = "https://contoso.sharepoint.com/teams/finance";
const LIBRARY: &str = "/teams/finance/Shared Documents";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Authenticate,
    FolderExists(String),
    CreateFolder(String),
    Download(String),
    FileExists(String),
    Delete(String),
    Upload { path: String, segments: usize },
}

#[derive(Default)]
struct SiteState {
    folders: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    calls: Vec<Call>,
}

/// Site held in memory that records every call made against it.
#[derive(Default)]
struct MemorySite {
    state: Mutex<SiteState>,
    reject_auth: bool,
    deny_folders: bool,
    fail_uploads: bool,
}

impl MemorySite {
    fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.lock().files.insert(path.to_string(), content.to_vec());
        self
    }

    fn with_folder(self, path: &str) -> Self {
        self.lock().folders.insert(path.to_string());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SiteState> {
        self.state.lock().expect("site state lock")
    }

    fn record(&self, call: Call) {
        self.lock().calls.push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }
}

impl SiteService for MemorySite {
    fn authenticate(&self, site_url: &Url, _credentials: &SiteCredentials) -> Result<SessionContext> {
        self.record(Call::Authenticate);
        if self.reject_auth {
            return Err(ToolError::Remote {
                status: 401,
                message: "invalid client secret".into(),
            });
        }
        Ok(SessionContext::new(site_url.clone(), "token", None))
    }

    fn folder_exists(&self, _ctx: &SessionContext, folder: &str) -> Result<bool> {
        self.record(Call::FolderExists(folder.to_string()));
        Ok(self.lock().folders.contains(folder))
    }

    fn create_folder(&self, _ctx: &SessionContext, folder: &str) -> Result<()> {
        self.record(Call::CreateFolder(folder.to_string()));
        if self.deny_folders {
            return Err(ToolError::Remote {
                status: 403,
                message: "Access denied.".into(),
            });
        }
        self.lock().folders.insert(folder.to_string());
        Ok(())
    }

    fn download_file(&self, _ctx: &SessionContext, file: &str) -> Result<Vec<u8>> {
        self.record(Call::Download(file.to_string()));
        self.file(file).ok_or_else(|| ToolError::Remote {
            status: 404,
            message: "File Not Found.".into(),
        })
    }

    fn file_exists(&self, _ctx: &SessionContext, file: &str) -> Result<bool> {
        self.record(Call::FileExists(file.to_string()));
        Ok(self.lock().files.contains_key(file))
    }

    fn delete_file(&self, _ctx: &SessionContext, file: &str) -> Result<()> {
        self.record(Call::Delete(file.to_string()));
        self.lock().files.remove(file);
        Ok(())
    }

    fn upload_file_chunked(
        &self,
        _ctx: &SessionContext,
        folder: &str,
        file_name: &str,
        content: &mut dyn Read,
        chunk_size: usize,
    ) -> Result<UploadSummary> {
        let path = format!("{folder}/{file_name}");
        let mut data = Vec::new();
        let mut segments = 0;
        for segment in Segments::new(content, chunk_size) {
            data.extend(segment?.data);
            segments += 1;
        }
        self.record(Call::Upload {
            path: path.clone(),
            segments,
        });
        if self.fail_uploads {
            return Err(ToolError::Remote {
                status: 503,
                message: "Service Unavailable".into(),
            });
        }
        let bytes = data.len() as u64;
        self.lock().files.insert(path, data);
        Ok(UploadSummary { bytes, segments })
    }
}

fn config() -> SiteConfig {
    SiteConfig::new("contoso", SiteCredentials::new("client", "secret", "finance")).with_site_url(SITE)
}

fn client(site: MemorySite) -> SharePointClient<MemorySite> {
    SharePointClient::with_service(config(), site).expect("client created")
}

fn sample_table() -> Table {
    let mut table = Table::new(vec!["col1".into(), "col2".into()]);
    table
        .push_row(vec![CellValue::Int(1), CellValue::String("a".into())])
        .expect("row");
    table
        .push_row(vec![CellValue::Int(2), CellValue::String("b".into())])
        .expect("row");
    table
}

#[test]
fn create_directory_creates_under_directory_root() {
    let client = client(MemorySite::default());
    let outcome = client.create_directory("Reports").expect("directory created");

    assert_eq!(
        outcome,
        FolderOutcome::Created(RemotePath::new("General/Reports").expect("path"))
    );
    let folder = format!("{LIBRARY}/General/Reports");
    assert_eq!(
        client.service().calls(),
        vec![
            Call::Authenticate,
            Call::FolderExists(folder.clone()),
            Call::CreateFolder(folder),
        ]
    );
}

#[test]
fn existing_directory_is_reported_without_creating() {
    let folder = format!("{LIBRARY}/General/Reports");
    let client = client(MemorySite::default().with_folder(&folder));

    let outcome = client.create_directory("Reports").expect("probe succeeds");

    assert!(matches!(outcome, FolderOutcome::AlreadyExists(_)));
    assert!(
        !client
            .service()
            .calls()
            .iter()
            .any(|call| matches!(call, Call::CreateFolder(_)))
    );
}

#[test]
fn denied_directory_creation_is_an_outcome() {
    let site = MemorySite {
        deny_folders: true,
        ..MemorySite::default()
    };
    let client = client(site);

    match client.create_directory("Reports").expect("denial is not an error") {
        FolderOutcome::Denied { path, reason } => {
            assert_eq!(path.to_string(), "General/Reports");
            assert!(reason.contains("Access denied."));
        }
        other => panic!("expected a denial, got {other:?}"),
    }
}

#[test]
fn invalid_directory_names_never_reach_the_site() {
    let client = client(MemorySite::default());
    for name in ["", "   ", "a/b", "Q1?"] {
        let error = client.create_directory(name).expect_err("name rejected");
        assert!(matches!(error, ToolError::InvalidDirectoryName(_)));
    }
    assert!(client.service().calls().is_empty());
}

#[test]
fn failed_authentication_stops_dependent_calls() {
    let site = MemorySite {
        reject_auth: true,
        ..MemorySite::default()
    };
    let client = client(site);

    let error = client.create_directory("Reports").expect_err("auth fails");
    assert!(matches!(error, ToolError::Authentication { .. }));
    assert_eq!(error.status(), Some(401));

    let payload = UploadPayload::new(RemotePath::new("General").expect("path"), "a.csv", b"x".to_vec());
    let error = client.write_bytes(&payload).expect_err("auth fails");
    assert!(matches!(error, ToolError::Authentication { .. }));

    let error = client
        .read_table("General/a.csv", &ReadOptions::default())
        .expect_err("auth fails");
    assert!(matches!(error, ToolError::Authentication { .. }));

    assert!(
        client
            .service()
            .calls()
            .iter()
            .all(|call| *call == Call::Authenticate)
    );
}

#[test]
fn overwrite_deletes_once_then_uploads_once() {
    let target = format!("{LIBRARY}/General/report.csv");
    let client = client(MemorySite::default().with_file(&target, b"old content"));
    let payload = UploadPayload::new(
        RemotePath::new("General").expect("path"),
        "report.csv",
        b"new content".to_vec(),
    );

    let report = client.write_bytes(&payload).expect("upload succeeds");

    assert!(report.replaced);
    assert_eq!(report.bytes, 11);
    assert_eq!(client.service().file(&target).as_deref(), Some(&b"new content"[..]));
    let calls = client.service().calls();
    assert_eq!(
        calls.iter().filter(|call| matches!(call, Call::Delete(_))).count(),
        1
    );
    assert_eq!(
        calls.iter().filter(|call| matches!(call, Call::Upload { .. })).count(),
        1
    );
    let delete = calls.iter().position(|call| matches!(call, Call::Delete(_)));
    let upload = calls.iter().position(|call| matches!(call, Call::Upload { .. }));
    assert!(delete < upload);
}

#[test]
fn padded_file_name_replaces_the_trimmed_file() {
    let target = format!("{LIBRARY}/General/report.csv");
    let client = client(MemorySite::default().with_file(&target, b"old content"));
    let payload = UploadPayload::new(
        RemotePath::new("General").expect("path"),
        " report.csv ",
        b"new content".to_vec(),
    );

    let report = client.write_bytes(&payload).expect("upload succeeds");

    assert!(report.replaced);
    assert_eq!(report.path.to_string(), "General/report.csv");
    assert_eq!(client.service().file(&target).as_deref(), Some(&b"new content"[..]));
    assert_eq!(
        client.service().calls(),
        vec![
            Call::Authenticate,
            Call::FileExists(target.clone()),
            Call::Delete(target.clone()),
            Call::Upload {
                path: target,
                segments: 1,
            },
        ]
    );
}

#[test]
fn new_file_is_uploaded_without_delete() {
    let client = client(MemorySite::default());
    let payload = UploadPayload::new(RemotePath::new("General").expect("path"), "new.bin", Vec::new());

    let report = client.write_bytes(&payload).expect("upload succeeds");

    assert!(!report.replaced);
    assert_eq!(report.segments, 1);
    assert!(
        !client
            .service()
            .calls()
            .iter()
            .any(|call| matches!(call, Call::Delete(_)))
    );
    assert_eq!(
        client.service().file(&format!("{LIBRARY}/General/new.bin")),
        Some(Vec::new())
    );
}

#[test]
fn uploaded_content_does_not_depend_on_chunk_size() {
    let content: Vec<u8> = (0..1_200_000u32).map(|idx| (idx % 251) as u8).collect();
    let target = format!("{LIBRARY}/General/large.bin");

    for (chunk_size, expected_segments) in [(500_000, 3), (5_000, 240)] {
        let client = SharePointClient::with_service(
            config().with_chunk_size(chunk_size),
            MemorySite::default(),
        )
        .expect("client created");
        let payload = UploadPayload::new(
            RemotePath::new("General").expect("path"),
            "large.bin",
            content.clone(),
        );

        let report = client.write_bytes(&payload).expect("upload succeeds");

        assert_eq!(report.segments, expected_segments);
        assert_eq!(report.bytes, content.len() as u64);
        assert_eq!(client.service().file(&target).as_deref(), Some(&content[..]));
    }
}

#[test]
fn staging_files_are_removed_after_success_and_failure() {
    let staging = tempdir().expect("staging dir");
    let payload = UploadPayload::new(RemotePath::new("General").expect("path"), "a.csv", b"a,b\n".to_vec());

    let client = SharePointClient::with_service(
        config().with_staging_dir(staging.path()),
        MemorySite::default(),
    )
    .expect("client created");
    client.write_bytes(&payload).expect("upload succeeds");
    assert_eq!(std::fs::read_dir(staging.path()).expect("list").count(), 0);

    let failing = MemorySite {
        fail_uploads: true,
        ..MemorySite::default()
    };
    let client = SharePointClient::with_service(config().with_staging_dir(staging.path()), failing)
        .expect("client created");
    let error = client.write_bytes(&payload).expect_err("upload fails");
    assert!(matches!(error, ToolError::Upload { .. }));
    assert_eq!(error.status(), Some(503));
    assert_eq!(std::fs::read_dir(staging.path()).expect("list").count(), 0);
}

#[test]
fn tables_round_trip_through_the_site() {
    let client = client(MemorySite::default());
    let table = sample_table();

    for file_name in ["file_name.xlsx", "file_name.csv"] {
        client
            .write_table("General", file_name, &table)
            .expect("table uploaded");

        let restored = client
            .read_table(&format!("General/{file_name}"), &ReadOptions::default())
            .expect("table downloaded");

        assert_eq!(restored, table, "{file_name} should round trip");
    }
}

#[test]
fn column_hints_apply_to_downloaded_tables() {
    let client = client(MemorySite::default());
    client
        .write_table("General", "codes.csv", &sample_table())
        .expect("table uploaded");

    let mut types = ColumnTypes::new();
    types.insert("col1".into(), ColumnType::String);
    let options = ReadOptions::default().with_column_types(types);
    let restored = client
        .read_table("General/codes.csv", &options)
        .expect("table downloaded");

    assert_eq!(
        restored.column("col1").expect("col1"),
        vec![&CellValue::String("1".into()), &CellValue::String("2".into())]
    );
}

#[test]
fn unparseable_content_is_a_parse_error() {
    let target = format!("{LIBRARY}/General/broken.xlsx");
    let client = client(MemorySite::default().with_file(&target, b"definitely not a zip"));

    let error = client
        .read_table("General/broken.xlsx", &ReadOptions::default())
        .expect_err("not a workbook");
    assert!(matches!(error, ToolError::Parse { .. }));
}

#[test]
fn missing_files_are_download_errors() {
    let client = client(MemorySite::default());
    let error = client.download_bytes("General/missing.csv").expect_err("missing");
    assert!(matches!(error, ToolError::Download { .. }));
    assert_eq!(error.status(), Some(404));
}
