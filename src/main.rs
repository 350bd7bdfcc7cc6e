use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sharepoint_tools::io::{ReadOptions, SpreadsheetFormat};
use sharepoint_tools::model::{ColumnType, ColumnTypes, FolderOutcome, RemotePath, UploadPayload};
use sharepoint_tools::{Result, SharePointClient, SiteConfig, SiteCredentials, ToolError};
use tracing_subscriber::EnvFilter;

fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    if let Err(error) = init_logging(cli.verbose).and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("sharepoint_tools=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    let client = SharePointClient::new(cli.site.into_config()?)?;
    match cli.command {
        Command::Mkdir(args) => execute_mkdir(&client, args),
        Command::Read(args) => execute_read(&client, args),
        Command::Download(args) => execute_download(&client, args),
        Command::Upload(args) => execute_upload(&client, args),
    }
}

fn execute_mkdir(client: &SharePointClient, args: MkdirArgs) -> Result<()> {
    match client.create_directory(&args.name)? {
        FolderOutcome::Created(path) => {
            println!("{} directory has been created at '{path}'", args.name.trim());
        }
        FolderOutcome::AlreadyExists(path) => {
            println!("{} directory already exists at '{path}'", args.name.trim());
        }
        FolderOutcome::Denied { path, reason } => {
            return Err(ToolError::FolderCreation {
                path: path.to_string(),
                source: Box::new(ToolError::Remote {
                    status: 403,
                    message: reason,
                }),
            });
        }
    }
    Ok(())
}

fn execute_read(client: &SharePointClient, args: ReadArgs) -> Result<()> {
    let mut options = ReadOptions::default()
        .with_column_types(args.dtype.into_iter().collect::<ColumnTypes>());
    if let Some(sheet) = args.sheet {
        options = options.with_sheet(sheet);
    }
    if let Some(format) = args.format {
        options = options.with_format(format.into());
    }

    let table = client.read_table(&args.path, &options)?;
    if args.json {
        let records = table.head(args.rows).to_records();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        println!("{}", table.head(args.rows));
        println!("[{} rows x {} columns]", table.len(), table.columns.len());
    }
    Ok(())
}

fn execute_download(client: &SharePointClient, args: DownloadArgs) -> Result<()> {
    let bytes = client.download_bytes(&args.path)?;
    let output = match args.output {
        Some(output) => output,
        None => {
            let remote = RemotePath::new(&args.path)?;
            PathBuf::from(remote.file_name().unwrap_or("download"))
        }
    };
    std::fs::write(&output, &bytes)?;
    println!("saved {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

fn execute_upload(client: &SharePointClient, args: UploadArgs) -> Result<()> {
    if !args.input.exists() {
        return Err(ToolError::MissingInput(args.input));
    }
    let file_name = match args.name {
        Some(name) => name,
        None => args
            .input
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| ToolError::InvalidPath(args.input.display().to_string()))?,
    };
    let content = std::fs::read(&args.input)?;
    let payload = UploadPayload::new(RemotePath::new(&args.folder)?, file_name, content);

    let report = client.write_bytes(&payload)?;
    let uploaded = report.path.file_name().unwrap_or(&payload.file_name);
    println!("{uploaded} has been uploaded successfully!");
    if report.replaced {
        println!("replaced the previous version of '{}'", report.path);
    }
    Ok(())
}

fn parse_column_type(value: &str) -> std::result::Result<(String, ColumnType), String> {
    let (column, column_type) = value
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=TYPE, got '{value}'"))?;
    let column_type = column_type.parse().map_err(|error: ToolError| error.to_string())?;
    Ok((column.to_string(), column_type))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Create folders, read spreadsheets and upload files on a SharePoint Online team site."
)]
struct Cli {
    #[command(flatten)]
    site: SiteArgs,

    /// Log debug output of this tool to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct SiteArgs {
    /// Tenant name, as in https://<tenant>.sharepoint.com.
    #[arg(long, env = "SHAREPOINT_TENANT", default_value = "")]
    tenant: String,

    /// Team site name, as in /teams/<team>.
    #[arg(long, env = "SHAREPOINT_TEAM")]
    team: String,

    /// Application (client) id registered for app-only access.
    #[arg(long, env = "SHAREPOINT_CLIENT_ID")]
    client_id: String,

    /// Application secret.
    #[arg(long, env = "SHAREPOINT_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Full site URL; overrides the URL derived from tenant and team.
    #[arg(long, env = "SHAREPOINT_SITE_URL")]
    site_url: Option<String>,

    /// Tenant realm; discovered from the site when omitted.
    #[arg(long, env = "SHAREPOINT_REALM")]
    realm: Option<String>,

    /// Access control service issuing tokens.
    #[arg(long, env = "SHAREPOINT_TOKEN_ENDPOINT")]
    token_endpoint: Option<String>,

    /// Document library all paths are relative to.
    #[arg(long, env = "SHAREPOINT_LIBRARY")]
    library: Option<String>,

    /// Folder inside the library that `mkdir` creates directories in.
    #[arg(long, env = "SHAREPOINT_DIRECTORY_ROOT")]
    directory_root: Option<String>,

    /// Upload segment size in bytes.
    #[arg(long, env = "SHAREPOINT_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// HTTP request timeout in seconds.
    #[arg(long, env = "SHAREPOINT_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

impl SiteArgs {
    fn into_config(self) -> Result<SiteConfig> {
        let credentials = SiteCredentials::new(self.client_id, self.client_secret, self.team);
        let mut config = SiteConfig::new(self.tenant, credentials);
        config.site_url = self.site_url;
        config.realm = self.realm;
        if let Some(endpoint) = self.token_endpoint {
            config.token_endpoint = endpoint;
        }
        if let Some(library) = self.library {
            config.library = library;
        }
        if let Some(root) = self.directory_root {
            config.directory_root = root;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout = Duration::from_secs(timeout);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create a directory under the directory root of the library.
    Mkdir(MkdirArgs),
    /// Download a spreadsheet and print its first rows.
    Read(ReadArgs),
    /// Download a file to the local disk.
    Download(DownloadArgs),
    /// Upload a local file, replacing any remote file of the same name.
    Upload(UploadArgs),
}

#[derive(clap::Args)]
struct MkdirArgs {
    /// Name of the directory to create.
    name: String,
}

#[derive(clap::Args)]
struct ReadArgs {
    /// File path relative to the document library.
    path: String,

    /// Worksheet to read instead of the first one.
    #[arg(long)]
    sheet: Option<String>,

    /// Column type hint such as `zip=str`; may be repeated.
    #[arg(long, value_parser = parse_column_type)]
    dtype: Vec<(String, ColumnType)>,

    /// Decode as this format instead of guessing from the extension.
    #[arg(long, value_enum)]
    format: Option<FormatKind>,

    /// Number of rows to print.
    #[arg(long, default_value_t = 5)]
    rows: usize,

    /// Print rows as JSON records.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct DownloadArgs {
    /// File path relative to the document library.
    path: String,

    /// Local destination; defaults to the remote file name.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
struct UploadArgs {
    /// Target folder relative to the document library.
    #[arg(long)]
    folder: String,

    /// Remote file name; defaults to the local file name.
    #[arg(long)]
    name: Option<String>,

    /// Local file to upload.
    input: PathBuf,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatKind {
    Xlsx,
    Csv,
}

impl From<FormatKind> for SpreadsheetFormat {
    fn from(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Xlsx => SpreadsheetFormat::Xlsx,
            FormatKind::Csv => SpreadsheetFormat::Csv,
        }
    }
}
