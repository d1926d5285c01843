use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{download::ExportFormat, io_utils::DEFAULT_SAMPLE_BYTES};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Profile delimited files and generate morphline indexing configurations",
    long_about = None
)]
pub struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Detect the dialect, columns, and sample rows of a delimited file
    GuessFormat(GuessFormatArgs),
    /// Guess column types of a file under an explicit format
    GuessFields(GuessFieldsArgs),
    /// List the operations a field can carry
    Operators,
    /// Render a morphline configuration from a field request
    Morphline(MorphlineArgs),
    /// Render a morphline, stage a job workspace, and submit it
    Stage(StageArgs),
    /// Move a local file into a user's home directory
    Upload(UploadArgs),
    /// Export a result grid as csv, xls, or json
    Export(ExportArgs),
    /// Run a statement or catalog read against a configured database
    Query(QueryArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input file to sample ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Maximum bytes read from the input (at most 5 MiB)
    #[arg(
        long = "sample-bytes",
        value_parser = clap::value_parser!(u64).range(1..=DEFAULT_SAMPLE_BYTES)
    )]
    pub sample_bytes: Option<u64>,
    /// Render columns and sample rows as a table instead of JSON
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct GuessFormatArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Format JSON to trust instead of sniffing
    #[arg(long = "format")]
    pub format: Option<String>,
}

#[derive(Debug, Args)]
pub struct GuessFieldsArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Format JSON, as returned by guess-format
    #[arg(long = "format")]
    pub format: String,
}

#[derive(Debug, Args)]
pub struct TemplateArgs {
    /// Directory searched for templates before the bundled ones
    #[arg(long = "templates")]
    pub templates: Option<PathBuf>,
    /// Zookeeper ensemble of the target search cluster
    #[arg(long = "zk-ensemble")]
    pub zk_ensemble: Option<String>,
    /// Library path holding grok dictionaries and job jars
    #[arg(long = "libs-path")]
    pub libs_path: Option<String>,
}

#[derive(Debug, Args)]
pub struct MorphlineArgs {
    /// Request JSON with `collection`, `format`, and `columns` ('-' reads stdin)
    #[arg(short = 'r', long = "request")]
    pub request: PathBuf,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub templates: TemplateArgs,
}

#[derive(Debug, Args)]
pub struct StageArgs {
    /// Request JSON with `collection`, `format`, and `columns` ('-' reads stdin)
    #[arg(short = 'r', long = "request")]
    pub request: PathBuf,
    /// Local directory standing in for the cluster filesystem root
    #[arg(long = "root")]
    pub root: PathBuf,
    /// User the workspace is created for
    #[arg(short = 'u', long = "user")]
    pub user: String,
    /// Path of the data to index, as seen by the job
    #[arg(long = "input-path")]
    pub input_path: String,
    /// Mark the job as a dry run
    #[arg(long = "dryrun")]
    pub dryrun: bool,
    #[command(flatten)]
    pub templates: TemplateArgs,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Local file to upload
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Local directory standing in for the cluster filesystem root
    #[arg(long = "root")]
    pub root: PathBuf,
    /// Owner of the destination home directory
    #[arg(short = 'u', long = "user")]
    pub user: String,
    /// Destination file name (defaults to the input's file name)
    #[arg(long = "name")]
    pub name: Option<String>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// JSON array of column names
    #[arg(long = "headers")]
    pub headers: String,
    /// JSON array of rows
    #[arg(long = "data")]
    pub data: String,
    /// Attachment format
    #[arg(long = "format", value_enum, default_value = "json")]
    pub format: ExportFormatArg,
    /// Directory the attachment is written to (stdout if omitted)
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormatArg {
    Csv,
    Xls,
    Json,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(value: ExportFormatArg) -> Self {
        match value {
            ExportFormatArg::Csv => ExportFormat::Csv,
            ExportFormatArg::Xls => ExportFormat::Xls,
            ExportFormatArg::Json => ExportFormat::Json,
        }
    }
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Query server name from the configuration
    #[arg(long = "server", conflicts_with = "database")]
    pub server: Option<String>,
    /// SQLite database file to open directly
    #[arg(long = "database")]
    pub database: Option<String>,
    /// Statement to execute
    #[arg(long = "sql", conflicts_with_all = ["tables", "columns", "databases"])]
    pub sql: Option<String>,
    /// List databases
    #[arg(long = "databases")]
    pub databases: bool,
    /// Select this database before reading the catalog
    #[arg(long = "use", value_name = "DATABASE")]
    pub use_database: Option<String>,
    /// List tables of DATABASE, or of the selected database when omitted
    #[arg(long = "tables", value_name = "DATABASE", num_args = 0..=1)]
    pub tables: Option<Option<String>>,
    /// List columns of [DATABASE.]TABLE
    #[arg(long = "columns", value_name = "[DATABASE.]TABLE")]
    pub columns: Option<String>,
    /// Commit after catalog reads
    #[arg(long = "commit-after-read")]
    pub commit_after_read: bool,
    /// Retries for statements that fail because the database is busy
    #[arg(long = "max-retries", default_value_t = 0)]
    pub max_retries: u32,
    /// Busy timeout in milliseconds
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,
    /// Export format for statement results
    #[arg(long = "format", value_enum, default_value = "json")]
    pub format: ExportFormatArg,
}
