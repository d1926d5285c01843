pub mod cli;
pub mod config;
pub mod dialect;
pub mod download;
pub mod error;
pub mod field;
pub mod format;
pub mod graph;
pub mod io_utils;
pub mod morphline;
pub mod query;
pub mod rdbms;
pub mod table;
pub mod template;
pub mod upload;
pub mod workspace;

use std::{
    env, fs,
    io::{self, Read, Write},
    path::Path,
    sync::OnceLock,
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::IndexerConfig,
    format::{FormatDescriptor, FormatProfile},
    morphline::{MorphlineRequest, MorphlineResources},
    query::SqlForm,
    rdbms::{QueryServerConfig, RdbmsClient, SqliteClient, StatementPolicy},
    template::TemplateLookup,
    workspace::{DryRunSubmitter, FileSystem, Indexer, LocalFileSystem},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("smart_indexer", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = IndexerConfig::load_or_default(cli.config.as_deref())?;
    match cli.command {
        Commands::GuessFormat(args) => handle_guess_format(&args, &config),
        Commands::GuessFields(args) => handle_guess_fields(&args, &config),
        Commands::Operators => handle_operators(),
        Commands::Morphline(args) => handle_morphline(&args, &config),
        Commands::Stage(args) => handle_stage(&args, &config),
        Commands::Upload(args) => handle_upload(&args),
        Commands::Export(args) => handle_export(&args),
        Commands::Query(args) => handle_query(&args, &config),
    }
}

fn profile_input(
    args: &cli::InputArgs,
    config: &IndexerConfig,
    format_override: Option<&FormatDescriptor>,
) -> Result<FormatProfile> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mut options = config.profile_options();
    if let Some(limit) = args.sample_bytes {
        options.sample_bytes = limit;
    }
    let reader = io_utils::open_input(&args.input)?;
    let profile = FormatProfile::from_reader(reader, encoding, format_override, &options)
        .with_context(|| format!("Profiling {:?}", args.input))?;
    debug!(
        "Profiled {:?}: {} column(s), {} sample row(s)",
        args.input,
        profile.columns.len(),
        profile.sample.len()
    );
    Ok(profile)
}

fn parse_format(raw: &str) -> Result<FormatDescriptor> {
    serde_json::from_str(raw).with_context(|| "Parsing --format JSON".to_string())
}

fn handle_guess_format(args: &cli::GuessFormatArgs, config: &IndexerConfig) -> Result<()> {
    let format_override = args.format.as_deref().map(parse_format).transpose()?;
    let profile = profile_input(&args.input, config, format_override.as_ref())?;
    info!(
        "Detected {:?} format with delimiter '{}' and {} column(s)",
        profile.format.kind,
        printable(&profile.format.field_separator),
        profile.columns.len()
    );
    if args.input.table {
        print!("{}", table::render_preview(&profile.columns, &profile.sample));
    } else {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    }
    Ok(())
}

fn handle_guess_fields(args: &cli::GuessFieldsArgs, config: &IndexerConfig) -> Result<()> {
    let format = parse_format(&args.format)?;
    let profile = profile_input(&args.input, config, Some(&format))?;
    if args.input.table {
        print!("{}", table::render_preview(&profile.columns, &profile.sample));
    } else {
        println!("{}", serde_json::to_string_pretty(&profile.fields())?);
    }
    Ok(())
}

fn handle_operators() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&field::operator_catalog())?);
    Ok(())
}

fn read_request(path: &Path) -> Result<MorphlineRequest> {
    let mut raw = String::new();
    io_utils::open_input(path)?
        .read_to_string(&mut raw)
        .with_context(|| format!("Reading request {path:?}"))?;
    MorphlineRequest::from_json(&raw).with_context(|| format!("Parsing request {path:?}"))
}

fn template_setup(
    args: &cli::TemplateArgs,
    config: &IndexerConfig,
) -> (TemplateLookup, IndexerConfig) {
    let mut effective = config.clone();
    if let Some(dir) = &args.templates {
        effective.templates_path = Some(dir.clone());
    }
    if let Some(zk) = &args.zk_ensemble {
        effective.zk_ensemble = zk.clone();
    }
    if let Some(libs) = &args.libs_path {
        effective.libs_path = libs.clone();
    }
    (effective.template_lookup(), effective)
}

fn render_request(
    request: &MorphlineRequest,
    lookup: &TemplateLookup,
    resources: &MorphlineResources,
) -> Result<String> {
    request
        .generate(lookup, resources)
        .with_context(|| format!("Generating morphline for collection '{}'", request.collection))
}

fn handle_morphline(args: &cli::MorphlineArgs, config: &IndexerConfig) -> Result<()> {
    let request = read_request(&args.request)?;
    let (lookup, effective) = template_setup(&args.templates, config);
    let morphline = render_request(&request, &lookup, &effective.morphline_resources())?;
    match &args.output {
        Some(path) => {
            fs::write(path, &morphline).with_context(|| format!("Writing {path:?}"))?;
            info!(
                "Morphline for collection '{}' written to {:?}",
                request.collection, path
            );
        }
        None => print!("{morphline}"),
    }
    Ok(())
}

fn handle_stage(args: &cli::StageArgs, config: &IndexerConfig) -> Result<()> {
    let request = read_request(&args.request)?;
    let (lookup, effective) = template_setup(&args.templates, config);
    let morphline = render_request(&request, &lookup, &effective.morphline_resources())?;

    let fs = LocalFileSystem::new(&args.root);
    let indexer = Indexer::new(
        args.user.as_str(),
        &fs,
        &lookup,
        effective.job_settings(args.dryrun),
    );
    let submitter = DryRunSubmitter::new(&fs);
    let job_id = indexer
        .run_morphline(&submitter, &request.collection, &morphline, &args.input_path)
        .with_context(|| format!("Staging job for collection '{}'", request.collection))?;
    println!("{job_id}");
    Ok(())
}

fn handle_upload(args: &cli::UploadArgs) -> Result<()> {
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Cannot derive a file name from {:?}", args.input))?,
    };
    let data = fs::read(&args.input).with_context(|| format!("Reading {:?}", args.input))?;

    let fs = LocalFileSystem::new(&args.root);
    fs.mkdir(&args.user, "/tmp")?;
    fs.mkdir(&args.user, &upload::home_directory(&args.user))?;
    let tmp_path = format!("/tmp/{}.{}.tmp", name, Utc::now().timestamp_millis());
    fs.create(&args.user, &tmp_path, &data)
        .with_context(|| format!("Staging upload at {tmp_path}"))?;

    let destination = upload::save_upload(&fs, &args.user, &tmp_path, &name)?;
    println!("{destination}");
    Ok(())
}

fn write_attachment(attachment: &download::Attachment, output_dir: Option<&Path>) -> Result<()> {
    match output_dir {
        Some(dir) => {
            let path = dir.join(&attachment.file_name);
            fs::write(&path, &attachment.body).with_context(|| format!("Writing {path:?}"))?;
            info!(
                "Wrote {} ({}) to {:?}",
                attachment.file_name, attachment.content_type, path
            );
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&attachment.body)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn handle_export(args: &cli::ExportArgs) -> Result<()> {
    let attachment = download::export(&args.headers, &args.data, args.format.into())?;
    write_attachment(&attachment, args.output_dir.as_deref())
}

fn handle_query(args: &cli::QueryArgs, config: &IndexerConfig) -> Result<()> {
    let server = match (&args.server, &args.database) {
        (Some(name), _) => config.query_server(name)?.clone(),
        (None, Some(database)) => QueryServerConfig {
            server_name: "sqlite".to_string(),
            name: database.clone(),
            ..QueryServerConfig::default()
        },
        (None, None) => return Err(anyhow!("Pass --server or --database")),
    };
    let policy = StatementPolicy {
        commit_after_read: args.commit_after_read,
        statement_timeout: args.timeout_ms.map(Duration::from_millis),
        max_retries: args.max_retries,
    };
    let mut client = SqliteClient::connect(&server, policy)?;
    if let Some(database) = &args.use_database {
        client.use_database(database)?;
    }

    let names = if args.databases {
        client.get_databases()?
    } else if let Some(database) = &args.tables {
        client.get_tables(database.as_deref())?
    } else if let Some(target) = &args.columns {
        match target.split_once('.') {
            Some((database, table)) => client.get_columns(Some(database), table)?,
            None => client.get_columns(None, target)?,
        }
    } else if let Some(sql) = &args.sql {
        let form = SqlForm::new(sql.as_str());
        form.validate()?;
        let result = client.execute_statement(&form.query)?;
        let attachment = download::export(
            &result.headers_json()?,
            &result.data_json()?,
            args.format.into(),
        )?;
        return write_attachment(&attachment, None);
    } else {
        return Err(anyhow!(
            "Nothing to do: pass --sql, --databases, --tables, or --columns"
        ));
    };
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn printable(separator: &str) -> String {
    match io_utils::format_byte(separator, "delimiter") {
        Ok(byte) => io_utils::printable_delimiter(byte),
        Err(_) => separator.to_string(),
    }
}
