//! CLI entry point for case-artifact indexing and retrieval.
//!
//! Loads layered settings, installs logging, then dispatches to ingestion,
//! vector search, substring search and collection management.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, anyhow};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use serde::Serialize;
use serde_json::json;

use evidex::display::with_spinner;
use evidex::embedding::provider_from_config;
use evidex::io::{ExitCode, JsonResponse, OutputFormat, ResponseMeta};
use evidex::logging::init_logging;
use evidex::{
    FileAttributesExtractor, Hit, IngestOptions, Ingestor, OutputField, Retriever, Settings,
    StoreGateway,
};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Case-artifact indexing and retrieval
#[derive(Parser)]
#[command(
    name = "evidex",
    version = env!("CARGO_PKG_VERSION"),
    about = "Index case attachments and search them by meaning",
    long_about = "Embed the images and text files of a case into two vector collections, then search them with natural-language queries.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ evidex init\n  $ evidex ingest\n  $ evidex search \"a red car at night\"\n  $ evidex search \"meeting time\" --text"
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Set up .evidex directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    #[command(about = "Display active settings")]
    Config,

    /// Embed every artifact under PATH (default: the configured attachments directory)
    #[command(
        about = "Build the case collections from an artifact directory",
        after_help = "Examples:\n  evidex ingest\n  evidex ingest ./case42/Export/Attachments --progress\n  evidex ingest --dry-run"
    )]
    Ingest {
        path: Option<PathBuf>,

        /// Records per insert call (overrides config)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Keep small low-colour images instead of skipping them as icons
        #[arg(long)]
        no_icon_filter: bool,

        #[arg(short, long)]
        progress: bool,

        /// Classify files without embedding or writing to the store
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    #[command(
        about = "Search a collection with a natural-language query",
        after_help = "Examples:\n  evidex search \"screenshot of a bank transfer\"\n  evidex search \"meet at the harbour\" --text --fields path,content\n  evidex search \"car\" --collection case42__attachments_image --json"
    )]
    Search {
        query: String,

        /// Collection to search (default: the case's image collection)
        #[arg(long, conflicts_with = "text")]
        collection: Option<String>,

        /// Search the case's text collection
        #[arg(long)]
        text: bool,

        #[arg(short, long)]
        limit: Option<usize>,

        /// Comma-separated output fields: path, modality, content, metadata
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,

        #[arg(long)]
        json: bool,
    },

    #[command(
        about = "Find records whose field contains a substring (case-sensitive)",
        after_help = "Examples:\n  evidex grep 555-0100\n  evidex grep .png --field path --collection case42__attachments_image"
    )]
    Grep {
        substring: String,

        /// Collection to query (default: the case's text collection)
        #[arg(long)]
        collection: Option<String>,

        /// Field to match: path, modality, content or metadata
        #[arg(long, default_value = "content")]
        field: String,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,

        #[arg(long)]
        json: bool,
    },

    #[command(about = "List collections with their descriptions")]
    Collections {
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Show a collection's schema and row counts")]
    Describe {
        name: String,

        #[arg(long)]
        json: bool,
    },

    #[command(about = "Delete a collection and its stored records")]
    Drop {
        name: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::GeneralError.into()
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Commands::Init { force } = &cli.command {
        let path = Settings::init_config_file(*force)
            .map_err(|e| anyhow!("{e}"))
            .context("Failed to create configuration")?;
        println!("Created configuration file at: {}", path.display());
        println!("Edit this file to customize your settings.");
        return Ok(ExitCode::Success);
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("Configuration error loading {}", path.display()))?,
        None => Settings::load().context("Configuration error")?,
    };

    if let Err(reason) = settings.validate() {
        eprintln!("Invalid configuration: {reason}");
        return Ok(ExitCode::ConfigError);
    }

    if let Commands::Config = &cli.command {
        println!("Current Configuration:");
        println!("{}", "=".repeat(50));
        println!("{}", toml::to_string_pretty(&settings)?);
        return Ok(ExitCode::Success);
    }

    match init_logging(&settings) {
        Ok(Some(path)) => tracing::debug!(log_file = %path.display(), "Logging to file"),
        Ok(None) => {}
        Err(e) => eprintln!("Warning: could not open log file: {e}"),
    }

    let gateway = StoreGateway::new(&settings.store);

    match cli.command {
        Commands::Init { .. } | Commands::Config => Ok(ExitCode::Success),

        Commands::Ingest {
            path,
            batch_size,
            no_icon_filter,
            progress,
            dry_run,
            json,
        } => {
            let format = OutputFormat::from_json_flag(json);
            let root = path.unwrap_or_else(|| settings.attachments_dir());
            let mut options = IngestOptions::from(&settings.ingest);
            if let Some(size) = batch_size {
                options.batch_size = size;
            }
            options.filter_icons &= !no_icon_filter;
            options.show_progress = progress && !json;
            options.dry_run = dry_run;

            let provider = match provider_from_config(
                &settings.embedding,
                settings.ingest.snippet_chars,
                settings.ingest.icon_size_guard,
            ) {
                Ok(provider) => provider,
                Err(e) => {
                    return Ok(report_error(
                        format,
                        e.status_code(),
                        &e.to_string(),
                        e.recovery_suggestions(),
                    ));
                }
            };
            let extractor = FileAttributesExtractor;
            let ingestor =
                Ingestor::new(&provider, &gateway, &extractor, &settings.case_name)
                    .with_options(options);

            match ingestor.ingest(&root) {
                Ok(report) => {
                    if format.is_json() {
                        print_json(&JsonResponse::success(&report))?;
                    } else {
                        println!("{report}");
                    }
                    Ok(ExitCode::Success)
                }
                Err(e) => Ok(report_error(
                    format,
                    e.status_code(),
                    &e.to_string(),
                    e.recovery_suggestions(),
                )),
            }
        }

        Commands::Search {
            query,
            collection,
            text,
            limit,
            fields,
            json,
        } => {
            let format = OutputFormat::from_json_flag(json);
            let fields = match parse_fields(fields.as_deref()) {
                Ok(fields) => fields,
                Err(reason) => return Ok(report_invalid(format, &reason)),
            };
            let provider = match provider_from_config(
                &settings.embedding,
                settings.ingest.snippet_chars,
                settings.ingest.icon_size_guard,
            ) {
                Ok(provider) => provider,
                Err(e) => {
                    return Ok(report_error(
                        format,
                        e.status_code(),
                        &e.to_string(),
                        e.recovery_suggestions(),
                    ));
                }
            };
            let retriever = Retriever::from_settings(&provider, &gateway, &settings);
            let target = collection.unwrap_or_else(|| {
                if text {
                    retriever.collections().text.clone()
                } else {
                    retriever.collections().image.clone()
                }
            });

            let started = Instant::now();
            let search = || retriever.search_by_text(&query, &target, limit, fields.as_deref());
            let result = if format.is_json() {
                search()
            } else {
                with_spinner("Searching...", search)
            };

            match result {
                Ok(hits) => print_hits(format, &query, &target, &hits, started),
                Err(e) => Ok(report_error_with_payload(
                    format,
                    e.status_code(),
                    &e.to_string(),
                    e.recovery_suggestions(),
                    e.to_payload(),
                )),
            }
        }

        Commands::Grep {
            substring,
            collection,
            field,
            limit,
            fields,
            json,
        } => {
            let format = OutputFormat::from_json_flag(json);
            let field: OutputField = match field.parse() {
                Ok(field) => field,
                Err(reason) => return Ok(report_invalid(format, &reason)),
            };
            let fields = match parse_fields(fields.as_deref()) {
                Ok(fields) => fields,
                Err(reason) => return Ok(report_invalid(format, &reason)),
            };

            // Models load lazily; a substring query never triggers them.
            let provider = provider_from_config(
                &settings.embedding,
                settings.ingest.snippet_chars,
                settings.ingest.icon_size_guard,
            )?;
            let retriever = Retriever::from_settings(&provider, &gateway, &settings);
            let target = collection.unwrap_or_else(|| retriever.collections().text.clone());

            let started = Instant::now();
            match retriever.text_search(&target, &substring, field, limit, fields.as_deref()) {
                Ok(hits) => print_hits(format, &substring, &target, &hits, started),
                Err(e) => Ok(report_error_with_payload(
                    format,
                    e.status_code(),
                    &e.to_string(),
                    e.recovery_suggestions(),
                    e.to_payload(),
                )),
            }
        }

        Commands::Collections { json } => {
            let format = OutputFormat::from_json_flag(json);
            let listed = gateway.list_collections().and_then(|names| {
                names
                    .into_iter()
                    .map(|name| gateway.describe(&name))
                    .collect::<Result<Vec<_>, _>>()
            });
            match listed {
                Ok(infos) => {
                    if format.is_json() {
                        let summary: Vec<_> = infos
                            .iter()
                            .map(|info| {
                                json!({
                                    "name": info.schema.name,
                                    "description": info.schema.description,
                                    "row_count": info.row_count,
                                    "dimension": info.schema.dimension.get(),
                                })
                            })
                            .collect();
                        print_json(&JsonResponse::success(summary))?;
                    } else if infos.is_empty() {
                        println!("No collections. Run 'evidex ingest' first.");
                    } else {
                        for info in &infos {
                            println!(
                                "{}  ({} rows, dim {})  {}",
                                info.schema.name,
                                info.row_count,
                                info.schema.dimension,
                                info.schema.description
                            );
                        }
                    }
                    Ok(ExitCode::Success)
                }
                Err(e) => Ok(report_error(
                    format,
                    e.status_code(),
                    &e.to_string(),
                    e.recovery_suggestions(),
                )),
            }
        }

        Commands::Describe { name, json } => {
            let format = OutputFormat::from_json_flag(json);
            match gateway.describe(&name) {
                Ok(info) => {
                    if format.is_json() {
                        print_json(&JsonResponse::success(&info))?;
                    } else {
                        println!("{info}");
                    }
                    Ok(ExitCode::Success)
                }
                Err(e) => Ok(report_error(
                    format,
                    e.status_code(),
                    &e.to_string(),
                    e.recovery_suggestions(),
                )),
            }
        }

        Commands::Drop { name, yes } => {
            if !yes {
                eprintln!("Refusing to drop '{name}' without --yes");
                return Ok(ExitCode::GeneralError);
            }
            match gateway.drop_collection(&name) {
                Ok(()) => {
                    println!("Dropped collection '{name}'");
                    Ok(ExitCode::Success)
                }
                Err(e) => Ok(report_error(
                    OutputFormat::Text,
                    e.status_code(),
                    &e.to_string(),
                    e.recovery_suggestions(),
                )),
            }
        }
    }
}

fn parse_fields(raw: Option<&[String]>) -> Result<Option<Vec<OutputField>>, String> {
    raw.map(|names| names.iter().map(|name| name.trim().parse()).collect())
        .transpose()
}

fn print_json<T: Serialize>(response: &JsonResponse<T>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

fn print_hits(
    format: OutputFormat,
    query: &str,
    collection: &str,
    hits: &[Hit],
    started: Instant,
) -> anyhow::Result<ExitCode> {
    let code = ExitCode::from_hits(hits);
    if format.is_json() {
        let meta = ResponseMeta::now(Some(started.elapsed().as_millis() as u64));
        let response = if code.is_success() {
            JsonResponse::success(hits)
        } else {
            JsonResponse::empty(hits, query)
        };
        print_json(&response.with_meta(meta))?;
        return Ok(code);
    }

    if hits.is_empty() {
        println!("No results in {collection} for '{query}'");
        return Ok(code);
    }

    println!("{} result(s) in {collection}:", hits.len());
    for (rank, hit) in hits.iter().enumerate() {
        match hit.score {
            Some(score) => println!("{:>3}. [{score:.4}] {}", rank + 1, hit.path().unwrap_or("?")),
            None => println!("{:>3}. {}", rank + 1, hit.path().unwrap_or("?")),
        }
        for (key, value) in &hit.fields {
            if key == "path" {
                continue;
            }
            let text = value.as_str().map_or_else(|| value.to_string(), str::to_string);
            for line in text.lines() {
                println!("       {key}: {line}");
            }
        }
    }
    Ok(code)
}

fn report_invalid(format: OutputFormat, reason: &str) -> ExitCode {
    report_error(
        format,
        "INVALID_REQUEST",
        reason,
        vec!["Valid fields: path, modality, content, metadata"],
    )
}

fn report_error(
    format: OutputFormat,
    code: &str,
    message: &str,
    suggestions: Vec<&str>,
) -> ExitCode {
    let response = JsonResponse::error(code, message, suggestions);
    emit_error(format, response)
}

fn report_error_with_payload(
    format: OutputFormat,
    code: &str,
    message: &str,
    suggestions: Vec<&str>,
    payload: serde_json::Value,
) -> ExitCode {
    let response = JsonResponse::error(code, message, suggestions).with_context(payload);
    emit_error(format, response)
}

fn emit_error(format: OutputFormat, response: JsonResponse) -> ExitCode {
    let code = ExitCode::from_status_code(&response.code);
    if format.is_json() {
        match serde_json::to_string_pretty(&response) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    } else {
        eprintln!("Error [{}]: {}", response.code, response.message);
        if let Some(details) = &response.error {
            for suggestion in &details.suggestions {
                eprintln!("  - {suggestion}");
            }
        }
    }
    code
}
