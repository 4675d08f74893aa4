//! ctx — local code-context engine CLI.
//!
//! Thin dispatcher: every command maps 1:1 onto a `CtxService` operation.
//! Exit codes: 0 success, 1 expected (typed) error, 2 unexpected error.

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

use ctx_core::CtxErr;
use ctx_core::CtxService;
use ctx_core::IndexOptions;
use ctx_core::ProjectConfig;
use ctx_core::QueryOptions;
use ctx_core::SearchResult;
use ctx_core::Strategy;

#[derive(Parser)]
#[command(name = "ctx")]
#[command(about = "Local code-context engine for AI coding agents")]
struct Cli {
    /// Debug-level diagnostics on stderr (also CTX_DEBUG=1)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the index state directory
    Init {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Build or incrementally update the index
    Index {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Skip the embedding phase (FTS/AST/path search still works)
        #[arg(long)]
        no_vectors: bool,
    },

    /// Search the index
    Query {
        query: String,
        /// Project root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Maximum results
        #[arg(short, long)]
        limit: Option<i32>,
        /// Strategies (comma separated: vector,fts,ast,path,dependency)
        #[arg(long, value_delimiter = ',')]
        strategy: Vec<String>,
        /// Restrict to one language
        #[arg(long)]
        language: Option<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
        /// Never run the vector strategy
        #[arg(long)]
        no_vectors: bool,
    },

    /// Show index status
    Status {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Inspect or edit configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
        /// Project root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Reclaim database space
    Vacuum {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print one value by dotted path (e.g. search.defaultLimit)
    Get { key: String },
    /// Set one value by dotted path
    Set { key: String, value: String },
    /// Restore defaults
    Reset,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let debug = cli.verbose || std::env::var("CTX_DEBUG").map(|v| v == "1").unwrap_or(false);
    let default_directive = if debug { "ctx_core=debug,ctx=debug" } else { "ctx_core=info,ctx=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e
                .downcast_ref::<CtxErr>()
                .map(|ctx| ctx.exit_code())
                .unwrap_or(2);
            std::process::exit(code);
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Init { path } => {
            let service = CtxService::new(&path);
            let config = service.init().await?;
            println!("initialized {} (embedder: {})", path.display(), config.embedder.signature());
        }
        Command::Index { path, no_vectors } => {
            let service = CtxService::new(&path);
            let stats = service
                .index(IndexOptions {
                    skip_embedding: no_vectors,
                    ..Default::default()
                })
                .await?;
            println!(
                "indexed {} files ({} added, {} modified, {} deleted, {} unchanged)",
                stats.files_discovered,
                stats.files_added,
                stats.files_modified,
                stats.files_deleted,
                stats.files_unchanged,
            );
            println!(
                "{} chunks, {} vectors, {} ms",
                stats.chunks_created, stats.vectors_created, stats.duration_ms
            );
        }
        Command::Query {
            query,
            path,
            limit,
            strategy,
            language,
            format,
            no_vectors,
        } => {
            let service = CtxService::new(&path);
            let strategies = parse_strategies(&strategy, no_vectors)?;
            let results = service
                .query(
                    &query,
                    QueryOptions {
                        limit,
                        strategies,
                        language,
                        ..Default::default()
                    },
                )
                .await?;
            print_results(&results, format)?;
        }
        Command::Status { path, format } => {
            let service = CtxService::new(&path);
            let status = service.status().await?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                Format::Text => {
                    println!(
                        "{} files, {} chunks, {} vectors ({} bytes on disk)",
                        status.store.files,
                        status.store.chunks,
                        status.store.vectors,
                        status.db_size_bytes,
                    );
                    for (language, count) in &status.store.languages {
                        println!("  {language}: {count}");
                    }
                    if let Some(embedder) = &status.embedder {
                        println!("embedder: {embedder}");
                    }
                    if let Some(ts) = status.store.last_indexed {
                        println!("last indexed: {ts}");
                    }
                }
            }
        }
        Command::Config { action, path } => run_config(action, &path)?,
        Command::Vacuum { path } => {
            let service = CtxService::new(&path);
            service.vacuum().await?;
            println!("vacuumed");
        }
    }
    Ok(())
}

fn run_config(action: ConfigAction, path: &std::path::Path) -> anyhow::Result<()> {
    let service = CtxService::new(path);
    match action {
        ConfigAction::Show => {
            let config = service.config_read()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Get { key } => {
            let config = service.config_read()?;
            let doc = serde_json::to_value(&config)?;
            match lookup(&doc, &key) {
                Some(value) => println!("{value}"),
                None => anyhow::bail!("unknown config key: {key}"),
            }
        }
        ConfigAction::Set { key, value } => {
            let config = service.config_read()?;
            let mut doc = serde_json::to_value(&config)?;
            // Values parse as JSON when possible, else as strings.
            let parsed: serde_json::Value =
                serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            set_path(&mut doc, &key, parsed)?;
            let updated: ProjectConfig = serde_json::from_value(doc)
                .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}"))?;
            service.config_write(&updated)?;
            println!("{key} updated");
        }
        ConfigAction::Reset => {
            service.config_write(&ProjectConfig::default())?;
            println!("configuration reset to defaults");
        }
    }
    Ok(())
}

fn parse_strategies(
    names: &[String],
    no_vectors: bool,
) -> anyhow::Result<Option<Vec<Strategy>>> {
    let mut strategies = Vec::new();
    for name in names {
        match Strategy::parse(name) {
            Some(strategy) => strategies.push(strategy),
            None => anyhow::bail!("unknown strategy: {name}"),
        }
    }
    if no_vectors {
        // Pin the effective set so the classifier cannot add vector back.
        if strategies.is_empty() {
            strategies = vec![Strategy::Fts, Strategy::Ast, Strategy::Path];
        } else {
            strategies.retain(|s| *s != Strategy::Vector);
        }
    }
    Ok(if strategies.is_empty() {
        None
    } else {
        Some(strategies)
    })
}

fn print_results(results: &[SearchResult], format: Format) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(results)?),
        Format::Text => {
            if results.is_empty() {
                println!("no results");
                return Ok(());
            }
            for (i, r) in results.iter().enumerate() {
                let name = r.name.as_deref().unwrap_or("-");
                println!(
                    "{:>2}. [{:.3}] {}:{}-{} {} ({})",
                    i + 1,
                    r.score,
                    r.file_path,
                    r.line_start,
                    r.line_end,
                    name,
                    r.kind,
                );
            }
        }
    }
    Ok(())
}

/// Walk a dotted path through a JSON document.
fn lookup<'a>(doc: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    key.split('.').try_fold(doc, |node, part| node.get(part))
}

/// Set a dotted path in a JSON document, creating objects as needed.
fn set_path(
    doc: &mut serde_json::Value,
    key: &str,
    value: serde_json::Value,
) -> anyhow::Result<()> {
    let mut node = doc;
    let parts: Vec<&str> = key.split('.').collect();
    let (last, parents) = parts.split_last().ok_or_else(|| anyhow::anyhow!("empty key"))?;
    for part in parents {
        node = node
            .as_object_mut()
            .ok_or_else(|| anyhow::anyhow!("{part} is not an object"))?
            .entry(part.to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    }
    node.as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("cannot set {key}"))?
        .insert(last.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strategies() {
        let parsed = parse_strategies(&["fts".to_string(), "ast".to_string()], false)
            .unwrap()
            .unwrap();
        assert_eq!(parsed, vec![Strategy::Fts, Strategy::Ast]);

        assert!(parse_strategies(&[], false).unwrap().is_none());
        assert!(parse_strategies(&["grep".to_string()], false).is_err());
    }

    #[test]
    fn test_no_vectors_pins_default_set() {
        let parsed = parse_strategies(&[], true).unwrap().unwrap();
        assert_eq!(parsed, vec![Strategy::Fts, Strategy::Ast, Strategy::Path]);

        let parsed = parse_strategies(&["vector".to_string(), "fts".to_string()], true)
            .unwrap()
            .unwrap();
        assert_eq!(parsed, vec![Strategy::Fts]);
    }

    #[test]
    fn test_lookup_and_set_path() {
        let mut doc = serde_json::json!({"search": {"defaultLimit": 10}});
        assert_eq!(
            lookup(&doc, "search.defaultLimit"),
            Some(&serde_json::json!(10))
        );
        assert_eq!(lookup(&doc, "search.missing"), None);

        set_path(&mut doc, "search.defaultLimit", serde_json::json!(5)).unwrap();
        set_path(&mut doc, "watch.debounceMs", serde_json::json!(250)).unwrap();
        assert_eq!(doc["search"]["defaultLimit"], 5);
        assert_eq!(doc["watch"]["debounceMs"], 250);
    }
}
