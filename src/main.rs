use filterer::cli::{Cli, Commands, ConfigAction};
use filterer::config::{Config, ConfigValidator};
use filterer::error::{FiltererError, Result};
use filterer::filters::{json_kind, FilterMapping, FilterService};
use filterer::pipeline::{scoring_items, Business};
use filterer::rerank::{apply_scores, BatchReranker, StaticScorer};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Commands::Merge {
            existing,
            extracted,
            mapping,
        } => {
            cmd_merge(cli.config, &existing, &extracted, mapping.as_deref())?;
        }
        Commands::Process { extracted, mapping } => {
            cmd_process(cli.config, &extracted, mapping.as_deref())?;
        }
        Commands::Clean { filters } => {
            let filters = read_object(&filters)?;
            print_json(&FilterService::clean_empty_filters(&filters)?)?;
        }
        Commands::EmptyKeys { filters } => {
            let filters = read_object(&filters)?;
            print_json(&FilterService::empty_filter_keys(&filters)?)?;
        }
        Commands::ScoreMapping { extracted } => {
            let extracted = read_object(&extracted)?;
            print_json(&FilterService::generate_score_mapping(&extracted))?;
        }
        Commands::Rerank {
            query,
            candidates,
            scores,
            chunk_size,
        } => {
            cmd_rerank(cli.config, &query, &candidates, &scores, chunk_size)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "filterer=debug" } else { "filterer=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_merge(
    config_path: Option<PathBuf>,
    existing: &Path,
    extracted: &Path,
    mapping: Option<&Path>,
) -> Result<()> {
    let config = Config::load_or_default(config_path.as_deref())?;
    let service = FilterService::from_config(&config.filters);

    let existing = read_object(existing)?;
    let extracted = read_object(extracted)?;
    let mapping = mapping.map(read_mapping).transpose()?;

    let merged = service.merge_filters(&existing, &extracted, mapping.as_ref())?;
    print_json(&merged)
}

fn cmd_process(
    config_path: Option<PathBuf>,
    extracted: &Path,
    mapping: Option<&Path>,
) -> Result<()> {
    let config = Config::load_or_default(config_path.as_deref())?;
    let service = FilterService::from_config(&config.filters);

    let extracted = read_object(extracted)?;
    let mapping = mapping.map(read_mapping).transpose()?;

    let processed = service.process_extracted_filters(&extracted, mapping.as_ref())?;
    print_json(&processed)
}

fn cmd_rerank(
    config_path: Option<PathBuf>,
    query: &str,
    candidates: &Path,
    scores: &Path,
    chunk_size: Option<usize>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path.as_deref())?;
    if let Some(size) = chunk_size {
        config.rerank.chunk_size = size;
    }

    let candidates: Vec<Business> =
        serde_json::from_value(read_json(candidates)?).map_err(|e| FiltererError::Json {
            source: e,
            context: "Candidates must be an array of businesses".to_string(),
        })?;
    let scorer = StaticScorer::from_json(&read_text(scores)?)?;
    tracing::info!(
        "Reranking {} candidates with {} precomputed scores",
        candidates.len(),
        scorer.len()
    );

    let reranker = BatchReranker::from_config(Arc::new(scorer), &config.rerank)?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| FiltererError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    let outcome = rt.block_on(reranker.rerank(query, scoring_items(&candidates)))?;

    let status = outcome.status();
    let unscored: Vec<String> = outcome.unscored_ids().map(str::to_string).collect();
    let failures: Vec<String> = outcome
        .failed_chunks
        .iter()
        .map(|failure| failure.error.to_string())
        .collect();
    let violations: Vec<String> = outcome
        .integrity_violations
        .iter()
        .map(ToString::to_string)
        .collect();
    let ranked = apply_scores(candidates, &outcome.ranked);

    print_json(&json!({
        "status": status,
        "total_chunks": outcome.total_chunks,
        "duration_ms": outcome.duration_ms,
        "ranked": ranked,
        "unscored": unscored,
        "errors": failures,
        "violations": violations,
    }))
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path)?;
            let value = match section.as_deref() {
                None => to_json(&config)?,
                Some("filters") => to_json(&config.filters)?,
                Some("rerank") => to_json(&config.rerank)?,
                Some("pipeline") => to_json(&config.pipeline)?,
                Some(other) => {
                    return Err(FiltererError::Config(format!(
                        "Unknown section '{}' (expected filters, rerank or pipeline)",
                        other
                    )))
                }
            };
            print_json(&value)?;
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            ConfigValidator::validate(&config)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
        ConfigAction::Path => {
            println!("{}", Config::default_path()?.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'filterer config init' to create one."
        );
        return Config::load_or_default(None);
    }

    Config::load(&path)
}

fn read_text(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| FiltererError::Io {
                source: e,
                context: "Failed to read stdin".to_string(),
            })?;
        return Ok(buf);
    }

    std::fs::read_to_string(path).map_err(|e| FiltererError::Io {
        source: e,
        context: format!("Failed to read {:?}", path),
    })
}

fn read_json(path: &Path) -> Result<Value> {
    serde_json::from_str(&read_text(path)?).map_err(|e| FiltererError::Json {
        source: e,
        context: format!("Failed to parse {:?}", path),
    })
}

fn read_object(path: &Path) -> Result<Map<String, Value>> {
    match read_json(path)? {
        Value::Object(map) => Ok(map),
        other => Err(FiltererError::Validation(format!(
            "Expected a JSON object in {:?}, got {}",
            path,
            json_kind(&other)
        ))),
    }
}

fn read_mapping(path: &Path) -> Result<FilterMapping> {
    serde_json::from_value(read_json(path)?).map_err(|e| FiltererError::Json {
        source: e,
        context: "Mapping must be an object of string to string".to_string(),
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| FiltererError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| FiltererError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })?;
    println!("{}", text);
    Ok(())
}
