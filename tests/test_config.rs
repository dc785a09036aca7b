//! Integration tests for configuration load, save and validation

use filterer::config::Config;
use filterer::error::FiltererError;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_save_and_load_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.rerank.chunk_size = 8;
    config.rerank.chunk_timeout = "750ms".to_string();
    config.pipeline.top_n = 12;
    config
        .filters
        .default_mapping
        .insert("terrace".to_string(), "processed_terrace_001".to_string());

    config.save(&path).unwrap();
    assert!(path.exists());

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.rerank.chunk_size, 8);
    assert_eq!(
        loaded.rerank.chunk_timeout().unwrap(),
        Duration::from_millis(750)
    );
    assert_eq!(loaded.pipeline.top_n, 12);
    assert_eq!(
        loaded.filters.default_mapping["terrace"],
        "processed_terrace_001"
    );
    assert_eq!(
        loaded.filters.default_mapping["cuisine_type"],
        "processed_refined_cuisine_types_001"
    );
}

#[test]
fn test_partial_file_uses_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[_meta]
schema_version = "1.0.0"

[rerank]
chunk_size = 3
max_concurrent_chunks = 2
chunk_timeout = "10s"
"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();

    assert_eq!(config.rerank.chunk_size, 3);
    assert_eq!(config.pipeline.top_n, 30);
    assert_eq!(config.pipeline.target_language, "en");
    assert_eq!(config.filters.default_mapping.len(), 3);
}

#[test]
fn test_invalid_file_reports_every_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[_meta]
schema_version = "0.1.0"

[rerank]
chunk_size = 0
max_concurrent_chunks = 4
chunk_timeout = "soon"

[pipeline]
top_n = 30
language_confidence = 1.5
target_language = "en"
default_country_code = "es"
default_city_code = "vlc"
"#,
    )
    .unwrap();

    match Config::load(&path) {
        Err(FiltererError::ConfigValidation { errors }) => {
            let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
            assert_eq!(
                paths,
                vec![
                    "_meta.schema_version",
                    "rerank.chunk_size",
                    "rerank.chunk_timeout",
                    "pipeline.language_confidence",
                ]
            );
        }
        other => panic!("expected validation errors, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.toml");

    assert!(matches!(
        Config::load(&path),
        Err(FiltererError::ConfigNotFound { .. })
    ));
}

#[test]
fn test_malformed_toml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[_meta\nschema_version = ").unwrap();

    assert!(matches!(Config::load(&path), Err(FiltererError::Toml(_))));
}
