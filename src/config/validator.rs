use crate::config::{parse_duration, Config, SCHEMA_VERSION};
use crate::error::{FiltererError, Result, ValidationError};
use crate::filters::is_routing_field;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        // Validate schema version
        Self::validate_schema_version(config, &mut errors);

        // Validate filter mapping
        Self::validate_filters(config, &mut errors);

        // Validate rerank settings
        Self::validate_rerank(config, &mut errors);

        // Validate pipeline settings
        Self::validate_pipeline(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FiltererError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_filters(config: &Config, errors: &mut Vec<ValidationError>) {
        for (from, to) in &config.filters.default_mapping {
            let path = format!("filters.default_mapping.{}", from);

            if from.trim().is_empty() || to.trim().is_empty() {
                errors.push(ValidationError::new(
                    path,
                    "Mapping keys and values cannot be empty",
                ));
                continue;
            }

            // Routing fields are stripped before mapping ever sees them
            if is_routing_field(to) {
                errors.push(ValidationError::new(
                    path,
                    format!("Cannot map onto routing field '{}'", to),
                ));
            }
        }
    }

    fn validate_rerank(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.rerank.chunk_size == 0 {
            errors.push(ValidationError::new(
                "rerank.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        if config.rerank.max_concurrent_chunks == 0 {
            errors.push(ValidationError::new(
                "rerank.max_concurrent_chunks",
                "Max concurrent chunks must be greater than 0",
            ));
        }

        match parse_duration(&config.rerank.chunk_timeout) {
            Some(timeout) if timeout.is_zero() => errors.push(ValidationError::new(
                "rerank.chunk_timeout",
                "Chunk timeout must be greater than 0",
            )),
            Some(_) => {}
            None => errors.push(ValidationError::new(
                "rerank.chunk_timeout",
                format!("Invalid duration format: {}", config.rerank.chunk_timeout),
            )),
        }
    }

    fn validate_pipeline(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.pipeline.top_n == 0 {
            errors.push(ValidationError::new(
                "pipeline.top_n",
                "top_n must be greater than 0",
            ));
        }

        let confidence = config.pipeline.language_confidence;
        if !(0.0..=1.0).contains(&confidence) {
            errors.push(ValidationError::new(
                "pipeline.language_confidence",
                format!("Confidence must be between 0.0 and 1.0, got {}", confidence),
            ));
        }

        if config.pipeline.target_language.is_empty() {
            errors.push(ValidationError::new(
                "pipeline.target_language",
                "Target language cannot be empty",
            ));
        }
    }
}
