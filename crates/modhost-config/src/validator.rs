//! Configuration validation.

use crate::error::ConfigError;
use crate::loader::ConfigLoader;
use crate::schema::Config;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// The warnings when there are no errors, otherwise a `Validation` error.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.first() {
            None => Ok(self.warnings),
            Some(first) => Err(ConfigError::Validation {
                count: self.errors.len(),
                first: format!("{}: {}", first.path, first.message),
            }),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_runtime(config, &mut result);
        Self::validate_plugins(config, &mut result);
        Self::validate_logging(config, &mut result);
        Self::validate_components(config, &mut result);

        Ok(result)
    }

    fn validate_runtime(config: &Config, result: &mut ValidationResult) {
        if config.runtime.phase_timeout_secs == Some(0) {
            result.add_error(ValidationError::new(
                "runtime.phase_timeout_secs",
                "phase_timeout_secs must be greater than 0 (omit it to disable the timeout)",
            ));
        }
    }

    fn validate_plugins(config: &Config, result: &mut ValidationResult) {
        let plugins = &config.plugins;

        if plugins.extension.is_empty() || plugins.extension.starts_with('.') {
            result.add_error(ValidationError::new(
                "plugins.extension",
                "extension must be non-empty and given without the leading dot",
            ));
        }

        // Dev mode never reads the directory
        if !config.runtime.dev_mode {
            if plugins.directory.is_empty() {
                result.add_error(ValidationError::new(
                    "plugins.directory",
                    "Plugin directory cannot be empty unless runtime.dev_mode is set",
                ));
            } else if !ConfigLoader::expand_path(&plugins.directory).exists() {
                result.add_warning(ValidationWarning::new(
                    "plugins.directory",
                    format!("Plugin directory does not exist: {}", plugins.directory),
                ));
            }
        }

        for name in &plugins.include {
            if plugins.exclude.contains(name) {
                result.add_error(ValidationError::new(
                    "plugins",
                    format!("Component '{}' is both included and excluded", name),
                ));
            }
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        let level = config.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            result.add_error(ValidationError::new(
                "logging.level",
                format!(
                    "Unknown log level '{}', valid values: {:?}",
                    config.logging.level, LOG_LEVELS
                ),
            ));
        }
    }

    fn validate_components(config: &Config, result: &mut ValidationResult) {
        for name in config.components.keys() {
            if config.plugins.exclude.contains(name) {
                result.add_warning(ValidationWarning::new(
                    format!("components.{}", name),
                    "Configuration given for an excluded component",
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
