//! `modhost check-config`.

use std::path::Path;

use modhost_config::{ConfigLoader, ConfigValidator};

pub(crate) fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load(path)?;
    let result = ConfigValidator::validate(&config)?;

    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }
    for warning in result.into_result()? {
        println!("warning: {}: {}", warning.path, warning.message);
    }

    println!("{} is valid", path.display());
    Ok(())
}
