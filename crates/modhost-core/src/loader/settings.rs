//! Loader settings.

use std::path::PathBuf;

/// Where units are discovered and which component names may load.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub directory: PathBuf,
    /// File extension without the dot.
    pub extension: String,
    /// When non-empty, only these names load.
    pub include: Vec<String>,
    /// Never loaded; wins over `include`.
    pub exclude: Vec<String>,
}

impl LoaderSettings {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            extension: std::env::consts::DLL_EXTENSION.to_string(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = names.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the include/exclude filter lets `name` load.
    pub fn allows(&self, name: &str) -> bool {
        if self.exclude.iter().any(|n| n == name) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|n| n == name)
    }

    /// File names a unit for component `name` may have, in lookup order.
    pub(crate) fn candidate_files(&self, name: &str) -> Vec<PathBuf> {
        vec![
            self.directory.join(format!("{name}.{}", self.extension)),
            self.directory
                .join(format!("lib{}.{}", name.replace('-', "_"), self.extension)),
        ]
    }
}
