use glob::glob;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vrts_common::VrtsError;

const DEFAULT_PATTERN: &str = "*.*";

/// Collects input files from glob patterns
pub struct FileCollector {
    patterns: Vec<String>,
    recursive: bool,
    keep_ignored: bool,
    repeat: usize,
    ignored_extensions: Vec<String>,
}

impl FileCollector {
    pub fn new(patterns: Vec<String>) -> Self {
        let patterns = if patterns.is_empty() {
            vec![DEFAULT_PATTERN.to_string()]
        } else {
            patterns
        };

        Self {
            patterns,
            recursive: false,
            keep_ignored: false,
            repeat: 0,
            ignored_extensions: Vec::new(),
        }
    }

    /// Also match the patterns in every subdirectory
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Extensions (with leading dot) skipped unless `keep_ignored` is set
    pub fn with_ignored_extensions(mut self, extensions: &[String]) -> Self {
        self.ignored_extensions = extensions.iter().map(|ext| ext.to_lowercase()).collect();
        self
    }

    pub fn with_keep_ignored(mut self, keep_ignored: bool) -> Self {
        self.keep_ignored = keep_ignored;
        self
    }

    /// Add every file `repeat` more times
    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn collect(&self) -> Result<Vec<PathBuf>, VrtsError> {
        let mut files = Vec::new();

        for pattern in &self.patterns {
            let pattern = if self.recursive {
                recursive_pattern(pattern)
            } else {
                pattern.clone()
            };

            let entries = glob(&pattern)
                .map_err(|e| VrtsError::Path(format!("Invalid pattern '{}': {}", pattern, e)))?;

            for entry in entries {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        warn!("Skipping unreadable path: {}", e);
                        continue;
                    }
                };

                if !path.is_file() {
                    continue;
                }
                if !self.keep_ignored && self.is_ignored(&path) {
                    debug!("Ignoring {}", path.display());
                    continue;
                }

                for _ in 0..=self.repeat {
                    files.push(path.clone());
                }
            }
        }

        debug!("Collected {} files", files.len());
        Ok(files)
    }

    fn is_ignored(&self, path: &Path) -> bool {
        match path.extension() {
            Some(ext) => {
                let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
                self.ignored_extensions.contains(&ext)
            }
            None => false,
        }
    }
}

// "dir/*.adx" -> "dir/**/*.adx", "*.adx" -> "**/*.adx"
fn recursive_pattern(pattern: &str) -> String {
    let path = Path::new(pattern);
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            parent.join("**").join(name).to_string_lossy().into_owned()
        }
        _ => format!("**/{}", pattern),
    }
}
