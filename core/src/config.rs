use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::checker::DEFAULT_ENDPOINT;
use crate::error::ConfigError;
use crate::Category;

pub const DEFAULT_CONFIG_FILE: &str = "orthography.yml";

/// Category switches applied before issues are normalised.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySettings {
    pub disable: Vec<Category>,
}

/// User settings for the overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: String,
    /// Quiet period before an edit triggers a check.
    pub debounce_ms: u64,
    /// Quiet period before a manual re-run starts.
    pub rerun_debounce_ms: u64,
    pub auto_check: bool,
    /// Move later issues by the length change of each applied replacement.
    pub shift_pending_offsets: bool,
    pub exclude: Vec<String>,
    pub categories: CategorySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            debounce_ms: 500,
            rerun_debounce_ms: 0,
            auto_check: true,
            shift_pending_offsets: false,
            exclude: vec!["**/.git/**".into(), "**/node_modules/**".into()],
            categories: CategorySettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn rerun_debounce(&self) -> Duration {
        Duration::from_millis(self.rerun_debounce_ms)
    }

    pub fn disabled_categories(&self) -> HashSet<Category> {
        self.categories.disable.iter().copied().collect()
    }

    /// Compile `exclude` into a matcher, `None` when the list is empty.
    pub fn exclude_set(&self) -> Result<Option<GlobSet>, ConfigError> {
        if self.exclude.is_empty() {
            return Ok(None);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| ConfigError::Glob {
            pattern: self.exclude.join(","),
            source,
        })?;
        Ok(Some(set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let settings = Settings::from_yaml("").unwrap();
        assert_eq!(settings.debounce_ms, 500);
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert!(!settings.shift_pending_offsets);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let settings = Settings::from_yaml(
            "endpoint: http://localhost:9000/check\ncategories:\n  disable: [Wordiness]\n",
        )
        .unwrap();
        assert_eq!(settings.endpoint, "http://localhost:9000/check");
        assert_eq!(settings.rerun_debounce(), Duration::ZERO);
        assert!(settings
            .disabled_categories()
            .contains(&Category::Wordiness));
    }

    #[test]
    fn exclude_globs_match_paths() {
        let settings = Settings {
            exclude: vec!["drafts/**".into()],
            ..Settings::default()
        };
        let set = settings.exclude_set().unwrap().unwrap();
        assert!(set.is_match("drafts/today.md"));
        assert!(!set.is_match("notes/today.md"));
    }

    #[test]
    fn invalid_glob_is_reported() {
        let settings = Settings {
            exclude: vec!["[".into()],
            ..Settings::default()
        };
        assert!(matches!(
            settings.exclude_set(),
            Err(ConfigError::Glob { .. })
        ));
    }

    #[test]
    fn missing_file_means_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/orthography.yml")).unwrap();
        assert!(settings.auto_check);
    }
}
