//! INI file configuration adapter.

use crate::domain::error::AnalyticsError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::fs;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AnalyticsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_string(&content).map_err(|e| match e {
            AnalyticsError::ConfigParse { reason, .. } => AnalyticsError::ConfigParse {
                file: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_string(content: &str) -> Result<Self, AnalyticsError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| AnalyticsError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}
