use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config store {0} does not hold a JSON object")]
    NotAnObject(PathBuf),
}

/// Persisted per-component configuration, keyed by config path.
pub trait ConfigStore {
    fn load(&self, path: &str) -> Result<Option<Value>, ConfigError>;

    fn save(&mut self, path: &str, value: &Value) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    entries: HashMap<String, Value>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, value: Value) {
        self.entries.insert(path.into(), value);
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self, path: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.entries.get(path).cloned())
    }

    fn save(&mut self, path: &str, value: &Value) -> Result<(), ConfigError> {
        self.entries.insert(path.to_string(), value.clone());
        Ok(())
    }
}

/// All config paths in one pretty-printed JSON object on disk. A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    file: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(file: impl AsRef<Path>) -> Self {
        Self {
            file: file.as_ref().to_path_buf(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    fn read_all(&self) -> Result<Map<String, Value>, ConfigError> {
        if !self.file.exists() {
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&self.file)?;
        match serde_json::from_str(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::NotAnObject(self.file.clone())),
        }
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn load(&self, path: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.read_all()?.remove(path))
    }

    fn save(&mut self, path: &str, value: &Value) -> Result<(), ConfigError> {
        let mut all = self.read_all()?;
        all.insert(path.to_string(), value.clone());
        if let Some(dir) = self.file.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let json = serde_json::to_string_pretty(&Value::Object(all))?;
        fs::write(&self.file, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_file_store_roundtrip_keeps_other_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileConfigStore::new(dir.path().join("cfg/sensors.json"));
        assert_eq!(store.load("/house/voltage").unwrap(), None);

        store
            .save("/house/voltage", &json!({"read_delay": 1000}))
            .unwrap();
        store
            .save("/thruster/amps", &json!({"read_delay": 250}))
            .unwrap();

        let reopened = JsonFileConfigStore::new(store.file());
        assert_eq!(
            reopened.load("/house/voltage").unwrap(),
            Some(json!({"read_delay": 1000}))
        );
        assert_eq!(
            reopened.load("/thruster/amps").unwrap(),
            Some(json!({"read_delay": 250}))
        );
    }

    #[test]
    fn test_json_file_store_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.json");
        fs::write(&file, "[1, 2, 3]").unwrap();
        let store = JsonFileConfigStore::new(&file);
        assert!(matches!(
            store.load("/x"),
            Err(ConfigError::NotAnObject(_))
        ));
    }
}
