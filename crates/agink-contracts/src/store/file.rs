use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde_json::{Map, Value};

use super::KeyValueStore;

/// Key-value store backed by a single JSON object file.
///
/// The file is re-read on every access and writes merge only the touched key
/// into whatever is on disk, so separate handles on the same path keep each
/// other's keys.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    inner: Arc<JsonFileStoreInner>,
}

#[derive(Debug)]
struct JsonFileStoreInner {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(JsonFileStoreInner {
                path: path.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn update(&self, key: &str, value: Option<&str>) -> anyhow::Result<()> {
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let mut on_disk = read_json_object(&self.inner.path).unwrap_or_default();
        match value {
            Some(value) => {
                if on_disk.get(key).and_then(Value::as_str) == Some(value) {
                    return Ok(());
                }
                on_disk.insert(key.to_string(), Value::String(value.to_string()));
            }
            None => {
                if on_disk.remove(key).is_none() {
                    return Ok(());
                }
            }
        }
        write_json_object(&self.inner.path, &on_disk)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        read_json_object(&self.inner.path)?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(err) = self.update(key, Some(value)) {
            tracing::warn!(
                key,
                path = %self.inner.path.display(),
                "store write failed: {err:#}"
            );
        }
    }

    fn remove(&self, key: &str) {
        if let Err(err) = self.update(key, None) {
            tracing::warn!(
                key,
                path = %self.inner.path.display(),
                "store remove failed: {err:#}"
            );
        }
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "store file is not a JSON object; ignoring");
            None
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), "store file unreadable: {err}");
            None
        }
    }
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )
    .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
