//! Persisted UI snapshots, stored as one JSON object keyed by name.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Key of the cached generator form values.
pub const FORM_VALUES_KEY: &str = "generator-form-values";

/// Key marking that first-run defaults were applied.
pub const DEFAULTS_APPLIED_KEY: &str = "generator-defaults-applied";

/// Generator form values remembered between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorFormValues {
    pub width: u32,
    pub height: u32,
    pub hires_fix: bool,
    pub number_of_images: u32,
    pub steps: u32,
    pub seed: i64,
    pub cfg_scale: f64,
    pub sampler: String,
    pub styles: Vec<String>,
    pub prompt: String,
    pub negative_prompt: String,
}

impl Default for GeneratorFormValues {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            hires_fix: false,
            number_of_images: 4,
            steps: 24,
            seed: -1,
            cfg_scale: 7.5,
            sampler: "EULER_A".to_string(),
            styles: Vec::new(),
            prompt: String::new(),
            negative_prompt: String::new(),
        }
    }
}

/// A small JSON-file key-value store. Without a path it lives in memory.
#[derive(Debug, Default)]
pub struct KeyValueStore {
    path: Option<PathBuf>,
    values: Map<String, Value>,
}

impl KeyValueStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            Map::new()
        };
        Ok(Self {
            path: Some(path),
            values,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Value at `key`, or `None` if absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        self.values
            .insert(key.to_string(), serde_json::to_value(value)?);
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Cached form values; defaults when absent or unreadable.
    pub fn form_values(&self) -> GeneratorFormValues {
        match self.get(FORM_VALUES_KEY) {
            Ok(Some(values)) => values,
            Ok(None) => GeneratorFormValues::default(),
            Err(e) => {
                tracing::warn!("Discarding unreadable {}: {}", FORM_VALUES_KEY, e);
                GeneratorFormValues::default()
            }
        }
    }

    pub fn set_form_values(&mut self, values: &GeneratorFormValues) -> Result<()> {
        self.set(FORM_VALUES_KEY, values)
    }

    pub fn reset_form_values(&mut self) -> Result<()> {
        self.remove(FORM_VALUES_KEY)
    }

    pub fn defaults_applied(&self) -> bool {
        matches!(self.get::<bool>(DEFAULTS_APPLIED_KEY), Ok(Some(true)))
    }

    pub fn mark_defaults_applied(&mut self) -> Result<()> {
        self.set(DEFAULTS_APPLIED_KEY, &true)
    }

    fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.values)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
