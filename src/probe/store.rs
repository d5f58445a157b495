use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use dashmap::DashMap;

use crate::DATA_FILE_DISABLED;

use super::ProbeResult;

/// Latest result of every prober, keyed by prober name, persisted as YAML so
/// the SLA statistics survive a restart.
#[derive(Debug, Default)]
pub struct ResultStore {
    data: DashMap<String, ProbeResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<ProbeResult> {
        self.data.get(name).map(|r| r.clone())
    }

    pub fn set(&self, result: ProbeResult) {
        self.data.insert(result.name.clone(), result);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        if path.trim() == DATA_FILE_DISABLED {
            return Ok(());
        }

        let sorted: BTreeMap<String, ProbeResult> = self
            .data
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let yaml = serde_yaml::to_string(&sorted)?;

        let path = Path::new(path);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        fs::write(path, yaml).with_context(|| format!("failed to write {}", path.display()))?;

        log::debug!("[save] {} results saved to {}", sorted.len(), path.display());
        Ok(())
    }

    /// Loads a previously saved file; a missing file is not an error.
    pub fn load_from_file(&self, path: &str) -> Result<()> {
        if path.trim() == DATA_FILE_DISABLED {
            return Ok(());
        }

        let path = Path::new(path);
        if !path.exists() {
            log::info!("[load] data file {} does not exist yet", path.display());
            return Ok(());
        }

        let content =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let loaded: BTreeMap<String, ProbeResult> = serde_yaml::from_slice(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let n = loaded.len();
        for (name, r) in loaded {
            self.data.insert(name, r);
        }
        log::info!("[load] {} results loaded from {}", n, path.display());
        Ok(())
    }
}
