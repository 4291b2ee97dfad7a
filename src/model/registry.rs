use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use thiserror::Error;

use crate::model::record::PluginRecord;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{}: registry is not a JSON array", path.display())]
    NotAnArray { path: PathBuf },
    #[error("{}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Correlation handle from a projected row back to its record.
///
/// Minted against a specific store generation; any mutation bumps the
/// generation and invalidates every outstanding handle. Mutations through
/// a stale handle are silent no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHandle {
    index: usize,
    generation: u64,
}

/// The authoritative ordered collection of plugin records, tied to the
/// registry file it was loaded from.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    records: Vec<PluginRecord>,
    generation: u64,
}

impl Registry {
    pub fn from_records(path: PathBuf, records: Vec<PluginRecord>) -> Self {
        Self {
            path,
            records,
            generation: 0,
        }
    }

    /// Read the registry file. A missing file is the first-run condition
    /// and yields an empty store, not an error.
    pub fn load(path: PathBuf) -> Result<Self, RegistryError> {
        if !path.exists() {
            tracing::info!("registry file {} not found, starting empty", path.display());
            return Ok(Self::from_records(path, Vec::new()));
        }

        let raw = fs::read_to_string(&path).map_err(|source| RegistryError::Io {
            path: path.clone(),
            source,
        })?;

        let parsed: Value =
            serde_json::from_str(&raw).map_err(|source| RegistryError::Parse {
                path: path.clone(),
                source,
            })?;

        let Value::Array(items) = parsed else {
            return Err(RegistryError::NotAnArray { path });
        };

        let records = items.into_iter().map(PluginRecord::new).collect();
        Ok(Self::from_records(path, records))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[allow(dead_code)]
    pub fn records(&self) -> &[PluginRecord] {
        &self.records
    }

    /// Handles for every record in store order, minted for the current
    /// generation.
    pub fn iter_handles(&self) -> impl Iterator<Item = (RecordHandle, &PluginRecord)> {
        self.records.iter().enumerate().map(|(index, record)| {
            (
                RecordHandle {
                    index,
                    generation: self.generation,
                },
                record,
            )
        })
    }

    pub fn get(&self, handle: RecordHandle) -> Option<&PluginRecord> {
        if handle.generation != self.generation {
            return None;
        }
        self.records.get(handle.index)
    }

    /// Flip `enabled` on the referenced record. Returns false (and leaves
    /// the store untouched) when the handle is stale.
    pub fn toggle_enabled(&mut self, handle: RecordHandle) -> bool {
        if handle.generation != self.generation {
            return false;
        }
        let Some(record) = self.records.get_mut(handle.index) else {
            return false;
        };

        record.toggle_enabled();
        self.generation += 1;
        true
    }

    /// Remove the referenced record. A stale handle is a silent no-op
    /// returning false, per the delete contract.
    pub fn remove(&mut self, handle: RecordHandle) -> bool {
        if handle.generation != self.generation || handle.index >= self.records.len() {
            return false;
        }

        self.records.remove(handle.index);
        self.generation += 1;
        true
    }

    /// Serialize the store back to its file as a pretty-printed JSON
    /// array. Written to a sibling temp file and renamed into place so a
    /// failed write never truncates the registry.
    pub fn save(&self) -> Result<(), RegistryError> {
        let values: Vec<&Value> = self.records.iter().map(PluginRecord::as_value).collect();
        let mut text = serde_json::to_string_pretty(&values).map_err(|source| {
            RegistryError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        text.push('\n');

        let tmp = tmp_sibling(&self.path);
        let io_err = |source| RegistryError::Io {
            path: self.path.clone(),
            source,
        };

        fs::write(&tmp, text).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        tracing::info!("saved {} records to {}", self.records.len(), self.path.display());
        Ok(())
    }

    /// Copy the *on-disk* registry file to a timestamped sibling. This
    /// deliberately snapshots the last save, not the in-memory store:
    /// Save and Backup are independent operations.
    pub fn backup(&self) -> Result<PathBuf, RegistryError> {
        let timestamp = Local::now().format("%Y%m%d%H%M%S");
        let backup_path = PathBuf::from(format!("{}_{timestamp}.bak", self.path.display()));

        fs::copy(&self.path, &backup_path).map_err(|source| RegistryError::Io {
            path: self.path.clone(),
            source,
        })?;

        tracing::info!("backup created at {}", backup_path.display());
        Ok(backup_path)
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "registry".to_string());
    path.with_file_name(format!("{name}.tmp"))
}
