//! Durable credential record.
//!
//! The record holds the unseal key shares and root token produced by the first
//! initialization. It is read and written wholesale as YAML; a write either
//! fully replaces the previous record or leaves it untouched.

use std::io::Write;
use std::path::{Path, PathBuf};

use harness_common::{HarnessError, Result, UnsealMaterial};
use tracing::{debug, info};

/// File-backed store for a cluster's `UnsealMaterial`
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the record back
    pub fn load(&self) -> Result<UnsealMaterial> {
        info!(path = %self.path.display(), "Reading credentials from disk");

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HarnessError::CredentialsMissing(self.path.clone()));
            }
            Err(e) => {
                return Err(HarnessError::Credentials(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let material: UnsealMaterial = serde_yaml::from_str(&contents).map_err(|e| {
            HarnessError::Credentials(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;

        if material.keys.is_empty() {
            return Err(HarnessError::Credentials(format!(
                "{} holds no unseal keys",
                self.path.display()
            )));
        }

        Ok(material)
    }

    /// Fail unless a record could be written at this path right now.
    ///
    /// Run before initializing a cluster; fresh unseal material exists only
    /// in memory until it is saved.
    pub fn ensure_writable(&self) -> Result<()> {
        let dir = self.prepare_dir()?;
        self.temp_file_in(&dir)?;
        if self.path.is_dir() {
            return Err(HarnessError::Credentials(format!(
                "{} is a directory",
                self.path.display()
            )));
        }

        debug!(path = %self.path.display(), "Credential record is writable");
        Ok(())
    }

    /// Replace the record with `material`
    pub fn save(&self, material: &UnsealMaterial) -> Result<()> {
        let dir = self.prepare_dir()?;

        let yaml = serde_yaml::to_string(material)
            .map_err(|e| HarnessError::Credentials(format!("Failed to encode record: {}", e)))?;

        let mut tmp = self.temp_file_in(&dir)?;
        tmp.write_all(yaml.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| HarnessError::Credentials(format!("Failed to write record: {}", e)))?;
        tmp.persist(&self.path).map_err(|e| {
            HarnessError::Credentials(format!(
                "Failed to persist {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        debug!(
            path = %self.path.display(),
            keys = material.keys.len(),
            "Credential record written"
        );

        Ok(())
    }

    fn prepare_dir(&self) -> Result<PathBuf> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        std::fs::create_dir_all(&dir).map_err(|e| {
            HarnessError::Credentials(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        Ok(dir)
    }

    fn temp_file_in(&self, dir: &Path) -> Result<tempfile::NamedTempFile> {
        tempfile::NamedTempFile::new_in(dir).map_err(|e| {
            HarnessError::Credentials(format!(
                "Failed to create temp file in {}: {}",
                dir.display(),
                e
            ))
        })
    }
}
