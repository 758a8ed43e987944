// # Versioned JSON files
//
// Shared persistence for the file-backed link store and user directory.
//
// - Atomic writes: write to `<file>.tmp.<pid>`, then rename over the real file
// - Backup: the previous good file is copied to `<file>.backup` first
// - Recovery: an unparsable file is replaced by its backup, or by an empty
//   document if the backup is missing or unparsable too
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "data": { ... }
// }
// ```

use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;

/// File format version
pub const FILE_VERSION: &str = "1.0";

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Envelope<T> {
    version: String,
    data: T,
}

enum LoadError {
    Corrupted(serde_json::Error),
    Io(std::io::Error),
}

/// Location of a versioned JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    /// Use `path` for the document, creating its parent directory if needed
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Ok(Self { path })
    }

    /// Path of the main file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the backup copy
    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("backup")
    }

    /// Per-process temp file, so two processes writing at once never share it
    fn temp_path(&self) -> PathBuf {
        self.path.with_extension(format!("tmp.{}", std::process::id()))
    }

    /// Load the document, recovering from the backup if the main file is corrupted
    pub async fn load_or_recover<T>(&self) -> Result<T, Error>
    where
        T: DeserializeOwned + Default,
    {
        match Self::load(&self.path).await {
            Ok(data) => Ok(data),
            Err(LoadError::Io(e)) => Err(Error::Io(e)),
            Err(LoadError::Corrupted(e)) => {
                tracing::warn!(
                    "{} appears corrupted: {}. Attempting recovery from backup.",
                    self.path.display(),
                    e
                );

                let backup = self.backup_path();
                if !backup.exists() {
                    tracing::warn!("No backup file found. Starting empty.");
                    return Ok(T::default());
                }

                match Self::load(&backup).await {
                    Ok(data) => {
                        if let Err(e) = fs::copy(&backup, &self.path).await {
                            tracing::error!("Failed to restore {} from backup: {}", self.path.display(), e);
                        } else {
                            tracing::info!("Restored {} from backup", self.path.display());
                        }
                        Ok(data)
                    }
                    Err(_) => {
                        tracing::error!("Backup also unreadable. Starting empty.");
                        Ok(T::default())
                    }
                }
            }
        }
    }

    async fn load<T>(path: &Path) -> Result<T, LoadError>
    where
        T: DeserializeOwned + Default,
    {
        if !path.exists() {
            tracing::debug!("{} does not exist yet", path.display());
            return Ok(T::default());
        }

        let content = fs::read_to_string(path).await.map_err(LoadError::Io)?;
        let envelope: Envelope<T> = serde_json::from_str(&content).map_err(LoadError::Corrupted)?;

        if envelope.version != FILE_VERSION {
            tracing::warn!(
                "{} has version {}, expected {}. Loading anyway.",
                path.display(),
                envelope.version,
                FILE_VERSION
            );
        }

        Ok(envelope.data)
    }

    /// Atomically replace the document
    pub async fn write<T: Serialize>(&self, data: &T) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(&Envelope {
            version: FILE_VERSION.to_string(),
            data,
        })?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, self.backup_path()).await
        {
            tracing::warn!("Failed to create backup of {}: {}", self.path.display(), e);
        }

        fs::rename(&temp_path, &self.path).await?;

        tracing::trace!("Wrote {}", self.path.display());
        Ok(())
    }
}
