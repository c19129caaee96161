//! File backups taken before a patch is written

use crate::error::PatchError;
use dashmap::DashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to the backed-up file name
pub const BACKUP_SUFFIX: &str = ".gte.bak";

/// Sibling path holding the pre-patch copy of `path`
#[must_use]
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

/// Record of one backup on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// Live file
    pub original: PathBuf,
    /// Copy taken before the first write
    pub backup_path: PathBuf,
}

/// Backups keyed by live file path
///
/// The first backup of a file is kept until restored or discarded, so
/// repeated patches to one file still restore to the pristine content.
#[derive(Debug, Default)]
pub struct BackupStore {
    entries: DashMap<PathBuf, Backup>,
}

impl BackupStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `path` aside unless a backup already exists
    ///
    /// # Errors
    /// Returns error if the copy fails
    pub fn create(&self, path: &Path) -> Result<Backup, PatchError> {
        if let Some(existing) = self.entries.get(path) {
            if existing.backup_path.exists() {
                return Ok(existing.clone());
            }
        }

        let backup_path = backup_path_for(path);
        std::fs::copy(path, &backup_path).map_err(|e| PatchError::io_error(&backup_path, e))?;
        let backup = Backup {
            original: path.to_path_buf(),
            backup_path,
        };
        self.entries.insert(path.to_path_buf(), backup.clone());
        tracing::debug!(file = %path.display(), backup = %backup.backup_path.display(), "backup created");
        Ok(backup)
    }

    /// Move the backup back over the live file, consuming it
    ///
    /// # Errors
    /// Returns [`PatchError::NoBackup`] if there is nothing to restore
    pub fn restore(&self, path: &Path) -> Result<(), PatchError> {
        let backup_path = self
            .entries
            .remove(path)
            .map(|(_, b)| b.backup_path)
            .unwrap_or_else(|| backup_path_for(path));
        if !backup_path.exists() {
            return Err(PatchError::NoBackup(path.to_path_buf()));
        }

        std::fs::rename(&backup_path, path).map_err(|e| PatchError::io_error(path, e))?;
        tracing::info!(file = %path.display(), "backup restored");
        Ok(())
    }

    /// Delete the backup without restoring; `false` if there was none
    ///
    /// # Errors
    /// Returns error if the backup file cannot be removed
    pub fn discard(&self, path: &Path) -> Result<bool, PatchError> {
        let backup_path = self
            .entries
            .remove(path)
            .map(|(_, b)| b.backup_path)
            .unwrap_or_else(|| backup_path_for(path));
        if !backup_path.exists() {
            return Ok(false);
        }

        std::fs::remove_file(&backup_path).map_err(|e| PatchError::io_error(&backup_path, e))?;
        tracing::debug!(file = %path.display(), "backup discarded");
        Ok(true)
    }

    /// Whether a backup exists for `path`
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path) || backup_path_for(path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_path_is_sibling() {
        assert_eq!(
            backup_path_for(Path::new("src/app.py")),
            PathBuf::from("src/app.py.gte.bak")
        );
    }

    #[test]
    fn first_backup_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "one").unwrap();

        let store = BackupStore::new();
        store.create(&file).unwrap();
        std::fs::write(&file, "two").unwrap();
        store.create(&file).unwrap();

        store.restore(&file).unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "one");
        assert!(!store.contains(&file));
    }

    #[test]
    fn restore_without_backup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("missing.txt");
        let err = BackupStore::new().restore(&file).unwrap_err();
        assert!(matches!(err, PatchError::NoBackup(_)));
    }

    #[test]
    fn discard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "one").unwrap();

        let store = BackupStore::new();
        let backup = store.create(&file).unwrap();
        assert!(store.discard(&file).unwrap());
        assert!(!backup.backup_path.exists());
        assert!(!store.discard(&file).unwrap());
    }
}
