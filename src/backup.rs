//! Backup/journal manager (spec §4.1): journals reversible file mutations so
//! an entire import can be undone as a unit. Grounded on the original
//! `Import::BackupManager` (`original_source/app/src/import/backup.h`),
//! reframed as an owned value rather than a process-wide singleton per the
//! Design Notes in spec §9.

use crate::error::{BackupError, BackupErrorKind};
use crate::path::StrictPath;

const BACKUP_FILE_EXT: &str = "fbk";

fn backup_path(path: &StrictPath) -> StrictPath {
    StrictPath::new(format!("{}.{BACKUP_FILE_EXT}", path.render()))
}

/// Whether a revert entry should simply delete the live path (no backup
/// exists, the path was newly created during import) or restore the sidecar
/// backup onto it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Disposition {
    Purge,
    Restore,
}

struct Revertable {
    path: StrictPath,
    disposition: Disposition,
}

/// Journal of reversible file-system effects, appended to in the order
/// mutations happen and unwound in reverse.
#[derive(Default)]
pub struct BackupManager {
    revertables: Vec<Revertable>,
}

impl BackupManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark(&mut self, path: StrictPath, disposition: Disposition) {
        self.revertables.push(Revertable { path, disposition });
    }

    /// If `path` exists, side-copies it to a sidecar and marks `path`
    /// revertable: on revert the sidecar is restored, or if `path` never
    /// existed, anything later placed there is deleted instead.
    pub fn backup_copy(&mut self, path: &StrictPath) -> Result<(), BackupError> {
        if path.exists() {
            std::fs::copy(path.interpret(), backup_path(path).interpret())
                .map_err(|_| BackupError::new(BackupErrorKind::FileWontBackup, path.clone()))?;
            self.mark(path.clone(), Disposition::Restore);
        } else {
            self.mark(path.clone(), Disposition::Purge);
        }
        Ok(())
    }

    /// Like [`Self::backup_copy`] but moves `path` to the sidecar instead of
    /// copying it, for callers that don't need the original left in place.
    pub fn backup_rename(&mut self, path: &StrictPath) -> Result<(), BackupError> {
        if path.exists() {
            std::fs::rename(path.interpret(), backup_path(path).interpret())
                .map_err(|_| BackupError::new(BackupErrorKind::FileWontBackup, path.clone()))?;
            self.mark(path.clone(), Disposition::Restore);
        } else {
            self.mark(path.clone(), Disposition::Purge);
        }
        Ok(())
    }

    /// Immediately restores `path` from its sidecar backup, used when
    /// [`Self::safe_replace`] fails mid-operation.
    pub fn restore(&self, path: &StrictPath) -> Result<(), BackupError> {
        let sidecar = backup_path(path);
        if path.exists() {
            let _ = std::fs::remove_file(path.interpret());
        }
        std::fs::rename(sidecar.interpret(), path.interpret())
            .map_err(|_| BackupError::new(BackupErrorKind::FileWontRestore, path.clone()))
    }

    /// Replaces `dst` with `src` (copy, or symlink when `symlink` is set).
    /// `dst` is backed up first if it exists and restored on failure; if
    /// `dst` didn't exist it is marked revertable instead.
    pub fn safe_replace(&mut self, src: &StrictPath, dst: &StrictPath, symlink: bool) -> Result<(), BackupError> {
        let existed = dst.exists();
        if existed {
            std::fs::copy(dst.interpret(), backup_path(dst).interpret())
                .map_err(|_| BackupError::new(BackupErrorKind::FileWontBackup, dst.clone()))?;
            if symlink {
                // A symlink can't be created where a file already sits; the
                // copy above already preserved it for restoration on failure.
                if let Err(_e) = std::fs::remove_file(dst.interpret()) {
                    let _ = std::fs::remove_file(backup_path(dst).interpret());
                    return Err(BackupError::new(BackupErrorKind::FileWontBackup, dst.clone()));
                }
            }
        }

        let transfer = if symlink {
            crate::path::symlink(src.interpret(), dst.interpret())
        } else {
            std::fs::copy(src.interpret(), dst.interpret()).map(|_| ())
        };

        match transfer {
            Ok(()) => {
                if existed {
                    let _ = std::fs::remove_file(backup_path(dst).interpret());
                } else {
                    self.mark(dst.clone(), Disposition::Purge);
                }
                Ok(())
            }
            Err(_) => {
                if existed {
                    self.restore(dst)?;
                }
                Err(BackupError::new(BackupErrorKind::FileWontReplace, dst.clone()))
            }
        }
    }

    /// Creates an empty file at `path`, failing if it already exists, and
    /// marks it for deletion on revert.
    pub fn revertable_touch(&mut self, path: &StrictPath) -> Result<(), BackupError> {
        if path.exists() {
            return Err(BackupError::new(BackupErrorKind::FileWontCreate, path.clone()));
        }
        std::fs::File::create(path.interpret()).map_err(|_| BackupError::new(BackupErrorKind::FileWontCreate, path.clone()))?;
        self.mark(path.clone(), Disposition::Purge);
        Ok(())
    }

    /// Backs up `path` and removes the original; the backup is purged at
    /// import end on success, or restored onto `path` on revert.
    pub fn revertable_remove(&mut self, path: &StrictPath) -> Result<(), BackupError> {
        std::fs::copy(path.interpret(), backup_path(path).interpret())
            .map_err(|_| BackupError::new(BackupErrorKind::FileWontBackup, path.clone()))?;
        std::fs::remove_file(path.interpret()).map_err(|_| BackupError::new(BackupErrorKind::FileWontDelete, path.clone()))?;
        self.mark(path.clone(), Disposition::Restore);
        Ok(())
    }

    pub fn has_reversions(&self) -> bool {
        !self.revertables.is_empty()
    }

    pub fn revert_queue_count(&self) -> usize {
        self.revertables.len()
    }

    /// Unwinds every queued mutation in reverse order. When `skip_on_fail`
    /// is true, a failed step is reported but doesn't stop the remaining
    /// unwind; otherwise the first failure stops it, leaving the rest
    /// queued for a later retry.
    pub fn revert_all(&mut self, skip_on_fail: bool) -> Vec<BackupError> {
        let mut errors = Vec::new();
        while let Some(entry) = self.revertables.pop() {
            if let Err(e) = self.revert_one(&entry) {
                errors.push(e);
                if !skip_on_fail {
                    break;
                }
            }
        }
        errors
    }

    fn revert_one(&self, entry: &Revertable) -> Result<(), BackupError> {
        match entry.disposition {
            Disposition::Purge => {
                if entry.path.exists() {
                    std::fs::remove_file(entry.path.interpret())
                        .map_err(|_| BackupError::new(BackupErrorKind::FileWontDelete, entry.path.clone()))?;
                }
                Ok(())
            }
            Disposition::Restore => self.restore(&entry.path),
        }
    }

    /// Discards all outstanding backup sidecars on a clean commit.
    pub fn purge(&mut self) {
        for entry in self.revertables.drain(..) {
            if entry.disposition == Disposition::Restore {
                let _ = std::fs::remove_file(backup_path(&entry.path).interpret());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> StrictPath {
        StrictPath::new(dir.path().join(name).to_string_lossy().to_string())
    }

    #[test]
    fn backup_copy_of_missing_file_marks_purge() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "new.txt");
        let mut mgr = BackupManager::new();

        mgr.backup_copy(&path).unwrap();
        std::fs::write(path.interpret(), b"created during import").unwrap();
        mgr.revert_all(false);

        assert!(!path.exists());
    }

    #[test]
    fn backup_copy_of_existing_file_restores_original_bytes_on_revert() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "existing.txt");
        std::fs::write(path.interpret(), b"original").unwrap();
        let mut mgr = BackupManager::new();

        mgr.backup_copy(&path).unwrap();
        std::fs::write(path.interpret(), b"overwritten").unwrap();
        mgr.revert_all(false);

        assert_eq!(std::fs::read(path.interpret()).unwrap(), b"original");
    }

    #[test]
    fn purge_after_commit_removes_sidecars_and_leaves_live_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "existing.txt");
        std::fs::write(path.interpret(), b"original").unwrap();
        let mut mgr = BackupManager::new();
        mgr.backup_copy(&path).unwrap();
        std::fs::write(path.interpret(), b"updated").unwrap();

        mgr.purge();

        assert!(!backup_path(&path).exists());
        assert_eq!(std::fs::read(path.interpret()).unwrap(), b"updated");
    }

    #[test]
    fn revert_visits_entries_in_reverse_registration_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = temp_path(&dir, "a.txt");
        let b = temp_path(&dir, "b.txt");
        let mut mgr = BackupManager::new();

        mgr.backup_copy(&a).unwrap();
        std::fs::write(a.interpret(), b"a").unwrap();
        mgr.backup_copy(&b).unwrap();
        std::fs::write(b.interpret(), b"b").unwrap();

        mgr.revert_all(false);

        assert!(!a.exists());
        assert!(!b.exists());
    }
}
