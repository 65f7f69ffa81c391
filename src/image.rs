//! Image placement and download (spec §4.5), grounded on
//! `original_source/app/src/import/image.h`'s copy/link/reference modes and
//! retrying bulk downloader.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::backup::BackupManager;
use crate::error::{ImageTransferError, ImageTransferErrorKind};
use crate::options::ImageMode;
use crate::path::StrictPath;

/// Lets the embedder supply a username/password when a download needs
/// authentication, without this crate owning any credential storage.
pub trait CredentialCallback {
    fn request_credentials(&self, url: &str) -> Option<(String, String)>;
}

pub struct NoCredentials;
impl CredentialCallback for NoCredentials {
    fn request_credentials(&self, _url: &str) -> Option<(String, String)> {
        None
    }
}

pub struct ImageManager {
    mode: ImageMode,
    can_symlink: bool,
    http: reqwest::blocking::Client,
    max_retries: u32,
}

impl ImageManager {
    pub fn new(mode: ImageMode) -> Self {
        let can_symlink = if mode == ImageMode::Link {
            crate::path::can_create_symlinks()
        } else {
            true
        };
        Self {
            mode,
            can_symlink,
            http: reqwest::blocking::Client::new(),
            max_retries: 3,
        }
    }

    pub fn mode(&self) -> ImageMode {
        self.mode
    }

    /// Whether the requested mode is actually usable on this host; `Link`
    /// degrades gracefully when symlink creation isn't permitted (spec §9
    /// "Symbolic link fallback").
    pub fn effective_mode(&self) -> ImageMode {
        if self.mode == ImageMode::Link && !self.can_symlink {
            ImageMode::Copy
        } else {
            self.mode
        }
    }

    /// Places `source` at `destination` per [`Self::effective_mode`],
    /// backing up any existing destination through the journal first.
    pub fn transfer(&self, backup: &mut BackupManager, source: &StrictPath, destination: &StrictPath) -> Result<(), ImageTransferError> {
        if !source.exists() {
            return Err(ImageTransferError::new(
                ImageTransferErrorKind::ImageSourceUnavailable,
                source.clone(),
                destination.clone(),
            ));
        }

        destination.create_parent_dir().map_err(|_| {
            ImageTransferError::new(ImageTransferErrorKind::CantCreateDirectory, source.clone(), destination.clone())
        })?;

        match self.effective_mode() {
            ImageMode::Reference => Ok(()),
            ImageMode::Copy => {
                backup
                    .backup_copy(destination)
                    .map_err(|_| ImageTransferError::new(ImageTransferErrorKind::ImageWontBackup, source.clone(), destination.clone()))?;
                std::fs::copy(source.interpret(), destination.interpret())
                    .map(|_| ())
                    .map_err(|_| ImageTransferError::new(ImageTransferErrorKind::ImageWontCopy, source.clone(), destination.clone()))
            }
            ImageMode::Link => {
                backup
                    .backup_copy(destination)
                    .map_err(|_| ImageTransferError::new(ImageTransferErrorKind::ImageWontBackup, source.clone(), destination.clone()))?;
                // backup_copy preserved the prior contents in its sidecar, so the
                // original can be removed to make way for the symlink.
                if destination.exists() {
                    std::fs::remove_file(destination.interpret()).map_err(|_| {
                        ImageTransferError::new(ImageTransferErrorKind::ImageWontLink, source.clone(), destination.clone())
                    })?;
                }
                crate::path::symlink(source.interpret(), destination.interpret())
                    .map_err(|_| ImageTransferError::new(ImageTransferErrorKind::ImageWontLink, source.clone(), destination.clone()))
            }
        }
    }

    /// Fetches `url` to `destination` with bounded retries, polling
    /// `cancel` between attempts so the same cancellation token governs
    /// network work as the rest of the worker (spec §5).
    pub fn download(
        &self,
        url: &str,
        destination: &StrictPath,
        cancel: &AtomicBool,
        credentials: &dyn CredentialCallback,
    ) -> Result<(), crate::error::Error> {
        destination.create_parent_dir().ok();

        let mut attempt = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(crate::error::Error::Cancelled);
            }

            let mut request = self.http.get(url);
            if let Some((user, pass)) = credentials.request_credentials(url) {
                request = request.basic_auth(user, Some(pass));
            }

            match request.send().and_then(|r| r.error_for_status()).and_then(|r| r.bytes()) {
                Ok(bytes) => {
                    std::fs::write(destination.interpret(), &bytes).map_err(|_| {
                        crate::error::Error::Image(ImageTransferError::new(
                            ImageTransferErrorKind::ImageWontCopy,
                            StrictPath::new(url.to_string()),
                            destination.clone(),
                        ))
                    })?;
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_retries {
                        return Err(crate::error::Error::Network(e));
                    }
                    std::thread::sleep(Duration::from_millis(250 * attempt as u64));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_mode_transfers_bytes_and_backs_up_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = StrictPath::new(dir.path().join("source.png").to_string_lossy().to_string());
        let destination = StrictPath::new(dir.path().join("out/dest.png").to_string_lossy().to_string());
        std::fs::write(source.interpret(), b"pixels").unwrap();

        let manager = ImageManager::new(ImageMode::Copy);
        let mut backup = BackupManager::new();
        manager.transfer(&mut backup, &source, &destination).unwrap();

        assert_eq!(std::fs::read(destination.interpret()).unwrap(), b"pixels");
    }

    #[test]
    fn missing_source_surfaces_image_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = StrictPath::new(dir.path().join("missing.png").to_string_lossy().to_string());
        let destination = StrictPath::new(dir.path().join("dest.png").to_string_lossy().to_string());

        let manager = ImageManager::new(ImageMode::Copy);
        let mut backup = BackupManager::new();
        let err = manager.transfer(&mut backup, &source, &destination).unwrap_err();
        assert_eq!(err.kind, ImageTransferErrorKind::ImageSourceUnavailable);
    }
}
