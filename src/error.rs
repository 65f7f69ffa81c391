//! Structured error taxonomy (spec §7). Each kind carries a [`Severity`], a
//! caption, a primary message templated with the document/path it concerns,
//! and an optional secondary/details string, mirroring the `Qx::AbstractError`
//! subclasses in the original C++ (`import/backup.h`, `import/image.h`,
//! `launcher/interface/lr-data-interface.h`).

use crate::doc::DocId;
use crate::path::StrictPath;

/// How serious an error is, used by the embedder to decide how to present it
/// and by the worker to decide whether it's fatal to the import.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// A choice the embedder can offer the user in response to a blocking error
/// (spec §4.6 "Blocking errors").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Choice {
    Abort,
    Retry,
    Ignore,
    IgnoreAll,
}

/// Common surface every structured error in this taxonomy exposes, matching
/// the derive*/primary/secondary/caption split of the original's
/// `Qx::AbstractError`.
pub trait StructuredError: std::fmt::Debug {
    fn severity(&self) -> Severity;
    fn caption(&self) -> String;
    fn primary(&self) -> String;
    fn secondary(&self) -> Option<String> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocHandlingErrorKind {
    DocAlreadyOpen,
    DocCantOpen,
    DocCantSave,
    NotParentDoc,
    CantRemoveBackup,
    CantCreateBackup,
    DocInvalidType,
    DocReadFailed,
    DocWriteFailed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocHandlingError {
    pub kind: DocHandlingErrorKind,
    pub doc: DocId,
    pub specific: Option<String>,
}

impl DocHandlingError {
    pub fn new(doc: DocId, kind: DocHandlingErrorKind) -> Self {
        Self { doc, kind, specific: None }
    }

    pub fn with_specific(doc: DocId, kind: DocHandlingErrorKind, specific: impl Into<String>) -> Self {
        Self {
            doc,
            kind,
            specific: Some(specific.into()),
        }
    }
}

impl StructuredError for DocHandlingError {
    fn severity(&self) -> Severity {
        match self.kind {
            DocHandlingErrorKind::DocInvalidType | DocHandlingErrorKind::DocReadFailed => Severity::Critical,
            _ => Severity::Error,
        }
    }

    fn caption(&self) -> String {
        "Error handling launcher document".to_string()
    }

    fn primary(&self) -> String {
        use DocHandlingErrorKind::*;
        let doc = &self.doc;
        match self.kind {
            DocAlreadyOpen => format!("The target document ({doc}) is already open."),
            DocCantOpen => format!("The target document ({doc}) cannot be opened."),
            DocCantSave => format!("The target document ({doc}) cannot be saved."),
            NotParentDoc => format!("The target document ({doc}) is not a parent document."),
            CantRemoveBackup => format!("The existing backup of the target document ({doc}) could not be removed."),
            CantCreateBackup => format!("Could not create a backup of the target document ({doc})."),
            DocInvalidType => format!("The document ({doc}) is invalid or of the wrong type."),
            DocReadFailed => format!("Reading the target document ({doc}) failed."),
            DocWriteFailed => format!("Writing to the target document ({doc}) failed."),
        }
    }

    fn secondary(&self) -> Option<String> {
        self.specific.clone()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackupErrorKind {
    FileWontDelete,
    FileWontRestore,
    FileWontBackup,
    FileWontReplace,
    FileWontCreate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupError {
    pub kind: BackupErrorKind,
    pub path: StrictPath,
}

impl BackupError {
    pub fn new(kind: BackupErrorKind, path: StrictPath) -> Self {
        Self { kind, path }
    }
}

impl StructuredError for BackupError {
    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn caption(&self) -> String {
        "Error managing backups".to_string()
    }

    fn primary(&self) -> String {
        use BackupErrorKind::*;
        match self.kind {
            FileWontDelete => "Cannot remove a file. It may need to be deleted manually.".to_string(),
            FileWontRestore => "Cannot restore a file backup. It may need to be renamed manually.".to_string(),
            FileWontBackup => "Cannot backup file.".to_string(),
            FileWontReplace => "A file that was part of a safe replace operation could not be transferred.".to_string(),
            FileWontCreate => "A file that was part of a safe touch operation could not be created.".to_string(),
        }
    }

    fn secondary(&self) -> Option<String> {
        Some(self.path.render())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageTransferErrorKind {
    ImageSourceUnavailable,
    ImageWontBackup,
    ImageWontCopy,
    ImageWontLink,
    CantCreateDirectory,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageTransferError {
    pub kind: ImageTransferErrorKind,
    pub source: StrictPath,
    pub destination: StrictPath,
}

impl ImageTransferError {
    pub fn new(kind: ImageTransferErrorKind, source: StrictPath, destination: StrictPath) -> Self {
        Self {
            kind,
            source,
            destination,
        }
    }
}

impl StructuredError for ImageTransferError {
    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn caption(&self) -> String {
        "Error importing game image(s)".to_string()
    }

    fn primary(&self) -> String {
        use ImageTransferErrorKind::*;
        match self.kind {
            ImageSourceUnavailable => "An expected source image does not exist.".to_string(),
            ImageWontBackup => "Cannot rename an existing image for backup.".to_string(),
            ImageWontCopy => "Cannot copy an image to its destination.".to_string(),
            ImageWontLink => "Cannot create a symbolic link for an image.".to_string(),
            CantCreateDirectory => "Could not create a directory for an image destination.".to_string(),
        }
    }

    fn secondary(&self) -> Option<String> {
        Some(format!(
            "Source: {}\nDestination: {}",
            self.source.render(),
            self.destination.render()
        ))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevertErrorKind {
    FileWontDelete,
    FileWontRestore,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevertError {
    pub kind: RevertErrorKind,
    pub path: StrictPath,
}

impl StructuredError for RevertError {
    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn caption(&self) -> String {
        "Error reverting import".to_string()
    }

    fn primary(&self) -> String {
        match self.kind {
            RevertErrorKind::FileWontDelete => format!("Could not delete '{}' while reverting.", self.path.render()),
            RevertErrorKind::FileWontRestore => format!("Could not restore '{}' while reverting.", self.path.render()),
        }
    }
}

/// Fatal, crate-wide errors that abort the import outright (spec §7:
/// "catalog read errors and adapter hook errors are fatal... and trigger
/// Revert").
#[derive(Debug)]
pub enum Error {
    Catalog(rusqlite::Error),
    Network(reqwest::Error),
    Cancelled,
    Doc(DocHandlingError),
    Backup(BackupError),
    Image(ImageTransferError),
    Revert(RevertError),
    InstallInvalid { why: String },
    LauncherRunning,
    AdapterHook { hook: &'static str, why: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Catalog(e) => write!(f, "catalog error: {e}"),
            Error::Network(e) => write!(f, "network error: {e}"),
            Error::Cancelled => write!(f, "import cancelled"),
            Error::Doc(e) => write!(f, "{}", e.primary()),
            Error::Backup(e) => write!(f, "{}", e.primary()),
            Error::Image(e) => write!(f, "{}", e.primary()),
            Error::Revert(e) => write!(f, "{}", e.primary()),
            Error::InstallInvalid { why } => write!(f, "invalid launcher install: {why}"),
            Error::LauncherRunning => write!(f, "the target launcher is currently running"),
            Error::AdapterHook { hook, why } => write!(f, "adapter hook '{hook}' failed: {why}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Error::Catalog(value)
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(value)
    }
}

impl From<DocHandlingError> for Error {
    fn from(value: DocHandlingError) -> Self {
        Error::Doc(value)
    }
}

impl From<BackupError> for Error {
    fn from(value: BackupError) -> Self {
        Error::Backup(value)
    }
}

impl From<ImageTransferError> for Error {
    fn from(value: ImageTransferError) -> Self {
        Error::Image(value)
    }
}

impl From<RevertError> for Error {
    fn from(value: RevertError) -> Self {
        Error::Revert(value)
    }
}
