pub use crate::path::StrictPath;

use std::sync::LazyLock;

pub static VERSION: LazyLock<&'static str> =
    LazyLock::new(|| option_env!("FIL_VERSION").unwrap_or(env!("CARGO_PKG_VERSION")));

pub type AnyError = Box<dyn std::error::Error>;

pub const WINDOWS: bool = cfg!(target_os = "windows");
pub const MAC: bool = cfg!(target_os = "macos");
pub const LINUX: bool = cfg!(target_os = "linux");
pub const CASE_INSENSITIVE_OS: bool = WINDOWS || MAC;

/// Characters forbidden in a file/folder name on at least one supported
/// platform; launcher-side folder names derived from catalog fields are
/// escaped against this set before touching the filesystem.
pub const INVALID_FILE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Upper bound on LaunchBox's launcher-assigned integer IDs (recovered from
/// the original `lb-items.h`); the free-index tracker never hands out a
/// value at or above this.
pub const LAUNCHBOX_ID_BOUND: u32 = 100_000;

pub fn filter_map_walkdir(e: Result<walkdir::DirEntry, walkdir::Error>) -> Option<walkdir::DirEntry> {
    match e {
        Ok(x) => Some(x),
        Err(e) => {
            log::warn!("failed to walk directory entry: {e:?}");
            None
        }
    }
}
