//! Launcher adapter capability interface (spec §4.4, §9 "Polymorphism over
//! launchers"): a single trait replaces the original's install class
//! hierarchy (`original_source/app/src/launcher/interface/lr-data-interface.h`
//! `Lr::IInstall`), so the registry can hold `Box<dyn Install>` and the
//! worker drives any launcher through the same hook sequence.

pub mod attractmode;
pub mod emulationstation;
pub mod launchbox;

use uuid::Uuid;

use crate::backup::BackupManager;
use crate::clifp::ExtraFlags;
use crate::doc::{DocType, PlatformDocState, PlaylistDocState};
use crate::error::Error;
use crate::model::item::{Game, ImagePaths};
use crate::options::ImageMode;
use crate::path::StrictPath;

/// Whether a process named `executable` (case-insensitive) is currently
/// running, used by adapters to implement `is_running()` (spec §4.4).
pub fn is_process_running(executable: &str) -> bool {
    let system = sysinfo::System::new_all();
    system
        .processes()
        .values()
        .any(|p| p.name().to_string_lossy().eq_ignore_ascii_case(executable))
}

/// Per-launcher implementation of the abstract install: root validation,
/// document checkout/commit, image path resolution, and the pre/post hook
/// sequence the worker drives every import through.
pub trait Install {
    fn name(&self) -> &str;

    /// Image modes this launcher's on-disk format can represent; adapters
    /// that can't support `Reference` (no media-scan config to edit) omit
    /// it so option validation rejects it up front.
    fn preferred_image_modes(&self) -> &[ImageMode];

    /// Whether the launcher's executable currently holds file locks or
    /// shows as a running process; the worker refuses to proceed while true
    /// (spec §4.4 "Running-process detection").
    fn is_running(&self) -> bool;

    /// Some launchers mangle document names (lowercase, de-space); default
    /// is identity.
    fn translate_doc_name(&self, original: &str, kind: DocType) -> String {
        let _ = kind;
        original.to_string()
    }

    fn checkout_platform(&mut self, name: &str) -> Result<PlatformDocState, Error>;
    fn commit_platform(&mut self, doc: PlatformDocState, backup: &mut BackupManager) -> Result<(), Error>;

    fn checkout_playlist(&mut self, name: &str) -> Result<PlaylistDocState, Error>;
    fn commit_playlist(&mut self, doc: PlaylistDocState, backup: &mut BackupManager) -> Result<(), Error>;

    /// Fills in `paths` with this launcher's on-disk artwork destinations
    /// for `game`, given the currently effective image mode.
    fn convert_to_destination_images(&self, game: &Game, image_mode: ImageMode, paths: &mut ImagePaths);

    fn platform_category_icon_path(&self, platform: &str) -> StrictPath;
    fn platform_icons_dir(&self) -> StrictPath;
    fn playlist_icons_dir(&self) -> StrictPath;

    /// Hands the adapter the deployed CLIFp path and extra flags so it can
    /// register CLIFp as the emulator/launch command for games it writes
    /// (spec §1, §6 "CLIFp command-line"); launchers with no per-game or
    /// per-system command field (AttractMode) can ignore this.
    fn configure_clifp(&mut self, clifp_path: &StrictPath, extra: &ExtraFlags) {
        let _ = (clifp_path, extra);
    }

    fn pre_import(&mut self, backup: &mut BackupManager) -> Result<(), Error> {
        let _ = backup;
        Ok(())
    }
    fn pre_platforms_import(&mut self, backup: &mut BackupManager) -> Result<(), Error> {
        let _ = backup;
        Ok(())
    }
    fn post_platforms_import(&mut self, backup: &mut BackupManager) -> Result<(), Error> {
        let _ = backup;
        Ok(())
    }
    fn pre_image_processing(&mut self, backup: &mut BackupManager) -> Result<(), Error> {
        let _ = backup;
        Ok(())
    }
    fn post_image_processing(&mut self, backup: &mut BackupManager) -> Result<(), Error> {
        let _ = backup;
        Ok(())
    }
    fn pre_playlists_import(&mut self, backup: &mut BackupManager) -> Result<(), Error> {
        let _ = backup;
        Ok(())
    }
    fn post_playlists_import(&mut self, backup: &mut BackupManager) -> Result<(), Error> {
        let _ = backup;
        Ok(())
    }
    fn post_import(&mut self, backup: &mut BackupManager) -> Result<(), Error> {
        let _ = backup;
        Ok(())
    }
}

/// A free index tracker bounded at a launcher's integer-ID ceiling (spec
/// §3, recovered bound from `original_source/.../lb-items.h`), shared by
/// document kinds that assign launcher-integer IDs rather than using the
/// catalog's UUIDs directly.
pub struct FreeIndexTracker {
    bound: u32,
    next: u32,
    freed: Vec<u32>,
    assigned: std::collections::HashMap<Uuid, u32>,
}

impl FreeIndexTracker {
    pub fn new(bound: u32) -> Self {
        Self {
            bound,
            next: 0,
            freed: Vec::new(),
            assigned: std::collections::HashMap::new(),
        }
    }

    /// Records that `id` already occupies `index`, so a later allocation
    /// for the same item reuses it instead of assigning a fresh one.
    pub fn observe(&mut self, id: Uuid, index: u32) {
        self.assigned.insert(id, index);
        if index >= self.next && index < self.bound {
            self.next = index + 1;
        }
    }

    /// Returns an existing assignment for `id`, or allocates one: a freed
    /// index if available, otherwise the next unused one below the bound.
    pub fn allocate(&mut self, id: Uuid) -> Option<u32> {
        if let Some(existing) = self.assigned.get(&id) {
            return Some(*existing);
        }
        let index = if let Some(freed) = self.freed.pop() {
            freed
        } else if self.next < self.bound {
            let i = self.next;
            self.next += 1;
            i
        } else {
            return None;
        };
        self.assigned.insert(id, index);
        Some(index)
    }

    /// Releases `id`'s index back to the free list, run during a
    /// document's `finalize()` for entries that became obsolete (spec
    /// §4.3 "Finalization policy").
    pub fn release(&mut self, id: Uuid) {
        if let Some(index) = self.assigned.remove(&id) {
            self.freed.push(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_reuses_released_indices_before_growing() {
        let mut tracker = FreeIndexTracker::new(100_000);
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);

        let idx_a = tracker.allocate(a).unwrap();
        let idx_b = tracker.allocate(b).unwrap();
        assert_ne!(idx_a, idx_b);

        tracker.release(a);
        let idx_c = tracker.allocate(Uuid::from_u128(3)).unwrap();
        assert_eq!(idx_c, idx_a);
    }

    #[test]
    fn allocate_never_exceeds_bound() {
        let mut tracker = FreeIndexTracker::new(2);
        assert!(tracker.allocate(Uuid::from_u128(1)).is_some());
        assert!(tracker.allocate(Uuid::from_u128(2)).is_some());
        assert!(tracker.allocate(Uuid::from_u128(3)).is_none());
    }

    #[test]
    fn allocate_is_idempotent_for_the_same_id() {
        let mut tracker = FreeIndexTracker::new(100_000);
        let id = Uuid::from_u128(1);
        let first = tracker.allocate(id).unwrap();
        let second = tracker.allocate(id).unwrap();
        assert_eq!(first, second);
    }
}
