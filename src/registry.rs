//! Launcher-adapter discovery by name (spec §4.7), grounded on the
//! registration pattern implied by `original_source/app/src/launcher/
//! interface/lr-data-interface.h`'s install factories. Order of
//! registration is undefined; `acquire_match` returns the first adapter
//! whose `validate` accepts the given root.

use crate::container::UpdatePolicy;
use crate::launcher::{attractmode::AttractModeInstall, emulationstation::EmulationStationInstall, launchbox::LaunchBoxInstall, Install};
use crate::path::StrictPath;

pub struct Entry {
    pub name: &'static str,
    pub icon_path: &'static str,
    pub help_url: &'static str,
    validate: fn(&StrictPath) -> bool,
    factory: fn(StrictPath, UpdatePolicy, bool) -> Box<dyn Install>,
}

impl Entry {
    pub fn validate(&self, path: &StrictPath) -> bool {
        (self.validate)(path)
    }

    pub fn build(&self, root: StrictPath, policy: UpdatePolicy, remove_obsolete: bool) -> Box<dyn Install> {
        (self.factory)(root, policy, remove_obsolete)
    }
}

pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    /// Builds the registry with every adapter shipped by this crate
    /// registered; an embedder that wants to add a launcher of its own
    /// would extend this list rather than conditionally branch elsewhere.
    pub fn with_builtin_adapters() -> Self {
        Self {
            entries: vec![
                Entry {
                    name: "LaunchBox",
                    icon_path: "Images/Platform Icons/LaunchBox.png",
                    help_url: "https://www.launchbox-app.com/",
                    validate: LaunchBoxInstall::validate,
                    factory: |root, policy, remove_obsolete| Box::new(LaunchBoxInstall::new(root, policy, remove_obsolete)),
                },
                Entry {
                    name: "AttractMode",
                    icon_path: "scraper/marquee/attractmode.png",
                    help_url: "https://attractmode.org/",
                    validate: AttractModeInstall::validate,
                    factory: |root, policy, remove_obsolete| Box::new(AttractModeInstall::new(root, policy, remove_obsolete)),
                },
                Entry {
                    name: "EmulationStation",
                    icon_path: "downloaded_media/system_icons/es-de.png",
                    help_url: "https://es-de.org/",
                    validate: EmulationStationInstall::validate,
                    factory: |root, policy, remove_obsolete| Box::new(EmulationStationInstall::new(root, policy, remove_obsolete)),
                },
            ],
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns the first registered adapter whose `validate` accepts `path`.
    pub fn acquire_match(&self, path: &StrictPath) -> Option<&Entry> {
        self.entries.iter().find(|e| e.validate(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_match_finds_launchbox_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Data")).unwrap();
        let root = StrictPath::new(dir.path().to_string_lossy().to_string());

        let registry = Registry::with_builtin_adapters();
        let entry = registry.acquire_match(&root).expect("should match LaunchBox");
        assert_eq!(entry.name, "LaunchBox");
    }

    #[test]
    fn acquire_match_returns_none_for_unrecognized_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = StrictPath::new(dir.path().to_string_lossy().to_string());
        let registry = Registry::with_builtin_adapters();
        assert!(registry.acquire_match(&root).is_none());
    }
}
