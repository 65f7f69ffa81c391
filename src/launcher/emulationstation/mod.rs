//! EmulationStation / ES-DE adapter (spec §6 "EmulationStation / ES-DE
//! layout"): `gamelists/<system>/gamelist.xml`, `collections/custom-<name>.cfg`,
//! and the dummy ROM files every gamelist entry's `path` must resolve to
//! (spec §8 "Dummy-file correspondence").

use uuid::Uuid;

use crate::backup::BackupManager;
use crate::clifp::{self, ExtraFlags};
use crate::container::{Phase, UpdatePolicy};
use crate::doc::xml::{read_records, write_records, FlatRecord, TaggedRecord};
use crate::doc::{DocType, PlatformDocState, PlaylistDocState};
use crate::error::{BackupErrorKind, DocHandlingError, DocHandlingErrorKind, Error};
use crate::launcher::Install;
use crate::model::item::{Game, GameFields, ImagePaths, PlaylistGame};
use crate::options::ImageMode;
use crate::path::StrictPath;

const GAME_FIELDS: &[&str] = &["path", "name", "desc", "releasedate", "developer", "publisher"];

/// Extension given to the placeholder ROM files ES-DE requires to exist
/// alongside each `gamelist.xml` entry.
const DUMMY_EXT: &str = "fp";

/// The dummy ROM's basename doubles as the `%BASENAME%` token ES-DE
/// substitutes into the per-system CLIFp command template, so it must
/// always be the game's id rather than anything derived from the catalog
/// (spec §1 "registers CLIFp as the emulator used to launch each game").
fn rom_basename(game: &Game) -> String {
    game.id.to_string()
}

fn game_to_record(system: &str, game: &Game) -> FlatRecord {
    let mut rec = FlatRecord::default();
    rec.insert("path", format!("./{}.{DUMMY_EXT}", rom_basename(game)));
    rec.insert("name", game.name.clone());
    if let Some(v) = &game.fields.notes {
        rec.insert("desc", v.clone());
    }
    if let Some(v) = &game.fields.release_date {
        rec.insert("releasedate", v.clone());
    }
    if let Some(v) = &game.fields.developer {
        rec.insert("developer", v.clone());
    }
    if let Some(v) = &game.fields.publisher {
        rec.insert("publisher", v.clone());
    }
    let _ = system;
    for (k, v) in &game.other_fields {
        rec.insert(k.clone(), v.clone());
    }
    rec
}

fn record_to_game(system: &str, record: FlatRecord) -> Option<Game> {
    let path = record.get("path")?.to_string();
    let basename = std::path::Path::new(&path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let id = Uuid::parse_str(&basename).unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{system}/{basename}").as_bytes()));
    let name = record.get("name").unwrap_or(&basename).to_string();
    let fields = GameFields {
        notes: record.get("desc").map(str::to_string),
        release_date: record.get("releasedate").map(str::to_string),
        developer: record.get("developer").map(str::to_string),
        publisher: record.get("publisher").map(str::to_string),
        application_path: Some(path),
        ..Default::default()
    };
    let other_fields = record.into_other_fields(GAME_FIELDS).into_iter().collect();
    Some(Game {
        id,
        name,
        platform: system.to_string(),
        fields,
        other_fields,
    })
}

pub struct EmulationStationInstall {
    root: StrictPath,
    policy: UpdatePolicy,
    remove_obsolete: bool,
    clifp_path: Option<StrictPath>,
    clifp_extra: ExtraFlags,
}

impl EmulationStationInstall {
    pub fn new(root: StrictPath, policy: UpdatePolicy, remove_obsolete: bool) -> Self {
        Self {
            root,
            policy,
            remove_obsolete,
            clifp_path: None,
            clifp_extra: ExtraFlags::default(),
        }
    }

    pub fn validate(path: &StrictPath) -> bool {
        path.joined("gamelists").is_dir()
    }

    fn gamelist_path(&self, system: &str) -> StrictPath {
        self.root.joined(&format!("gamelists/{system}/gamelist.xml"))
    }

    fn custom_systems_path(&self) -> StrictPath {
        self.root.joined("custom_systems/es_systems.xml")
    }

    fn roms_dir(&self, system: &str) -> StrictPath {
        self.root.joined(&format!("roms/{system}"))
    }

    fn collection_path(&self, name: &str) -> StrictPath {
        self.root.joined(&format!("collections/custom-{name}.cfg"))
    }

    fn write_text(&self, path: &StrictPath, content: &str, backup: &mut BackupManager) -> Result<(), Error> {
        path.create_parent_dir().ok();
        backup.backup_copy(path)?;
        std::fs::write(path.interpret(), content).map_err(|_| {
            Error::Doc(DocHandlingError::new(
                crate::doc::DocId::new(DocType::Platform, path.render()),
                DocHandlingErrorKind::DocWriteFailed,
            ))
        })
    }

    /// Ensures a dummy ROM file exists for `game` so `gamelist.xml`'s
    /// `path` entry resolves (spec §8 "Dummy-file correspondence").
    fn ensure_dummy_rom(&self, system: &str, game: &Game, backup: &mut BackupManager) -> Result<(), Error> {
        let path = self.roms_dir(system).joined(&format!("{}.{DUMMY_EXT}", rom_basename(game)));
        if !path.exists() {
            backup.revertable_touch(&path).map_err(|e| match e.kind {
                BackupErrorKind::FileWontCreate => Error::Doc(DocHandlingError::new(
                    crate::doc::DocId::new(DocType::Platform, system),
                    DocHandlingErrorKind::DocWriteFailed,
                )),
                _ => Error::Backup(e),
            })?;
        }
        Ok(())
    }
}

impl Install for EmulationStationInstall {
    fn name(&self) -> &str {
        "EmulationStation"
    }

    fn preferred_image_modes(&self) -> &[ImageMode] {
        &[ImageMode::Copy, ImageMode::Link]
    }

    fn is_running(&self) -> bool {
        crate::launcher::is_process_running("emulationstation") || crate::launcher::is_process_running("es-de")
    }

    fn configure_clifp(&mut self, clifp_path: &StrictPath, extra: &ExtraFlags) {
        self.clifp_path = Some(clifp_path.clone());
        self.clifp_extra = extra.clone();
    }

    fn checkout_platform(&mut self, name: &str) -> Result<PlatformDocState, Error> {
        let path = self.gamelist_path(name);
        let mut doc = PlatformDocState::new(name, self.policy, self.remove_obsolete);
        if path.exists() {
            let content = std::fs::read_to_string(path.interpret())
                .map_err(|_| Error::Doc(DocHandlingError::new(doc.id().clone(), DocHandlingErrorKind::DocCantOpen)))?;
            let records = read_records(&content, doc.id(), "gameList")?;
            for TaggedRecord { tag, record } in records {
                if tag == "game" {
                    if let Some(game) = record_to_game(name, record) {
                        doc.games.insert(game, Phase::Init);
                    }
                }
            }
        }
        doc.post_checkout();
        doc.begin_update();
        Ok(doc)
    }

    fn commit_platform(&mut self, mut doc: PlatformDocState, backup: &mut BackupManager) -> Result<(), Error> {
        doc.finalize();

        let mut games = Vec::new();
        doc.games.for_each_final(|g| games.push(g.clone()));
        for game in &games {
            self.ensure_dummy_rom(&doc.id.name, game, backup)?;
        }

        let records: Vec<(String, FlatRecord)> = games.iter().map(|g| ("game".to_string(), game_to_record(&doc.id.name, g))).collect();
        let content = write_records("gameList", &records)
            .map_err(|_| Error::Doc(DocHandlingError::new(doc.id().clone(), DocHandlingErrorKind::DocCantSave)))?;
        let path = self.gamelist_path(&doc.id.name);
        self.write_text(&path, &content, backup)
    }

    fn checkout_playlist(&mut self, name: &str) -> Result<PlaylistDocState, Error> {
        let path = self.collection_path(name);
        let mut doc = PlaylistDocState::new(name, self.policy, self.remove_obsolete);
        if path.exists() {
            let content = std::fs::read_to_string(path.interpret())
                .map_err(|_| Error::Doc(DocHandlingError::new(doc.id().clone(), DocHandlingErrorKind::DocCantOpen)))?;
            let mut order = 0i64;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                let game_id = Uuid::new_v5(&Uuid::NAMESPACE_OID, line.as_bytes());
                doc.add_member(PlaylistGame {
                    id: game_id,
                    game_id,
                    order,
                    notes: None,
                    title: None,
                    filename: Some(line.to_string()),
                    platform: None,
                    other_fields: Default::default(),
                });
                order += 1;
            }
        }
        doc.post_checkout();
        doc.begin_update();
        Ok(doc)
    }

    fn commit_playlist(&mut self, mut doc: PlaylistDocState, backup: &mut BackupManager) -> Result<(), Error> {
        doc.finalize();

        let mut members = Vec::new();
        doc.members.for_each_final(|m| members.push(m.clone()));
        members.sort_by_key(|m| m.order);

        let mut content = String::new();
        for member in members {
            let entry = member.filename.unwrap_or_else(|| {
                format!(
                    "%ROMPATH%/{}/{}.{DUMMY_EXT}",
                    member.platform.unwrap_or_default(),
                    member.game_id
                )
            });
            content.push_str(&entry);
            content.push('\n');
        }

        let path = self.collection_path(&doc.id.name);
        self.write_text(&path, &content, backup)
    }

    fn convert_to_destination_images(&self, game: &Game, _image_mode: ImageMode, paths: &mut ImagePaths) {
        let basename = rom_basename(game);
        paths.logo_path = Some(self.root.joined(&format!("downloaded_media/{}/marquees/{basename}.png", game.platform)));
        paths.screenshot_path = Some(self.root.joined(&format!("downloaded_media/{}/screenshots/{basename}.png", game.platform)));
    }

    fn platform_category_icon_path(&self, platform: &str) -> StrictPath {
        self.root.joined(&format!("downloaded_media/{platform}/logo.png"))
    }

    fn platform_icons_dir(&self) -> StrictPath {
        self.root.joined("downloaded_media/system_icons")
    }

    fn playlist_icons_dir(&self) -> StrictPath {
        self.root.joined("downloaded_media/collection_icons")
    }

    /// ES-DE has no per-game command field (`Es::Game` carries no launch
    /// command; only `Es::System` does), so CLIFp is registered once per
    /// system here, as a `<command>` template in a custom `es_systems.xml`
    /// that invokes CLIFp with the `%BASENAME%` placeholder — which
    /// resolves to the dummy ROM's basename, the game's id.
    fn post_platforms_import(&mut self, backup: &mut BackupManager) -> Result<(), Error> {
        let Some(clifp_path) = self.clifp_path.clone() else {
            return Ok(());
        };

        let gamelists_dir = self.root.joined("gamelists");
        let mut systems: Vec<String> = Vec::new();
        if gamelists_dir.is_dir() {
            for entry in std::fs::read_dir(gamelists_dir.interpret()).into_iter().flatten().flatten() {
                if entry.path().is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        systems.push(name.to_string());
                    }
                }
            }
        }
        systems.sort();

        let args = clifp::build_play_args("%BASENAME%", &self.clifp_extra);
        let program = shlex::quote(&clifp_path.render()).into_owned();
        let command = format!("{program} {args}");

        let mut content = String::from("<?xml version=\"1.0\"?>\n<systemList>\n");
        for system in &systems {
            content.push_str(&format!(
                "  <system>\n    <name>{system}</name>\n    <fullname>{system}</fullname>\n    \
                 <path>%ROMPATH%/{system}</path>\n    <extension>.{DUMMY_EXT}</extension>\n    \
                 <command label=\"CLIFp\">{command}</command>\n    <platform>{system}</platform>\n  </system>\n"
            ));
        }
        content.push_str("</systemList>\n");

        self.write_text(&self.custom_systems_path(), &content, backup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committing_a_platform_creates_a_dummy_rom_per_game() {
        let dir = tempfile::tempdir().unwrap();
        let root = StrictPath::new(dir.path().to_string_lossy().to_string());
        let mut install = EmulationStationInstall::new(root, UpdatePolicy::NewAndExisting, true);
        let mut backup = BackupManager::new();

        let mut doc = install.checkout_platform("flash").unwrap();
        doc.add_set(crate::model::item::Set {
            game: Game {
                id: Uuid::from_u128(1),
                name: "A".into(),
                platform: "flash".into(),
                fields: GameFields {
                    application_path: Some("a.swf".into()),
                    ..Default::default()
                },
                other_fields: Default::default(),
            },
            add_apps: vec![],
        });

        install.commit_platform(doc, &mut backup).unwrap();

        let expected_rom = format!("{}.{DUMMY_EXT}", Uuid::from_u128(1));
        assert!(install.roms_dir("flash").joined(&expected_rom).exists());
        assert!(install.gamelist_path("flash").exists());
    }

    #[test]
    fn post_platforms_import_writes_a_clifp_command_per_system() {
        let dir = tempfile::tempdir().unwrap();
        let root = StrictPath::new(dir.path().to_string_lossy().to_string());
        let mut install = EmulationStationInstall::new(root, UpdatePolicy::NewAndExisting, true);
        let mut backup = BackupManager::new();

        let mut doc = install.checkout_platform("flash").unwrap();
        doc.add_set(crate::model::item::Set {
            game: Game {
                id: Uuid::from_u128(1),
                name: "A".into(),
                platform: "flash".into(),
                fields: GameFields::default(),
                other_fields: Default::default(),
            },
            add_apps: vec![],
        });
        install.commit_platform(doc, &mut backup).unwrap();

        install.configure_clifp(&StrictPath::new("/fp/CLIFp".to_string()), &ExtraFlags::default());
        install.post_platforms_import(&mut backup).unwrap();

        let content = std::fs::read_to_string(install.custom_systems_path().interpret()).unwrap();
        assert!(content.contains("<name>flash</name>"));
        assert!(content.contains("/fp/CLIFp"));
        assert!(content.contains("--id=%BASENAME%"));
    }
}
