//! LaunchBox adapter (spec §6 "LaunchBox layout"): `Data/Platforms/*.xml`
//! and `Data/Playlists/*.xml`, both LaunchBox-rooted structured-XML
//! documents, plus `Data/Platforms.xml`/`Parents.xml` registries and an
//! `Images/<platform>/{Box - Front,Screenshot - Gameplay}/` artwork tree.

use std::collections::HashMap;

use uuid::Uuid;

use crate::backup::BackupManager;
use crate::clifp::{self, ExtraFlags};
use crate::container::UpdatePolicy;
use crate::doc::xml::{read_records, write_records, FlatRecord, TaggedRecord};
use crate::doc::{DocType, PlatformDocState, PlaylistDocState};
use crate::error::{DocHandlingError, DocHandlingErrorKind, Error};
use crate::launcher::{FreeIndexTracker, Install};
use crate::model::item::{AddApp, Game, GameFields, ImagePaths, PlaylistGame, PlaylistHeader};
use crate::options::ImageMode;
use crate::path::StrictPath;
use crate::prelude::LAUNCHBOX_ID_BOUND;

const GAME_FIELDS: &[&str] = &[
    "ID",
    "Title",
    "Platform",
    "Series",
    "Developer",
    "Publisher",
    "SortTitle",
    "DateAdded",
    "DateModified",
    "Broken",
    "PlayMode",
    "Status",
    "Region",
    "Notes",
    "Source",
    "ApplicationPath",
    "CommandLine",
    "ReleaseDate",
    "Version",
    "ReleaseType",
];

const ADDAPP_FIELDS: &[&str] = &[
    "Id",
    "GameID",
    "Name",
    "ApplicationPath",
    "CommandLine",
    "AutoRunBefore",
    "WaitForExit",
];

const PLAYLIST_HEADER_FIELDS: &[&str] = &["PlaylistId", "Name", "Notes"];
const PLAYLIST_GAME_FIELDS: &[&str] = &["GameId", "GameTitle", "GameFileName", "GamePlatform", "LaunchBoxId", "Notes"];

fn bool_str(value: Option<bool>) -> Option<String> {
    value.map(|b| b.to_string())
}

fn parse_bool(s: Option<&str>) -> Option<bool> {
    s.and_then(|s| s.parse().ok())
}

fn date_str(value: Option<chrono::NaiveDateTime>) -> Option<String> {
    value.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn parse_date(s: Option<&str>) -> Option<chrono::NaiveDateTime> {
    s.and_then(|s| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
}

fn game_to_record(game: &Game, clifp_path: Option<&StrictPath>, extra: &ExtraFlags) -> FlatRecord {
    let mut rec = FlatRecord::default();
    rec.insert("ID", game.id.to_string());
    rec.insert("Title", game.name.clone());
    rec.insert("Platform", game.platform.clone());
    if let Some(v) = &game.fields.series {
        rec.insert("Series", v.clone());
    }
    if let Some(v) = &game.fields.developer {
        rec.insert("Developer", v.clone());
    }
    if let Some(v) = &game.fields.publisher {
        rec.insert("Publisher", v.clone());
    }
    if let Some(v) = &game.fields.sort_title {
        rec.insert("SortTitle", v.clone());
    }
    if let Some(v) = date_str(game.fields.date_added) {
        rec.insert("DateAdded", v);
    }
    if let Some(v) = date_str(game.fields.date_modified) {
        rec.insert("DateModified", v);
    }
    if let Some(v) = bool_str(game.fields.broken) {
        rec.insert("Broken", v);
    }
    if let Some(v) = &game.fields.play_mode {
        rec.insert("PlayMode", v.clone());
    }
    if let Some(v) = &game.fields.status {
        rec.insert("Status", v.clone());
    }
    if let Some(v) = &game.fields.region {
        rec.insert("Region", v.clone());
    }
    if let Some(v) = &game.fields.notes {
        rec.insert("Notes", v.clone());
    }
    if let Some(v) = &game.fields.source {
        rec.insert("Source", v.clone());
    }
    // ApplicationPath/CommandLine register CLIFp as the emulator that
    // launches the game (spec §1, §6); the catalog's own launch fields are
    // only used as a fallback when no CLIFp path has been configured.
    match clifp_path {
        Some(path) => {
            rec.insert("ApplicationPath", path.render());
            rec.insert("CommandLine", clifp::build_play_args(game.id, extra));
        }
        None => {
            if let Some(v) = &game.fields.application_path {
                rec.insert("ApplicationPath", v.clone());
            }
            if let Some(v) = &game.fields.launch_command {
                rec.insert("CommandLine", v.clone());
            }
        }
    }
    if let Some(v) = &game.fields.release_date {
        rec.insert("ReleaseDate", v.clone());
    }
    if let Some(v) = &game.fields.version {
        rec.insert("Version", v.clone());
    }
    if let Some(v) = &game.fields.release_type {
        rec.insert("ReleaseType", v.clone());
    }
    for (k, v) in &game.other_fields {
        rec.insert(k.clone(), v.clone());
    }
    rec
}

fn record_to_game(record: FlatRecord) -> Option<Game> {
    let id = Uuid::parse_str(record.get("ID")?).ok()?;
    let name = record.get("Title").unwrap_or_default().to_string();
    let platform = record.get("Platform").unwrap_or_default().to_string();
    let fields = GameFields {
        series: record.get("Series").map(str::to_string),
        developer: record.get("Developer").map(str::to_string),
        publisher: record.get("Publisher").map(str::to_string),
        sort_title: record.get("SortTitle").map(str::to_string),
        date_added: parse_date(record.get("DateAdded")),
        date_modified: parse_date(record.get("DateModified")),
        broken: parse_bool(record.get("Broken")),
        play_mode: record.get("PlayMode").map(str::to_string),
        status: record.get("Status").map(str::to_string),
        region: record.get("Region").map(str::to_string),
        notes: record.get("Notes").map(str::to_string),
        source: record.get("Source").map(str::to_string),
        application_path: record.get("ApplicationPath").map(str::to_string),
        launch_command: record.get("CommandLine").map(str::to_string),
        release_date: record.get("ReleaseDate").map(str::to_string),
        version: record.get("Version").map(str::to_string),
        release_type: record.get("ReleaseType").map(str::to_string),
    };
    let other_fields = record.into_other_fields(GAME_FIELDS).into_iter().collect();
    Some(Game {
        id,
        name,
        platform,
        fields,
        other_fields,
    })
}

fn addapp_to_record(app: &AddApp, clifp_path: Option<&StrictPath>, extra: &ExtraFlags) -> FlatRecord {
    let mut rec = FlatRecord::default();
    rec.insert("Id", app.id.to_string());
    rec.insert("GameID", app.game_id.to_string());
    rec.insert("Name", app.name.clone());
    match clifp_path {
        Some(path) => {
            rec.insert("ApplicationPath", path.render());
            let original_app = app.application_path.clone().unwrap_or_default();
            let original_params = app.launch_command.clone().unwrap_or_default();
            rec.insert("CommandLine", clifp::build_run_args(&original_app, &original_params, extra));
        }
        None => {
            if let Some(v) = &app.application_path {
                rec.insert("ApplicationPath", v.clone());
            }
            if let Some(v) = &app.launch_command {
                rec.insert("CommandLine", v.clone());
            }
        }
    }
    if let Some(v) = bool_str(app.auto_run_before) {
        rec.insert("AutoRunBefore", v);
    }
    if let Some(v) = bool_str(app.wait_for_exit) {
        rec.insert("WaitForExit", v);
    }
    for (k, v) in &app.other_fields {
        rec.insert(k.clone(), v.clone());
    }
    rec
}

fn record_to_addapp(record: FlatRecord) -> Option<AddApp> {
    let id = Uuid::parse_str(record.get("Id")?).ok()?;
    let game_id = Uuid::parse_str(record.get("GameID")?).ok()?;
    let name = record.get("Name").unwrap_or_default().to_string();
    let application_path = record.get("ApplicationPath").map(str::to_string);
    let launch_command = record.get("CommandLine").map(str::to_string);
    let auto_run_before = parse_bool(record.get("AutoRunBefore"));
    let wait_for_exit = parse_bool(record.get("WaitForExit"));
    let other_fields = record.into_other_fields(ADDAPP_FIELDS).into_iter().collect();
    Some(AddApp {
        id,
        game_id,
        name,
        application_path,
        launch_command,
        auto_run_before,
        wait_for_exit,
        other_fields,
    })
}

pub struct LaunchBoxInstall {
    root: StrictPath,
    policy: UpdatePolicy,
    remove_obsolete: bool,
    playlist_ids: FreeIndexTracker,
    clifp_path: Option<StrictPath>,
    clifp_extra: ExtraFlags,
}

impl LaunchBoxInstall {
    pub fn new(root: StrictPath, policy: UpdatePolicy, remove_obsolete: bool) -> Self {
        Self {
            root,
            policy,
            remove_obsolete,
            playlist_ids: FreeIndexTracker::new(LAUNCHBOX_ID_BOUND),
            clifp_path: None,
            clifp_extra: ExtraFlags::default(),
        }
    }

    pub fn validate(path: &StrictPath) -> bool {
        path.joined("Data").is_dir()
    }

    fn platform_doc_path(&self, name: &str) -> StrictPath {
        self.root.joined(&format!("Data/Platforms/{name}.xml"))
    }

    fn playlist_doc_path(&self, name: &str) -> StrictPath {
        self.root.joined(&format!("Data/Playlists/{name}.xml"))
    }

    fn write_document(&self, path: &StrictPath, content: &str, backup: &mut BackupManager) -> Result<(), Error> {
        path.create_parent_dir().ok();
        backup.backup_copy(path)?;
        std::fs::write(path.interpret(), content).map_err(|_| {
            Error::Doc(DocHandlingError::new(
                crate::doc::DocId::new(DocType::Platform, path.render()),
                DocHandlingErrorKind::DocWriteFailed,
            ))
        })
    }
}

impl Install for LaunchBoxInstall {
    fn name(&self) -> &str {
        "LaunchBox"
    }

    fn preferred_image_modes(&self) -> &[ImageMode] {
        &[ImageMode::Copy, ImageMode::Link]
    }

    fn is_running(&self) -> bool {
        crate::launcher::is_process_running("LaunchBox.exe")
    }

    fn configure_clifp(&mut self, clifp_path: &StrictPath, extra: &ExtraFlags) {
        self.clifp_path = Some(clifp_path.clone());
        self.clifp_extra = extra.clone();
    }

    fn checkout_platform(&mut self, name: &str) -> Result<PlatformDocState, Error> {
        let path = self.platform_doc_path(name);
        let mut doc = PlatformDocState::new(name, self.policy, self.remove_obsolete);
        if path.exists() {
            let content = std::fs::read_to_string(path.interpret()).map_err(|_| {
                Error::Doc(DocHandlingError::new(doc.id().clone(), DocHandlingErrorKind::DocCantOpen))
            })?;
            let records = read_records(&content, doc.id(), "LaunchBox")?;
            for TaggedRecord { tag, record } in records {
                match tag.as_str() {
                    "Game" => {
                        if let Some(game) = record_to_game(record) {
                            doc.games.insert(game, crate::container::Phase::Init);
                        }
                    }
                    "AdditionalApplication" => {
                        if let Some(app) = record_to_addapp(record) {
                            doc.add_apps.insert(app, crate::container::Phase::Init);
                        }
                    }
                    _ => {}
                }
            }
        }
        doc.post_checkout();
        doc.begin_update();
        Ok(doc)
    }

    fn commit_platform(&mut self, mut doc: PlatformDocState, backup: &mut BackupManager) -> Result<(), Error> {
        doc.finalize();

        let mut records: Vec<(String, FlatRecord)> = Vec::new();
        let clifp_path = self.clifp_path.clone();
        let clifp_extra = self.clifp_extra.clone();
        doc.games
            .for_each_final(|g| records.push(("Game".to_string(), game_to_record(g, clifp_path.as_ref(), &clifp_extra))));
        doc.add_apps.for_each_final(|a| {
            records.push((
                "AdditionalApplication".to_string(),
                addapp_to_record(a, clifp_path.as_ref(), &clifp_extra),
            ))
        });

        let content = write_records("LaunchBox", &records)
            .map_err(|_| Error::Doc(DocHandlingError::new(doc.id().clone(), DocHandlingErrorKind::DocCantSave)))?;

        let path = self.platform_doc_path(&doc.id.name);
        self.write_document(&path, &content, backup)
    }

    fn checkout_playlist(&mut self, name: &str) -> Result<PlaylistDocState, Error> {
        let path = self.playlist_doc_path(name);
        let mut doc = PlaylistDocState::new(name, self.policy, self.remove_obsolete);
        if path.exists() {
            let content = std::fs::read_to_string(path.interpret())
                .map_err(|_| Error::Doc(DocHandlingError::new(doc.id().clone(), DocHandlingErrorKind::DocCantOpen)))?;
            let records = read_records(&content, doc.id(), "LaunchBox")?;
            let mut order = 0i64;
            for TaggedRecord { tag, record } in records {
                match tag.as_str() {
                    "Playlist" => {
                        if let Some(id) = record.get("PlaylistId").and_then(|s| Uuid::parse_str(s).ok()) {
                            doc.set_header(PlaylistHeader {
                                id,
                                name: record.get("Name").unwrap_or_default().to_string(),
                                description: None,
                                author: None,
                                other_fields: record.into_other_fields(PLAYLIST_HEADER_FIELDS).into_iter().collect(),
                            });
                        }
                    }
                    "PlaylistGame" => {
                        if let Some(game_id) = record.get("GameId").and_then(|s| Uuid::parse_str(s).ok()) {
                            if let Some(lb_id) = record.get("LaunchBoxId").and_then(|s| s.parse::<u32>().ok()) {
                                self.playlist_ids.observe(game_id, lb_id);
                            }
                            doc.add_member(PlaylistGame {
                                id: game_id,
                                game_id,
                                order,
                                notes: record.get("Notes").map(str::to_string),
                                title: record.get("GameTitle").map(str::to_string),
                                filename: record.get("GameFileName").map(str::to_string),
                                platform: record.get("GamePlatform").map(str::to_string),
                                other_fields: record.into_other_fields(PLAYLIST_GAME_FIELDS).into_iter().collect(),
                            });
                            order += 1;
                        }
                    }
                    _ => {}
                }
            }
        }
        doc.post_checkout();
        doc.begin_update();
        Ok(doc)
    }

    fn commit_playlist(&mut self, mut doc: PlaylistDocState, backup: &mut BackupManager) -> Result<(), Error> {
        doc.finalize();

        // `obsolete()` always yields leftover `existing` members, but they're
        // still written out by `for_each_final` when `!remove_obsolete`, so
        // only release their LaunchBoxId when they're actually being dropped.
        if doc.members.remove_obsolete() {
            for id in doc.members.obsolete().map(|m| m.game_id).collect::<Vec<_>>() {
                self.playlist_ids.release(id);
            }
        }

        let mut records: Vec<(String, FlatRecord)> = Vec::new();
        if let Some(header) = &doc.header {
            let mut rec = FlatRecord::default();
            rec.insert("PlaylistId", header.id.to_string());
            rec.insert("Name", header.name.clone());
            for (k, v) in &header.other_fields {
                rec.insert(k.clone(), v.clone());
            }
            records.push(("Playlist".to_string(), rec));
        }

        let mut members = Vec::new();
        doc.members.for_each_final(|m| members.push(m.clone()));
        members.sort_by_key(|m| m.order);
        for member in &members {
            let lb_id = self.playlist_ids.allocate(member.game_id);
            let mut rec = FlatRecord::default();
            rec.insert("GameId", member.game_id.to_string());
            if let Some(v) = &member.title {
                rec.insert("GameTitle", v.clone());
            }
            if let Some(v) = &member.filename {
                rec.insert("GameFileName", v.clone());
            }
            if let Some(v) = &member.platform {
                rec.insert("GamePlatform", v.clone());
            }
            if let Some(lb_id) = lb_id {
                rec.insert("LaunchBoxId", lb_id.to_string());
            }
            if let Some(v) = &member.notes {
                rec.insert("Notes", v.clone());
            }
            for (k, v) in &member.other_fields {
                rec.insert(k.clone(), v.clone());
            }
            records.push(("PlaylistGame".to_string(), rec));
        }

        let content = write_records("LaunchBox", &records)
            .map_err(|_| Error::Doc(DocHandlingError::new(doc.id().clone(), DocHandlingErrorKind::DocCantSave)))?;

        let path = self.playlist_doc_path(&doc.id.name);
        self.write_document(&path, &content, backup)
    }

    fn convert_to_destination_images(&self, game: &Game, _image_mode: ImageMode, paths: &mut ImagePaths) {
        let safe_name: String = game
            .name
            .chars()
            .map(|c| if crate::prelude::INVALID_FILE_CHARS.contains(&c) { '_' } else { c })
            .collect();
        let stem = format!("{safe_name}-{}", game.id);
        paths.logo_path = Some(self.root.joined(&format!("Images/{}/Box - Front/{stem}.png", game.platform)));
        paths.screenshot_path = Some(self.root.joined(&format!("Images/{}/Screenshot - Gameplay/{stem}.png", game.platform)));
    }

    fn platform_category_icon_path(&self, platform: &str) -> StrictPath {
        self.root.joined(&format!("Images/{platform}/Clear Logo/{platform}.png"))
    }

    fn platform_icons_dir(&self) -> StrictPath {
        self.root.joined("Images/Platform Icons")
    }

    fn playlist_icons_dir(&self) -> StrictPath {
        self.root.joined("Images/Playlist Icons")
    }

    fn post_platforms_import(&mut self, backup: &mut BackupManager) -> Result<(), Error> {
        // Data/Platforms.xml is the registry of which platform documents exist;
        // keep its <Platform> list in sync with what's on disk.
        let path = self.root.joined("Data/Platforms.xml");
        let mut names: Vec<String> = if path.exists() {
            let content = std::fs::read_to_string(path.interpret()).unwrap_or_default();
            let id = crate::doc::DocId::new(DocType::Config, "Platforms");
            read_records(&content, &id, "LaunchBox")
                .unwrap_or_default()
                .into_iter()
                .filter_map(|r| r.record.get("Name").map(str::to_string))
                .collect()
        } else {
            Vec::new()
        };

        let platforms_dir = self.root.joined("Data/Platforms");
        if platforms_dir.is_dir() {
            for entry in std::fs::read_dir(platforms_dir.interpret()).into_iter().flatten().flatten() {
                if let Some(stem) = entry.path().file_stem().map(|s| s.to_string_lossy().to_string()) {
                    if !names.contains(&stem) {
                        names.push(stem);
                    }
                }
            }
        }
        names.sort();

        let records: Vec<(String, FlatRecord)> = names
            .into_iter()
            .map(|name| {
                let mut rec = FlatRecord::default();
                rec.insert("Name", name);
                ("Platform".to_string(), rec)
            })
            .collect();
        let content = write_records("LaunchBox", &records).map_err(|_| {
            Error::Doc(DocHandlingError::new(
                crate::doc::DocId::new(DocType::Config, "Platforms"),
                DocHandlingErrorKind::DocCantSave,
            ))
        })?;
        self.write_document(&path, &content, backup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::UpdatePolicy;

    #[test]
    fn game_round_trips_through_record_conversion() {
        let game = Game {
            id: Uuid::from_u128(1),
            name: "A".into(),
            platform: "Flash".into(),
            fields: GameFields {
                developer: Some("Acme".into()),
                ..Default::default()
            },
            other_fields: HashMap::from([("CustomTag".to_string(), "value".to_string())]),
        };

        let record = game_to_record(&game, None, &ExtraFlags::default());
        let parsed = record_to_game(record).unwrap();

        assert_eq!(parsed.id, game.id);
        assert_eq!(parsed.fields.developer, game.fields.developer);
        assert_eq!(parsed.other_fields.get("CustomTag"), Some(&"value".to_string()));
    }

    #[test]
    fn committed_game_uses_clifp_as_the_launch_command_when_configured() {
        let game = Game {
            id: Uuid::from_u128(7),
            name: "A".into(),
            platform: "Flash".into(),
            fields: GameFields {
                application_path: Some("FPSoftware/Flash/flashplayer.exe".into()),
                launch_command: Some("http://example.test/a.swf".into()),
                ..Default::default()
            },
            other_fields: Default::default(),
        };
        let clifp_path = StrictPath::new("/fp/CLIFp".to_string());
        let record = game_to_record(&game, Some(&clifp_path), &ExtraFlags::default());

        assert_eq!(record.get("ApplicationPath"), Some("/fp/CLIFp"));
        assert_eq!(record.get("CommandLine"), Some("play --id=00000000-0000-0000-0000-000000000007"));
    }

    #[test]
    fn checkout_of_missing_platform_document_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let root = StrictPath::new(dir.path().to_string_lossy().to_string());
        let mut install = LaunchBoxInstall::new(root, UpdatePolicy::NewAndExisting, true);
        let doc = install.checkout_platform("Flash").unwrap();
        assert_eq!(doc.imported_game_ids().len(), 0);
    }
}
