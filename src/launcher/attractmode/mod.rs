//! AttractMode adapter (spec §6 "AttractMode layout"): `romlists/<name>.txt`
//! semicolon tables, `emulators/<name>.cfg` key/value files, `*.tag`
//! membership lists, and the nested `attract.cfg`. AttractMode has no
//! native add-app concept, so `Set::add_apps` are not represented on disk
//! here; the worker still imports them into the in-memory document (spec
//! §4.6 `add_set`), they just never reach a file.

use uuid::Uuid;

use crate::backup::BackupManager;
use crate::container::{Phase, UpdatePolicy};
use crate::doc::line::{parse_romlist, write_romlist, RomlistRecord};
use crate::doc::{DocType, PlatformDocState, PlaylistDocState};
use crate::error::{DocHandlingError, DocHandlingErrorKind, Error};
use crate::launcher::Install;
use crate::model::item::{Game, GameFields, ImagePaths, PlaylistGame, PlaylistHeader};
use crate::options::ImageMode;
use crate::path::StrictPath;

fn romname(game: &Game) -> String {
    game.fields
        .application_path
        .as_ref()
        .and_then(|p| std::path::Path::new(p).file_stem().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_else(|| game.id.to_string())
}

fn game_to_record(game: &Game) -> RomlistRecord {
    let mut rec = RomlistRecord::default();
    rec.set("Name", romname(game));
    rec.set("Title", game.name.clone());
    rec.set("Emulator", "CLIFp");
    if let Some(v) = &game.fields.developer {
        rec.set("Manufacturer", v.clone());
    }
    if let Some(v) = &game.fields.release_date {
        rec.set("Year", v.clone());
    }
    if let Some(v) = &game.fields.play_mode {
        rec.set("Players", v.clone());
    }
    rec
}

fn record_to_game(platform: &str, record: &RomlistRecord) -> Option<Game> {
    let name_token = record.get("Name")?.to_string();
    let title = record.get("Title").unwrap_or(&name_token).to_string();
    // AttractMode (per `am-install.h`'s single shared `mFpRomlist`) identifies
    // a rom by its romname alone, the same identity `.tag` membership files
    // reference (spec §6 "AttractMode layout"); not platform-qualified, so
    // checkout_playlist's matching id below uses the identical basis.
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("rom/{name_token}").as_bytes());
    Some(Game {
        id,
        name: title,
        platform: platform.to_string(),
        fields: GameFields {
            developer: record.get("Manufacturer").map(str::to_string),
            release_date: record.get("Year").map(str::to_string),
            play_mode: record.get("Players").map(str::to_string),
            application_path: Some(name_token),
            ..Default::default()
        },
        other_fields: Default::default(),
    })
}

pub struct AttractModeInstall {
    root: StrictPath,
    policy: UpdatePolicy,
    remove_obsolete: bool,
}

impl AttractModeInstall {
    pub fn new(root: StrictPath, policy: UpdatePolicy, remove_obsolete: bool) -> Self {
        Self {
            root,
            policy,
            remove_obsolete,
        }
    }

    pub fn validate(path: &StrictPath) -> bool {
        path.joined("romlists").is_dir() && path.joined("attract.cfg").exists()
    }

    fn romlist_path(&self, name: &str) -> StrictPath {
        self.root.joined(&format!("romlists/{name}.txt"))
    }

    fn taglist_path(&self, name: &str) -> StrictPath {
        self.root.joined(&format!("romlists/{name}.tag"))
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
}

impl Install for AttractModeInstall {
    fn name(&self) -> &str {
        "AttractMode"
    }

    fn preferred_image_modes(&self) -> &[ImageMode] {
        &[ImageMode::Copy, ImageMode::Link, ImageMode::Reference]
    }

    fn is_running(&self) -> bool {
        crate::launcher::is_process_running("attract") || crate::launcher::is_process_running("attract.exe")
    }

    fn checkout_platform(&mut self, name: &str) -> Result<PlatformDocState, Error> {
        let path = self.romlist_path(name);
        let mut doc = PlatformDocState::new(name, self.policy, self.remove_obsolete);
        if path.exists() {
            let content = std::fs::read_to_string(path.interpret())
                .map_err(|_| Error::Doc(DocHandlingError::new(doc.id().clone(), DocHandlingErrorKind::DocCantOpen)))?;
            for record in parse_romlist(&content) {
                if let Some(game) = record_to_game(name, &record) {
                    doc.games.insert(game, Phase::Init);
                }
            }
        }
        doc.post_checkout();
        doc.begin_update();
        Ok(doc)
    }

    fn commit_platform(&mut self, mut doc: PlatformDocState, backup: &mut BackupManager) -> Result<(), Error> {
        doc.finalize();
        let mut records = Vec::new();
        doc.games.for_each_final(|g| records.push(game_to_record(g)));
        let content = write_romlist(&records);
        let path = self.romlist_path(&doc.id.name);
        self.write_text(&path, &content, backup)
    }

    fn checkout_playlist(&mut self, name: &str) -> Result<PlaylistDocState, Error> {
        let path = self.taglist_path(name);
        let mut doc = PlaylistDocState::new(name, self.policy, self.remove_obsolete);
        if path.exists() {
            let content = std::fs::read_to_string(path.interpret())
                .map_err(|_| Error::Doc(DocHandlingError::new(doc.id().clone(), DocHandlingErrorKind::DocCantOpen)))?;
            let mut order = 0i64;
            for line in content.lines() {
                if let Some(comment) = line.strip_prefix("# ") {
                    doc.set_header(PlaylistHeader {
                        id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()),
                        name: name.to_string(),
                        description: Some(comment.to_string()),
                        author: None,
                        other_fields: Default::default(),
                    });
                    continue;
                }
                if line.trim().is_empty() {
                    continue;
                }
                let game_id = Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("rom/{line}").as_bytes());
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

        let mut content = String::new();
        if let Some(header) = &doc.header {
            if let Some(desc) = &header.description {
                content.push_str(&format!("# {desc}\n"));
            }
        }
        let mut members = Vec::new();
        doc.members.for_each_final(|m| members.push(m.clone()));
        members.sort_by_key(|m| m.order);
        for member in members {
            // Match the romname derivation used for the main romlist's `Name`
            // field, since checkout_playlist rehashes this same text to
            // recover a member's synthetic id.
            let romname = member
                .filename
                .as_deref()
                .and_then(|f| std::path::Path::new(f).file_stem().map(|s| s.to_string_lossy().to_string()))
                .unwrap_or_else(|| member.game_id.to_string());
            content.push_str(&romname);
            content.push('\n');
        }

        let path = self.taglist_path(&doc.id.name);
        self.write_text(&path, &content, backup)
    }

    fn convert_to_destination_images(&self, game: &Game, _image_mode: ImageMode, paths: &mut ImagePaths) {
        let name = romname(game);
        paths.logo_path = Some(self.root.joined(&format!("scraper/{}/flyer/{name}.png", game.platform)));
        paths.screenshot_path = Some(self.root.joined(&format!("scraper/{}/snap/{name}.png", game.platform)));
    }

    fn platform_category_icon_path(&self, platform: &str) -> StrictPath {
        self.root.joined(&format!("scraper/{platform}/marquee/{platform}.png"))
    }

    fn platform_icons_dir(&self) -> StrictPath {
        self.root.joined("scraper/marquee")
    }

    fn playlist_icons_dir(&self) -> StrictPath {
        self.root.joined("scraper/marquee")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_with_semicolon_title_round_trips() {
        let game = Game {
            id: Uuid::from_u128(1),
            name: "A;B".into(),
            platform: "flash".into(),
            fields: GameFields {
                application_path: Some("a_b.swf".into()),
                ..Default::default()
            },
            other_fields: Default::default(),
        };

        let record = game_to_record(&game);
        let content = write_romlist(&[record]);
        let parsed = parse_romlist(&content);
        let round_tripped = record_to_game("flash", &parsed[0]).unwrap();

        assert_eq!(round_tripped.name, "A;B");
    }
}
