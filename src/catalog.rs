//! Read-only access to the source catalog (spec §6): a pre-existing SQLite
//! database we never write to. Column names here follow spec §6's logical
//! listing; a real catalog's schema may rename columns, in which case only
//! the `SELECT` strings below need to change.

use std::collections::HashMap;

use rusqlite::Connection;
use uuid::Uuid;

use crate::error::Error;
use crate::model::item::{AddApp, Game, GameFields, ImagePaths, PlaylistGame, PlaylistHeader};
use crate::path::StrictPath;

pub fn open(path: &StrictPath) -> Result<Connection, Error> {
    let conn = Connection::open_with_flags(path.interpret(), rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    Ok(conn)
}

fn parse_uuid(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, raw.as_bytes()))
}

fn parse_bool(raw: Option<i64>) -> Option<bool> {
    raw.map(|v| v != 0)
}

fn parse_datetime(raw: Option<String>) -> Option<chrono::NaiveDateTime> {
    raw.and_then(|s| chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok())
}

/// Distinct platform names present among games not excluded by `excluded_tags`.
pub fn query_platform_names(conn: &Connection, excluded_tags: &[String]) -> Result<Vec<String>, Error> {
    let exclusion = tag_exclusion_clause(excluded_tags);
    let sql = format!(
        "SELECT DISTINCT platform FROM game WHERE platform IS NOT NULL AND platform != '' {exclusion} ORDER BY platform"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

fn tag_exclusion_clause(excluded_tags: &[String]) -> String {
    if excluded_tags.is_empty() {
        return String::new();
    }
    let list = excluded_tags
        .iter()
        .map(|t| format!("'{}'", t.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "AND id NOT IN (SELECT gameId FROM game_tags_map gtm JOIN tag t ON t.id = gtm.tagId WHERE t.primaryAlias IN ({list}))"
    )
}

/// All games for `platform`, excluding ones tagged with any of `excluded_tags`.
pub fn query_games_for_platform(conn: &Connection, platform: &str, excluded_tags: &[String]) -> Result<Vec<Game>, Error> {
    let exclusion = tag_exclusion_clause(excluded_tags);
    let sql = format!(
        "SELECT id, title, series, developer, publisher, platform, sortTitle, dateAdded, dateModified, \
         broken, playMode, status, region, notes, source, applicationPath, launchCommand, releaseDate, \
         version, releaseType FROM game WHERE platform = ?1 {exclusion}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([platform], |row| {
        Ok(Game {
            id: parse_uuid(&row.get::<_, String>(0)?),
            name: row.get(1)?,
            platform: row.get(5)?,
            fields: GameFields {
                series: row.get(2)?,
                developer: row.get(3)?,
                publisher: row.get(4)?,
                sort_title: row.get(6)?,
                date_added: parse_datetime(row.get(7)?),
                date_modified: parse_datetime(row.get(8)?),
                broken: parse_bool(row.get(9)?),
                play_mode: row.get(10)?,
                status: row.get(11)?,
                region: row.get(12)?,
                notes: row.get(13)?,
                source: row.get(14)?,
                application_path: row.get(15)?,
                launch_command: row.get(16)?,
                release_date: row.get(17)?,
                version: row.get(18)?,
                release_type: row.get(19)?,
            },
            other_fields: Default::default(),
        })
    })?;

    let mut games = Vec::new();
    for row in rows {
        games.push(row?);
    }
    Ok(games)
}

/// All add-apps for `game_ids`, keyed by their parent game's UUID, matching
/// spec §4.6's "populate an in-memory AddApp multi-map" directive.
pub fn query_add_apps_for_games(conn: &Connection, game_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<AddApp>>, Error> {
    let mut stmt = conn.prepare(
        "SELECT id, parentGameId, applicationPath, launchCommand, name, autoRunBefore, waitForExit \
         FROM additional_app WHERE parentGameId = ?1",
    )?;

    let mut by_game: HashMap<Uuid, Vec<AddApp>> = HashMap::new();
    for game_id in game_ids {
        let rows = stmt.query_map([game_id.to_string()], |row| {
            Ok(AddApp {
                id: parse_uuid(&row.get::<_, String>(0)?),
                game_id: parse_uuid(&row.get::<_, String>(1)?),
                application_path: row.get(2)?,
                launch_command: row.get(3)?,
                name: row.get(4)?,
                auto_run_before: parse_bool(row.get(5)?),
                wait_for_exit: parse_bool(row.get(6)?),
                other_fields: Default::default(),
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        if !entries.is_empty() {
            by_game.insert(*game_id, entries);
        }
    }
    Ok(by_game)
}

/// Single game lookup by id, used when a playlist references a game outside
/// the platforms selected for import (spec §4.6 `PlaylistsPhase`, "force
/// all" mode).
pub fn query_game_by_id(conn: &Connection, id: Uuid) -> Result<Option<Game>, Error> {
    let sql = "SELECT id, title, series, developer, publisher, platform, sortTitle, dateAdded, dateModified, \
               broken, playMode, status, region, notes, source, applicationPath, launchCommand, releaseDate, \
               version, releaseType FROM game WHERE id = ?1";
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map([id.to_string()], |row| {
        Ok(Game {
            id: parse_uuid(&row.get::<_, String>(0)?),
            name: row.get(1)?,
            platform: row.get(5)?,
            fields: GameFields {
                series: row.get(2)?,
                developer: row.get(3)?,
                publisher: row.get(4)?,
                sort_title: row.get(6)?,
                date_added: parse_datetime(row.get(7)?),
                date_modified: parse_datetime(row.get(8)?),
                broken: parse_bool(row.get(9)?),
                play_mode: row.get(10)?,
                status: row.get(11)?,
                region: row.get(12)?,
                notes: row.get(13)?,
                source: row.get(14)?,
                application_path: row.get(15)?,
                launch_command: row.get(16)?,
                release_date: row.get(17)?,
                version: row.get(18)?,
                release_type: row.get(19)?,
            },
            other_fields: Default::default(),
        })
    })?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn query_playlist_header(conn: &Connection, name: &str) -> Result<Option<PlaylistHeader>, Error> {
    let mut stmt = conn.prepare("SELECT id, title, description, author FROM playlist WHERE title = ?1")?;
    let mut rows = stmt.query_map([name], |row| {
        Ok(PlaylistHeader {
            id: parse_uuid(&row.get::<_, String>(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
            author: row.get(3)?,
            other_fields: Default::default(),
        })
    })?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Member list of a playlist, ordered by the catalog's own `order` column;
/// `title`/`filename`/`platform` are left unset here, filled in later from
/// the in-memory cache built while importing platform entries (spec §3).
pub fn query_playlist_games(conn: &Connection, playlist_id: Uuid) -> Result<Vec<PlaylistGame>, Error> {
    let mut stmt =
        conn.prepare("SELECT gameId, `order`, notes FROM playlist_game WHERE playlistId = ?1 ORDER BY `order`")?;
    let rows = stmt.query_map([playlist_id.to_string()], |row| {
        let game_id = parse_uuid(&row.get::<_, String>(0)?);
        Ok(PlaylistGame {
            id: game_id,
            game_id,
            order: row.get(1)?,
            notes: row.get(2)?,
            title: None,
            filename: None,
            platform: None,
            other_fields: Default::default(),
        })
    })?;
    let mut games = Vec::new();
    for row in rows {
        games.push(row?);
    }
    Ok(games)
}

/// Resolves the catalog's own on-disk location for a game's artwork,
/// nested two hex-pair levels deep under `Data/Images/{Logos,Screenshots}`
/// (spec §4.5 "logo_path_source / screenshot_path_source"; directory roots
/// grounded on `flashpointinstall.h`'s `LOGOS_PATH`/`SCREENSHOTS_PATH`).
pub fn source_image_paths(root: &StrictPath, game: &Game) -> ImagePaths {
    let id = game.id.simple().to_string();
    let a = &id[0..2];
    let b = &id[2..4];
    ImagePaths {
        logo_path: Some(root.joined(&format!("Data/Images/Logos/{a}/{b}/{id}.png"))),
        screenshot_path: Some(root.joined(&format!("Data/Images/Screenshots/{a}/{b}/{id}.png"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE game (id TEXT, title TEXT, series TEXT, developer TEXT, publisher TEXT, platform TEXT,
                sortTitle TEXT, dateAdded TEXT, dateModified TEXT, broken INTEGER, playMode TEXT, status TEXT,
                region TEXT, notes TEXT, source TEXT, applicationPath TEXT, launchCommand TEXT, releaseDate TEXT,
                version TEXT, releaseType TEXT);
             INSERT INTO game (id, title, platform) VALUES
                ('00000000-0000-0000-0000-000000000001', 'A', 'Flash'),
                ('00000000-0000-0000-0000-000000000002', 'B', 'HTML5');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn query_platform_names_returns_distinct_sorted_platforms() {
        let conn = seeded_connection();
        let names = query_platform_names(&conn, &[]).unwrap();
        assert_eq!(names, vec!["Flash".to_string(), "HTML5".to_string()]);
    }

    #[test]
    fn source_image_paths_nests_two_hex_pairs_deep() {
        use crate::model::item::GameFields;

        let game = Game {
            id: Uuid::from_u128(1),
            name: "A".into(),
            platform: "Flash".into(),
            fields: GameFields::default(),
            other_fields: Default::default(),
        };
        let root = StrictPath::new("/flashpoint".to_string());
        let paths = source_image_paths(&root, &game);
        let id = game.id.simple().to_string();
        assert_eq!(
            paths.logo_path.unwrap().render(),
            format!("/flashpoint/Data/Images/Logos/{}/{}/{id}.png", &id[0..2], &id[2..4])
        );
    }

    #[test]
    fn query_games_for_platform_filters_by_platform() {
        let conn = seeded_connection();
        let games = query_games_for_platform(&conn, "Flash", &[]).unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].name, "A");
    }
}
