//! Plain-data item types (spec §3). Every launcher-entry type carries an
//! `other_fields` map preserving attributes this crate doesn't recognize, so
//! that reading a document and writing it back is lossless.

use std::collections::HashMap;
use uuid::Uuid;

use crate::serialization::ordered_map;

/// Foreign key/value pairs carried verbatim between read and write.
pub type OtherFields = HashMap<String, String>;

/// Shared behavior of every item kind: preserve unknown attributes across a
/// read-modify-write cycle.
pub trait Item {
    fn other_fields(&self) -> &OtherFields;
    fn other_fields_mut(&mut self) -> &mut OtherFields;

    /// Copies `other`'s foreign fields onto `self`, used when an update merge
    /// keeps a successor item but the predecessor's unrecognized attributes
    /// must still be retained.
    fn transfer_other_fields(&mut self, other: &impl Item) {
        for (k, v) in other.other_fields() {
            self.other_fields_mut().entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

/// Identity shared by every concrete record: a UUID and a display name.
/// Equality and hashing follow `id` alone.
pub trait BasicItem: Item {
    fn id(&self) -> Uuid;
    fn name(&self) -> &str;
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub name: String,
    pub platform: String,
    /// Launcher-defined ordered attributes (release date, developer,
    /// sort-title, app path, command line, etc.) kept as strings; each
    /// adapter interprets the subset it understands.
    pub fields: GameFields,
    #[serde(serialize_with = "ordered_map", default)]
    pub other_fields: OtherFields,
}

/// Recognized catalog fields a launcher adapter may draw from (spec §6's
/// logical game columns). Fields an adapter doesn't surface stay `None` and
/// are not emitted.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct GameFields {
    pub series: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub sort_title: Option<String>,
    pub date_added: Option<chrono::NaiveDateTime>,
    pub date_modified: Option<chrono::NaiveDateTime>,
    pub broken: Option<bool>,
    pub play_mode: Option<String>,
    pub status: Option<String>,
    pub region: Option<String>,
    pub notes: Option<String>,
    pub source: Option<String>,
    pub application_path: Option<String>,
    pub launch_command: Option<String>,
    pub release_date: Option<String>,
    pub version: Option<String>,
    pub release_type: Option<String>,
}

impl Item for Game {
    fn other_fields(&self) -> &OtherFields {
        &self.other_fields
    }
    fn other_fields_mut(&mut self) -> &mut OtherFields {
        &mut self.other_fields
    }
}

impl BasicItem for Game {
    fn id(&self) -> Uuid {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Additional application: a walkthrough, manual, or alternate launch
/// attached to a parent [`Game`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AddApp {
    pub id: Uuid,
    pub name: String,
    pub game_id: Uuid,
    pub application_path: Option<String>,
    pub launch_command: Option<String>,
    pub auto_run_before: Option<bool>,
    pub wait_for_exit: Option<bool>,
    #[serde(serialize_with = "ordered_map", default)]
    pub other_fields: OtherFields,
}

impl Item for AddApp {
    fn other_fields(&self) -> &OtherFields {
        &self.other_fields
    }
    fn other_fields_mut(&mut self) -> &mut OtherFields {
        &mut self.other_fields
    }
}

impl BasicItem for AddApp {
    fn id(&self) -> Uuid {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// A game and its add-apps, consumed atomically by a platform document.
#[derive(Clone, Debug)]
pub struct Set {
    pub game: Game,
    pub add_apps: Vec<AddApp>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PlaylistHeader {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub author: Option<String>,
    #[serde(serialize_with = "ordered_map", default)]
    pub other_fields: OtherFields,
}

impl Item for PlaylistHeader {
    fn other_fields(&self) -> &OtherFields {
        &self.other_fields
    }
    fn other_fields_mut(&mut self) -> &mut OtherFields {
        &mut self.other_fields
    }
}

impl BasicItem for PlaylistHeader {
    fn id(&self) -> Uuid {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// A single member of a playlist. `id` is aliased to the referenced game's
/// UUID in some launchers; `order` is the position fixed by whichever
/// playlist was imported first for this game (spec §9 open question).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PlaylistGame {
    pub id: Uuid,
    pub game_id: Uuid,
    pub order: i64,
    pub notes: Option<String>,
    /// Filled from the in-memory cache built while importing platform
    /// entries, not from the playlist table itself.
    pub title: Option<String>,
    pub filename: Option<String>,
    pub platform: Option<String>,
    #[serde(serialize_with = "ordered_map", default)]
    pub other_fields: OtherFields,
}

impl Item for PlaylistGame {
    fn other_fields(&self) -> &OtherFields {
        &self.other_fields
    }
    fn other_fields_mut(&mut self) -> &mut OtherFields {
        &mut self.other_fields
    }
}

impl BasicItem for PlaylistGame {
    fn id(&self) -> Uuid {
        self.id
    }
    fn name(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }
}

/// Destination for a game's artwork; either side may be unset if the source
/// or adapter doesn't supply it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImagePaths {
    pub logo_path: Option<crate::path::StrictPath>,
    pub screenshot_path: Option<crate::path::StrictPath>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(id: u128, other: &[(&str, &str)]) -> Game {
        Game {
            id: Uuid::from_u128(id),
            name: "A".into(),
            platform: "Flash".into(),
            fields: GameFields::default(),
            other_fields: other.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn transfer_other_fields_keeps_predecessor_values_not_already_set() {
        let predecessor = game(1, &[("custom1", "keep-me"), ("custom2", "also-keep")]);
        let mut successor = game(1, &[("custom2", "source-wins")]);

        successor.transfer_other_fields(&predecessor);

        assert_eq!(successor.other_fields.get("custom1"), Some(&"keep-me".to_string()));
        assert_eq!(successor.other_fields.get("custom2"), Some(&"source-wins".to_string()));
    }

    #[test]
    fn basic_item_identity_is_id_only() {
        let g = game(42, &[]);
        assert_eq!(g.id(), Uuid::from_u128(42));
        assert_eq!(g.name(), "A");
    }
}
