//! Data document abstraction (spec §3, §4.3): a typed handle on a single
//! launcher file, with a checkout → populate → mutate → finalize → commit
//! lifecycle. The concrete reader/writer pairs for each on-disk format live
//! in [`crate::doc::xml`] and [`crate::doc::line`]; this module holds the
//! shared state every platform/playlist document needs regardless of
//! format, mirroring the original's `IDataDoc`/`IUpdatableDoc` split
//! (`original_source/app/src/launcher/interface/lr-data-interface.h`).

pub mod line;
pub mod xml;

use std::fmt;

use uuid::Uuid;

use crate::container::{Phase, UpdatableContainer, UpdatePolicy};
use crate::model::item::{AddApp, Game, PlaylistGame, PlaylistHeader, Set};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocType {
    Platform,
    Playlist,
    Config,
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocType::Platform => write!(f, "platform"),
            DocType::Playlist => write!(f, "playlist"),
            DocType::Config => write!(f, "config"),
        }
    }
}

/// `(type, docName)` identity of a document, used in diagnostics and error
/// messages.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocId {
    pub kind: DocType,
    pub name: String,
}

impl DocId {
    pub fn new(kind: DocType, name: impl Into<String>) -> Self {
        Self { kind, name: name.into() }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// Behavior shared by every document: identity, and the two lifecycle hooks
/// that run once per checkout/commit.
pub trait DataDoc {
    fn id(&self) -> &DocId;

    /// Runs once after the reader finishes populating the document with
    /// whatever was already on disk.
    fn post_checkout(&mut self) {}

    /// Runs once before the writer serializes the document: folds the
    /// updatable containers down to what's written. Launcher-specific
    /// bookkeeping that depends on which members end up obsolete (e.g.
    /// recycling freed LaunchBox IDs) happens in the adapter's own
    /// `commit_platform`/`commit_playlist`, after this returns.
    fn finalize(&mut self) {}
}

/// Shared state for a platform document: the games and add-apps read off
/// disk at checkout, updated in place as the worker feeds in [`Set`]s from
/// the source catalog.
pub struct PlatformDocState {
    pub id: DocId,
    pub games: UpdatableContainer<Game>,
    pub add_apps: UpdatableContainer<AddApp>,
    phase: Phase,
}

impl PlatformDocState {
    pub fn new(name: impl Into<String>, policy: UpdatePolicy, remove_obsolete: bool) -> Self {
        Self {
            id: DocId::new(DocType::Platform, name),
            games: UpdatableContainer::new(policy, remove_obsolete),
            add_apps: UpdatableContainer::new(policy, remove_obsolete),
            phase: Phase::Init,
        }
    }

    /// Switches from the reader's initial-population phase to the import
    /// phase; subsequent [`Self::add_set`] calls merge rather than seed.
    pub fn begin_update(&mut self) {
        self.phase = Phase::Update;
    }

    /// Feeds one `(Game, [AddApp])` tuple from the source catalog into the
    /// document, atomically (spec §3 "Set").
    pub fn add_set(&mut self, set: Set) {
        let game_id = set.game.id;
        self.games.insert(set.game, self.phase);
        for add_app in set.add_apps {
            debug_assert_eq!(add_app.game_id, game_id);
            self.add_apps.insert(add_app, self.phase);
        }
    }

    pub fn imported_game_ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::new();
        self.games.for_each_final(|g| ids.push(g.id));
        ids
    }
}

impl DataDoc for PlatformDocState {
    fn id(&self) -> &DocId {
        &self.id
    }
}

/// Shared state for a playlist document: header plus member list, with
/// membership keyed by the referenced game's UUID (spec §3).
pub struct PlaylistDocState {
    pub id: DocId,
    pub header: Option<PlaylistHeader>,
    pub members: UpdatableContainer<PlaylistGame>,
    phase: Phase,
}

impl PlaylistDocState {
    pub fn new(name: impl Into<String>, policy: UpdatePolicy, remove_obsolete: bool) -> Self {
        Self {
            id: DocId::new(DocType::Playlist, name),
            header: None,
            members: UpdatableContainer::new(policy, remove_obsolete),
            phase: Phase::Init,
        }
    }

    pub fn begin_update(&mut self) {
        self.phase = Phase::Update;
    }

    pub fn set_header(&mut self, header: PlaylistHeader) {
        self.header = Some(header);
    }

    pub fn add_member(&mut self, member: PlaylistGame) {
        self.members.insert(member, self.phase);
    }
}

impl DataDoc for PlaylistDocState {
    fn id(&self) -> &DocId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::GameFields;

    fn set(id: u128) -> Set {
        Set {
            game: Game {
                id: Uuid::from_u128(id),
                name: "A".into(),
                platform: "Flash".into(),
                fields: GameFields::default(),
                other_fields: Default::default(),
            },
            add_apps: vec![],
        }
    }

    #[test]
    fn add_set_during_init_phase_seeds_existing() {
        let mut doc = PlatformDocState::new("Flash", UpdatePolicy::NewAndExisting, true);
        doc.add_set(set(1));
        assert!(doc.games.contains_existing(Uuid::from_u128(1)));
    }

    #[test]
    fn add_set_after_begin_update_merges_into_new_or_updated() {
        let mut doc = PlatformDocState::new("Flash", UpdatePolicy::NewAndExisting, true);
        doc.add_set(set(1));
        doc.begin_update();
        doc.add_set(set(1));
        doc.add_set(set(2));

        assert!(doc.games.contains_updated(Uuid::from_u128(1)));
        assert!(doc.games.contains_new(Uuid::from_u128(2)));
        assert_eq!(doc.imported_game_ids().len(), 2);
    }
}
