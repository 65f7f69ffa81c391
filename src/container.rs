//! Three-way updatable container (spec §3, §4.2): items read off disk at
//! checkout land in `existing`; items then inserted from the import source
//! either migrate an `existing` entry into `updated` or land fresh in `new`.

use std::collections::HashMap;
use std::hash::Hash;

use crate::model::item::{BasicItem, Item};

/// Which phase an insert happens in: reading the document off disk, or
/// merging in freshly imported entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Init,
    Update,
}

/// How an update-phase insert resolves a collision with an `existing` entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// The newly inserted item's fields win; its `other_fields` are still
    /// backfilled from the predecessor via [`Item::transfer_other_fields`].
    NewAndExisting,
    /// The existing on-disk payload is kept verbatim; the insert only
    /// proves the item is still present (so it isn't treated as obsolete).
    OnlyNew,
}

/// Three-way existing/updated/new set keyed by an item's own identity.
#[derive(Debug)]
pub struct UpdatableContainer<T: BasicItem> {
    existing: HashMap<uuid::Uuid, T>,
    updated: HashMap<uuid::Uuid, T>,
    new: HashMap<uuid::Uuid, T>,
    policy: UpdatePolicy,
    remove_obsolete: bool,
}

impl<T: BasicItem + Clone> UpdatableContainer<T> {
    pub fn new(policy: UpdatePolicy, remove_obsolete: bool) -> Self {
        Self {
            existing: HashMap::new(),
            updated: HashMap::new(),
            new: HashMap::new(),
            policy,
            remove_obsolete,
        }
    }

    /// Inserts `item` according to `phase`; see module docs and spec §3.
    pub fn insert(&mut self, item: T, phase: Phase) {
        match phase {
            Phase::Init => {
                self.existing.insert(item.id(), item);
            }
            Phase::Update => {
                if let Some(predecessor) = self.existing.remove(&item.id()) {
                    let resolved = match self.policy {
                        UpdatePolicy::NewAndExisting => {
                            let mut item = item;
                            item.transfer_other_fields(&predecessor);
                            item
                        }
                        UpdatePolicy::OnlyNew => predecessor,
                    };
                    self.updated.insert(resolved.id(), resolved);
                } else {
                    self.new.insert(item.id(), item);
                }
            }
        }
    }

    pub fn contains_existing(&self, id: uuid::Uuid) -> bool {
        self.existing.contains_key(&id)
    }

    pub fn contains_updated(&self, id: uuid::Uuid) -> bool {
        self.updated.contains_key(&id)
    }

    pub fn contains_new(&self, id: uuid::Uuid) -> bool {
        self.new.contains_key(&id)
    }

    pub fn find_existing(&self, id: uuid::Uuid) -> Option<&T> {
        self.existing.get(&id)
    }

    pub fn find_updated(&self, id: uuid::Uuid) -> Option<&T> {
        self.updated.get(&id)
    }

    pub fn find_new(&self, id: uuid::Uuid) -> Option<&T> {
        self.new.get(&id)
    }

    pub fn find_final(&self, id: uuid::Uuid) -> Option<&T> {
        self.updated
            .get(&id)
            .or_else(|| self.new.get(&id))
            .or_else(|| if self.remove_obsolete { None } else { self.existing.get(&id) })
    }

    pub fn remove_existing(&mut self, id: uuid::Uuid) -> Option<T> {
        self.existing.remove(&id)
    }

    pub fn for_each_existing(&self, mut f: impl FnMut(&T)) {
        self.existing.values().for_each(|x| f(x));
    }

    pub fn for_each_updated(&self, mut f: impl FnMut(&T)) {
        self.updated.values().for_each(|x| f(x));
    }

    pub fn for_each_new(&self, mut f: impl FnMut(&T)) {
        self.new.values().for_each(|x| f(x));
    }

    /// Visits every item that will be written out: `updated` and `new`
    /// always, plus leftover `existing` entries when `!remove_obsolete`.
    pub fn for_each_final(&self, mut f: impl FnMut(&T)) {
        self.updated.values().for_each(|x| f(x));
        self.new.values().for_each(|x| f(x));
        if !self.remove_obsolete {
            self.existing.values().for_each(|x| f(x));
        }
    }

    /// Leftover `existing` entries not matched by any update-phase insert;
    /// when `remove_obsolete` is set these are the ones to delete.
    pub fn obsolete(&self) -> impl Iterator<Item = &T> {
        self.existing.values()
    }

    pub fn erase_if(&mut self, mut predicate: impl FnMut(&T) -> bool) {
        self.existing.retain(|_, v| !predicate(v));
        self.updated.retain(|_, v| !predicate(v));
        self.new.retain(|_, v| !predicate(v));
    }

    pub fn final_len(&self) -> usize {
        self.updated.len() + self.new.len() + if self.remove_obsolete { 0 } else { self.existing.len() }
    }

    pub fn remove_obsolete(&self) -> bool {
        self.remove_obsolete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::{Game, GameFields};
    use uuid::Uuid;

    fn game(id: u128, name: &str) -> Game {
        Game {
            id: Uuid::from_u128(id),
            name: name.to_string(),
            platform: "Flash".into(),
            fields: GameFields::default(),
            other_fields: Default::default(),
        }
    }

    #[test]
    fn new_and_existing_remove_obsolete_yields_exactly_source() {
        let mut c = UpdatableContainer::new(UpdatePolicy::NewAndExisting, true);
        c.insert(game(1, "A"), Phase::Init);
        c.insert(game(2, "C"), Phase::Init);

        c.insert(game(1, "A'"), Phase::Update);
        c.insert(game(3, "B"), Phase::Update);

        assert_eq!(c.final_len(), 2);
        assert_eq!(c.find_final(Uuid::from_u128(1)).unwrap().name, "A'");
        assert!(c.find_final(Uuid::from_u128(2)).is_none());
        assert!(c.find_final(Uuid::from_u128(3)).is_some());
    }

    #[test]
    fn only_new_keep_obsolete_merges_unmatched_existing_back() {
        let mut c = UpdatableContainer::new(UpdatePolicy::OnlyNew, false);
        c.insert(game(1, "A"), Phase::Init);
        c.insert(game(2, "C"), Phase::Init);

        c.insert(game(1, "A-from-source"), Phase::Update);

        assert_eq!(c.final_len(), 2);
        // OnlyNew: payload on collision is retained from disk, not source.
        assert_eq!(c.find_final(Uuid::from_u128(1)).unwrap().name, "A");
        assert_eq!(c.find_final(Uuid::from_u128(2)).unwrap().name, "C");
    }

    #[test]
    fn other_fields_transferred_on_new_and_existing_update() {
        let mut predecessor = game(1, "A");
        predecessor.other_fields.insert("custom".into(), "value".into());
        let mut c = UpdatableContainer::new(UpdatePolicy::NewAndExisting, true);
        c.insert(predecessor, Phase::Init);
        c.insert(game(1, "A'"), Phase::Update);

        let merged = c.find_final(Uuid::from_u128(1)).unwrap();
        assert_eq!(merged.other_fields.get("custom"), Some(&"value".to_string()));
    }
}
