use uuid::Uuid;

use crate::model::item::{Game, GameFields};
use crate::path::StrictPath;

pub fn repo_raw() -> String {
    env!("CARGO_MANIFEST_DIR").to_string()
}

/// A scratch directory plus a `StrictPath` pointed at it, for tests that
/// need a real filesystem root (launcher adapters, the backup journal).
pub fn temp_root() -> (tempfile::TempDir, StrictPath) {
    let dir = tempfile::tempdir().unwrap();
    let root = StrictPath::new(dir.path().to_string_lossy().to_string());
    (dir, root)
}

/// A minimal, deterministic game keyed off a small integer so call sites
/// read clearly (`fake_game(1)`).
pub fn fake_game(id: u128) -> Game {
    Game {
        id: Uuid::from_u128(id),
        name: format!("Game {id}"),
        platform: "Flash".to_string(),
        fields: GameFields::default(),
        other_fields: Default::default(),
    }
}
