//! Parameter structures an embedder builds and hands to the worker.
//! Configuration persistence is out of scope for this crate (spec §1); these
//! types are `serde` + `schemars`-annotated the way the teacher's
//! `resource::config` module shapes its own parameter structs, so an
//! embedder that wants to persist a previous run's choices can do so with
//! `serde_yaml` on its own.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::container::UpdatePolicy;
use crate::path::StrictPath;

/// How a game's artwork is placed into the launcher's image tree (spec
/// §4.5).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImageMode {
    #[default]
    Copy,
    Link,
    Reference,
}

/// Whether playlist-referenced games outside the selected platform set are
/// imported anyway (spec §4.6 `PlaylistsPhase`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistGameMode {
    /// Only import playlist members whose platform is already selected.
    #[default]
    SelectedPlatformsOnly,
    /// Also import playlist members into platforms that weren't selected,
    /// creating those platform documents as needed.
    ForceAll,
}

/// Merge policy plus the `removeObsolete` flag, mirroring
/// `UpdatableContainer`'s two knobs (spec §3) as something an embedder picks
/// once per import rather than per document.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateOptions {
    #[serde(rename = "policy")]
    pub policy_shape: UpdatePolicyShape,
    pub remove_obsolete: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            policy_shape: UpdatePolicyShape::NewAndExisting,
            remove_obsolete: true,
        }
    }
}

impl UpdateOptions {
    pub fn policy(&self) -> UpdatePolicy {
        match self.policy_shape {
            UpdatePolicyShape::NewAndExisting => UpdatePolicy::NewAndExisting,
            UpdatePolicyShape::OnlyNew => UpdatePolicy::OnlyNew,
        }
    }
}

/// Serde-friendly mirror of [`UpdatePolicy`] (which intentionally isn't
/// itself serde-derived, since it's an internal merge-semantics switch, not
/// part of the embedder-facing configuration shape).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicyShape {
    NewAndExisting,
    OnlyNew,
}

/// Which launcher root to target, and how to reach it.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct RootsConfig {
    pub launcher: String,
    #[schemars(with = "String")]
    pub path: StrictPath,
}

/// A scope-current snapshot of the user's choices for one import, installed
/// at the start of the worker's `Prepare` state and cleared at the end
/// (spec §3 "ImportDetails").
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct ImportDetails {
    #[schemars(with = "String")]
    pub flashpoint_root: StrictPath,
    pub update_options: UpdateOptions,
    pub image_mode: ImageMode,
    /// Standard path CLIFp is deployed to and invoked from; this is what
    /// every emitted launch command references (spec §6 "CLIFp
    /// command-line").
    #[schemars(with = "String")]
    pub clifp_path: StrictPath,
    /// Packaged copy of CLIFp bundled with the embedder, compared against
    /// whatever's already at `clifp_path` during `Prepare` (spec §4.6
    /// "deploy CLIFp via a version check"); `None` skips deployment
    /// entirely, for an embedder that manages it some other way.
    #[schemars(with = "Option<String>")]
    pub clifp_packaged_path: Option<StrictPath>,
    pub involved_platforms: Vec<String>,
    pub involved_playlists: Vec<String>,
    pub playlist_game_mode: PlaylistGameMode,
    pub force_fullscreen: bool,
    /// Base URL used to fetch artwork missing from the local catalog (spec
    /// §4.5 "Bulk download"); `None` disables network fallback entirely.
    pub image_download_base_url: Option<String>,
}

impl ImportDetails {
    pub fn is_taskless(&self) -> bool {
        self.involved_platforms.is_empty() && self.involved_playlists.is_empty()
    }
}
