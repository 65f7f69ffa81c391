//! CLIFp command-line construction and packaged-version deployment check
//! (spec §6, §4.6 "Prepare"). We never implement CLIFp itself — only build
//! the argv every emitted launch command uses, and decide whether the
//! packaged copy needs to replace whatever's already installed, grounded on
//! `original_source/app/src/kernel/clifp.h`'s compare-then-copy shape.

use semver::Version;

use crate::backup::BackupManager;
use crate::error::Error;
use crate::path::StrictPath;

/// Extra flags every emitted command line may carry (spec §6).
#[derive(Clone, Debug, Default)]
pub struct ExtraFlags {
    pub msg: Option<String>,
    pub extra: Option<String>,
    pub fullscreen: bool,
}

fn push_extra(args: &mut Vec<String>, extra: &ExtraFlags) {
    if let Some(msg) = &extra.msg {
        args.push(format!("--msg={msg}"));
    }
    if let Some(e) = &extra.extra {
        args.push(format!("--extra={e}"));
    }
    if extra.fullscreen {
        args.push("--fullscreen".to_string());
    }
}

fn play_args(game_id: impl std::fmt::Display, extra: &ExtraFlags) -> Vec<String> {
    let mut args = vec!["play".to_string(), format!("--id={game_id}")];
    push_extra(&mut args, extra);
    args
}

fn run_args(app_path: &str, params: &str, extra: &ExtraFlags) -> Vec<String> {
    let mut args = vec!["run".to_string(), format!("--app={app_path}"), format!("--param={params}")];
    push_extra(&mut args, extra);
    args
}

fn join(args: &[String]) -> String {
    shlex::try_join(args.iter().map(|s| s.as_str())).unwrap_or_else(|_| args.join(" "))
}

/// Builds `clifp play --id="<uuid>" ...`, the full launch command for an
/// ordinary game entry. `game_id` accepts either a concrete UUID or a
/// launcher placeholder token (e.g. ES-DE's `%BASENAME%`), since a
/// system-level command template needs the latter.
pub fn build_play_command(game_id: impl std::fmt::Display, extra: &ExtraFlags) -> String {
    let mut args = vec!["clifp".to_string()];
    args.extend(play_args(game_id, extra));
    join(&args)
}

/// Builds `clifp run --app="<path>" --param="<args>" ...`, the full launch
/// command for an add-app entry.
pub fn build_run_command(app_path: &str, params: &str, extra: &ExtraFlags) -> String {
    let mut args = vec!["clifp".to_string()];
    args.extend(run_args(app_path, params, extra));
    join(&args)
}

/// Argument-only form of [`build_play_command`], for launchers (LaunchBox)
/// that store the invoked executable and its arguments in separate fields.
pub fn build_play_args(game_id: impl std::fmt::Display, extra: &ExtraFlags) -> String {
    join(&play_args(game_id, extra))
}

/// Argument-only form of [`build_run_command`].
pub fn build_run_args(app_path: &str, params: &str, extra: &ExtraFlags) -> String {
    join(&run_args(app_path, params, extra))
}

/// Reads the semver embedded in a CLIFp binary, if any. Adapters provide
/// this however they can determine it (a sidecar version file, `--version`
/// output, etc.); this module just compares.
pub trait InstalledVersionReader {
    fn read_installed_version(&self, path: &StrictPath) -> Option<Version>;
}

/// Reads a version from a `<path>.version` sidecar text file next to the
/// binary, the portable stand-in for the original's PE version-resource
/// read (`Qx::FileDetails`) that doesn't require a platform-specific crate.
pub struct SidecarVersionReader;

impl InstalledVersionReader for SidecarVersionReader {
    fn read_installed_version(&self, path: &StrictPath) -> Option<Version> {
        let sidecar = format!("{}.version", path.interpret());
        let content = std::fs::read_to_string(sidecar).ok()?;
        Version::parse(content.trim()).ok()
    }
}

/// Deploys `packaged` over `installed_path` unless the installed copy's
/// version (per `reader`) already matches the packaged copy's, via the
/// journal so a failed or cancelled import can undo the replacement. Also
/// deploys a `.version` sidecar alongside, if the packaged copy has one, so
/// a later call sees the new version without re-copying the binary.
pub fn deploy_if_outdated(
    backup: &mut BackupManager,
    reader: &impl InstalledVersionReader,
    packaged: &StrictPath,
    installed_path: &StrictPath,
) -> Result<bool, Error> {
    let packaged_version = reader.read_installed_version(packaged);
    let installed_version = reader.read_installed_version(installed_path);
    if packaged_version.is_none() && installed_path.exists() {
        // No version info to compare against; trust what's already deployed
        // rather than redeploying on every single import.
        return Ok(false);
    }
    if installed_version.is_some() && installed_version == packaged_version {
        return Ok(false);
    }

    backup.safe_replace(packaged, installed_path, false).map_err(Error::from)?;

    let packaged_sidecar = StrictPath::new(format!("{}.version", packaged.interpret()));
    if packaged_sidecar.exists() {
        let installed_sidecar = StrictPath::new(format!("{}.version", installed_path.interpret()));
        backup.safe_replace(&packaged_sidecar, &installed_sidecar, false).map_err(Error::from)?;
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_command_quotes_id_flag() {
        let cmd = build_play_command(uuid::Uuid::nil(), &ExtraFlags::default());
        assert_eq!(cmd, "clifp play --id=00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn run_command_includes_extra_flags_when_set() {
        let cmd = build_run_command(
            "game.exe",
            "-fullscreen",
            &ExtraFlags {
                msg: Some("hello world".to_string()),
                extra: None,
                fullscreen: true,
            },
        );
        assert!(cmd.contains("--app=game.exe"));
        assert!(cmd.contains("--param=-fullscreen"));
        assert!(cmd.contains("--msg='hello world'") || cmd.contains("--msg=hello\\ world"));
        assert!(cmd.contains("--fullscreen"));
    }

    #[test]
    fn play_command_accepts_a_placeholder_token_for_system_level_templates() {
        let cmd = build_play_command("%BASENAME%", &ExtraFlags::default());
        assert_eq!(cmd, "clifp play --id=%BASENAME%");
    }

    #[test]
    fn play_args_omit_the_program_name() {
        let args = build_play_args(uuid::Uuid::nil(), &ExtraFlags::default());
        assert_eq!(args, "play --id=00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn deploy_if_outdated_replaces_when_versions_differ() {
        let dir = tempfile::tempdir().unwrap();
        let packaged = StrictPath::new(dir.path().join("packaged/CLIFp").to_string_lossy().to_string());
        let installed = StrictPath::new(dir.path().join("installed/CLIFp").to_string_lossy().to_string());
        packaged.create_parent_dir().ok();
        installed.create_parent_dir().ok();
        std::fs::write(packaged.interpret(), b"binary").unwrap();
        std::fs::write(format!("{}.version", packaged.interpret()), "1.2.0").unwrap();

        let mut backup = BackupManager::new();
        let deployed = deploy_if_outdated(&mut backup, &SidecarVersionReader, &packaged, &installed).unwrap();
        assert!(deployed);
        assert!(installed.exists());

        let deployed_again = deploy_if_outdated(&mut backup, &SidecarVersionReader, &packaged, &installed).unwrap();
        assert!(!deployed_again);
    }
}
