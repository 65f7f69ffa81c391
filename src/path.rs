#[cfg(target_os = "windows")]
const TYPICAL_SEPARATOR: &str = "\\";
#[cfg(target_os = "windows")]
const ATYPICAL_SEPARATOR: &str = "/";

#[cfg(not(target_os = "windows"))]
const TYPICAL_SEPARATOR: &str = "/";
#[cfg(not(target_os = "windows"))]
const ATYPICAL_SEPARATOR: &str = "\\";

#[allow(dead_code)]
const UNC_PREFIX: &str = "\\\\";
#[allow(dead_code)]
const UNC_LOCAL_PREFIX: &str = "\\\\?\\";

fn parse_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") || path.starts_with("~\\") {
        path.replacen("~", &dirs::home_dir().unwrap().to_string_lossy(), 1)
    } else {
        path.to_owned()
    }
}

fn normalize(path: &str) -> String {
    parse_home(path).replace(ATYPICAL_SEPARATOR, TYPICAL_SEPARATOR)
}

// Based on:
// https://github.com/rust-lang/cargo/blob/f84f3f8c630c75a1ec01b818ff469d3496228c6b/src/cargo/util/paths.rs#L61-L86
fn parse_dots(path: &str, basis: &str) -> String {
    let mut components = std::path::Path::new(&path).components().peekable();
    let mut ret = if let Some(c @ std::path::Component::Prefix(..)) = components.peek().cloned() {
        components.next();
        std::path::PathBuf::from(c.as_os_str())
    } else {
        std::path::PathBuf::from(basis)
    };

    for component in components {
        match component {
            std::path::Component::Prefix(..) => unreachable!(),
            std::path::Component::RootDir => {
                ret.push(component.as_os_str());
            }
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                ret.pop();
            }
            std::path::Component::Normal(c) => {
                let lossy = c.to_string_lossy();
                if lossy.contains(':') {
                    // This can happen if the manifest contains invalid paths,
                    // such as `<winDocuments>/<home>`. In this example, `<home>`
                    // means we could try to push `C:` in the middle of the path,
                    // which would truncate the rest of the path up to that point,
                    // causing us to check the entire home folder.
                    // We escape it so that it (likely) just won't be found,
                    // rather than finding something irrelevant.
                    ret.push(lossy.replace(":", "_"));
                } else {
                    ret.push(c);
                }
            }
        }
    }

    render_pathbuf(&ret)
}

/// Convert a raw, possibly user-provided path into a suitable form for internal use.
/// On Windows, this produces UNC paths.
fn interpret<P: Into<String>>(path: P, basis: &Option<String>) -> String {
    let normalized = normalize(&path.into());
    let absolutized = if std::path::Path::new(&normalized).is_absolute() {
        normalized
    } else {
        render_pathbuf(
            &match basis {
                None => std::env::current_dir().unwrap(),
                Some(b) => std::path::Path::new(b).to_path_buf(),
            }
            .join(normalized),
        )
    };
    match std::fs::canonicalize(&absolutized) {
        Ok(x) => render_pathbuf(&x),
        Err(_) => {
            let dedotted = parse_dots(
                &absolutized,
                &render_pathbuf(&match basis {
                    None => std::env::current_dir().unwrap(),
                    Some(b) => std::path::Path::new(b).to_path_buf(),
                }),
            );
            format!(
                "{}{}",
                if cfg!(target_os = "windows") && !dedotted.starts_with(UNC_LOCAL_PREFIX) {
                    UNC_LOCAL_PREFIX
                } else {
                    ""
                },
                dedotted.replace(ATYPICAL_SEPARATOR, TYPICAL_SEPARATOR)
            )
        }
    }
}

/// Convert a path into a nice form for display and storage.
/// On Windows, this produces non-UNC paths.
fn render<P: Into<String>>(path: P) -> String {
    path.into().replace(UNC_LOCAL_PREFIX, "").replace("\\", "/")
}

pub fn render_pathbuf(value: &std::path::PathBuf) -> String {
    value.as_path().display().to_string()
}

/// This is a wrapper around paths to make it more obvious when we're
/// converting between different representations. This also handles
/// things like `~`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StrictPath {
    raw: String,
    basis: Option<String>,
}

impl StrictPath {
    pub fn new(raw: String) -> Self {
        Self { raw, basis: None }
    }

    pub fn relative(raw: String, basis: Option<String>) -> Self {
        Self { raw, basis }
    }

    pub fn reset(&mut self, raw: String) {
        self.raw = raw;
    }

    pub fn from_std_path_buf(path_buf: &std::path::PathBuf) -> Self {
        Self::new(render_pathbuf(&path_buf))
    }

    pub fn as_std_path_buf(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(&self.interpret())
    }

    pub fn raw(&self) -> String {
        self.raw.to_string()
    }

    pub fn interpret(&self) -> String {
        interpret(&self.raw, &self.basis)
    }

    pub fn render(&self) -> String {
        render(self.interpret())
    }

    pub fn is_file(&self) -> bool {
        std::path::Path::new(&self.interpret()).is_file()
    }

    pub fn is_dir(&self) -> bool {
        std::path::Path::new(&self.interpret()).is_dir()
    }

    pub fn exists(&self) -> bool {
        self.is_file() || self.is_dir()
    }

    pub fn remove(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.is_file() {
            std::fs::remove_file(&self.interpret())?;
        } else if self.is_dir() {
            std::fs::remove_dir_all(&self.interpret())?;
        }
        Ok(())
    }

    pub fn joined(&self, other: &str) -> Self {
        Self::new(format!("{}/{}", self.interpret(), other))
    }

    pub fn create_parent_dir(&self) -> std::io::Result<()> {
        let mut pb = self.as_std_path_buf();
        pb.pop();
        std::fs::create_dir_all(&pb)?;
        Ok(())
    }

    /// Name of the final path component, if any (used to translate a document's
    /// logical name into a leaf file/folder name for layout purposes).
    pub fn leaf(&self) -> Option<String> {
        self.as_std_path_buf()
            .file_name()
            .map(|x| x.to_string_lossy().to_string())
    }

    /// Clears the read-only attribute on `path` so it can be overwritten, returning
    /// whether it was previously set so the caller can restore it on revert.
    pub fn unset_readonly(&self) -> Result<bool, ()> {
        let interpreted = self.interpret();
        let mut perms = std::fs::metadata(&interpreted).map_err(|_| ())?.permissions();
        let was_readonly = perms.readonly();
        if was_readonly {
            perms.set_readonly(false);
            std::fs::set_permissions(&interpreted, perms).map_err(|_| ())?;
        }
        Ok(was_readonly)
    }

    pub fn set_readonly(&self, readonly: bool) -> Result<(), ()> {
        let interpreted = self.interpret();
        let mut perms = std::fs::metadata(&interpreted).map_err(|_| ())?.permissions();
        perms.set_readonly(readonly);
        std::fs::set_permissions(&interpreted, perms).map_err(|_| ())
    }

}

/// Creates a symbolic link at `dst` pointing at `src`, file or directory.
#[cfg(target_os = "windows")]
pub fn symlink(src: impl AsRef<std::path::Path>, dst: impl AsRef<std::path::Path>) -> std::io::Result<()> {
    if src.as_ref().is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

#[cfg(not(target_os = "windows"))]
pub fn symlink(src: impl AsRef<std::path::Path>, dst: impl AsRef<std::path::Path>) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Probes once whether the process can create symbolic links, so callers can
/// drop `Link` image mode from the offered choices rather than failing mid
/// import (spec §9 "Symbolic link fallback").
pub fn can_create_symlinks() -> bool {
    let dir = match tempfile::tempdir() {
        Ok(d) => d,
        Err(_) => return false,
    };
    let src = dir.path().join("probe-src");
    let dst = dir.path().join("probe-dst");
    if std::fs::write(&src, b"x").is_err() {
        return false;
    }
    symlink(&src, &dst).is_ok()
}

// Based on:
// https://github.com/serde-rs/serde/issues/751#issuecomment-277580700
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct StrictPathSerdeHelper(String);

impl serde::Serialize for StrictPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        StrictPathSerdeHelper(self.raw()).serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for StrictPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        serde::Deserialize::deserialize(deserializer).map(|StrictPathSerdeHelper(raw)| StrictPath::new(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> String {
        env!("CARGO_MANIFEST_DIR").to_owned()
    }

    fn username() -> String {
        std::env::var("USERNAME").or_else(|_| std::env::var("USER")).unwrap_or_default()
    }

    fn home() -> String {
        render_pathbuf(&dirs::home_dir().unwrap())
    }

    mod strict_path {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn expands_relative_paths_from_working_dir_by_default() {
            let sp = StrictPath::new("Cargo.toml".to_owned());
            if cfg!(target_os = "windows") {
                assert_eq!(format!("\\\\?\\{}\\Cargo.toml", repo()), sp.interpret());
            } else {
                assert_eq!(format!("{}/Cargo.toml", repo()), sp.interpret());
            }
        }

        #[test]
        fn expands_relative_paths_from_specified_basis_dir() {
            if cfg!(target_os = "windows") {
                let sp = StrictPath::relative("Cargo.toml".to_owned(), Some("C:\\tmp".to_string()));
                assert_eq!("\\\\?\\C:\\tmp\\Cargo.toml", sp.interpret());
            } else {
                let sp = StrictPath::relative("Cargo.toml".to_owned(), Some("/tmp".to_string()));
                assert_eq!("/tmp/Cargo.toml", sp.interpret());
            }
        }

        #[test]
        fn converts_single_dot_at_start_of_real_path() {
            assert_eq!(
                format!("{}/Cargo.toml", repo()).replace("\\", "/"),
                StrictPath::new("./Cargo.toml".to_owned()).render(),
            );
        }

        #[test]
        fn converts_single_dots_at_start_of_real_path() {
            assert_eq!(
                format!("{}/Cargo.toml", repo()).replace("\\", "/"),
                StrictPath::new("./././Cargo.toml".to_owned()).render(),
            );
        }

        #[test]
        fn converts_single_dot_at_start_of_fake_path() {
            assert_eq!(
                format!("{}/fake/Cargo.toml", repo()).replace("\\", "/"),
                StrictPath::relative("./Cargo.toml".to_owned(), Some(format!("{}/fake", repo()))).render(),
            );
        }

        #[test]
        fn converts_single_dot_within_real_path() {
            assert_eq!(
                format!("{}/Cargo.toml", repo()).replace("\\", "/"),
                StrictPath::new(format!("{}/./Cargo.toml", repo())).render(),
            );
        }

        #[test]
        fn converts_single_dots_within_real_path() {
            assert_eq!(
                format!("{}/Cargo.toml", repo()).replace("\\", "/"),
                StrictPath::new(format!("{}/./././Cargo.toml", repo())).render(),
            );
        }

        #[test]
        fn converts_single_dot_within_fake_path() {
            assert_eq!(
                format!("{}/fake/Cargo.toml", repo()).replace("\\", "/"),
                StrictPath::new(format!("{}/fake/./Cargo.toml", repo())).render(),
            );
        }

        #[test]
        fn converts_double_dots_at_start_of_real_path() {
            assert_eq!(
                format!("{}/Cargo.toml", repo()).replace("\\", "/"),
                StrictPath::relative("../Cargo.toml".to_owned(), Some(format!("{}/src", repo()))).render(),
            );
        }

        #[test]
        fn converts_double_dots_at_start_of_fake_path() {
            assert_eq!(
                format!("{}/fake.md", repo()).replace("\\", "/"),
                StrictPath::relative("../fake.md".to_owned(), Some(format!("{}/fake", repo()))).render(),
            );
        }

        #[test]
        fn converts_double_dots_within_real_path() {
            assert_eq!(
                format!("{}/Cargo.toml", repo()).replace("\\", "/"),
                StrictPath::new(format!("{}/src/../Cargo.toml", repo())).render(),
            );
        }

        #[test]
        fn converts_double_dots_within_fake_path() {
            assert_eq!(
                format!("{}/fake.md", repo()).replace("\\", "/"),
                StrictPath::new(format!("{}/fake/../fake.md", repo())).render(),
            );
        }

        #[test]
        fn treats_absolute_paths_as_such() {
            if cfg!(target_os = "windows") {
                let sp = StrictPath::new("C:\\tmp\\Cargo.toml".to_owned());
                assert_eq!("\\\\?\\C:\\tmp\\Cargo.toml", sp.interpret());
            } else {
                let sp = StrictPath::new("/tmp/Cargo.toml".to_owned());
                assert_eq!("/tmp/Cargo.toml", sp.interpret());
            }
        }

        #[test]
        fn converts_tilde_in_isolation() {
            if cfg!(target_os = "windows") {
                let sp = StrictPath::new("~".to_owned());
                assert_eq!(format!("\\\\?\\C:\\Users\\{}", username()), sp.interpret());
                assert_eq!(format!("C:/Users/{}", username()), sp.render());
            } else {
                let sp = StrictPath::new("~".to_owned());
                assert_eq!(home(), sp.interpret());
                assert_eq!(home(), sp.render());
            }
        }

        #[test]
        fn converts_tilde_before_forward_slash() {
            if cfg!(target_os = "windows") {
                let sp = StrictPath::new("~/~".to_owned());
                assert_eq!(format!("\\\\?\\C:\\Users\\{}\\~", username()), sp.interpret());
                assert_eq!(format!("C:/Users/{}/~", username()), sp.render());
            } else {
                let sp = StrictPath::new("~/~".to_owned());
                assert_eq!(format!("{}/~", home()), sp.interpret());
                assert_eq!(format!("{}/~", home()), sp.render());
            }
        }

        #[test]
        fn converts_tilde_before_backslash() {
            if cfg!(target_os = "windows") {
                let sp = StrictPath::new("~\\~".to_owned());
                assert_eq!(format!("\\\\?\\C:\\Users\\{}\\~", username()), sp.interpret());
                assert_eq!(format!("C:/Users/{}/~", username()), sp.render());
            } else {
                let sp = StrictPath::new("~\\~".to_owned());
                assert_eq!(format!("{}/~", home()), sp.interpret());
                assert_eq!(format!("{}/~", home()), sp.render());
            }
        }

        #[test]
        fn does_not_convert_tilde_before_a_nonslash_character() {
            let sp = StrictPath::new("~a".to_owned());
            if cfg!(target_os = "windows") {
                assert_eq!(format!("\\\\?\\{}\\~a", repo()), sp.interpret());
            } else {
                assert_eq!(format!("{}/~a", repo()), sp.interpret());
            }
        }

        #[test]
        #[cfg(target_os = "windows")]
        fn does_not_truncate_path_up_to_drive_letter_in_classic_path() {
            // https://github.com/mtkennerly/ludusavi/issues/36
            // Test for: <winDocuments>/<home>

            let sp = StrictPath {
                raw: "C:\\Users\\Foo\\Documents/C:\\Users\\Bar".to_string(),
                basis: Some("\\\\?\\C:\\Users\\Foo\\.config\\ludusavi".to_string()),
            };
            assert_eq!(r#"\\?\C:\Users\Foo\Documents\C_\Users\Bar"#, sp.interpret(),);
            assert_eq!("C:/Users/Foo/Documents/C_/Users/Bar", sp.render(),);
        }

        #[test]
        #[cfg(target_os = "windows")]
        fn does_not_truncate_path_up_to_drive_letter_in_unc_path() {
            // https://github.com/mtkennerly/ludusavi/issues/36
            // Test for: <winDocuments>/<home>

            let sp = StrictPath {
                raw: "\\\\?\\C:\\Users\\Foo\\Documents\\C:\\Users\\Bar".to_string(),
                basis: Some("\\\\?\\C:\\Users\\Foo\\.config\\ludusavi".to_string()),
            };
            assert_eq!(r#"\\?\C:\Users\Foo\Documents\C_\Users\Bar"#, sp.interpret(),);
            assert_eq!("C:/Users/Foo/Documents/C_/Users/Bar", sp.render(),);
        }

        #[test]
        fn can_check_if_it_is_a_file() {
            assert!(StrictPath::new(format!("{}/Cargo.toml", repo())).is_file());
            assert!(!StrictPath::new(repo()).is_file());
        }

        #[test]
        fn can_check_if_it_is_a_directory() {
            assert!(StrictPath::new(repo()).is_dir());
            assert!(!StrictPath::new(format!("{}/Cargo.toml", repo())).is_dir());
        }

        #[test]
        fn can_check_if_it_exists() {
            assert!(StrictPath::new(repo()).exists());
            assert!(StrictPath::new(format!("{}/Cargo.toml", repo())).exists());
            assert!(!StrictPath::new(format!("{}/fake", repo())).exists());
        }

        #[test]
        fn can_report_leaf_name() {
            assert_eq!(Some("Cargo.toml".to_string()), StrictPath::new(format!("{}/Cargo.toml", repo())).leaf());
        }
    }
}
