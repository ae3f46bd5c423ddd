use crate::types::{VaultError, VaultResult};
use std::path::{Component, Path, PathBuf};

/// Checks that `target_path` stays inside `base_path`.
/// Relative paths may not climb above the base with `..`; absolute paths must start with it.
pub fn is_path_safe(base_path: &Path, target_path: &Path) -> bool {
    if target_path.is_absolute() {
        return target_path.starts_with(base_path);
    }

    let mut depth = 0;
    for component in target_path.components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }

    true
}

/// Joins a record-relative path (`/` separated) onto `base_path`, refusing traversal.
pub fn resolve_record_path(base_path: &Path, relative: &str) -> VaultResult<PathBuf> {
    let target = Path::new(relative);
    if relative.is_empty() || target.is_absolute() || !is_path_safe(base_path, target) {
        return Err(VaultError::InvalidInput(format!(
            "Path '{relative}' escapes {}",
            base_path.display()
        )));
    }
    Ok(base_path.join(target))
}

/// Turns an arbitrary name into something usable as a single directory name.
pub fn safe_dir_name(raw: &str) -> String {
    let options = sanitize_filename::Options {
        truncate: true,
        windows: true,
        replacement: "_",
    };
    let cleaned = sanitize_filename::sanitize_with_options(raw.trim(), options);
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        "mod".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_traversal_rejected() {
        let base = Path::new("/active");
        assert!(is_path_safe(base, Path::new("skin/skin.pak")));
        assert!(is_path_safe(base, Path::new("skin/../other.pak")));
        assert!(!is_path_safe(base, Path::new("../outside.pak")));
        assert!(!is_path_safe(base, Path::new("a/../../outside.pak")));
    }

    #[test]
    fn test_resolve_record_path() {
        let base = Path::new("/active");
        assert_eq!(
            resolve_record_path(base, "skin/skin.pak").unwrap(),
            PathBuf::from("/active/skin/skin.pak")
        );
        assert!(resolve_record_path(base, "").is_err());
        assert!(resolve_record_path(base, "../x").is_err());
    }

    #[test]
    fn test_safe_dir_name() {
        assert_eq!(safe_dir_name("skin"), "skin");
        assert_eq!(safe_dir_name("a/b:c"), "a_b_c");
        assert_eq!(safe_dir_name("  "), "mod");
        let dots = safe_dir_name("..");
        assert!(!dots.is_empty() && dots != "..");
    }
}
