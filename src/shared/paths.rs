use crate::errors::RestoreServiceError;
use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` without touching the filesystem. `..` at the root
/// stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Absolute, normalized form of a configured directory
pub fn absolute_dir(path: &Path) -> Result<PathBuf, RestoreServiceError> {
    let absolute = std::path::absolute(path).map_err(|e| {
        RestoreServiceError::ConfigurationError(format!("{}: {}", path.display(), e))
    })?;
    Ok(normalize_lexically(&absolute))
}

/// True when walking `reference` from `base_dir` ever enters `scope` and the
/// walk ends outside of it
pub fn walks_out_of(base_dir: &Path, reference: &Path, scope: &Path) -> bool {
    let mut current = PathBuf::new();
    let mut entered = false;
    for component in base_dir.join(reference).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                current.pop();
            }
            other => current.push(other.as_os_str()),
        }
        entered |= current.starts_with(scope);
    }
    entered && !current.starts_with(scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/srv/app/../shared/./uploads")),
            PathBuf::from("/srv/shared/uploads")
        );
        assert_eq!(normalize_lexically(Path::new("/../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn test_absolute_dir_resolves_relative_paths() -> Result<(), RestoreServiceError> {
        let resolved = absolute_dir(Path::new("../shared/uploads"))?;
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("shared/uploads"));
        assert!(!resolved.components().any(|c| c == Component::ParentDir));
        Ok(())
    }

    #[test]
    fn test_walks_out_of_scope() {
        let base = Path::new("/srv/onehub");
        let uploads = Path::new("/srv/onehub/backend/uploads");

        assert!(walks_out_of(base, Path::new("backend/uploads/../../../etc/passwd"), uploads));
        assert!(walks_out_of(
            base,
            Path::new("/srv/onehub/backend/uploads/../x.sql"),
            uploads
        ));
        assert!(!walks_out_of(base, Path::new("backend/uploads/sub/../a.sql"), uploads));
        assert!(!walks_out_of(base, Path::new("dumps/../dumps/a.sql"), uploads));
        assert!(!walks_out_of(base, Path::new("/var/backups/a.sql"), uploads));
    }
}
