//! Relocating paths from a source root to a target root.

use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

/// Move `item` from under `source_root` to the same relative position under
/// `target_root`.
///
/// The prefix test compares whole path components, so `/data/foo` is not
/// treated as a parent of `/data/foobar`. Grafting the root itself yields
/// `target_root`.
///
/// # Errors
/// Returns `EngineError::NotUnderRoot` if `item` is not `source_root` or one
/// of its descendants.
pub fn graft(item: &Path, source_root: &Path, target_root: &Path) -> Result<PathBuf> {
    let relative = item
        .strip_prefix(source_root)
        .map_err(|_| EngineError::NotUnderRoot {
            path: item.to_path_buf(),
            root: source_root.to_path_buf(),
        })?;

    if relative.as_os_str().is_empty() {
        Ok(target_root.to_path_buf())
    } else {
        Ok(target_root.join(relative))
    }
}

/// Graft every path in `items`, stopping at the first one outside `source_root`.
pub fn graft_all<'a, I>(items: I, source_root: &Path, target_root: &Path) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = &'a Path>,
{
    items
        .into_iter()
        .map(|item| graft(item, source_root, target_root))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graft_preserves_relative_structure() {
        let grafted = graft(
            Path::new("/home/me/docs/a/b.txt"),
            Path::new("/home/me/docs"),
            Path::new("/mnt/backup"),
        )
        .unwrap();
        assert_eq!(grafted, PathBuf::from("/mnt/backup/a/b.txt"));
    }

    #[test]
    fn test_graft_root_maps_to_target() {
        let grafted = graft(
            Path::new("/home/me/docs"),
            Path::new("/home/me/docs"),
            Path::new("/mnt/backup"),
        )
        .unwrap();
        assert_eq!(grafted, PathBuf::from("/mnt/backup"));
    }

    #[test]
    fn test_graft_handles_trailing_separator() {
        let grafted = graft(
            Path::new("/home/me/docs/a.txt"),
            Path::new("/home/me/docs/"),
            Path::new("/mnt/backup/"),
        )
        .unwrap();
        assert_eq!(grafted, PathBuf::from("/mnt/backup/a.txt"));
    }

    #[test]
    fn test_graft_rejects_sibling_sharing_string_prefix() {
        let result = graft(
            Path::new("/data/foobar/x.txt"),
            Path::new("/data/foo"),
            Path::new("/backup"),
        );
        assert!(matches!(result, Err(EngineError::NotUnderRoot { .. })));
    }

    #[test]
    fn test_graft_rejects_unrelated_path() {
        let result = graft(Path::new("/etc/passwd"), Path::new("/home"), Path::new("/backup"));
        assert!(result.is_err());
    }

    #[test]
    fn test_graft_round_trip() {
        let source = Path::new("/src/root");
        let target = Path::new("/dst/elsewhere/root");
        for item in ["/src/root", "/src/root/a", "/src/root/a/b/c.txt", "/src/root/.hidden"] {
            let item = Path::new(item);
            let there = graft(item, source, target).unwrap();
            assert!(there.starts_with(target));
            let back = graft(&there, target, source).unwrap();
            assert_eq!(back, item);
        }
    }

    #[test]
    fn test_graft_is_injective() {
        let source = Path::new("/s");
        let target = Path::new("/t");
        let items = [
            Path::new("/s/a"),
            Path::new("/s/ab"),
            Path::new("/s/a/b"),
            Path::new("/s/b"),
        ];
        let grafted = graft_all(items, source, target).unwrap();
        let unique: std::collections::HashSet<_> = grafted.iter().collect();
        assert_eq!(unique.len(), items.len());
    }

    #[test]
    fn test_graft_all_stops_on_violation() {
        let items = [Path::new("/s/a"), Path::new("/elsewhere")];
        assert!(graft_all(items, Path::new("/s"), Path::new("/t")).is_err());
    }
}
