//! Timestamped snapshots of the site sources with a retention limit.

use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;

use crate::assets::copy_tree;

const PREFIX: &str = "backup_";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> BackupError + '_ {
    move |source| BackupError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Copy `items` (files or directories, relative to `root`) into a new
/// `backup_YYYYmmdd_HHMMSS` directory under `location`, then delete all but
/// the newest `keep_last` backups. Missing items are skipped.
pub fn create_backup(
    root: &Path,
    items: &[PathBuf],
    location: &Path,
    keep_last: usize,
) -> Result<PathBuf, BackupError> {
    std::fs::create_dir_all(location).map_err(io_err(location))?;

    let backup_path = next_backup_path(location);
    std::fs::create_dir(&backup_path).map_err(io_err(&backup_path))?;

    for item in items {
        let src = root.join(item);
        let dest = backup_path.join(item);
        if src.is_dir() {
            copy_tree(&src, &dest).map_err(io_err(&src))?;
        } else if src.is_file() {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
            std::fs::copy(&src, &dest).map_err(io_err(&src))?;
        } else {
            tracing::debug!("Skipping missing backup item {}", src.display());
        }
    }

    prune_backups(location, keep_last)?;
    Ok(backup_path)
}

/// Backup directories under `location`, oldest first.
pub fn list_backups(location: &Path) -> Result<Vec<PathBuf>, BackupError> {
    if !location.is_dir() {
        return Ok(Vec::new());
    }

    let mut backups: Vec<PathBuf> = std::fs::read_dir(location)
        .map_err(io_err(location))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(PREFIX))
        })
        .collect();
    backups.sort();
    Ok(backups)
}

/// Remove all but the newest `keep_last` backups. Returns what was removed.
pub fn prune_backups(location: &Path, keep_last: usize) -> Result<Vec<PathBuf>, BackupError> {
    let backups = list_backups(location)?;
    let excess = backups.len().saturating_sub(keep_last);

    let mut removed = Vec::with_capacity(excess);
    for old in backups.into_iter().take(excess) {
        std::fs::remove_dir_all(&old).map_err(io_err(&old))?;
        tracing::debug!("Removed old backup {}", old.display());
        removed.push(old);
    }
    Ok(removed)
}

// Several backups within one second get a zero-padded counter so names
// still sort in creation order. The counter continues past the highest one
// already used in that second, so a pruned name is never handed out again.
fn next_backup_path(location: &Path) -> PathBuf {
    let name = format!("{PREFIX}{}", Local::now().format("%Y%m%d_%H%M%S"));

    let taken = std::fs::read_dir(location)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let entry = e.file_name().to_string_lossy().to_string();
            same_second_counter(&name, &entry)
        })
        .max();

    match taken {
        None => location.join(&name),
        Some(n) => location.join(format!("{name}_{:02}", n + 1)),
    }
}

/// `Some(0)` for the bare `name`, `Some(n)` for `name_NN`.
fn same_second_counter(name: &str, entry: &str) -> Option<u32> {
    let rest = entry.strip_prefix(name)?;
    if rest.is_empty() {
        return Some(0);
    }
    rest.strip_prefix('_')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("content/pages")).unwrap();
        std::fs::write(tmp.path().join("content/pages/home.md"), "# Hi").unwrap();
        std::fs::write(tmp.path().join("site.config.yaml"), "site: {}").unwrap();
        tmp
    }

    #[test]
    fn test_backup_copies_items() {
        let tmp = project();
        let items = vec![
            PathBuf::from("content"),
            PathBuf::from("templates"),
            PathBuf::from("site.config.yaml"),
        ];
        let location = tmp.path().join("backups");

        let backup = create_backup(tmp.path(), &items, &location, 5).unwrap();
        assert!(backup.file_name().unwrap().to_string_lossy().starts_with("backup_"));
        assert_eq!(
            std::fs::read_to_string(backup.join("content/pages/home.md")).unwrap(),
            "# Hi"
        );
        assert!(backup.join("site.config.yaml").is_file());
        assert!(!backup.join("templates").exists());
    }

    #[test]
    fn test_retention_keeps_newest() {
        let tmp = project();
        let items = vec![PathBuf::from("site.config.yaml")];
        let location = tmp.path().join("backups");

        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(create_backup(tmp.path(), &items, &location, 3).unwrap());
        }

        let remaining = list_backups(&location).unwrap();
        assert_eq!(remaining, created[2..].to_vec());
        assert!(created.last().unwrap().is_dir());
    }

    #[test]
    fn test_pruned_name_is_not_reused() {
        let tmp = project();
        let items = vec![PathBuf::from("site.config.yaml")];
        let location = tmp.path().join("backups");

        for _ in 0..4 {
            let newest = create_backup(tmp.path(), &items, &location, 1).unwrap();
            assert!(newest.is_dir());
            assert_eq!(list_backups(&location).unwrap(), vec![newest]);
        }
    }

    #[test]
    fn test_same_second_counter() {
        let name = "backup_20250101_000000";
        assert_eq!(same_second_counter(name, name), Some(0));
        assert_eq!(same_second_counter(name, "backup_20250101_000000_07"), Some(7));
        assert_eq!(same_second_counter(name, "backup_20250101_000001"), None);
        assert_eq!(same_second_counter(name, "backup_20250101_000000_old"), None);
    }

    #[test]
    fn test_prune_ignores_other_entries() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("backup_20240101_000000")).unwrap();
        std::fs::create_dir(tmp.path().join("backup_20250101_000000")).unwrap();
        std::fs::create_dir(tmp.path().join("manual")).unwrap();

        let removed = prune_backups(tmp.path(), 1).unwrap();
        assert_eq!(removed, vec![tmp.path().join("backup_20240101_000000")]);
        assert!(tmp.path().join("manual").exists());
    }
}
