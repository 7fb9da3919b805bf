//! Typed filesystem primitives over the registry store.
//!
//! `FsAdapter` is the sole mutator of the filesystem; every other component
//! computes sets of paths and issues adapter calls. In `dry_run` mode every
//! mutating call is logged instead of executed, which is what makes P2
//! (dry-run is a no-op) hold: guard every write here, nowhere else.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct FsAdapter {
    dry_run: bool,
}

impl FsAdapter {
    pub fn new(dry_run: bool) -> Self {
        FsAdapter { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Names of the direct children of `path`.
    pub fn list_dir(&self, path: &Path) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    pub fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    pub fn read_file(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }

    /// Depth-first walk of `path`, collecting every regular file found.
    pub fn walk(&self, path: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if path.is_dir() {
            self.walk_into(path, &mut files)?;
        }
        Ok(files)
    }

    fn walk_into(&self, dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.walk_into(&path, files)?;
            } else {
                files.push(path);
            }
        }
        Ok(())
    }

    /// Delete a subtree. Failures are logged at error level and swallowed:
    /// the caller's collection operation continues with the next item.
    pub fn remove_tree(&self, path: &Path) {
        if self.dry_run {
            info!(path = %path.display(), "would have deleted");
            return;
        }
        info!(path = %path.display(), "deleting");
        if let Err(err) = std::fs::remove_dir_all(path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                error!(path = %path.display(), %err, "failed to delete directory");
            }
        }
    }

    /// Recursively delete empty directories under `root`. `root` itself is
    /// always preserved, even when it ends up empty.
    pub fn remove_empty_dirs(&self, root: &Path) {
        self.del_empty_dirs(root, true);
    }

    fn del_empty_dirs(&self, dir: &Path, top_level: bool) -> bool {
        let mut empty = true;

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                error!(path = %dir.display(), %err, "failed to list directory during prune");
                return false;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    error!(path = %dir.display(), %err, "failed to read directory entry during prune");
                    empty = false;
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                if !self.del_empty_dirs(&path, false) {
                    empty = false;
                }
            } else {
                empty = false;
            }
        }

        if empty && !top_level {
            debug!(path = %dir.display(), "deleting empty directory");
            if !self.dry_run {
                if let Err(err) = std::fs::remove_dir(dir) {
                    error!(path = %dir.display(), %err, "failed to remove empty directory");
                }
            }
        }

        empty
    }
}
