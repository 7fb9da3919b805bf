//! Reference index: on-demand lookups over the store's link files.
//!
//! Nothing here is cached — every call re-reads the filesystem, per the
//! "no caches persist between invocations" rule. This is cheap enough for a
//! batch tool that runs once per image spec while the registry is quiesced.

use std::collections::HashSet;
use std::path::Path;

use tracing::error;

use crate::digest::Digest;
use crate::manifest;
use crate::store::Store;

pub struct ReferenceIndex<'a> {
    store: &'a Store,
}

impl<'a> ReferenceIndex<'a> {
    pub fn new(store: &'a Store) -> Self {
        ReferenceIndex { store }
    }

    /// Tags of `repo`, or `None` if the repository has no tags directory.
    pub fn tags_of(&self, repo: &str) -> Option<Vec<String>> {
        let tags_dir = self.store.tags_dir(repo);
        if !self.store.fs().is_dir(&tags_dir) {
            return None;
        }
        let names = self.store.fs().list_dir(&tags_dir).ok()?;
        Some(
            names
                .into_iter()
                .filter(|name| self.store.fs().is_dir(&tags_dir.join(name)))
                .collect(),
        )
    }

    /// The digest a tag's `current/link` points at.
    pub fn current_manifest(&self, repo: &str, tag: &str) -> Option<Digest> {
        self.read_link(&self.store.tag_current_link(repo, tag))
    }

    fn read_link(&self, path: &Path) -> Option<Digest> {
        match self.store.fs().read_file(path) {
            Ok(body) => Digest::parse_link(&body).or_else(|| {
                error!(path = %path.display(), "malformed link file");
                None
            }),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    error!(path = %path.display(), %err, "failed to read link file");
                }
                None
            }
        }
    }

    /// Walk `path` and parse every file named `link`, optionally keeping
    /// only those whose full path contains `substring_filter`. Duplicates
    /// are preserved; callers deduplicate as needed.
    pub fn links_under(&self, path: &Path, substring_filter: Option<&str>) -> Vec<Digest> {
        let files = match self.store.fs().walk(path) {
            Ok(files) => files,
            Err(err) => {
                error!(path = %path.display(), %err, "failed to walk directory");
                return Vec::new();
            }
        };

        files
            .into_iter()
            .filter(|file| file.file_name().map(|n| n == "link").unwrap_or(false))
            .filter(|file| {
                substring_filter
                    .map(|needle| file.to_string_lossy().contains(needle))
                    .unwrap_or(true)
            })
            .filter_map(|file| self.read_link(&file))
            .collect()
    }

    /// First-level repositories under `repositories/`, expanding one extra
    /// level of nesting (`namespace/name`) for directories that are not
    /// themselves leaf repositories (no `_layers` subdirectory).
    pub fn all_repositories(&self) -> Vec<String> {
        let root = self.store.repositories_dir();
        let Ok(top_level) = self.store.fs().list_dir(&root) else {
            return Vec::new();
        };

        let mut repos = Vec::new();
        for name in top_level {
            let path = root.join(&name);
            if !self.store.fs().is_dir(&path) {
                continue;
            }
            if self.store.fs().is_dir(&path.join("_layers")) {
                repos.push(name);
            } else if let Ok(children) = self.store.fs().list_dir(&path) {
                for child in children {
                    if self.store.fs().is_dir(&path.join(&child)) {
                        repos.push(format!("{name}/{child}"));
                    }
                }
            }
        }
        repos
    }

    /// Union of every link digest across all repositories, excluding
    /// `except_repo` when given. Used to test cross-repository sharing.
    pub fn all_links(&self, except_repo: Option<&str>) -> HashSet<Digest> {
        let mut all = HashSet::new();
        for repo in self.all_repositories() {
            if Some(repo.as_str()) == except_repo {
                continue;
            }
            let repo_dir = self.store.repo_dir(&repo);
            all.extend(self.links_under(&repo_dir, None));
        }
        all
    }

    /// The set of digests a manifest references (layers, plus config for
    /// schema 2). Any parse/IO failure is logged and yields an empty set —
    /// a soft failure, never "no references exist" (§4.2).
    pub fn layers_of_manifest(&self, digest: &Digest) -> HashSet<Digest> {
        let path = self.store.blob_data_path(digest);
        match self.store.fs().read_file(&path) {
            Ok(body) => manifest::parse_manifest(body.as_bytes()).unwrap_or_else(|| {
                error!(digest = %digest, "failed to parse manifest blob");
                HashSet::new()
            }),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    error!(digest = %digest, %err, "failed to read manifest blob");
                }
                HashSet::new()
            }
        }
    }

    /// Whether the blob backing a manifest revision is absent on disk.
    pub fn blob_is_missing(&self, digest: &Digest) -> bool {
        !self.store.fs().is_file(&self.store.blob_data_path(digest))
    }
}
