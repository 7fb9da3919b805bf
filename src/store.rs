//! Path layout of a registry v2 data directory, and the `Store` handle that
//! ties a root path to the filesystem adapter used to read and mutate it.

use std::path::{Path, PathBuf};

use crate::digest::Digest;
use crate::fs_adapter::FsAdapter;

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    fs: FsAdapter,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Store {
            root: root.into(),
            fs: FsAdapter::new(dry_run),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fs(&self) -> &FsAdapter {
        &self.fs
    }

    pub fn repositories_dir(&self) -> PathBuf {
        self.root.join("repositories")
    }

    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        self.repositories_dir().join(repo)
    }

    pub fn tags_dir(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("_manifests/tags")
    }

    pub fn tag_dir(&self, repo: &str, tag: &str) -> PathBuf {
        self.tags_dir(repo).join(tag)
    }

    pub fn tag_current_link(&self, repo: &str, tag: &str) -> PathBuf {
        self.tag_dir(repo, tag).join("current/link")
    }

    pub fn tag_index_dir(&self, repo: &str, tag: &str) -> PathBuf {
        self.tag_dir(repo, tag).join("index/sha256")
    }

    pub fn revisions_dir(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("_manifests/revisions/sha256")
    }

    pub fn revision_dir(&self, repo: &str, digest: &Digest) -> PathBuf {
        self.revisions_dir(repo).join(digest.as_str())
    }

    pub fn layers_dir(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("_layers/sha256")
    }

    pub fn layer_link_dir(&self, repo: &str, digest: &Digest) -> PathBuf {
        self.layers_dir(repo).join(digest.as_str())
    }

    pub fn blob_dir(&self, digest: &Digest) -> PathBuf {
        self.root
            .join("blobs/sha256")
            .join(digest.shard())
            .join(digest.as_str())
    }

    pub fn blob_data_path(&self, digest: &Digest) -> PathBuf {
        self.blob_dir(digest).join("data")
    }
}
