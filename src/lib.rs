//! On-disk garbage collector for a Docker Registry v2 blob store.
//!
//! This crate's hard core is [`collector`]: given the filesystem layout of
//! manifests, revisions, tag links, and blobs, it decides which blobs,
//! manifests, and tag indexes are safe to delete without corrupting any
//! other tag or repository, then deletes them.
//!
//! The registry HTTP client that selects which tags should be removed is a
//! separate binary (`registry-select`); it is an external collaborator of
//! this library, invoking [`collector::Collector`] once per tag.

pub mod collector;
pub mod digest;
pub mod error;
pub mod fs_adapter;
pub mod index;
pub mod manifest;
pub mod prune;
pub mod store;

pub use collector::Collector;
pub use digest::Digest;
pub use error::{GcError, GcResult};
pub use store::Store;

/// Default registry v2 data directory, used when `REGISTRY_DATA_DIR` is
/// unset.
pub const DEFAULT_DATA_DIR: &str = "/opt/registry_data/docker/registry/v2";

/// An `--image` argument split into repository and optional tag.
///
/// `repo:tag` selects tag-delete; `repo` alone selects entire-repository
/// delete. A repository path containing a colon is rejected (§9 open
/// question — ambiguous with the tag separator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: Option<String>,
}

impl ImageRef {
    pub fn parse(spec: &str) -> Result<Self, GcError> {
        let parts: Vec<&str> = spec.split(':').collect();
        match parts.as_slice() {
            [repo] => Ok(ImageRef {
                repository: repo.to_string(),
                tag: None,
            }),
            [repo, tag] => Ok(ImageRef {
                repository: repo.to_string(),
                tag: Some(tag.to_string()),
            }),
            _ => Err(GcError::InvalidImageRef(spec.to_string())),
        }
    }
}
