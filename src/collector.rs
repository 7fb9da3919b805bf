//! Collector policies: the three top-level garbage-collection operations.
//!
//! Each policy computes its deletion set against a fresh [`ReferenceIndex`]
//! before issuing any mutating [`FsAdapter`] call, so that same-repo reuse
//! checks observe pre-delete state (§5 "Ordering guarantees"). Blob
//! deletions always happen after the reference that protected them has
//! been removed from the repository.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::digest::Digest;
use crate::error::{GcError, GcResult};
use crate::index::ReferenceIndex;
use crate::store::Store;

pub struct Collector {
    store: Store,
}

impl Collector {
    pub fn new(store: Store) -> Self {
        Collector { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Delete every blob, manifest, and tag belonging to `repo`, retaining
    /// only blobs still referenced by some other repository.
    pub fn delete_repository(&self, repo: &str) -> GcResult<()> {
        debug!(repo, "deleting entire repository");
        let repo_dir = self.store.repo_dir(repo);
        if !self.store.fs().is_dir(&repo_dir) {
            return Err(GcError::RepositoryNotFound(repo.to_string()));
        }

        let index = ReferenceIndex::new(&self.store);
        let owned: HashSet<Digest> = index.links_under(&repo_dir, None).into_iter().collect();
        let elsewhere = index.all_links(Some(repo));

        for digest in &owned {
            if elsewhere.contains(digest) {
                debug!(%digest, "blob found in another repository, not deleting");
            } else {
                self.store.fs().remove_tree(&self.store.blob_dir(digest));
            }
        }

        self.store.fs().remove_tree(&repo_dir);
        Ok(())
    }

    /// Delete a single tag of `repo`, along with any manifest revision,
    /// layer link, and blob that becomes unreachable as a result.
    pub fn delete_tag(&self, repo: &str, tag: &str) -> GcResult<()> {
        debug!(repo, tag, "deleting repository tag");
        let tag_dir = self.store.tag_dir(repo, tag);
        if !self.store.fs().is_dir(&tag_dir) {
            return Err(GcError::TagNotFound {
                repo: repo.to_string(),
                tag: tag.to_string(),
            });
        }

        let index = ReferenceIndex::new(&self.store);
        let manifests: HashSet<Digest> = index.links_under(&tag_dir, None).into_iter().collect();
        let elsewhere = index.all_links(Some(repo));

        let mut revisions_to_delete: Vec<Digest> = Vec::new();
        let mut blobs_to_keep: HashSet<Digest> = HashSet::new();
        let mut layers: Vec<Digest> = Vec::new();

        for manifest in manifests {
            if self.manifest_in_same_repo(&index, repo, tag, &manifest) {
                debug!(%manifest, "not deleting, another tag in this repo uses it");
                continue;
            }

            if elsewhere.contains(&manifest) {
                debug!(%manifest, "not deleting blob, another repo uses it");
                blobs_to_keep.insert(manifest.clone());
            }
            layers.extend(index.layers_of_manifest(&manifest));
            revisions_to_delete.push(manifest);
        }

        let layers_uniq: HashSet<Digest> = layers.into_iter().collect();
        for layer in &layers_uniq {
            if self.layer_in_same_repo(&index, repo, tag, layer) {
                debug!(%layer, "not deleting, another tag in this repo uses it");
                continue;
            }

            self.store
                .fs()
                .remove_tree(&self.store.layer_link_dir(repo, layer));
            if elsewhere.contains(layer) {
                debug!(%layer, "blob found in another repository, not deleting");
            } else {
                self.store.fs().remove_tree(&self.store.blob_dir(layer));
            }
        }

        self.delete_revisions(repo, &revisions_to_delete, &blobs_to_keep);
        self.store.fs().remove_tree(&tag_dir);
        Ok(())
    }

    /// Delete every manifest revision of `repo` that is not currently
    /// pointed at by any tag's `current/link`, anywhere in the store, and
    /// any layer that becomes unreachable as a result.
    pub fn delete_untagged(&self, repo: &str) -> GcResult<()> {
        debug!(repo, "deleting untagged revisions");
        let repo_dir = self.store.repo_dir(repo);
        if !self.store.fs().is_dir(&repo_dir) {
            return Err(GcError::RepositoryNotFound(repo.to_string()));
        }

        let index = ReferenceIndex::new(&self.store);

        let tagged_links = index.links_under(&self.store.repositories_dir(), Some("current"));
        let mut protected_layers: HashSet<Digest> = HashSet::new();
        for manifest in &tagged_links {
            protected_layers.extend(index.layers_of_manifest(manifest));
        }

        let tagged_revisions: HashSet<Digest> =
            index.links_under(&repo_dir, Some("current")).into_iter().collect();

        let revisions_dir = self.store.revisions_dir(repo);
        let revision_names = self.store.fs().list_dir(&revisions_dir).unwrap_or_default();

        let mut revisions_to_delete: Vec<Digest> = Vec::new();
        let mut layers_to_delete: Vec<Digest> = Vec::new();

        for name in revision_names {
            let revision = Digest::new(name);
            if tagged_revisions.contains(&revision) {
                continue;
            }
            for layer in index.layers_of_manifest(&revision) {
                if !protected_layers.contains(&layer) {
                    layers_to_delete.push(layer);
                }
            }
            revisions_to_delete.push(revision);
        }

        self.delete_revisions(repo, &revisions_to_delete, &HashSet::new());

        let unique_layers: HashSet<Digest> = layers_to_delete.into_iter().collect();
        for layer in &unique_layers {
            self.store.fs().remove_tree(&self.store.blob_dir(layer));
            self.store
                .fs()
                .remove_tree(&self.store.layer_link_dir(repo, layer));
        }
        Ok(())
    }

    /// Remove each revision directory in `revisions`, purging matching tag
    /// index entries along the way, then delete the backing blob unless it
    /// is listed in `blobs_to_keep`.
    fn delete_revisions(&self, repo: &str, revisions: &[Digest], blobs_to_keep: &HashSet<Digest>) {
        let index = ReferenceIndex::new(&self.store);
        for revision in revisions {
            let revision_dir = self.store.revision_dir(repo, revision);
            let digests = index.links_under(&revision_dir, None);
            for digest in digests {
                self.purge_tag_index_entries(repo, &digest);
                if !blobs_to_keep.contains(&digest) {
                    self.store.fs().remove_tree(&self.store.blob_dir(&digest));
                }
            }
            self.store.fs().remove_tree(&revision_dir);
        }
    }

    fn purge_tag_index_entries(&self, repo: &str, revision: &Digest) {
        let index = ReferenceIndex::new(&self.store);
        let Some(tags) = index.tags_of(repo) else {
            return;
        };
        for tag in tags {
            let entry = self.store.tag_index_dir(repo, &tag).join(revision.as_str());
            if self.store.fs().is_dir(&entry) {
                self.store.fs().remove_tree(&entry);
            }
        }
    }

    /// Whether some tag other than `tag` in `repo` currently points its
    /// `current/link` at `manifest`. Index-only (historical) references do
    /// not count — only `current` protects a manifest from same-repo
    /// deletion.
    fn manifest_in_same_repo(
        &self,
        index: &ReferenceIndex<'_>,
        repo: &str,
        tag: &str,
        manifest: &Digest,
    ) -> bool {
        let Some(tags) = index.tags_of(repo) else {
            return false;
        };
        tags.iter()
            .filter(|t| t.as_str() != tag)
            .any(|other_tag| index.current_manifest(repo, other_tag).as_ref() == Some(manifest))
    }

    /// Whether some tag other than `tag` in `repo` has a current manifest
    /// whose layer set contains `layer`. Along the way, any other tag whose
    /// current manifest blob is missing (structural corruption) is itself
    /// deleted as garbage and does not participate in the check.
    fn layer_in_same_repo(
        &self,
        index: &ReferenceIndex<'_>,
        repo: &str,
        tag: &str,
        layer: &Digest,
    ) -> bool {
        let Some(tags) = index.tags_of(repo) else {
            return false;
        };

        for other_tag in tags.iter().filter(|t| t.as_str() != tag) {
            let Some(manifest) = index.current_manifest(repo, other_tag) else {
                continue;
            };

            if index.blob_is_missing(&manifest) {
                warn!(
                    %manifest,
                    tag = other_tag.as_str(),
                    "blob for digest does not exist, deleting tag manifest"
                );
                self.store
                    .fs()
                    .remove_tree(&self.store.tag_dir(repo, other_tag));
                continue;
            }

            if index.layers_of_manifest(&manifest).contains(layer) {
                return true;
            }
        }

        false
    }
}
