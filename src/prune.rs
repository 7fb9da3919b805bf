//! Pruner: the optional post-step that sweeps empty directories left behind
//! by the collector. Idempotent, safe to run even when nothing was deleted,
//! and never fails the run — any IO error is logged by the adapter and
//! swallowed.

use crate::store::Store;

pub fn prune(store: &Store) {
    store.fs().remove_empty_dirs(store.root());
}
