//! End-to-end scenarios for the on-disk collector, covering the concrete
//! cases and universal invariants it must preserve.

use std::fs;
use std::path::{Path, PathBuf};

use registry_gc::{Collector, Store};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Fixture {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write_link(&self, path: &Path, digest: &str) {
        fs::create_dir_all(path).unwrap();
        fs::write(path.join("link"), format!("sha256:{digest}")).unwrap();
    }

    fn write_blob(&self, digest: &str, body: &[u8]) {
        let dir = self
            .root()
            .join("blobs/sha256")
            .join(&digest[..2])
            .join(digest);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("data"), body).unwrap();
    }

    fn write_manifest_v2(&self, digest: &str, layers: &[&str], config: Option<&str>) {
        let layer_entries: Vec<_> = layers
            .iter()
            .map(|l| serde_json::json!({ "digest": format!("sha256:{l}") }))
            .collect();
        let mut body = serde_json::json!({
            "schemaVersion": 2,
            "layers": layer_entries,
        });
        if let Some(config) = config {
            body["config"] = serde_json::json!({ "digest": format!("sha256:{config}") });
        }
        self.write_blob(digest, body.to_string().as_bytes());
    }

    fn revision_link(&self, repo: &str, digest: &str) -> PathBuf {
        self.root()
            .join("repositories")
            .join(repo)
            .join("_manifests/revisions/sha256")
            .join(digest)
    }

    fn layer_link(&self, repo: &str, digest: &str) -> PathBuf {
        self.root()
            .join("repositories")
            .join(repo)
            .join("_layers/sha256")
            .join(digest)
    }

    fn tag_current_link(&self, repo: &str, tag: &str) -> PathBuf {
        self.root()
            .join("repositories")
            .join(repo)
            .join("_manifests/tags")
            .join(tag)
            .join("current")
    }

    fn tag_dir(&self, repo: &str, tag: &str) -> PathBuf {
        self.root()
            .join("repositories")
            .join(repo)
            .join("_manifests/tags")
            .join(tag)
    }

    fn blob_dir(&self, digest: &str) -> PathBuf {
        self.root().join("blobs/sha256").join(&digest[..2]).join(digest)
    }

    fn tag(&self, repo: &str, tag: &str, manifest: &str) {
        self.write_link(&self.tag_current_link(repo, tag), manifest);
        self.write_link(&self.revision_link(repo, manifest), manifest);
    }

    fn layer(&self, repo: &str, digest: &str, body: &[u8]) {
        self.write_link(&self.layer_link(repo, digest), digest);
        self.write_blob(digest, body);
    }

    fn collector(&self, dry_run: bool) -> Collector {
        Collector::new(Store::new(self.root().to_path_buf(), dry_run))
    }
}

fn hex(byte: char) -> String {
    byte.to_string().repeat(64)
}

#[test]
fn shared_blob_across_repos_is_retained() {
    let fx = Fixture::new();
    let layer = hex('a');
    let manifest_a = hex('1');
    let manifest_b = hex('2');

    fx.write_manifest_v2(&manifest_a, &[&layer], None);
    fx.write_manifest_v2(&manifest_b, &[&layer], None);

    fx.tag("a", "latest", &manifest_a);
    fx.layer("a", &layer, b"layer-bytes");

    fx.tag("b", "latest", &manifest_b);
    fx.layer("b", &layer, b"layer-bytes");

    fx.collector(false).delete_repository("a").unwrap();

    assert!(!fx.root().join("repositories/a").exists());
    assert!(!fx.blob_dir(&manifest_a).exists());
    assert!(fx.blob_dir(&layer).exists(), "shared layer blob must survive");
    assert!(fx.blob_dir(&manifest_b).exists());
    assert!(fx.tag_dir("b", "latest").exists());
}

#[test]
fn tag_reuse_in_same_repo_keeps_revision_and_blobs() {
    let fx = Fixture::new();
    let layer = hex('a');
    let manifest = hex('1');

    fx.write_manifest_v2(&manifest, &[&layer], None);
    fx.tag("r", "v1", &manifest);
    fx.tag("r", "v2", &manifest);
    fx.layer("r", &layer, b"layer-bytes");

    fx.collector(false).delete_tag("r", "v1").unwrap();

    assert!(!fx.tag_dir("r", "v1").exists());
    assert!(fx.tag_dir("r", "v2").exists());
    assert!(fx.revision_link("r", &manifest).exists());
    assert!(fx.blob_dir(&manifest).exists());
    assert!(fx.blob_dir(&layer).exists());
    assert!(fx.layer_link("r", &layer).exists());
}

#[test]
fn unique_tag_deletes_everything_it_owns() {
    let fx = Fixture::new();
    let l1 = hex('a');
    let l2 = hex('b');
    let manifest = hex('1');

    fx.write_manifest_v2(&manifest, &[&l1, &l2], None);
    fx.tag("r", "v1", &manifest);
    fx.layer("r", &l1, b"one");
    fx.layer("r", &l2, b"two");

    fx.collector(false).delete_tag("r", "v1").unwrap();

    assert!(!fx.tag_dir("r", "v1").exists());
    assert!(!fx.revision_link("r", &manifest).exists());
    assert!(!fx.blob_dir(&manifest).exists());
    assert!(!fx.blob_dir(&l1).exists());
    assert!(!fx.blob_dir(&l2).exists());
    assert!(!fx.layer_link("r", &l1).exists());
    assert!(!fx.layer_link("r", &l2).exists());
}

#[test]
fn untagged_collection_prunes_orphan_revision_only() {
    let fx = Fixture::new();
    let l1 = hex('a');
    let l2 = hex('b');
    let m1 = hex('1');
    let m2 = hex('2');

    fx.write_manifest_v2(&m1, &[&l1], None);
    fx.write_manifest_v2(&m2, &[&l1, &l2], None);

    fx.tag("r", "v1", &m1);
    fx.layer("r", &l1, b"one");
    fx.layer("r", &l2, b"two");
    // m2 is a pushed-but-never-tagged revision.
    fx.write_link(&fx.revision_link("r", &m2), &m2);

    fx.collector(false).delete_untagged("r").unwrap();

    assert!(!fx.revision_link("r", &m2).exists());
    assert!(!fx.blob_dir(&m2).exists());
    assert!(!fx.blob_dir(&l2).exists());
    assert!(!fx.layer_link("r", &l2).exists());

    assert!(fx.tag_dir("r", "v1").exists());
    assert!(fx.blob_dir(&m1).exists());
    assert!(fx.blob_dir(&l1).exists());
    assert!(fx.layer_link("r", &l1).exists());
}

#[test]
fn dangling_other_tag_manifest_is_cleaned_up_during_reuse_check() {
    let fx = Fixture::new();
    let layer = hex('a');
    let m1 = hex('1');
    let m2 = hex('2');

    fx.write_manifest_v2(&m1, &[&layer], None);
    fx.tag("r", "v1", &m1);
    fx.layer("r", &layer, b"bytes");

    // v2 points at a manifest whose blob was never written (structural
    // corruption): the revision link exists but blobs/.../data does not.
    fx.write_link(&fx.tag_current_link("r", "v2"), &m2);
    fx.write_link(&fx.revision_link("r", &m2), &m2);

    fx.collector(false).delete_tag("r", "v1").unwrap();

    assert!(!fx.tag_dir("r", "v1").exists());
    assert!(!fx.tag_dir("r", "v2").exists(), "dangling tag must be cleaned up");
}

#[test]
fn prune_after_deleting_only_repository_leaves_root() {
    let fx = Fixture::new();
    let manifest = hex('1');
    fx.write_manifest_v2(&manifest, &[], None);
    fx.tag("only", "latest", &manifest);

    let collector = fx.collector(false);
    collector.delete_repository("only").unwrap();
    registry_gc::prune::prune(collector.store());

    assert!(fx.root().exists());
    assert!(!fx.root().join("repositories").exists());
    assert!(!fx.root().join("blobs").exists());
}

#[test]
fn dry_run_leaves_filesystem_untouched() {
    let fx = Fixture::new();
    let layer = hex('a');
    let manifest = hex('1');
    fx.write_manifest_v2(&manifest, &[&layer], None);
    fx.tag("r", "v1", &manifest);
    fx.layer("r", &layer, b"bytes");

    fx.collector(true).delete_tag("r", "v1").unwrap();

    assert!(fx.tag_dir("r", "v1").exists());
    assert!(fx.revision_link("r", &manifest).exists());
    assert!(fx.blob_dir(&manifest).exists());
    assert!(fx.blob_dir(&layer).exists());
    assert!(fx.layer_link("r", &layer).exists());
}

#[test]
fn deleting_tag_twice_is_idempotent() {
    let fx = Fixture::new();
    let layer = hex('a');
    let manifest = hex('1');
    fx.write_manifest_v2(&manifest, &[&layer], None);
    fx.tag("r", "v1", &manifest);
    fx.layer("r", &layer, b"bytes");

    let collector = fx.collector(false);
    collector.delete_tag("r", "v1").unwrap();
    assert!(collector.delete_tag("r", "v1").is_err());
}

#[test]
fn delete_repository_rejects_unknown_repo() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.root().join("repositories")).unwrap();
    assert!(fx.collector(false).delete_repository("missing").is_err());
}

#[test]
fn delete_tag_rejects_unknown_tag() {
    let fx = Fixture::new();
    let manifest = hex('1');
    fx.write_manifest_v2(&manifest, &[], None);
    fx.tag("r", "v1", &manifest);

    assert!(fx.collector(false).delete_tag("r", "missing").is_err());
}
