//! Manifest parsing: reads a manifest blob and yields the digests it
//! references (layers, plus the config blob for schema 2).
//!
//! Parse failures never propagate; they yield an empty set and are logged
//! at error level by the caller's index lookup (`ReferenceIndex::layers_of_manifest`).
//! Empty references are a *soft* failure — callers must not read "no
//! layers" as "nothing to protect".

use std::collections::HashSet;

use serde::Deserialize;

use crate::digest::Digest;

#[derive(Debug, Deserialize)]
struct ManifestV1 {
    #[serde(rename = "fsLayers")]
    fs_layers: Vec<FsLayer>,
}

#[derive(Debug, Deserialize)]
struct FsLayer {
    #[serde(rename = "blobSum")]
    blob_sum: String,
}

#[derive(Debug, Deserialize)]
struct ManifestV2 {
    layers: Vec<LayerRef>,
    config: Option<LayerRef>,
}

#[derive(Debug, Deserialize)]
struct LayerRef {
    digest: String,
}

#[derive(Debug, Deserialize)]
struct SchemaProbe {
    #[serde(rename = "schemaVersion")]
    schema_version: u32,
}

/// Parse a manifest blob's JSON bytes into the set of digests it
/// references. Returns `None` on any parse failure.
pub fn parse_manifest(bytes: &[u8]) -> Option<HashSet<Digest>> {
    let probe: SchemaProbe = serde_json::from_slice(bytes).ok()?;

    match probe.schema_version {
        1 => {
            let manifest: ManifestV1 = serde_json::from_slice(bytes).ok()?;
            Some(
                manifest
                    .fs_layers
                    .into_iter()
                    .filter_map(|l| strip_scheme(&l.blob_sum))
                    .collect(),
            )
        }
        _ => {
            let manifest: ManifestV2 = serde_json::from_slice(bytes).ok()?;
            let mut digests: HashSet<Digest> = manifest
                .layers
                .into_iter()
                .filter_map(|l| strip_scheme(&l.digest))
                .collect();
            if let Some(config) = manifest.config {
                if let Some(digest) = strip_scheme(&config.digest) {
                    digests.insert(digest);
                }
            }
            Some(digests)
        }
    }
}

fn strip_scheme(value: &str) -> Option<Digest> {
    value
        .split_once(':')
        .map(|(_, hex)| Digest::new(hex))
        .or_else(|| Some(Digest::new(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schema2_layers_and_config() {
        let json = serde_json::json!({
            "schemaVersion": 2,
            "config": { "digest": format!("sha256:{}", "a".repeat(64)) },
            "layers": [
                { "digest": format!("sha256:{}", "b".repeat(64)) },
                { "digest": format!("sha256:{}", "c".repeat(64)) },
            ],
        });
        let digests = parse_manifest(json.to_string().as_bytes()).unwrap();
        assert_eq!(digests.len(), 3);
        assert!(digests.contains(&Digest::new("a".repeat(64))));
    }

    #[test]
    fn parses_schema1_fslayers() {
        let json = serde_json::json!({
            "schemaVersion": 1,
            "fsLayers": [
                { "blobSum": format!("sha256:{}", "d".repeat(64)) },
            ],
        });
        let digests = parse_manifest(json.to_string().as_bytes()).unwrap();
        assert_eq!(digests.len(), 1);
        assert!(digests.contains(&Digest::new("d".repeat(64))));
    }

    #[test]
    fn schema2_without_config_omits_it() {
        let json = serde_json::json!({
            "schemaVersion": 2,
            "layers": [{ "digest": format!("sha256:{}", "e".repeat(64)) }],
        });
        let digests = parse_manifest(json.to_string().as_bytes()).unwrap();
        assert_eq!(digests.len(), 1);
    }

    #[test]
    fn invalid_json_yields_none() {
        assert!(parse_manifest(b"not json").is_none());
    }
}
