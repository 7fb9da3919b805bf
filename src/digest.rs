//! Content digests and the on-disk link file format.

use std::fmt;

/// A 64-character lowercase hex sha256 digest.
///
/// Identity is the hex value; the `sha256:` scheme prefix used on disk and
/// over the wire is never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    /// Build a digest from a bare hex string, without validating length.
    ///
    /// The store is expected to contain well-formed digests; callers that
    /// need to validate untrusted input should use [`Digest::parse_link`].
    pub fn new(hex: impl Into<String>) -> Self {
        Digest(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First two hex characters, used as the shard directory under
    /// `blobs/sha256/<dd>/`.
    pub fn shard(&self) -> &str {
        &self.0[..2.min(self.0.len())]
    }

    /// Parse a link file body of the form `sha256:<hex><noise>`.
    ///
    /// Liberal on read per spec: any bytes after the first `:` up to the
    /// first non-hex character form the digest. Returns `None` if there is
    /// no `:` or the hex run is empty.
    pub fn parse_link(body: &str) -> Option<Digest> {
        let (_, rest) = body.split_once(':')?;
        let hex: String = rest
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        if hex.is_empty() {
            None
        } else {
            Some(Digest(hex.to_ascii_lowercase()))
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
