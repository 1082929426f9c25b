//! Info-hash extraction from magnet URIs.

use std::fmt;

use url::Url;

use crate::error::TorrentError;

/// The exact topic prefix for a BitTorrent info-hash.
pub const BTIH_PREFIX: &str = "urn:btih:";

/// Info-hashes shorter than this are never acted on destructively.
pub const MIN_INFO_HASH_LEN: usize = 5;

/// A BitTorrent info-hash, the key for locally tracked torrents.
///
/// Always non-empty ASCII alphanumeric, so it is safe to use as a directory
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash(String);

impl InfoHash {
    /// Validate a bare info-hash.
    pub fn new(hash: impl Into<String>) -> Result<Self, TorrentError> {
        let hash = hash.into();
        if hash.is_empty() || !hash.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(TorrentError::InvalidMagnet(hash));
        }
        Ok(Self(hash))
    }

    /// Extract the info-hash from a magnet URI's `xt` parameter.
    pub fn from_magnet(magnet: &str) -> Result<Self, TorrentError> {
        let invalid = || TorrentError::InvalidMagnet(magnet.to_string());

        let url = Url::parse(magnet).map_err(|_| invalid())?;
        if url.scheme() != "magnet" {
            return Err(invalid());
        }
        let hash = url
            .query_pairs()
            .filter(|(key, _)| key == "xt")
            .find_map(|(_, value)| value.strip_prefix(BTIH_PREFIX).map(str::to_string))
            .ok_or_else(invalid)?;
        Self::new(hash).map_err(|_| invalid())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this hash is too short to trust for deletion.
    pub fn is_suspiciously_short(&self) -> bool {
        self.0.len() < MIN_INFO_HASH_LEN
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InfoHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_magnet() {
        let hash = InfoHash::from_magnet("magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056")
            .unwrap();
        assert_eq!(hash.as_str(), "c9e15763f722f23e98a29decdfae341b98d53056");
    }

    #[test]
    fn test_trailing_parameters() {
        let hash = InfoHash::from_magnet(
            "magnet:?xt=urn:btih:abcdef123456&dn=photos&tr=wss%3A%2F%2Ftracker.example",
        )
        .unwrap();
        assert_eq!(hash.as_str(), "abcdef123456");
    }

    #[test]
    fn test_xt_in_any_position() {
        let hash = InfoHash::from_magnet("magnet:?dn=photos&xt=urn:btih:abcdef123456").unwrap();
        assert_eq!(hash.as_str(), "abcdef123456");
    }

    #[test]
    fn test_malformed_magnets() {
        for magnet in [
            "",
            "magnet:?dn=photos",
            "magnet:?xt=urn:sha1:abcdef",
            "magnet:?xt=urn:btih:",
            "magnet:?xt=urn:btih:../../etc",
            "http://example.com/?xt=urn:btih:abcdef",
            "not a magnet",
        ] {
            assert!(
                matches!(InfoHash::from_magnet(magnet), Err(TorrentError::InvalidMagnet(_))),
                "{magnet:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_short_hash() {
        assert!(InfoHash::new("abcd").unwrap().is_suspiciously_short());
        assert!(!InfoHash::new("abcde").unwrap().is_suspiciously_short());
    }
}
