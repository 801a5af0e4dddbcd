use std::fmt;

use sha2::{Digest, Sha256};

/// Opaque digest summarizing a module's working-tree content.
///
/// The SHA-256 digest bytes are mapped one byte per code point (ISO-8859-1)
/// so the fingerprint is a plain string scalar that can be persisted as is.
/// Two equal fingerprints mean the working tree is considered unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Decode digest bytes losslessly, one byte per character.
    pub fn from_digest(bytes: &[u8]) -> Self {
        Self(bytes.iter().map(|&b| char::from(b)).collect())
    }

    /// Wrap a fingerprint previously obtained from [`Fingerprint::as_str`].
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the digest bytes when the fingerprint was produced by
    /// [`Fingerprint::from_digest`].
    pub fn digest_bytes(&self) -> Option<Vec<u8>> {
        self.0.chars().map(|c| u8::try_from(c).ok()).collect()
    }

    /// Hex rendering for human-facing output.
    pub fn to_hex(&self) -> String {
        match self.digest_bytes() {
            Some(bytes) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
            None => self.0.escape_default().to_string(),
        }
    }

    /// First characters of [`Fingerprint::to_hex`], for report lines.
    pub fn short(&self) -> String {
        self.to_hex().chars().take(12).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Running SHA-256 accumulator fed with the pieces of a working-tree state.
#[derive(Clone, Default)]
pub struct FingerprintHasher {
    hasher: Sha256,
    pieces: usize,
}

impl FingerprintHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the UTF-8 bytes of `piece`.
    pub fn update(&mut self, piece: &str) {
        self.hasher.update(piece.as_bytes());
        self.pieces += 1;
    }

    /// Number of pieces fed so far.
    pub fn pieces(&self) -> usize {
        self.pieces
    }

    pub fn finalize(self) -> Fingerprint {
        Fingerprint::from_digest(&self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_fingerprint_of_known_input() {
        let mut hasher = FingerprintHasher::new();
        hasher.update("hello world");
        let fingerprint = hasher.finalize();

        assert_eq!(
            fingerprint.to_hex(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(fingerprint.as_str().chars().count(), 32);
        assert_eq!(fingerprint.short(), "b94d27b9934d");
    }

    #[test]
    fn test_pieces_are_concatenated() {
        let mut split = FingerprintHasher::new();
        split.update("hello ");
        split.update("world");
        assert_eq!(split.pieces(), 2);

        let mut whole = FingerprintHasher::new();
        whole.update("hello world");

        assert_eq!(split.finalize(), whole.finalize());
    }

    #[test]
    fn test_order_matters() {
        let mut first = FingerprintHasher::new();
        first.update("a");
        first.update("b");

        let mut second = FingerprintHasher::new();
        second.update("b");
        second.update("a");

        assert_ne!(first.finalize(), second.finalize());
    }

    #[test]
    fn test_non_latin1_stored_value_has_no_digest() {
        let fingerprint = Fingerprint::from_stored("snowman \u{2603}");
        assert!(fingerprint.digest_bytes().is_none());
        assert!(!fingerprint.to_hex().is_empty());
    }

    proptest! {
        #[test]
        fn digest_bytes_round_trip_through_latin1(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let fingerprint = Fingerprint::from_digest(&bytes);
            prop_assert_eq!(fingerprint.as_str().chars().count(), bytes.len());
            let stored = Fingerprint::from_stored(fingerprint.as_str().to_string());
            prop_assert_eq!(stored.digest_bytes(), Some(bytes));
        }
    }
}
