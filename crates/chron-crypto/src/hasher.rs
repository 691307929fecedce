use chron_types::ObjectId;

/// Type-tagged BLAKE3 content hasher.
///
/// Each hasher carries the object kind tag (`"blob"`, `"tree"`, `"commit"`)
/// that is written, together with the payload length, ahead of the payload.
/// The same header is what the object store persists, so the id of an
/// object is the hash of its uncompressed on-disk encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    tag: &'static str,
}

impl ContentHasher {
    /// Hasher for blob objects.
    pub const BLOB: Self = Self { tag: "blob" };
    /// Hasher for tree objects.
    pub const TREE: Self = Self { tag: "tree" };
    /// Hasher for commit objects.
    pub const COMMIT: Self = Self { tag: "commit" };

    /// The kind tag written into the object header.
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// The framing header for a payload of `len` bytes: `"<tag> <len>\0"`.
    pub fn header(&self, len: usize) -> Vec<u8> {
        let mut header = Vec::with_capacity(self.tag.len() + 22);
        header.extend_from_slice(self.tag.as_bytes());
        header.push(b' ');
        header.extend_from_slice(len.to_string().as_bytes());
        header.push(0);
        header
    }

    /// Hash a payload with its kind header.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.header(data.len()));
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected object ID.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    /// Split a framed encoding into `(tag, payload)`.
    ///
    /// Returns `None` if the header is malformed or the declared length does
    /// not match the payload.
    pub fn split_framed(encoded: &[u8]) -> Option<(&str, &[u8])> {
        let nul = encoded.iter().position(|b| *b == 0)?;
        let header = std::str::from_utf8(&encoded[..nul]).ok()?;
        let (tag, len) = header.split_once(' ')?;
        let len: usize = len.parse().ok()?;
        let payload = &encoded[nul + 1..];
        (payload.len() == len).then_some((tag, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn header_layout() {
        assert_eq!(ContentHasher::BLOB.header(5), b"blob 5\0".to_vec());
        assert_eq!(ContentHasher::COMMIT.header(0), b"commit 0\0".to_vec());
    }

    #[test]
    fn different_tags_produce_different_hashes() {
        let data = b"same content";
        let blob = ContentHasher::BLOB.hash(data);
        let tree = ContentHasher::TREE.hash(data);
        let commit = ContentHasher::COMMIT.hash(data);
        assert_ne!(blob, tree);
        assert_ne!(blob, commit);
        assert_ne!(tree, commit);
    }

    #[test]
    fn framed_hash_differs_from_raw_hash() {
        assert_ne!(
            ContentHasher::BLOB.hash(b"test"),
            ObjectId::from_bytes(b"test")
        );
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::BLOB.hash(b"original");
        assert!(ContentHasher::BLOB.verify(b"original", &id));
        assert!(!ContentHasher::BLOB.verify(b"tampered", &id));
    }

    #[test]
    fn split_framed_parses_header() {
        let mut encoded = ContentHasher::TREE.header(3);
        encoded.extend_from_slice(b"abc");
        let (tag, payload) = ContentHasher::split_framed(&encoded).unwrap();
        assert_eq!(tag, "tree");
        assert_eq!(payload, b"abc");
    }

    #[test]
    fn split_framed_rejects_length_mismatch() {
        let mut encoded = ContentHasher::BLOB.header(10);
        encoded.extend_from_slice(b"short");
        assert!(ContentHasher::split_framed(&encoded).is_none());
        assert!(ContentHasher::split_framed(b"no header here").is_none());
    }

    proptest! {
        #[test]
        fn equal_payloads_hash_equal(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let copy = data.clone();
            prop_assert_eq!(ContentHasher::BLOB.hash(&data), ContentHasher::BLOB.hash(&copy));
        }
    }
}
