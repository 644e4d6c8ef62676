//! BLAKE3 helpers for building stable cache keys.

use blake3::Hasher;

#[inline]
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hashes `parts` in order, length-prefixing each so that `["ab", "c"]` and `["a", "bc"]`
/// produce different digests.
pub fn hash_parts<I, P>(parts: I) -> [u8; 32]
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut hasher = Hasher::new();
    for part in parts {
        let part = part.as_ref();
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Builds `"{prefix}:{hex}"` where `hex` is the first 16 bytes of [`hash_parts`].
///
/// The prefix is usually a pattern name, so the key resolves to that pattern's config.
pub fn content_key<I, P>(prefix: &str, parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let digest = hash_parts(parts);
    let mut key = String::with_capacity(prefix.len() + 1 + 32);
    key.push_str(prefix);
    key.push(':');
    for byte in &digest[..16] {
        key.push_str(&format!("{:02x}", byte));
    }
    key
}
