// spriteforge-core/src/domain/manifest/hash.rs
//
// Canonical-JSON hashing. The hash gates resume: a run may only continue
// against the byte-for-byte meaning of the manifest it started with.

use sha2::{Digest, Sha256};

use crate::domain::manifest::Manifest;

/// SHA-256 over the canonical JSON form of the manifest.
///
/// Canonical form: object keys sorted (serde_json maps are BTree-ordered),
/// compact whitespace, no trailing newline. Formatting-only edits to the
/// manifest file therefore do not invalidate a run.
pub fn manifest_hash(manifest: &Manifest) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(manifest)?;
    let canonical = serde_json::to_string(&value)?;
    Ok(sha256_hex(canonical.trim_end_matches('\n').as_bytes()))
}

/// Canonicalize and hash raw manifest text (used on resume, before the
/// manifest is fully deserialized).
pub fn raw_json_hash(raw: &str) -> Result<String, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let canonical = serde_json::to_string(&value)?;
    Ok(sha256_hex(canonical.trim_end_matches('\n').as_bytes()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_ignores_formatting() {
        let compact = r#"{"b":1,"a":{"y":2,"x":3}}"#;
        let pretty = "{\n  \"a\": { \"x\": 3, \"y\": 2 },\n  \"b\": 1\n}\n";

        assert_eq!(
            raw_json_hash(compact).unwrap(),
            raw_json_hash(pretty).unwrap()
        );
    }

    #[test]
    fn test_hash_detects_value_change() {
        let a = r#"{"frame_count":4}"#;
        let b = r#"{"frame_count":5}"#;
        assert_ne!(raw_json_hash(a).unwrap(), raw_json_hash(b).unwrap());
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        // SHA-256(""), fixed by the standard.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
