//! # User Identifier Hashing
//!
//! Google Ads only accepts user identifiers (email, phone) as SHA-256 digests of
//! the normalized value. Normalization here is trim followed by lowercase.

use sha2::{Digest, Sha256};

/// Trims surrounding whitespace and lowercases the identifier.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalizes the identifier and returns its lowercase hex SHA-256 digest.
pub fn hash_identifier(raw: &str) -> String {
    let digest = Sha256::digest(normalize_identifier(raw).as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(
            normalize_identifier("  Jane.Doe@Example.COM \n"),
            "jane.doe@example.com"
        );
    }

    #[test]
    fn test_hash_is_deterministic_across_formatting() {
        let a = hash_identifier("Jane.Doe@Example.com");
        let b = hash_identifier("  jane.doe@example.com  ");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_known_vector() {
        // sha256("test@example.com")
        assert_eq!(
            hash_identifier("Test@Example.com"),
            "973dfe463ec85785f5f95af5ba3906eedb2d931c24e69824a89ea65dba4e813b"
        );
    }

    #[test]
    fn test_different_inputs_produce_different_hashes() {
        assert_ne!(hash_identifier("+15551234567"), hash_identifier("+15551234568"));
    }
}
