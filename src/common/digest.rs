//! Content fingerprint for artifact files, so a log line can tell two
//! artifact versions apart.

/// blake3 of the raw artifact bytes as 64 lowercase hex characters.
pub fn artifact_digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_known_hash() {
        assert_eq!(
            artifact_digest(b""),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn different_content_differs() {
        let a = artifact_digest(br#"{"model":"poisson"}"#);
        let b = artifact_digest(br#"{"model":"linear"}"#);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(a, artifact_digest(br#"{"model":"poisson"}"#));
    }
}
