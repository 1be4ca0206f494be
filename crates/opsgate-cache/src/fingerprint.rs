// crates/opsgate-cache/src/fingerprint.rs
// ============================================================================
// Module: Fingerprint
// Description: Stable content hash used as the response cache key.
// Purpose: Give get/put the same key for the same logical request.
// Dependencies: opsgate-core, sha2
// ============================================================================

//! ## Overview
//! The fingerprint is a hex-encoded SHA-256 digest over
//! `(prompt_text, model_id, temperature, extra_context_key)`, joined with a
//! separator byte so no field can bleed into its neighbor. Temperature is
//! hashed via its bit pattern so distinct temperatures never collide.

use opsgate_core::Fingerprint;
use sha2::Digest;
use sha2::Sha256;

/// Builds a [`Fingerprint`] over the components that determine whether two
/// requests are the "same" request for caching purposes.
#[must_use]
pub fn fingerprint_of(
    prompt_text: &str,
    model_id: &str,
    temperature: f32,
    extra_context_key: Option<&str>,
) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(prompt_text.as_bytes());
    hasher.update([0u8]);
    hasher.update(model_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(temperature.to_bits().to_le_bytes());
    hasher.update([0u8]);
    hasher.update(extra_context_key.unwrap_or("").as_bytes());
    let digest = hasher.finalize();
    Fingerprint::new(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::fingerprint_of;

    #[test]
    fn same_inputs_produce_same_fingerprint() {
        let a = fingerprint_of("prompt", "gpt-4", 0.7, None);
        let b = fingerprint_of("prompt", "gpt-4", 0.7, None);
        assert_eq!(a, b);
    }

    #[test]
    fn different_temperature_produces_different_fingerprint() {
        let a = fingerprint_of("prompt", "gpt-4", 0.7, None);
        let b = fingerprint_of("prompt", "gpt-4", 0.2, None);
        assert_ne!(a, b);
    }

    #[test]
    fn different_extra_context_key_produces_different_fingerprint() {
        let a = fingerprint_of("prompt", "gpt-4", 0.7, Some("ctx-a"));
        let b = fingerprint_of("prompt", "gpt-4", 0.7, Some("ctx-b"));
        assert_ne!(a, b);
    }
}
