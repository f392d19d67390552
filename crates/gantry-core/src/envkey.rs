use sha2::{Digest, Sha256};

/// Content-addressed identity of an environment specification.
///
/// Derived from the dependency-file bytes plus an optional discriminator,
/// so byte-identical inputs resolve to the same key on any machine — the
/// basis for environment reuse.
pub fn environment_key(spec_bytes: &[u8], discriminator: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(spec_bytes);
    if let Some(disc) = discriminator {
        hasher.update(disc.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Environment name for a spec: a fixed prefix over the content key.
pub fn environment_name(spec_bytes: &[u8], discriminator: Option<&str>) -> String {
    format!("gantry-{}", environment_key(spec_bytes, discriminator))
}
