//! Destination hash derivation.
//!
//! A hub is addressed by a SINGLE destination: the hash of its dotted name
//! (`rrc.hub`) bound to the hub's identity hash. The client recomputes it from
//! a recalled identity to make sure the hash it was given really belongs to a
//! hub with the configured name.

use crate::error::DestinationNameError;
use crate::hash::{sha256, truncated_hash};
use crate::types::{DestinationHash, IdentityHash, NAME_HASH_LEN, NameHash, TRUNCATED_HASH_LEN};

/// Compute the name hash for a destination.
///
/// `name_hash = SHA-256("app_name.aspect1.aspect2")[:10]`
#[must_use = "returns the computed name hash"]
pub fn name_hash(app_name: &str, aspects: &[&str]) -> NameHash {
    let base_name = build_base_name(app_name, aspects);
    let hash = sha256(base_name.as_bytes());
    let mut result = [0u8; NAME_HASH_LEN];
    result.copy_from_slice(&hash[..NAME_HASH_LEN]);
    NameHash::new(result)
}

/// Compute the destination hash for a SINGLE destination.
///
/// `destination_hash = SHA-256(name_hash || identity_hash)[:16]`
#[must_use = "returns the computed destination hash"]
pub fn destination_hash(name_hash: &NameHash, identity_hash: &IdentityHash) -> DestinationHash {
    let mut material = Vec::with_capacity(NAME_HASH_LEN + TRUNCATED_HASH_LEN);
    material.extend_from_slice(name_hash.as_ref());
    material.extend_from_slice(identity_hash.as_ref());
    DestinationHash::new(truncated_hash(&material))
}

/// Split a dotted destination name into its app name and aspects.
///
/// `"rrc.hub"` → `("rrc", ["hub"])`. Empty names and empty components are
/// rejected.
pub fn app_and_aspects_from_name(
    full_name: &str,
) -> Result<(String, Vec<String>), DestinationNameError> {
    let trimmed = full_name.trim();
    if trimmed.is_empty() {
        return Err(DestinationNameError::Empty);
    }

    let mut components = trimmed.split('.');
    let app_name = components.next().unwrap_or_default();
    let aspects: Vec<String> = components.map(str::to_owned).collect();

    if app_name.is_empty() || aspects.iter().any(String::is_empty) {
        return Err(DestinationNameError::EmptyComponent(trimmed.to_owned()));
    }

    Ok((app_name.to_owned(), aspects))
}

/// Destination hash a hub with `identity_hash` announces under `dest_name`.
pub fn hub_destination_hash(
    identity_hash: &IdentityHash,
    dest_name: &str,
) -> Result<DestinationHash, DestinationNameError> {
    let (app_name, aspects) = app_and_aspects_from_name(dest_name)?;
    let aspect_refs: Vec<&str> = aspects.iter().map(String::as_str).collect();
    let nh = name_hash(&app_name, &aspect_refs);
    Ok(destination_hash(&nh, identity_hash))
}

fn build_base_name(app_name: &str, aspects: &[&str]) -> String {
    let mut name = String::from(app_name);
    for aspect in aspects {
        name.push('.');
        name.push_str(aspect);
    }
    name
}
