//! NGSI-LD URN helpers.
//!
//! Identifiers in NGSI-LD are URIs, by convention `urn:ngsi-ld:<Type>:<id>`.
//! Users are allowed to write the short form (`Device:1`); everything that
//! goes on the wire is normalized with [`prefix`].

/// Namespace prefix added to short identifiers.
pub const NGSILD_PREFIX: &str = "urn:ngsi-ld:";

/// Whether `id` is already a URN.
pub fn is_prefixed(id: &str) -> bool {
    id.starts_with("urn:")
}

/// Normalize an identifier to URN form.
///
/// Values already starting with `urn:` are returned unchanged, so the
/// operation is idempotent.
pub fn prefix(id: &str) -> String {
    if is_prefixed(id) {
        id.to_string()
    } else {
        format!("{NGSILD_PREFIX}{id}")
    }
}

/// Strip the NGSI-LD namespace prefix, if present.
pub fn unprefix(id: &str) -> &str {
    id.strip_prefix(NGSILD_PREFIX).unwrap_or(id)
}
