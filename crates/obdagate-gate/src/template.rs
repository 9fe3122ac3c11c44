//! Query template identity.

use sha2::{Digest, Sha512};

/// SHA-512 (lowercase hex) of the trimmed template text.
///
/// Whitespace inside the template is significant: two templates that differ
/// only in inner spacing have different digests.
pub fn template_digest(template: &str) -> String {
    format!("{:x}", Sha512::digest(template.trim().as_bytes()))
}

/// Collapse every whitespace run to one space and trim both ends.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn same_template(a: &str, b: &str) -> bool {
    normalize_ws(a) == normalize_ws(b)
}

/// Short digest prefix for logs.
pub fn digest_prefix(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
