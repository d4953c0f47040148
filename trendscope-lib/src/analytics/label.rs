//! Technology label normalization.

/// Common short forms mapped to their canonical technology name.
const ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("nodejs", "node.js"),
    ("py", "python"),
    ("rb", "ruby"),
    ("ts", "typescript"),
];

/// Normalize a technology label so that spellings from different sources collide.
///
/// Labels are trimmed, lower-cased, and mapped through a small alias table.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    let key = label.trim().to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map_or(key, |(_, canonical)| (*canonical).to_string())
}
