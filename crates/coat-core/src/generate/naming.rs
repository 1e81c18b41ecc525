//! Project naming

const FALLBACK_NAME: &str = "bundle";

/// Filesystem-safe project name derived from a bundle label.
///
/// Keeps only the last path component without its extension, then replaces
/// every character outside `[A-Za-z0-9_-]` with `-`.
pub fn safe_name(label: &str) -> String {
    let base = label.rsplit(['/', '\\']).next().unwrap_or(label);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };

    let name: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

/// Package name used in the generated project's `package.json` files
pub fn package_name(safe_name: &str) -> String {
    format!("{}-duffle-self-installer", safe_name.to_lowercase())
}
