//! Bundle manifest types and parsing

use crate::error::{CoatError, Result};
use serde::{Deserialize, Serialize};

/// First line of a clear-signed bundle
pub const SIGNATURE_MARKER: &str = "-----BEGIN PGP SIGNED MESSAGE-----";

const SIGNATURE_START: &str = "-----BEGIN PGP SIGNATURE-----";

/// The parts of a bundle manifest the generator relies on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub name: String,

    pub version: String,

    /// Source repository; many bundles leave it out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Remaining fields, preserved verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A bundle's manifest together with the text it came from
#[derive(Debug, Clone)]
pub struct ResolvedBundle {
    pub manifest: BundleManifest,

    /// JSON text of the manifest, exactly as published (signature stripped)
    pub manifest_text: String,

    /// Text as obtained from the source, including any signature armor
    pub raw_text: String,
}

impl ResolvedBundle {
    /// Parse raw bundle text; `role` names the source in error messages
    pub fn parse(raw_text: String, role: &str) -> Result<Self> {
        let manifest_text = if is_signed(&raw_text) {
            signed_body(&raw_text).ok_or_else(|| {
                CoatError::parse(role, "clear-signed bundle has no signed body")
            })?
        } else {
            raw_text.clone()
        };

        let manifest: BundleManifest =
            serde_json::from_str(&manifest_text).map_err(|e| CoatError::parse(role, e))?;

        Ok(Self {
            manifest,
            manifest_text,
            raw_text,
        })
    }

    /// Whether the source text is a clear-signed bundle
    pub fn is_signed(&self) -> bool {
        is_signed(&self.raw_text)
    }
}

fn is_signed(text: &str) -> bool {
    text.trim_start().starts_with(SIGNATURE_MARKER)
}

/// Extract the signed message from clear-signed text.
///
/// The body starts after the blank line ending the armor headers and runs up
/// to the signature block. Dash-escaped lines ("- ...") are unescaped.
fn signed_body(text: &str) -> Option<String> {
    let mut lines = text.trim_start().lines().map(|l| l.trim_end_matches('\r'));

    lines.next().filter(|first| *first == SIGNATURE_MARKER)?;
    // Armor headers (Hash: ...) end at the first blank line
    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
    }

    let mut body = Vec::new();
    let mut terminated = false;
    for line in lines {
        if line == SIGNATURE_START {
            terminated = true;
            break;
        }
        body.push(line.strip_prefix("- ").unwrap_or(line));
    }

    if !terminated || body.iter().all(|l| l.trim().is_empty()) {
        return None;
    }
    Some(body.join("\n"))
}
