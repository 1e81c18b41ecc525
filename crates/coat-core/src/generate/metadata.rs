//! Identity injection into the generated project's metadata files
//!
//! Each rewrite touches only the fields it names. A field that is missing
//! from the template fails the whole run: a half-patched project would build
//! an installer with another bundle's identity.

use crate::bundle::BundleManifest;
use crate::error::{CoatError, Result};
use serde_json::Value;
use std::path::Path;
use tokio::fs;

/// Relative paths of the rewritten files
pub const ROOT_PACKAGE_JSON: &str = "package.json";
pub const ROOT_PACKAGE_LOCK: &str = "package-lock.json";
pub const APP_PACKAGE_JSON: &str = "app/package.json";
pub const APP_PACKAGE_LOCK: &str = "app/package-lock.json";
pub const APP_HTML: &str = "app/app.html";

/// Identity written into the generated project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
    pub package_name: String,
    pub product_name: String,
    pub description: String,
    pub author_name: String,
    pub author_email: String,
}

impl ProjectIdentity {
    pub fn new(manifest: &BundleManifest, safe_name: &str, user_name: &str) -> Self {
        Self {
            package_name: super::naming::package_name(safe_name),
            product_name: format!("{} installer", manifest.name),
            description: format!(
                "Self-installer for {} {}",
                manifest.name, manifest.version
            ),
            author_name: user_name.to_string(),
            author_email: format!("{}@users.noreply.local", safe_email_local_part(user_name)),
        }
    }
}

fn safe_email_local_part(user_name: &str) -> String {
    user_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Rewrite every metadata file under `project`
pub async fn rewrite_project(project: &Path, identity: &ProjectIdentity) -> Result<()> {
    rewrite_json(project, ROOT_PACKAGE_JSON, |doc| {
        set_field(doc, ROOT_PACKAGE_JSON, &["name"], &identity.package_name)?;
        set_field(doc, ROOT_PACKAGE_JSON, &["description"], &identity.description)
    })
    .await?;

    rewrite_json(project, ROOT_PACKAGE_LOCK, |doc| {
        set_field(doc, ROOT_PACKAGE_LOCK, &["name"], &identity.package_name)
    })
    .await?;

    rewrite_json(project, APP_PACKAGE_JSON, |doc| {
        set_field(doc, APP_PACKAGE_JSON, &["name"], &identity.package_name)?;
        set_field(doc, APP_PACKAGE_JSON, &["productName"], &identity.product_name)?;
        set_field(doc, APP_PACKAGE_JSON, &["description"], &identity.description)?;
        set_field(doc, APP_PACKAGE_JSON, &["author", "name"], &identity.author_name)?;
        set_field(doc, APP_PACKAGE_JSON, &["author", "email"], &identity.author_email)
    })
    .await?;

    rewrite_json(project, APP_PACKAGE_LOCK, |doc| {
        set_field(doc, APP_PACKAGE_LOCK, &["name"], &identity.package_name)
    })
    .await?;

    let html_path = project.join(APP_HTML);
    let html = fs::read_to_string(&html_path)
        .await
        .map_err(|e| CoatError::io_at("read", &html_path, e))?;
    let html = replace_title(&html, &identity.product_name)?;
    fs::write(&html_path, html)
        .await
        .map_err(|e| CoatError::io_at("write", &html_path, e))?;

    Ok(())
}

async fn rewrite_json<F>(project: &Path, relative: &str, edit: F) -> Result<()>
where
    F: FnOnce(&mut Value) -> Result<()>,
{
    let path = project.join(relative);
    let text = fs::read_to_string(&path)
        .await
        .map_err(|e| CoatError::io_at("read", &path, e))?;
    let mut doc: Value = serde_json::from_str(&text).map_err(|e| CoatError::parse(relative, e))?;

    edit(&mut doc)?;

    let mut out = serde_json::to_string_pretty(&doc).map_err(|e| CoatError::parse(relative, e))?;
    out.push('\n');
    fs::write(&path, out)
        .await
        .map_err(|e| CoatError::io_at("write", &path, e))
}

/// Replace the value at `field_path`, which must already exist
fn set_field(doc: &mut Value, file: &str, field_path: &[&str], value: &str) -> Result<()> {
    let dotted = field_path.join(".");
    let (last, parents) = field_path
        .split_last()
        .ok_or_else(|| CoatError::structural(file, "<empty path>"))?;

    let mut current = doc;
    for key in parents {
        current = current
            .as_object_mut()
            .and_then(|obj| obj.get_mut(*key))
            .ok_or_else(|| CoatError::structural(file, dotted.clone()))?;
    }

    let slot = current
        .as_object_mut()
        .and_then(|obj| obj.get_mut(*last))
        .ok_or_else(|| CoatError::structural(file, dotted.clone()))?;
    *slot = Value::String(value.to_string());
    Ok(())
}

/// Replace the text of the first `<title>` element
fn replace_title(html: &str, title: &str) -> Result<String> {
    let missing = || CoatError::structural(APP_HTML, "title");
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title").ok_or_else(missing)?;
    let content_start = open + lower[open..].find('>').ok_or_else(missing)? + 1;
    let content_end = content_start
        + lower[content_start..]
            .find("</title>")
            .ok_or_else(missing)?;

    Ok(format!(
        "{}{}{}",
        &html[..content_start],
        escape_html(title),
        &html[content_end..]
    ))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
