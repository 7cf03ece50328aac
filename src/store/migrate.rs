//! Versioned schema migrations.
//!
//! Migrations run on the raw JSON value, before typed parsing, from the
//! version recorded in the document up to [`SCHEMA_VERSION`]. Default-filling
//! of missing fields is left to normalization; migrations only handle
//! changes in shape that serde could not absorb on its own.

use super::document::SCHEMA_VERSION;
use crate::error::{Error, Result};
use log::{debug, info, warn};
use serde_json::{Map, Value};

type Migration = fn(&mut Map<String, Value>);

/// Ordered migrations; each entry lifts a document *to* the listed version.
const MIGRATIONS: &[(u32, Migration)] = &[(1, to_v1), (2, to_v2)];

/// Version recorded in a document root; documents without one are version 0.
pub fn recorded_version(root: &Map<String, Value>) -> u32 {
    root.get("version")
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .unwrap_or(0)
}

/// Bring `value` up to the current schema version.
///
/// Returns `true` if anything changed.
///
/// # Errors
///
/// Returns `Error::DocumentParse` if the document root is not a JSON object.
pub fn migrate(value: &mut Value) -> Result<bool> {
    let root = value.as_object_mut().ok_or_else(|| Error::DocumentParse {
        message: "document root is not an object".to_string(),
        source: None,
    })?;

    let from = recorded_version(root);
    if from > SCHEMA_VERSION {
        warn!(
            "Document schema version {} is newer than supported version {}; reading as-is",
            from, SCHEMA_VERSION
        );
        return Ok(false);
    }

    let mut changed = false;
    for (target, migration) in MIGRATIONS {
        if *target > from {
            debug!("Migrating document to schema version {}", target);
            migration(root);
            root.insert("version".to_string(), Value::from(*target));
            changed = true;
        }
    }

    if changed {
        info!("Migrated document from schema version {} to {}", from, SCHEMA_VERSION);
    }
    Ok(changed)
}

// ─────────────────────────────────────────────────────────────────────────────
// Migrations
// ─────────────────────────────────────────────────────────────────────────────

/// v0 → v1: drop the legacy `appVersion` tag and repair top-level collections.
fn to_v1(root: &mut Map<String, Value>) {
    root.remove("appVersion");

    if root.get("globalSettings").is_some_and(|v| !v.is_object()) {
        root.remove("globalSettings");
    }
    for key in ["tabs", "journals"] {
        if !root.get(key).is_some_and(Value::is_array) {
            root.insert(key.to_string(), Value::Array(Vec::new()));
        }
    }
}

/// v1 → v2: font sizes become numbers (`"16px"` → `16.0`).
fn to_v2(root: &mut Map<String, Value>) {
    if let Some(settings) = root.get_mut("globalSettings").and_then(Value::as_object_mut) {
        convert_font_size(settings, "defaultFontSize");
    }
    if let Some(tabs) = root.get_mut("tabs").and_then(Value::as_array_mut) {
        for tab in tabs {
            if let Some(appearance) = tab.get_mut("appearance").and_then(Value::as_object_mut) {
                convert_font_size(appearance, "fontSize");
            }
        }
    }
}

fn convert_font_size(object: &mut Map<String, Value>, key: &str) {
    let Some(Value::String(css)) = object.get(key) else {
        return;
    };
    match parse_css_pixels(css) {
        Some(px) => {
            object.insert(key.to_string(), Value::from(px));
        }
        None => {
            warn!("Unrecognized font size '{}', resetting to default", css);
            object.remove(key);
        }
    }
}

/// Parse `"16px"`, `"16"` or `" 12.5px "` into a pixel count.
fn parse_css_pixels(css: &str) -> Option<f64> {
    let trimmed = css.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim();
    number.parse::<f64>().ok().filter(|n| n.is_finite())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_document_is_migrated() {
        let mut doc = json!({
            "appVersion": "1.0.0",
            "globalSettings": { "defaultFontSize": "16px", "theme": "dark" },
            "tabs": [ { "id": "tab-1", "appearance": { "fontSize": "18px" } } ]
        });

        assert!(migrate(&mut doc).unwrap());
        assert_eq!(doc["version"], SCHEMA_VERSION);
        assert!(doc.get("appVersion").is_none());
        assert_eq!(doc["globalSettings"]["defaultFontSize"], 16.0);
        assert_eq!(doc["tabs"][0]["appearance"]["fontSize"], 18.0);
        assert_eq!(doc["journals"], json!([]));
    }

    #[test]
    fn test_current_document_is_untouched() {
        let mut doc = json!({ "version": SCHEMA_VERSION, "tabs": [], "journals": [] });
        let before = doc.clone();
        assert!(!migrate(&mut doc).unwrap());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_missing_settings_stay_missing() {
        let mut doc = json!({ "tabs": [] });
        migrate(&mut doc).unwrap();
        assert!(doc.get("globalSettings").is_none());
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        let mut doc = json!([1, 2, 3]);
        assert!(matches!(migrate(&mut doc), Err(Error::DocumentParse { .. })));
    }

    #[test]
    fn test_newer_document_is_left_alone() {
        let mut doc = json!({ "version": SCHEMA_VERSION + 1, "tabs": "weird" });
        assert!(!migrate(&mut doc).unwrap());
        assert_eq!(doc["tabs"], "weird");
    }

    #[test]
    fn test_unparseable_font_size_is_removed() {
        let mut doc = json!({ "version": 1, "globalSettings": { "defaultFontSize": "large" } });
        migrate(&mut doc).unwrap();
        assert!(doc["globalSettings"].get("defaultFontSize").is_none());
    }

    #[test]
    fn test_parse_css_pixels() {
        assert_eq!(parse_css_pixels("16px"), Some(16.0));
        assert_eq!(parse_css_pixels(" 12.5px "), Some(12.5));
        assert_eq!(parse_css_pixels("20"), Some(20.0));
        assert_eq!(parse_css_pixels("1em"), None);
    }
}
