//! JSON toggle definitions
//!
//! Libraries ship their default toggle fractions as JSON documents:
//!
//! ```json
//! {
//!   "toggles": [
//!     { "id": "com.example.search.fuzzy", "fraction": 0.1,
//!       "description": "Fuzzy matching", "comment": "ramping, owner: search" }
//!   ]
//! }
//! ```
//!
//! Unlike runtime overrides, definitions are checked strictly: a bad id, an
//! out of range fraction or a duplicate id rejects the whole document.
//! `comment` and any other unknown keys are ignored.

use crate::error::{Result, ToggleError};
use crate::immutable::ImmutableToggleMap;
use crate::metadata::Metadata;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Document {
    toggles: Vec<Definition>,
}

#[derive(Debug, Deserialize)]
struct Definition {
    id: String,
    fraction: f64,
    #[serde(default)]
    description: Option<String>,
}

/// Parse a JSON document. `origin` names the document in [`Metadata::source`].
///
/// # Examples
///
/// ```
/// use armature_toggle::*;
///
/// let map = json::parse_str(r#"{"toggles":[{"id":"com.a","fraction":1.0}]}"#, "inline").unwrap();
/// assert_eq!(map.get("com.a").evaluate(0), Some(true));
/// ```
pub fn parse_str(text: &str, origin: &str) -> Result<ImmutableToggleMap> {
    let document: Document = serde_json::from_str(text)?;
    let source = format!("JsonToggleMap({origin})");

    let mut seen = HashSet::new();
    let mut metadata = Vec::with_capacity(document.toggles.len());
    for definition in document.toggles {
        if !seen.insert(definition.id.clone()) {
            return Err(ToggleError::DuplicateId(definition.id));
        }

        let mut md = Metadata::try_new(definition.id, definition.fraction, source.as_str())?;
        md.description = definition.description;
        metadata.push(md);
    }

    Ok(ImmutableToggleMap::new(metadata))
}

/// Read and parse a JSON document from disk.
pub fn load_file(path: impl AsRef<Path>) -> Result<ImmutableToggleMap> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let map = parse_str(&text, &path.display().to_string())?;
    tracing::debug!(
        target: "armature::toggle",
        "Loaded {} toggles from {}",
        map.len(),
        path.display()
    );
    Ok(map)
}
