//! Toggle metadata
//!
//! Describes a single toggle definition as surfaced by a [`ToggleMap`](crate::ToggleMap).

use crate::error::{Result, ToggleError};
use serde::{Deserialize, Serialize};

/// Toggle definition metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Toggle id, dot-namespaced by convention (`com.example.feature`)
    pub id: String,

    /// Fraction of inputs the toggle decides `true` for, within `[0.0, 1.0]`
    pub fraction: f64,

    /// Human readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Name of the toggle map this definition came from
    #[serde(default)]
    pub source: String,
}

impl Metadata {
    /// Create metadata without validating the id or fraction.
    pub fn new(id: impl Into<String>, fraction: f64, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fraction,
            description: None,
            source: source.into(),
        }
    }

    /// Create metadata, rejecting invalid ids and out of range fractions.
    ///
    /// # Examples
    ///
    /// ```
    /// use armature_toggle::Metadata;
    ///
    /// assert!(Metadata::try_new("com.example.search", 0.25, "static").is_ok());
    /// assert!(Metadata::try_new("com.example.search", 1.5, "static").is_err());
    /// ```
    pub fn try_new(
        id: impl Into<String>,
        fraction: f64,
        source: impl Into<String>,
    ) -> Result<Self> {
        let md = Self::new(id, fraction, source);
        md.validate()?;
        Ok(md)
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check both the id and the fraction.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id)?;
        if !is_valid_fraction(self.fraction) {
            return Err(ToggleError::InvalidFraction {
                id: self.id.clone(),
                fraction: self.fraction,
            });
        }
        Ok(())
    }
}

/// Whether `fraction` lies within `[0.0, 1.0]`. `NaN` is never valid.
pub fn is_valid_fraction(fraction: f64) -> bool {
    (0.0..=1.0).contains(&fraction)
}

/// Validate a toggle id.
///
/// Ids are non-empty, made of ASCII alphanumerics, `_`, `-` and `.`, and
/// neither start nor end with a `.`.
pub fn validate_id(id: &str) -> Result<()> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if id.is_empty() || !valid_chars || id.starts_with('.') || id.ends_with('.') {
        return Err(ToggleError::InvalidId(id.to_string()));
    }
    Ok(())
}
