//! Object identity and name validation.
//!
//! Every object the verifier touches is addressed by a `(namespace, name)`
//! pair. Names are validated up front so a typo surfaces as a clear error
//! instead of a 404 loop that only ends when the deadline expires.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a DNS-1123 label.
pub const MAX_NAME_LENGTH: usize = 63;

/// Identity of an orchestration object. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub namespace: String,
    pub name: String,
}

impl Identity {
    /// Create a validated identity.
    ///
    /// Both parts must be DNS-1123 labels.
    ///
    /// # Examples
    ///
    /// ```
    /// use settle::models::Identity;
    ///
    /// let id = Identity::new("arendelle-x7k2", "kanikotask-run").unwrap();
    /// assert_eq!(id.to_string(), "arendelle-x7k2/kanikotask-run");
    /// assert!(Identity::new("ns", "Not_Valid").is_err());
    /// ```
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();
        validate_name(&namespace)?;
        validate_name(&name)?;
        Ok(Self { namespace, name })
    }

    /// Another object living in the same namespace.
    pub fn sibling(&self, name: impl Into<String>) -> Result<Self> {
        Self::new(self.namespace.clone(), name)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Validates that a name is a DNS-1123 label.
///
/// A name is valid if:
/// - It is not empty
/// - It is no longer than MAX_NAME_LENGTH characters
/// - It contains only lowercase alphanumeric characters and dashes
/// - It starts and ends with an alphanumeric character
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Name cannot be empty");
    }

    if name.len() > MAX_NAME_LENGTH {
        bail!(
            "Name too long: {} characters (max {})",
            name.len(),
            MAX_NAME_LENGTH
        );
    }

    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars {
        bail!("Name '{name}' contains invalid characters. Use only lowercase alphanumeric characters and dashes (-)");
    }

    if name.starts_with('-') || name.ends_with('-') {
        bail!("Name '{name}' must start and end with an alphanumeric character");
    }

    Ok(())
}

/// Clap value parser for object names.
pub fn clap_name_validator(s: &str) -> Result<String, String> {
    validate_name(s).map_err(|e| e.to_string())?;
    Ok(s.to_string())
}
