#![forbid(unsafe_code)]

//! Identifier and display-text value types.
//!
//! Neither type implements `PartialEq`: [`Name`] compares through
//! [`Equals`] and [`Text`] through [`EqualTo`], so properties holding them
//! resolve to the second and third equality strategies respectively.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kind::{EqualTo, Equals};

/// Case-insensitive identifier used for session and field names.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    /// Create a name from any string-like value.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name exactly as it was written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the name has no visible characters.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Equals for Name {
    fn equals(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User-facing text, optionally tagged with a localisation namespace and key.
///
/// Two texts are [`EqualTo`] when they display the same string, regardless
/// of where they were localised from.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Text {
    display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
}

impl Text {
    /// Culture-invariant text that is never localised.
    #[must_use]
    pub fn invariant(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            namespace: None,
            key: None,
        }
    }

    /// Text looked up from a localisation table by namespace and key.
    #[must_use]
    pub fn localized(
        namespace: impl Into<String>,
        key: impl Into<String>,
        display: impl Into<String>,
    ) -> Self {
        Self {
            display: display.into(),
            namespace: Some(namespace.into()),
            key: Some(key.into()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl EqualTo for Text {
    fn equal_to(&self, other: &Self) -> bool {
        self.display == other.display
    }
}

impl From<&str> for Text {
    fn from(value: &str) -> Self {
        Self::invariant(value)
    }
}

impl From<String> for Text {
    fn from(value: String) -> Self {
        Self::invariant(value)
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Text")
            .field("display", &self.display)
            .field("namespace", &self.namespace)
            .field("key", &self.key)
            .finish()
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}
