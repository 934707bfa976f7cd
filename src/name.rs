// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hierarchical publication names.
//!
//! A name is an ordered sequence of opaque byte components, compared component-wise and
//! byte-lexicographically. Numeric components (epochs, timestamps) use the minimal big-endian
//! encoding from [`crate::tlv`].
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tlv::{read_number, write_number, TlvError};

/// One opaque name component.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Component(#[serde(with = "serde_bytes")] Vec<u8>);

impl Component {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_number(value: u64) -> Self {
        Self(write_number(value))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_number(&self) -> Result<u64, TlvError> {
        read_number(&self.0)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Component {
    // Printable components render as text, everything else as hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.0.is_empty() && self.0.iter().all(|b| b.is_ascii_graphic()) {
            write!(f, "{}", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "{}", hex::encode(&self.0))
        }
    }
}

/// Hierarchical name of a publication.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name(Vec<Component>);

impl Name {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components(components: Vec<Component>) -> Self {
        Self(components)
    }

    /// Builds a name from `/`-separated text components.
    pub fn from_str_path(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|part| !part.is_empty())
                .map(|part| Component::from_bytes(part.as_bytes().to_vec()))
                .collect(),
        )
    }

    /// Returns this name extended by one string component.
    pub fn with_str(&self, part: &str) -> Self {
        self.with(Component::from_bytes(part.as_bytes().to_vec()))
    }

    /// Returns this name extended by one numeric component.
    pub fn with_number(&self, value: u64) -> Self {
        self.with(Component::from_number(value))
    }

    /// Returns this name extended by one opaque component.
    pub fn with_bytes(&self, bytes: impl Into<Vec<u8>>) -> Self {
        self.with(Component::from_bytes(bytes))
    }

    pub fn with(&self, component: Component) -> Self {
        let mut components = self.0.clone();
        components.push(component);
        Self(components)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn component(&self, index: usize) -> Option<&Component> {
        self.0.get(index)
    }

    pub fn components(&self) -> &[Component] {
        &self.0
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.0 {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}
