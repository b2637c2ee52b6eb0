//! Identifier interning
//!
//! Declaration names are stored once and referred to by small integer
//! handles, so name lookup in a destination context compares integers.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// An interned identifier (32-bit index).
///
/// Names are small (4 bytes) and can be copied cheaply.
/// Use `Interner::resolve()` to get the actual string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(NonZeroU32);

impl Name {
    #[inline]
    fn from_raw(raw: u32) -> Self {
        // Offset by one because NonZeroU32 cannot be 0
        Name(NonZeroU32::MIN.saturating_add(raw))
    }

    #[inline]
    fn to_raw(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// String interner that deduplicates identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Interner {
    /// Map from string to name index
    map: FxHashMap<String, Name>,

    /// Vec of interned strings (indexed by name)
    strings: Vec<String>,
}

impl Interner {
    /// Create a new empty interner.
    pub fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            strings: Vec::new(),
        }
    }

    /// Intern a string, returning its name.
    ///
    /// If the string was already interned, returns the existing name.
    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(&name) = self.map.get(s) {
            return name;
        }

        let name = Name::from_raw(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.map.insert(s.to_string(), name);
        name
    }

    /// Look up a string without interning it.
    pub fn get(&self, s: &str) -> Option<Name> {
        self.map.get(s).copied()
    }

    /// Resolve a name back to its string.
    ///
    /// Names that did not come from this interner resolve to `"<unknown>"`.
    #[inline]
    pub fn resolve(&self, name: Name) -> &str {
        self.strings
            .get(name.to_raw())
            .map(String::as_str)
            .unwrap_or("<unknown>")
    }

    /// Get the number of interned strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if the interner is empty.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<String>> for Interner {
    fn from(strings: Vec<String>) -> Self {
        let mut interner = Interner::new();
        for s in &strings {
            interner.intern(s);
        }
        interner
    }
}

impl From<Interner> for Vec<String> {
    fn from(interner: Interner) -> Self {
        interner.strings
    }
}
