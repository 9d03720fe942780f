//! Element guids.
//!
//! Guids are interned once and compared as 4-byte handles. Two rules are
//! specific to flows:
//!
//! - `root` names the synthetic element every flow hangs off. Documents
//!   never list it, and no generated guid can collide with it.
//! - Generated guids take the form `{prefix}_{n}`, where the prefix is the
//!   element kind name. Names a document already uses are skipped, so an
//!   element added in the editor never takes over a loaded guid.

use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for element guids.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Guid of the synthetic root element every flow hangs off.
pub const ROOT_GUID: &str = "root";

/// A lightweight, interned identifier for flow elements.
/// Internally a `Spur` index: 4 bytes and `Copy`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid(Spur);

impl Guid {
    /// Intern a new string as a Guid, or return existing if already interned.
    pub fn intern(s: &str) -> Self {
        Guid(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// The guid of the synthetic root.
    pub fn root() -> Self {
        Self::intern(ROOT_GUID)
    }

    pub fn is_root(&self) -> bool {
        *self == Self::root()
    }

    /// Generate a unique guid with a kind prefix (e.g. `decision_3`).
    /// Any name already interned, by a document or by hand, is skipped.
    pub fn with_prefix(prefix: &str) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        loop {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{prefix}_{n}");
            // Skip names a fixture already interned by hand.
            if INTERNER.get(&candidate).is_none() {
                return Self::intern(&candidate);
            }
        }
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for Guid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by string value, not interning order, so sorted output is stable
/// across runs.
impl Ord for Guid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Guid::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = Guid::intern("screen_welcome");
        let b = Guid::intern("screen_welcome");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "screen_welcome");
    }

    #[test]
    fn prefixed_guids_are_unique() {
        let a = Guid::with_prefix("decision");
        let b = Guid::with_prefix("decision");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("decision_"));
    }

    #[test]
    fn prefixed_guid_skips_existing_names() {
        Guid::intern("assignment_0");
        Guid::intern("assignment_1");
        let fresh = Guid::with_prefix("assignment");
        assert_ne!(fresh.as_str(), "assignment_0");
        assert_ne!(fresh.as_str(), "assignment_1");
    }

    #[test]
    fn root_sentinel_is_shared() {
        assert!(Guid::root().is_root());
        assert!(Guid::intern(ROOT_GUID).is_root());
        assert!(!Guid::intern("root_screen").is_root());
    }

    #[test]
    fn generated_guid_never_names_the_root() {
        let generated = Guid::with_prefix(ROOT_GUID);
        assert!(!generated.is_root());
        assert!(generated.as_str().starts_with("root_"));
    }

    #[test]
    fn debug_marks_guids_display_does_not() {
        let guid = Guid::intern("screen_display");
        assert_eq!(format!("{guid:?}"), "#screen_display");
        assert_eq!(guid.to_string(), "screen_display");
    }

    #[test]
    fn serializes_as_plain_string() {
        let guid = Guid::intern("decision_serde");
        let json = serde_json::to_string(&guid).unwrap();
        assert_eq!(json, "\"decision_serde\"");
        let back: Guid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, guid);
    }

    #[test]
    fn ordering_follows_string_value() {
        let z = Guid::intern("zzz_ordering");
        let a = Guid::intern("aaa_ordering");
        assert!(a < z);
    }
}
