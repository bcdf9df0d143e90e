use serde::Serialize;
use std::{fmt, sync::Arc};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_TENANT: &str = "default";

// -----------------------------------------------------------------------------
// ----- TenantKey -------------------------------------------------------------

/// Opaque caller-supplied identifier selecting one independent messaging
/// session. Cheap to clone; used as the only lookup key across the registry,
/// the credential store and the pairing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantKey(Arc<str>);

// -----------------------------------------------------------------------------
// ----- TenantKey: Static -----------------------------------------------------

impl TenantKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Resolves an optional header value, falling back to `default` when the
    /// value is absent or blank.
    pub fn from_header(value: Option<&str>, default: &str) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Self::new(v),
            _ => Self::new(default),
        }
    }
}

impl Default for TenantKey {
    fn default() -> Self {
        Self::new(DEFAULT_TENANT)
    }
}

// -----------------------------------------------------------------------------
// ----- TenantKey: Public -----------------------------------------------------

impl TenantKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-system safe, collision-free name for this key.
    ///
    /// Keys made only of `[A-Za-z0-9_-]` are used as-is. Anything else is
    /// rendered as `~` followed by the hex of its UTF-8 bytes; `~` never
    /// appears in a verbatim name, so the two forms cannot collide.
    pub fn storage_name(&self) -> String {
        let raw = self.as_str();
        let verbatim = !raw.is_empty()
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

        if verbatim {
            return raw.to_string();
        }

        let mut out = String::with_capacity(1 + raw.len() * 2);
        out.push('~');
        for b in raw.bytes() {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_header_uses_default() {
        assert_eq!(TenantKey::from_header(None, "default").as_str(), "default");
        assert_eq!(TenantKey::from_header(Some("  "), "default").as_str(), "default");
        assert_eq!(TenantKey::from_header(Some("acme"), "default").as_str(), "acme");
    }

    #[test]
    fn storage_name_keeps_safe_keys() {
        assert_eq!(TenantKey::new("acme_01-x").storage_name(), "acme_01-x");
    }

    #[test]
    fn storage_name_encodes_unsafe_keys() {
        assert_eq!(TenantKey::new("../etc").storage_name(), "~2e2e2f657463");
        assert_eq!(TenantKey::new("").storage_name(), "~");
        assert_ne!(
            TenantKey::new("a/b").storage_name(),
            TenantKey::new("a b").storage_name()
        );
    }
}
