use secrecy::{ExposeSecret, SecretSlice};

// -----------------------------------------------------------------------------
// ----- CredentialBundle ------------------------------------------------------

/// Opaque credential material produced by the protocol layer. The gateway
/// never looks inside; it only moves the bytes between the protocol layer and
/// the credential store. Debug output is redacted.
#[derive(Debug)]
pub struct CredentialBundle {
    data: SecretSlice<u8>,
}

impl CredentialBundle {
    pub fn empty() -> Self {
        Self::from_bytes(Vec::new())
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.data.expose_secret().is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.expose_secret().len()
    }

    pub fn expose(&self) -> &[u8] {
        self.data.expose_secret()
    }
}

impl Default for CredentialBundle {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_material() {
        let bundle = CredentialBundle::from_bytes(b"noise-key-123".to_vec());
        let printed = format!("{bundle:?}");
        assert!(!printed.contains("noise-key-123"));
        assert_eq!(bundle.len(), 13);
    }
}
