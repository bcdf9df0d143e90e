// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_ADDRESS_SUFFIX: &str = "s.whatsapp.net";

// -----------------------------------------------------------------------------
// ----- Recipient addressing --------------------------------------------------

/// Appends `@<suffix>` unless the number already carries it. Idempotent.
pub fn normalize_recipient(number: &str, suffix: &str) -> String {
    let domain = format!("@{suffix}");
    if number.contains(&domain) {
        number.to_string()
    } else {
        format!("{number}{domain}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_gets_suffix() {
        assert_eq!(
            normalize_recipient("15551234567", DEFAULT_ADDRESS_SUFFIX),
            "15551234567@s.whatsapp.net"
        );
    }

    #[test]
    fn suffixed_number_is_left_alone() {
        let once = normalize_recipient("15551234567", DEFAULT_ADDRESS_SUFFIX);
        assert_eq!(normalize_recipient(&once, DEFAULT_ADDRESS_SUFFIX), once);
    }

    #[test]
    fn custom_suffix() {
        assert_eq!(normalize_recipient("42", "example.net"), "42@example.net");
    }
}
