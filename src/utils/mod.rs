pub mod circuit_breaker;
pub mod logging;
pub mod retry;

/// Trim surrounding whitespace and collapse inner runs of whitespace into a
/// single space. Used for titles and client names before they are stored.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `None` for missing or blank optional text, otherwise the normalized value.
pub fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(normalize_text).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  EDSA   northbound \n install "), "EDSA northbound install");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" Makati ")), Some("Makati".to_string()));
    }
}
