//! Call-number and collection-code masking.
//!
//! A rule masks everything after a matching prefix. Exception prefixes are
//! checked first and suppress masking entirely.

use libris_core::{ConfigError, ConfigSection};

/// Default replacement character.
pub const DEFAULT_MASK_CHAR: char = '*';

/// Masking rule for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskRule {
    pub prefixes: Vec<String>,
    pub exception_prefixes: Vec<String>,
    pub mask_char: char,
}

impl MaskRule {
    #[must_use]
    pub fn new(prefixes: Vec<String>) -> Self {
        Self {
            prefixes,
            exception_prefixes: Vec::new(),
            mask_char: DEFAULT_MASK_CHAR,
        }
    }

    #[must_use]
    pub fn with_exceptions(mut self, exception_prefixes: Vec<String>) -> Self {
        self.exception_prefixes = exception_prefixes;
        self
    }

    #[must_use]
    pub fn with_mask_char(mut self, mask_char: char) -> Self {
        self.mask_char = mask_char;
        self
    }

    /// Apply the rule. Values without a matching prefix come back unchanged.
    #[must_use]
    pub fn apply(&self, value: &str) -> String {
        if self
            .exception_prefixes
            .iter()
            .any(|p| !p.is_empty() && value.starts_with(p.as_str()))
        {
            return value.to_string();
        }
        match self
            .prefixes
            .iter()
            .find(|p| !p.is_empty() && value.starts_with(p.as_str()))
        {
            Some(prefix) => {
                let hidden = value[prefix.len()..].chars().count();
                let mut masked = String::with_capacity(value.len());
                masked.push_str(prefix);
                masked.extend(std::iter::repeat(self.mask_char).take(hidden));
                masked
            }
            None => value.to_string(),
        }
    }
}

/// Masking rules per maskable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskingConfig {
    pub call_number: Option<MaskRule>,
    pub collection_code: Option<MaskRule>,
}

impl MaskingConfig {
    /// Read rules from a section.
    ///
    /// Keys: `call_number_prefixes`, `call_number_exceptions`,
    /// `collection_code_prefixes`, `collection_code_exceptions` (comma lists)
    /// and `mask_char`. A field without prefixes is not masked.
    pub fn from_section(section: &ConfigSection) -> Result<Self, ConfigError> {
        let mask_char = match section.get("mask_char") {
            None => DEFAULT_MASK_CHAR,
            Some(raw) => {
                let mut chars = raw.trim().chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            section: section.name().to_string(),
                            key: "mask_char".to_string(),
                            message: format!("expected a single character, got '{raw}'"),
                        })
                    }
                }
            }
        };

        let rule = |field: &str| {
            let prefixes = section.get_list(&format!("{field}_prefixes"));
            (!prefixes.is_empty()).then(|| {
                MaskRule::new(prefixes)
                    .with_exceptions(section.get_list(&format!("{field}_exceptions")))
                    .with_mask_char(mask_char)
            })
        };

        Ok(Self {
            call_number: rule("call_number"),
            collection_code: rule("collection_code"),
        })
    }

    /// Check if no field is masked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.call_number.is_none() && self.collection_code.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_after_prefix() {
        let rule = MaskRule::new(vec!["MAG".into()]);
        assert_eq!(rule.apply("MAG 1234"), "MAG*****");
        assert_eq!(rule.apply("QA76"), "QA76");
    }

    #[test]
    fn test_exception_wins() {
        let rule = MaskRule::new(vec!["MAG".into()])
            .with_exceptions(vec!["MAG OPEN".into()])
            .with_mask_char('#');
        assert_eq!(rule.apply("MAG OPEN 12"), "MAG OPEN 12");
        assert_eq!(rule.apply("MAG 12"), "MAG###");
    }

    #[test]
    fn test_mask_counts_characters() {
        let rule = MaskRule::new(vec!["Z".into()]);
        assert_eq!(rule.apply("Zäö"), "Z**");
    }

    #[test]
    fn test_from_section() {
        let mut section = ConfigSection::new("Holdings");
        section.insert("call_number_prefixes", "MAG, ARCH");
        section.insert("call_number_exceptions", "MAG OPEN");
        section.insert("mask_char", "x");
        let config = MaskingConfig::from_section(&section).unwrap();
        let rule = config.call_number.unwrap();
        assert_eq!(rule.prefixes, vec!["MAG", "ARCH"]);
        assert_eq!(rule.exception_prefixes, vec!["MAG OPEN"]);
        assert_eq!(rule.mask_char, 'x');
        assert!(config.collection_code.is_none());
    }

    #[test]
    fn test_from_section_rejects_long_mask_char() {
        let mut section = ConfigSection::new("Holdings");
        section.insert("mask_char", "**");
        assert!(MaskingConfig::from_section(&section).is_err());
    }
}
