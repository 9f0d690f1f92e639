//! Mapping from sprite filenames to subject keys.
//!
//! Sprites arrive as `{subject}{sep}{NN}.{ext}` where `NN` numbers alternative
//! captures of the same subject. The variant index and the extension are
//! stripped so every capture of one subject lands on the same key.

use serde::{Deserialize, Serialize};

use crate::error::{AnchorError, Result};
use crate::record::SubjectKey;

/// Configurable variant-suffix rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingRule {
    /// Text between the subject and the variant index.
    pub separator: String,
    /// Exact number of digits in a variant index.
    pub variant_digits: usize,
    /// Variant index used for locally cached files.
    pub canonical_variant: String,
    /// Variant indices worth fetching; everything else is ignored.
    pub accepted_variants: Vec<String>,
}

impl Default for NamingRule {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            variant_digits: 2,
            canonical_variant: "00".to_string(),
            accepted_variants: vec!["00".to_string(), "01".to_string()],
        }
    }
}

/// A filename split into its subject key, variant index and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub key: SubjectKey,
    pub variant: Option<String>,
    pub extension: String,
}

impl NamingRule {
    /// Split `filename` (a bare name or a path) into its parts.
    pub fn parse(&self, filename: &str) -> Result<ParsedName> {
        let invalid = || AnchorError::InvalidFilename {
            name: filename.to_string(),
        };

        let base = filename.rsplit(['/', '\\']).next().unwrap_or_default().trim();
        let (stem, extension) = base.rsplit_once('.').ok_or_else(invalid)?;
        if extension.is_empty() {
            return Err(invalid());
        }

        // Wiki titles use spaces where file URLs use underscores.
        let stem = stem.split_whitespace().collect::<Vec<_>>().join("_");
        if stem.is_empty() {
            return Err(invalid());
        }

        let (subject, variant) = match self.split_variant(&stem) {
            Some((subject, variant)) => (subject.to_string(), Some(variant.to_string())),
            None => (stem, None),
        };

        Ok(ParsedName {
            key: SubjectKey::new(subject).map_err(|_| invalid())?,
            variant,
            extension: extension.to_string(),
        })
    }

    pub fn normalize(&self, filename: &str) -> Result<SubjectKey> {
        self.parse(filename).map(|parsed| parsed.key)
    }

    /// Whether the parsed name carries a variant this pipeline fetches.
    /// Names without a variant index are always accepted.
    pub fn accepts(&self, parsed: &ParsedName) -> bool {
        match &parsed.variant {
            Some(variant) => self.accepted_variants.iter().any(|v| v == variant),
            None => true,
        }
    }

    /// Local filename every capture of `key` is cached under.
    pub fn canonical_file_name(&self, key: &SubjectKey, extension: &str) -> String {
        format!(
            "{key}{}{}.{extension}",
            self.separator, self.canonical_variant
        )
    }

    /// Shell glob matching any variant index of `key`.
    pub fn variant_glob(&self, key: &SubjectKey, extension: &str) -> String {
        format!(
            "{key}{}{}.{extension}",
            self.separator,
            "?".repeat(self.variant_digits)
        )
    }

    fn split_variant<'a>(&self, stem: &'a str) -> Option<(&'a str, &'a str)> {
        if self.separator.is_empty() {
            return None;
        }
        let (subject, variant) = stem.rsplit_once(self.separator.as_str())?;
        let is_index =
            variant.len() == self.variant_digits && variant.chars().all(|c| c.is_ascii_digit());
        (is_index && !subject.is_empty()).then_some((subject, variant))
    }
}

/// Normalize with the default `_NN` rule.
pub fn normalize(filename: &str) -> Result<SubjectKey> {
    NamingRule::default().normalize(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_of_one_subject_share_a_key() {
        let a = normalize("Alice_(Summer)_00.png").unwrap();
        let b = normalize("Alice_(Summer)_01.png").unwrap();
        let c = normalize("portraits/Alice_(Summer)_07.png").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.as_str(), "Alice_(Summer)");
    }

    #[test]
    fn distinct_subjects_do_not_collide() {
        assert_ne!(
            normalize("Alice_Angry_00.png").unwrap(),
            normalize("Alice_Happy_00.png").unwrap()
        );
        assert_ne!(
            normalize("Alice_00.png").unwrap(),
            normalize("Alice_Happy_00.png").unwrap()
        );
    }

    #[test]
    fn non_index_suffixes_are_kept() {
        assert_eq!(normalize("Alice_2.png").unwrap().as_str(), "Alice_2");
        assert_eq!(normalize("Alice_001.png").unwrap().as_str(), "Alice_001");
        assert_eq!(normalize("Alice_ab.png").unwrap().as_str(), "Alice_ab");
        assert_eq!(normalize("_00.png").unwrap().as_str(), "_00");
    }

    #[test]
    fn spaces_map_to_underscores() {
        assert_eq!(
            normalize("Alice (Summer) 00.png").unwrap(),
            normalize("Alice_(Summer)_00.png").unwrap()
        );
    }

    #[test]
    fn missing_extension_or_empty_name_is_invalid() {
        for name in ["", "   ", "Alice_00", "Alice.", ".png", "dir/"] {
            assert!(
                matches!(normalize(name), Err(AnchorError::InvalidFilename { .. })),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn parse_reports_variant_and_extension() {
        let rule = NamingRule::default();
        let parsed = rule.parse("Bob_01.webp").unwrap();
        assert_eq!(parsed.key.as_str(), "Bob");
        assert_eq!(parsed.variant.as_deref(), Some("01"));
        assert_eq!(parsed.extension, "webp");
        assert!(rule.accepts(&parsed));
        assert!(!rule.accepts(&rule.parse("Bob_02.png").unwrap()));
        assert!(rule.accepts(&rule.parse("Bob.png").unwrap()));
    }

    #[test]
    fn custom_rule_changes_suffix_matching() {
        let rule = NamingRule {
            separator: "-".to_string(),
            variant_digits: 3,
            canonical_variant: "000".to_string(),
            accepted_variants: vec!["000".to_string()],
        };
        assert_eq!(rule.normalize("Carol-012.png").unwrap().as_str(), "Carol");
        assert_eq!(rule.normalize("Carol_01.png").unwrap().as_str(), "Carol_01");

        let key = rule.normalize("Carol-012.png").unwrap();
        assert_eq!(rule.canonical_file_name(&key, "png"), "Carol-000.png");
        assert_eq!(rule.variant_glob(&key, "png"), "Carol-???.png");
    }
}
