//! Entity label normalization.
//!
//! Feed labels arrive as market-question phrasings ("Will Jane Doe win the
//! primary?", "Jane Doe for District 9"). Fusion needs one canonical key per
//! entity regardless of which feed produced the label, and the store wants a
//! cleaned display name, so both derivations live here. All matching is
//! ASCII-case-insensitive; rules are configuration, not code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalization rules as they appear in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Leading words stripped together with their trailing whitespace.
    #[serde(default = "default_strip_prefixes")]
    pub strip_prefixes: Vec<String>,
    /// Markers that end the entity name. Each must start with a space so
    /// names are only cut at word boundaries.
    #[serde(default = "default_suffix_markers")]
    pub suffix_markers: Vec<String>,
    /// Leading titles stripped from canonical keys but kept for display.
    #[serde(default = "default_honorifics")]
    pub honorifics: Vec<String>,
    /// Canonical-key fixups for known cross-feed misspellings.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_strip_prefixes() -> Vec<String> {
    vec!["will".to_string(), "wil".to_string()]
}

fn default_suffix_markers() -> Vec<String> {
    vec![" be the".to_string(), " for ".to_string(), " win".to_string()]
}

fn default_honorifics() -> Vec<String> {
    vec!["dr.".to_string()]
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            strip_prefixes: default_strip_prefixes(),
            suffix_markers: default_suffix_markers(),
            honorifics: default_honorifics(),
            aliases: HashMap::new(),
        }
    }
}

impl From<NormalizerConfig> for Normalizer {
    fn from(config: NormalizerConfig) -> Self {
        Self::new(
            config.strip_prefixes,
            config.suffix_markers,
            config.honorifics,
            config.aliases,
        )
    }
}

/// Rules for reducing feed labels to canonical entity keys and cleaned
/// display names.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Leading words stripped together with their trailing whitespace.
    strip_prefixes: Vec<String>,
    /// Markers that end the entity name; the label is cut at the first one
    /// found. Each must start with a space so names are only cut at word
    /// boundaries.
    suffix_markers: Vec<String>,
    /// Leading titles stripped from canonical keys but kept for display.
    honorifics: Vec<String>,
    /// Canonical-key fixups for known cross-feed misspellings.
    aliases: HashMap<String, String>,
}

impl Normalizer {
    pub fn new(
        strip_prefixes: Vec<String>,
        suffix_markers: Vec<String>,
        honorifics: Vec<String>,
        aliases: HashMap<String, String>,
    ) -> Self {
        Self {
            strip_prefixes: strip_prefixes.iter().map(|p| p.to_lowercase()).collect(),
            suffix_markers: suffix_markers.iter().map(|m| m.to_lowercase()).collect(),
            honorifics: honorifics.iter().map(|h| h.to_lowercase()).collect(),
            aliases: aliases
                .into_iter()
                .map(|(from, to)| (from.to_lowercase(), to.to_lowercase()))
                .collect(),
        }
    }

    /// Reduce a raw feed label to the canonical entity key used for fusion.
    ///
    /// Returns an empty string when nothing survives; callers skip those.
    pub fn canonical_key(&self, label: &str) -> String {
        let mut key = collapse_whitespace(&label.to_lowercase());

        for prefix in &self.strip_prefixes {
            if let Some(rest) = strip_word_prefix(&key, prefix) {
                key = rest.to_string();
            }
        }

        if let Some(cut) = self.earliest_marker(&key) {
            key.truncate(cut);
        }

        key = key.replace('?', "");

        for honorific in &self.honorifics {
            if let Some(rest) = key.strip_prefix(honorific.as_str()) {
                key = rest.trim_start().to_string();
            }
        }

        let key = collapse_whitespace(&key);
        match self.aliases.get(&key) {
            Some(canonical) => canonical.clone(),
            None => key,
        }
    }

    /// Clean a raw feed label for display, preserving its original casing
    /// (honorifics and spelling included).
    pub fn display_name(&self, label: &str) -> String {
        let mut name = collapse_whitespace(label);

        for prefix in &self.strip_prefixes {
            if let Some(rest) = strip_word_prefix_ignore_case(&name, prefix) {
                name = rest.to_string();
            }
        }

        if let Some(cut) = self
            .suffix_markers
            .iter()
            .filter_map(|m| find_ignore_ascii_case(&name, m))
            .min()
        {
            name.truncate(cut);
        }

        collapse_whitespace(&name.replace('?', ""))
    }

    fn earliest_marker(&self, key: &str) -> Option<usize> {
        self.suffix_markers
            .iter()
            .filter_map(|marker| key.find(marker.as_str()))
            .min()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        NormalizerConfig::default().into()
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip `prefix` followed by whitespace from an already-lowercased string.
fn strip_word_prefix<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    let trimmed = rest.strip_prefix(' ')?;
    Some(trimmed)
}

/// Case-insensitive variant working on the original-cased string.
fn strip_word_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    text[prefix.len()..].strip_prefix(' ')
}

/// Find the first ASCII-case-insensitive occurrence of `needle`.
///
/// Markers start with a space, so a returned offset is always a valid char
/// boundary for truncation.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.is_empty() || hay.len() < pat.len() {
        return None;
    }
    (0..=hay.len() - pat.len()).find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer_with_alias() -> Normalizer {
        let mut aliases = HashMap::new();
        aliases.insert(
            "kat abughazaleh".to_string(),
            "kat abugazaleh".to_string(),
        );
        Normalizer::new(
            vec!["will".to_string(), "wil".to_string()],
            vec![" be the".to_string(), " for ".to_string(), " win".to_string()],
            vec!["dr.".to_string()],
            aliases,
        )
    }

    #[test]
    fn test_canonical_strips_question_phrasing() {
        let n = Normalizer::default();
        assert_eq!(n.canonical_key("Will Jane Doe win the primary?"), "jane doe");
        assert_eq!(n.canonical_key("Wil Jane Doe be the nominee?"), "jane doe");
        assert_eq!(n.canonical_key("Jane Doe for District 9"), "jane doe");
        assert_eq!(n.canonical_key("JANE   DOE"), "jane doe");
    }

    #[test]
    fn test_canonical_strips_honorific() {
        let n = Normalizer::default();
        assert_eq!(n.canonical_key("Dr. Jane Doe"), "jane doe");
    }

    #[test]
    fn test_canonical_applies_alias_after_cleaning() {
        let n = normalizer_with_alias();
        assert_eq!(
            n.canonical_key("Will Kat Abughazaleh win the primary?"),
            "kat abugazaleh"
        );
        // The correctly spelled form maps to the same key.
        assert_eq!(n.canonical_key("Kat Abugazaleh"), "kat abugazaleh");
    }

    #[test]
    fn test_display_keeps_casing_and_honorific() {
        let n = Normalizer::default();
        assert_eq!(n.display_name("Will Jane Doe win the primary?"), "Jane Doe");
        assert_eq!(n.display_name("Dr. Jane Doe for District 9"), "Dr. Jane Doe");
    }

    #[test]
    fn test_display_ignores_alias_table() {
        let n = normalizer_with_alias();
        assert_eq!(n.display_name("Kat Abughazaleh"), "Kat Abughazaleh");
    }

    #[test]
    fn test_empty_and_degenerate_labels() {
        let n = Normalizer::default();
        assert_eq!(n.canonical_key(""), "");
        assert_eq!(n.canonical_key("Will ?"), "");
        assert_eq!(n.display_name("   "), "");
    }
}
