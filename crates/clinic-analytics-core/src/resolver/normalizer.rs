//! Phone and name normalization for identity resolution.
//!
//! Handles:
//! - Phone reshaping to international form (best effort, never rejects)
//! - Display names (trimmed, collapsed, capitalized)
//! - Comparison keys (display name without diacritics, lowercased)

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Phone numbering plan the normalizer is tuned to.
///
/// Numbers outside this plan are only stripped to digits and given a `+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingPlan {
    /// International country code, e.g. "54"
    pub country_code: String,
    /// Digit inserted after the country code for mobile numbers, e.g. "9"
    pub mobile_indicator: String,
    /// Redundant long-distance prefix sometimes typed after the mobile indicator
    pub trunk_prefix: String,
    /// Length of a national mobile number (area code + subscriber)
    pub national_length: usize,
    /// Leading digits a national mobile number may start with
    pub national_leading_digits: Vec<char>,
}

impl NumberingPlan {
    /// Argentine mobile numbering: +54 9 <area><subscriber>, 10 national digits.
    pub fn argentina() -> Self {
        Self {
            country_code: "54".into(),
            mobile_indicator: "9".into(),
            trunk_prefix: "0".into(),
            national_length: 10,
            national_leading_digits: vec!['1', '2', '3'],
        }
    }

    fn mobile_prefix(&self) -> String {
        format!("{}{}", self.country_code, self.mobile_indicator)
    }

    fn is_national_mobile(&self, digits: &str) -> bool {
        digits.len() == self.national_length
            && digits
                .chars()
                .next()
                .is_some_and(|c| self.national_leading_digits.contains(&c))
    }
}

impl Default for NumberingPlan {
    fn default() -> Self {
        Self::argentina()
    }
}

/// Normalizer for the identity parts of a visit.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    plan: NumberingPlan,
}

impl Normalizer {
    /// Create a normalizer for the default numbering plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a normalizer for a specific numbering plan.
    pub fn with_plan(plan: NumberingPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &NumberingPlan {
        &self.plan
    }

    /// Canonicalize a phone number to international form.
    ///
    /// Rules apply in order, first match wins. Idempotent.
    pub fn normalize_phone(&self, raw: &str) -> String {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return raw.trim().to_string();
        }

        let mobile_prefix = self.plan.mobile_prefix();

        // Bare national mobile number
        if self.plan.is_national_mobile(&digits) {
            return format!("+{}{}", mobile_prefix, digits);
        }

        // Mobile prefix followed by a redundant trunk prefix
        if let Some(national) = digits
            .strip_prefix(mobile_prefix.as_str())
            .and_then(|rest| rest.strip_prefix(self.plan.trunk_prefix.as_str()))
        {
            if national.len() == self.plan.national_length {
                return format!("+{}{}", mobile_prefix, national);
            }
        }

        // Already carries the mobile prefix, or foreign: digits only, never reshaped further
        format!("+{}", digits)
    }

    /// Display-quality name: trimmed, edge punctuation removed, whitespace
    /// collapsed, each word capitalized. Idempotent.
    pub fn display_name(&self, raw: &str) -> String {
        let trimmed = raw.trim_matches(|c: char| !c.is_alphanumeric());

        trimmed
            .split_whitespace()
            .map(capitalize_word)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Comparison key for a name: display name, diacritics removed, lowercased.
    pub fn canonical_name(&self, raw: &str) -> String {
        strip_diacritics(&self.display_name(raw)).to_lowercase()
    }

    /// Grouping key for a patient identity.
    pub fn patient_key(&self, raw_name: &str, raw_phone: &str) -> String {
        format!(
            "{}|{}",
            self.canonical_name(raw_name),
            self.normalize_phone(raw_phone)
        )
    }
}

/// Uppercase the first letter when it has a single-char uppercase form
/// ("ß" stays as is), lowercase the rest.
fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut upper = first.to_uppercase();
    let head = match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => first,
    };

    std::iter::once(head)
        .chain(chars.flat_map(char::to_lowercase))
        .collect()
}

/// Remove combining marks after canonical decomposition ("José" → "Jose").
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_national_mobile_gets_prefix() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.normalize_phone("1122334455"), "+5491122334455");
        assert_eq!(normalizer.normalize_phone("11 2233-4455"), "+5491122334455");
        assert_eq!(normalizer.normalize_phone("(351) 555-1234"), "+5493515551234");
    }

    #[test]
    fn test_redundant_trunk_prefix_stripped() {
        let normalizer = Normalizer::new();
        assert_eq!(normalizer.normalize_phone("54 9 0 11 2233 4455"), "+5491122334455");
    }

    #[test]
    fn test_already_international() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.normalize_phone("+54 9 11 2233 4455"), "+5491122334455");
        assert_eq!(normalizer.normalize_phone("5491122334455"), "+5491122334455");
    }

    #[test]
    fn test_foreign_numbers_only_get_plus() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.normalize_phone("+1 (415) 555-0100"), "+14155550100");
        // Leading zero: not a national mobile number, left alone
        assert_eq!(normalizer.normalize_phone("0111234567"), "+0111234567");
    }

    #[test]
    fn test_phone_without_digits_is_kept() {
        let normalizer = Normalizer::new();
        assert_eq!(normalizer.normalize_phone("  sin teléfono "), "sin teléfono");
    }

    #[test]
    fn test_display_name() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.display_name("  ana   garcía "), "Ana García");
        assert_eq!(normalizer.display_name("-- JOSÉ pérez."), "José Pérez");
        assert_eq!(normalizer.display_name("maría de los ángeles"), "María De Los Ángeles");
        assert_eq!(normalizer.display_name("***"), "");
    }

    #[test]
    fn test_display_name_keeps_letters_without_single_uppercase() {
        let normalizer = Normalizer::new();

        let once = normalizer.display_name("ßanchez ŉoa");
        assert_eq!(once, "ßanchez ŉoa");
        assert_eq!(normalizer.display_name(&once), once);
        assert_eq!(normalizer.display_name("STRAßE"), "Straße");
    }

    #[test]
    fn test_canonical_name_ignores_case_and_accents() {
        let normalizer = Normalizer::new();

        let a = normalizer.canonical_name("José Pérez");
        let b = normalizer.canonical_name("jose perez");
        let c = normalizer.canonical_name("JOSÉ PÉREZ");

        assert_eq!(a, "jose perez");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(normalizer.canonical_name("Muñoz"), "munoz");
    }

    #[test]
    fn test_patient_key() {
        let normalizer = Normalizer::new();
        assert_eq!(
            normalizer.patient_key(" José Pérez ", "11 2233 4455"),
            "jose perez|+5491122334455"
        );
    }

    proptest! {
        #[test]
        fn prop_phone_normalization_idempotent(raw in "[+]?[0-9 ()-]{0,20}") {
            let normalizer = Normalizer::new();
            let once = normalizer.normalize_phone(&raw);
            prop_assert_eq!(normalizer.normalize_phone(&once), once);
        }

        #[test]
        fn prop_display_name_idempotent(raw in "[ a-zA-ZáéíóúñÁÉÍÓÚÑßŉ.,-]{0,30}") {
            let normalizer = Normalizer::new();
            let once = normalizer.display_name(&raw);
            prop_assert_eq!(normalizer.display_name(&once), once);
        }

        #[test]
        fn prop_canonical_name_idempotent(raw in "[ a-zA-ZáéíóúñÁÉÍÓÚÑßŉ.,-]{0,30}") {
            let normalizer = Normalizer::new();
            let once = normalizer.canonical_name(&raw);
            prop_assert_eq!(normalizer.canonical_name(&once), once);
        }
    }
}
