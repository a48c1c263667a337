//! MARC language code lookup
//!
//! Bundled subset of the MARC code list covering the languages seen in
//! practice; both directions of the lookup are case-insensitive on
//! input. English is the repository default.

pub const DEFAULT_CODE: &str = "eng";
pub const DEFAULT_NAME: &str = "English";

// (code, display name), sorted by code
static LANGUAGES: &[(&str, &str)] = &[
    ("ara", "Arabic"),
    ("chi", "Chinese"),
    ("cze", "Czech"),
    ("dan", "Danish"),
    ("dut", "Dutch"),
    ("eng", "English"),
    ("fin", "Finnish"),
    ("fre", "French"),
    ("ger", "German"),
    ("gre", "Greek, Modern"),
    ("heb", "Hebrew"),
    ("hin", "Hindi"),
    ("hun", "Hungarian"),
    ("ita", "Italian"),
    ("jpn", "Japanese"),
    ("kor", "Korean"),
    ("lat", "Latin"),
    ("nor", "Norwegian"),
    ("pol", "Polish"),
    ("por", "Portuguese"),
    ("rum", "Romanian"),
    ("rus", "Russian"),
    ("spa", "Spanish"),
    ("swe", "Swedish"),
    ("tur", "Turkish"),
    ("ukr", "Ukrainian"),
    ("vie", "Vietnamese"),
];

/// Display name for a MARC code, None when unknown
pub fn name_for_code(code: &str) -> Option<&'static str> {
    let code = code.to_ascii_lowercase();
    LANGUAGES
        .binary_search_by(|(c, _)| c.cmp(&code.as_str()))
        .ok()
        .map(|i| LANGUAGES[i].1)
}

/// MARC code for a display name, None when unknown
pub fn code_for_name(name: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(c, _)| *c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_directions() {
        assert_eq!(name_for_code("eng"), Some("English"));
        assert_eq!(name_for_code("GER"), Some("German"));
        assert_eq!(code_for_name("french"), Some("fre"));
        assert_eq!(name_for_code("xxx"), None);
        assert_eq!(code_for_name("Klingon"), None);
    }

    #[test]
    fn test_table_sorted_for_binary_search() {
        for pair in LANGUAGES.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }
}
