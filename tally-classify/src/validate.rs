//! Checks a generator's reply against the closed category set.

use tally_core::Category;

use crate::classifier::ClassifyError;

/// Echoes of the prompt's markers a model sometimes repeats before the label.
const ECHO_PREFIXES: [&str; 4] = ["saída:", "categoria:", "output:", "category:"];

/// Parse a reply into a category; `None` when it is not exactly one label.
pub fn parse_label(raw: &str) -> Option<Category> {
    let mut s = raw.trim();
    if s.is_empty() || s.contains('\n') {
        return None;
    }

    for prefix in ECHO_PREFIXES {
        if s.len() >= prefix.len()
            && s.is_char_boundary(prefix.len())
            && s[..prefix.len()].to_lowercase() == prefix
        {
            s = s[prefix.len()..].trim_start();
            break;
        }
    }

    let s = s
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '.' | '!'))
        .trim();

    let wanted = s.to_lowercase();
    Category::ALL
        .into_iter()
        .find(|c| c.label().to_lowercase() == wanted)
}

/// Category for a reply. Empty and off-list replies are errors; the
/// classifier turns them into the sentinel.
pub fn validate_response(raw: &str) -> Result<Category, ClassifyError> {
    if raw.trim().is_empty() {
        return Err(ClassifyError::Empty);
    }
    parse_label(raw).ok_or_else(|| ClassifyError::OffList(raw.to_string()))
}
