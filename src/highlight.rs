use regex::{Regex, RegexBuilder};

/// Case-insensitive matcher for the dashboard search term, used to
/// highlight matches in filter names and locations.
pub fn build_highlight_regex(term: &str) -> Option<Regex> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Splits `text` into `(fragment, is_match)` runs.
pub fn split_matches<'t>(text: &'t str, regex: Option<&Regex>) -> Vec<(&'t str, bool)> {
    let Some(regex) = regex else {
        return vec![(text, false)];
    };
    let mut runs = Vec::new();
    let mut cursor = 0;
    for found in regex.find_iter(text) {
        if found.start() > cursor {
            runs.push((&text[cursor..found.start()], false));
        }
        runs.push((found.as_str(), true));
        cursor = found.end();
    }
    if cursor < text.len() {
        runs.push((&text[cursor..], false));
    }
    runs
}
