/// Characters separating a main title from subtitles and attribution clauses.
const TITLE_DELIMITERS: &[char] = &[':', ';', '/', '\\'];

/// Extract the main title: everything before the leftmost delimiter, trimmed.
///
/// "Petri Lombardi Libri IV sententiarum / studio et cura pp." becomes
/// "Petri Lombardi Libri IV sententiarum". Titles without a delimiter are only
/// trimmed.
pub fn extract_primary_title(raw_title: &str) -> &str {
    match raw_title.find(TITLE_DELIMITERS) {
        Some(pos) => raw_title[..pos].trim(),
        None => raw_title.trim(),
    }
}
