/*
 * src/query/fulltext.rs
 *
 * File for the Full-Text Search Filter
 *
 * Purpose:
 *   Build a `tsquery`-compatible string from `SearchString`: drop words
 *   under three characters and the stopword "the", treat bare integers as
 *   additional meeting-id disjuncts, OR-combine tokens by default,
 *   AND-combine under `SearchStringAll=1`.
 */

const STOPWORDS: &[&str] = &["the"];
const MIN_TOKEN_LEN: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct TextSearch {
    pub tsquery: Option<String>,
    pub meeting_id_disjuncts: Vec<i64>,
    pub exact_substring: Option<String>,
}

/// `SearchStringExact=1` bypasses tokenization entirely: the raw string is
/// matched as a substring across the concatenated searchable fields.
pub fn build(search_string: &str, all_mode: bool, exact_mode: bool) -> TextSearch {
    if exact_mode {
        return TextSearch { exact_substring: Some(search_string.to_string()), ..Default::default() };
    }

    let mut words = Vec::new();
    let mut meeting_ids = Vec::new();

    for raw_token in search_string.split_whitespace() {
        let token: String = raw_token.chars().filter(|c| c.is_alphanumeric()).collect();
        if token.is_empty() {
            continue;
        }
        if let Ok(id) = token.parse::<i64>() {
            meeting_ids.push(id);
            continue;
        }
        let lower = token.to_lowercase();
        if lower.len() < MIN_TOKEN_LEN || STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        words.push(lower);
    }

    let tsquery = if words.is_empty() {
        None
    } else {
        let joiner = if all_mode { " & " } else { " | " };
        Some(words.join(joiner))
    };

    TextSearch { tsquery, meeting_id_disjuncts: meeting_ids, exact_substring: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_short_words_and_the_stopword() {
        let search = build("the cat in a hat", false, false);
        assert_eq!(search.tsquery.as_deref(), Some("cat | hat"));
    }

    #[test]
    fn and_mode_joins_with_ampersand() {
        let search = build("recovery meeting", true, false);
        assert_eq!(search.tsquery.as_deref(), Some("recovery & meeting"));
    }

    #[test]
    fn bare_integers_become_meeting_id_disjuncts() {
        let search = build("12345 downtown", false, false);
        assert_eq!(search.meeting_id_disjuncts, vec![12345]);
        assert_eq!(search.tsquery.as_deref(), Some("downtown"));
    }

    #[test]
    fn exact_mode_skips_tokenization() {
        let search = build("123 Main St", false, true);
        assert_eq!(search.exact_substring.as_deref(), Some("123 Main St"));
        assert!(search.tsquery.is_none());
    }
}
