/*
 * src/normalize/format.rs
 *
 * File for the Format Normalizer
 *
 * Purpose:
 *   Validate GetFormats records. A format is keyed by (root_server, source_id)
 *   and carries one TranslatedFormat row per language returned by upstream.
 */

use serde_json::Value as Json;

use super::{get_optional_str, get_required_str, NormResult};

#[derive(Debug, Clone)]
pub struct CanonicalFormat {
    pub source_id: i64,
    pub r#type: Option<String>,
    pub world_id: Option<String>,
    pub translations: Vec<CanonicalTranslation>,
}

#[derive(Debug, Clone)]
pub struct CanonicalTranslation {
    pub language: String,
    pub key_string: String,
    pub name: String,
    pub description: Option<String>,
}

/// A format record carries exactly one language per upstream response; the
/// import orchestrator merges repeated calls across `lang_enum` values into
/// one `CanonicalFormat.translations` list keyed by source_id.
pub fn validate(raw: &Json, language: &str) -> NormResult<CanonicalFormat> {
    let source_id = super::get_int(raw, "id")?;
    let key_string = get_required_str(raw, "key_string")?;
    let name = get_required_str(raw, "name_string")?;

    Ok(CanonicalFormat {
        source_id,
        r#type: get_optional_str(raw, "format_type"),
        world_id: get_optional_str(raw, "world_id"),
        translations: vec![CanonicalTranslation {
            language: language.to_string(),
            key_string,
            name,
            description: get_optional_str(raw, "description_string"),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_missing_key_string() {
        let raw = json!({"id": "1", "name_string": "Open"});
        assert!(validate(&raw, "en").is_err());
    }

    #[test]
    fn builds_single_translation_for_language() {
        let raw = json!({"id": "3", "key_string": "O", "name_string": "Open", "world_id": "BMLT_O"});
        let fmt = validate(&raw, "en").unwrap();
        assert_eq!(fmt.translations.len(), 1);
        assert_eq!(fmt.translations[0].language, "en");
        assert_eq!(fmt.translations[0].key_string, "O");
    }
}
