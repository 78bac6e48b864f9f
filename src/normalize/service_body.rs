/*
 * src/normalize/service_body.rs
 *
 * File for the Service Body Normalizer
 *
 * Purpose:
 *   Validate a single raw GetServiceBodies record into a canonical shape the
 *   store can upsert. Parent linkage is resolved by source_id in a second
 *   pass by the caller, since a
 *   service body's parent may not have been seen yet within the same batch.
 */

use serde_json::Value as Json;

use super::{get_optional_str, get_required_str, NormResult};

#[derive(Debug, Clone)]
pub struct CanonicalServiceBody {
    pub source_id: i64,
    pub parent_source_id: Option<i64>,
    pub name: String,
    pub r#type: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub helpline: Option<String>,
    pub world_id: Option<String>,
}

pub fn validate(raw: &Json) -> NormResult<CanonicalServiceBody> {
    let source_id = super::get_int(raw, "id")?;
    let name = get_required_str(raw, "name")?;

    let parent_source_id = match super::get_int(raw, "parent_id") {
        Ok(0) => None,
        Ok(v) => Some(v),
        Err(_) => None,
    };

    Ok(CanonicalServiceBody {
        source_id,
        parent_source_id,
        name,
        r#type: get_optional_str(raw, "type"),
        description: get_optional_str(raw, "description"),
        url: get_optional_str(raw, "url"),
        helpline: get_optional_str(raw, "helpline"),
        world_id: get_optional_str(raw, "world_id"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_missing_name() {
        let raw = json!({"id": "1", "parent_id": "0"});
        assert!(validate(&raw).is_err());
    }

    #[test]
    fn parent_id_zero_means_no_parent() {
        let raw = json!({"id": "1", "parent_id": "0", "name": "Area 51"});
        let sb = validate(&raw).unwrap();
        assert_eq!(sb.parent_source_id, None);
    }

    #[test]
    fn keeps_nonzero_parent_id() {
        let raw = json!({"id": "5", "parent_id": "2", "name": "District 5"});
        let sb = validate(&raw).unwrap();
        assert_eq!(sb.parent_source_id, Some(2));
    }
}
