/*
 * src/query/params.rs
 *
 * File for the Query Parameter Multimap
 *
 * Purpose:
 *   Parse a raw query string into a multimap, and split signed-integer
 *   list parameters into include/exclude sets.
 */

#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(raw_query: &str) -> Self {
        let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(raw_query).unwrap_or_default();
        QueryParams { pairs }
    }

    /// `services[]` and `services` are treated as the same key so both
    /// scalar and indexed-list forms work.
    fn normalized_key(key: &str) -> String {
        key.trim_end_matches("[]").to_string()
    }

    pub fn all(&self, key: &str) -> Vec<&str> {
        let target = Self::normalized_key(key);
        self.pairs
            .iter()
            .filter(|(k, _)| Self::normalized_key(k) == target)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.all(key).into_iter().next()
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.first(key), Some("1") | Some("true"))
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.first(key).and_then(|v| v.parse().ok())
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        self.first(key).and_then(|v| v.parse().ok())
    }

    pub fn csv_list(&self, key: &str) -> Vec<String> {
        self.first(key)
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Splits an indexed-list parameter into `(included, excluded)` ids,
    /// where excluded ids are stored as positive magnitudes of the negative
    /// values supplied.
    pub fn signed_ids(&self, key: &str) -> (Vec<i64>, Vec<i64>) {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for raw in self.all(key) {
            if let Ok(v) = raw.parse::<i64>() {
                if v < 0 {
                    exclude.push(-v);
                } else {
                    include.push(v);
                }
            }
        }
        (include, exclude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_positive_and_negative_weekdays() {
        let qp = QueryParams::parse("weekdays[]=1&weekdays[]=-2&weekdays[]=3");
        let (include, exclude) = qp.signed_ids("weekdays");
        assert_eq!(include, vec![1, 3]);
        assert_eq!(exclude, vec![2]);
    }

    #[test]
    fn scalar_and_indexed_forms_share_a_key() {
        let qp = QueryParams::parse("root_server_ids=1&root_server_ids[]=2");
        assert_eq!(qp.all("root_server_ids"), vec!["1", "2"]);
    }

    #[test]
    fn flag_recognizes_one_and_true() {
        let qp = QueryParams::parse("recursive=1&parents=true");
        assert!(qp.flag("recursive"));
        assert!(qp.flag("parents"));
    }

    #[test]
    fn csv_list_trims_whitespace() {
        let qp = QueryParams::parse("data_field_key=a%2C%20b%2Cc");
        assert_eq!(qp.csv_list("data_field_key"), vec!["a", "b", "c"]);
    }
}
