// src/ingest/mod.rs
pub mod cache;
pub mod providers;
pub mod types;

use serde::Deserialize;

use crate::error::FetchError;
use crate::ingest::types::FeedItem;

/// Provider envelope: `{"results": [ {...}, ... ]}`. Extra top-level fields are ignored.
#[derive(Debug, Deserialize)]
struct Envelope {
    results: Vec<FeedItem>,
}

/// Decode a provider body into its item list. Any other shape is a fetch error,
/// including a `results` array containing non-object entries.
pub fn parse_feed_body(body: &[u8]) -> Result<Vec<FeedItem>, FetchError> {
    serde_json::from_slice::<Envelope>(body)
        .map(|env| env.results)
        .map_err(|e| FetchError::new(format!("malformed provider body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_results_array() {
        let body = br#"{"status":"OK","num_results":2,"results":[
            {"title":"a","des_facet":["Politics"]},
            {"title":"b","des_facet":""}
        ]}"#;
        let items = parse_feed_body(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].descriptive_tags(), vec!["Politics"]);
        assert!(items[1].descriptive_tags().is_empty());
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(parse_feed_body(br#"{"fault":"bad key"}"#).is_err());
        assert!(parse_feed_body(br#"{"results":[1,2,3]}"#).is_err());
        assert!(parse_feed_body(b"<html>").is_err());
    }
}
