// src/pipeline/extract.rs

//! Projection of raw log records into endpoint observations.

use std::collections::HashMap;

use crate::models::{EndpointObservation, LogRecord};

/// Collapse records into one observation per PDS URL.
///
/// Records without a well-formed PDS descriptor or without `createdAt` are
/// dropped. For a repeated URL the last qualifying record wins; output keeps
/// first-seen order so later sorting is deterministic.
pub fn extract_endpoints(records: &[LogRecord]) -> Vec<EndpointObservation> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut observations: Vec<EndpointObservation> = Vec::new();

    for record in records {
        let (Some(url), Some(created_at)) = (record.pds_endpoint(), record.created_at) else {
            continue;
        };

        match positions.get(url) {
            Some(&index) => observations[index].created_at = created_at,
            None => {
                positions.insert(url, observations.len());
                observations.push(EndpointObservation {
                    url: url.to_string(),
                    created_at,
                });
            }
        }
    }

    observations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: Option<&str>, created_at: Option<&str>) -> LogRecord {
        let mut json = serde_json::json!({});
        if let Some(created_at) = created_at {
            json["createdAt"] = created_at.into();
        }
        if let Some(url) = url {
            json["operation"] = serde_json::json!({
                "services": {
                    "atproto_pds": {"type": "AtprotoPersonalDataServer", "endpoint": url}
                }
            });
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_last_record_wins_per_url() {
        let records = vec![
            record(Some("https://a.example"), Some("2024-01-01T00:00:01Z")),
            record(Some("https://b.example"), Some("2024-01-01T00:00:02Z")),
            record(Some("https://a.example"), Some("2024-01-01T00:00:03Z")),
        ];

        let observations = extract_endpoints(&records);

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].url, "https://a.example");
        assert_eq!(
            observations[0].created_at.to_rfc3339(),
            "2024-01-01T00:00:03+00:00"
        );
        assert_eq!(observations[1].url, "https://b.example");
    }

    #[test]
    fn test_later_but_older_timestamp_still_wins() {
        let records = vec![
            record(Some("https://a.example"), Some("2024-01-01T00:00:05Z")),
            record(Some("https://a.example"), Some("2024-01-01T00:00:02Z")),
        ];

        let observations = extract_endpoints(&records);

        assert_eq!(
            observations[0].created_at.to_rfc3339(),
            "2024-01-01T00:00:02+00:00"
        );
    }

    #[test]
    fn test_irrelevant_records_are_filtered() {
        let records = vec![
            record(None, Some("2024-01-01T00:00:01Z")),
            record(Some("https://a.example"), None),
            record(Some(""), Some("2024-01-01T00:00:01Z")),
            record(Some("https://b.example"), Some("2024-01-01T00:00:01Z")),
        ];

        let observations = extract_endpoints(&records);

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].url, "https://b.example");
    }
}
