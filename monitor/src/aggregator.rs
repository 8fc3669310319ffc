//! Merges registry metadata with probe results

use serde::Serialize;
use shared::{Endpoint, StatusResult};

/// One row of a probe cycle, as handed to consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedRecord {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    #[serde(flatten)]
    pub status: StatusResult,
}

impl AggregatedRecord {
    /// Advertised name, or `host:port` when the server did not answer
    pub fn display_name(&self) -> String {
        match &self.status.hostname {
            Some(hostname) => hostname.clone(),
            None => self.endpoint.address(),
        }
    }

    pub fn players(&self) -> u16 {
        self.status.players_or_zero()
    }

    pub fn max_players(&self) -> u16 {
        self.status.max_players_or_zero()
    }
}

/// Pairs each endpoint with the result at the same index.
///
/// The scheduler always returns one result per endpoint; a short `results`
/// would be a bug, and any missing tail is reported offline.
pub fn aggregate(endpoints: &[Endpoint], results: Vec<StatusResult>) -> Vec<AggregatedRecord> {
    debug_assert_eq!(endpoints.len(), results.len());

    let mut results = results.into_iter();
    endpoints
        .iter()
        .map(|endpoint| AggregatedRecord {
            endpoint: endpoint.clone(),
            status: results.next().unwrap_or_else(StatusResult::offline),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::InfoReply;

    #[test]
    fn test_aggregate_preserves_order_and_metadata() {
        let endpoints = vec![
            Endpoint::new("10.0.0.1", 7777, "alice"),
            Endpoint::new("10.0.0.2", 7777, "bob"),
        ];
        let results = vec![
            StatusResult::offline(),
            StatusResult::from(InfoReply::new("Bob's Place", 4, 20)),
        ];

        let records = aggregate(&endpoints, results);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].endpoint.added_by, "alice");
        assert!(!records[0].status.online);
        assert_eq!(records[1].endpoint.added_by, "bob");
        assert_eq!(records[1].display_name(), "Bob's Place");
        assert_eq!(records[1].players(), 4);
        assert_eq!(records[1].max_players(), 20);
    }

    #[test]
    fn test_offline_record_defaults() {
        let records = aggregate(
            &[Endpoint::new("203.0.113.5", 7777, "alice")],
            vec![StatusResult::offline()],
        );

        assert_eq!(records[0].display_name(), "203.0.113.5:7777");
        assert_eq!(records[0].players(), 0);
        assert_eq!(records[0].max_players(), 0);
    }

    #[test]
    fn test_record_serializes_flat() {
        let records = aggregate(
            &[Endpoint::new("203.0.113.5", 7777, "alice")],
            vec![StatusResult::from(InfoReply::new("Test Server", 5, 32))],
        );

        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["host"], "203.0.113.5");
        assert_eq!(json["port"], 7777);
        assert_eq!(json["added_by"], "alice");
        assert_eq!(json["online"], true);
        assert_eq!(json["hostname"], "Test Server");
        assert_eq!(json["players"], 5);
        assert_eq!(json["max_players"], 32);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(aggregate(&[], Vec::new()).is_empty());
    }
}
