//! Mirror REST API types.

use certledger_core::TransactionStatus;
use serde::{Deserialize, Serialize};

/// The mirror's view of a transaction.
///
/// Only the fields this system reads are typed; the mirror returns many more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorTransaction {
    /// Transaction id in mirror form (`0.0.1001-1700000000-123456789`).
    pub transaction_id: String,
    /// Consensus timestamp (`seconds.nanos`).
    pub consensus_timestamp: String,
    /// Base64 transaction hash.
    #[serde(default)]
    pub transaction_hash: Option<String>,
    /// Fee charged, in tinybars.
    #[serde(default)]
    pub charged_tx_fee: Option<i64>,
    /// Result code (`SUCCESS` or a failure code).
    pub result: String,
    /// Transaction type name (`TOKENMINT`, `CONSENSUSSUBMITMESSAGE`, ...).
    #[serde(default)]
    pub name: Option<String>,
    /// Hbar transfers.
    #[serde(default)]
    pub transfers: Vec<MirrorTransfer>,
}

impl MirrorTransaction {
    /// Whether the ledger accepted the transaction.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result == "SUCCESS"
    }

    /// Terminal local status implied by this record.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        TransactionStatus::from_mirror_result(&self.result)
    }
}

/// A single hbar transfer within a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorTransfer {
    /// Account id.
    pub account: String,
    /// Signed amount in tinybars.
    pub amount: i64,
    /// Whether an allowance was used.
    #[serde(default)]
    pub is_approval: Option<bool>,
}

/// A message from a consensus topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorTopicMessage {
    /// Consensus timestamp (`seconds.nanos`).
    pub consensus_timestamp: String,
    /// Topic id.
    pub topic_id: String,
    /// Base64 message payload.
    pub message: String,
    /// Base64 running hash after this message.
    #[serde(default)]
    pub running_hash: Option<String>,
    /// Position in the topic, starting at 1.
    pub sequence_number: u64,
    /// Account that paid for the submission.
    #[serde(default)]
    pub payer_account_id: Option<String>,
}

/// Pagination links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    /// Relative URL of the next page, if any.
    #[serde(default)]
    pub next: Option<String>,
}

/// `GET /api/v1/transactions/...` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsResponse {
    /// Matching transactions.
    #[serde(default)]
    pub transactions: Vec<MirrorTransaction>,
    /// Pagination links.
    #[serde(default)]
    pub links: Links,
}

/// `GET /api/v1/topics/{id}/messages` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMessagesResponse {
    /// Messages in the requested window.
    #[serde(default)]
    pub messages: Vec<MirrorTopicMessage>,
    /// Pagination links.
    #[serde(default)]
    pub links: Links,
}

/// Filters for topic message queries.
///
/// `sequence_number` and `timestamp` accept the mirror's operator syntax,
/// e.g. `gt:10` or `gte:1700000000.000000000`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicMessageQuery {
    /// Page size.
    pub limit: Option<u32>,
    /// Sequence number filter.
    pub sequence_number: Option<String>,
    /// Consensus timestamp filter.
    pub timestamp: Option<String>,
}

impl TopicMessageQuery {
    pub(crate) fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(sequence_number) = &self.sequence_number {
            params.push(("sequencenumber", sequence_number.clone()));
        }
        if let Some(timestamp) = &self.timestamp {
            params.push(("timestamp", timestamp.clone()));
        }
        params
    }
}

/// Filters for account transaction history queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountTransactionQuery {
    /// Page size.
    pub limit: Option<u32>,
    /// Mirror transaction type (e.g. `TOKENMINT`).
    pub transaction_type: Option<String>,
    /// Consensus timestamp filter.
    pub timestamp: Option<String>,
}

impl AccountTransactionQuery {
    pub(crate) fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(transaction_type) = &self.transaction_type {
            params.push(("transactiontype", transaction_type.clone()));
        }
        if let Some(timestamp) = &self.timestamp {
            params.push(("timestamp", timestamp.clone()));
        }
        params
    }
}

/// Result of a mirror health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorHealth {
    /// Whether the probe got a successful response in time.
    pub mirror_node_available: bool,
    /// Round-trip latency of a successful probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_node_latency_ms: Option<u64>,
}

impl MirrorHealth {
    /// A failed probe.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            mirror_node_available: false,
            mirror_node_latency_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_parses_mirror_payload() {
        let body = serde_json::json!({
            "transactions": [{
                "transaction_id": "0.0.1001-1700000000-123456789",
                "consensus_timestamp": "1700000005.000000000",
                "transaction_hash": "abc123",
                "charged_tx_fee": 85_000_000,
                "result": "SUCCESS",
                "name": "TOKENMINT",
                "node": "0.0.3",
                "transfers": [
                    {"account": "0.0.3", "amount": 1_000, "is_approval": false},
                    {"account": "0.0.1001", "amount": -1_000}
                ]
            }],
            "links": {"next": null}
        });

        let response: TransactionsResponse = serde_json::from_value(body).unwrap();
        let tx = &response.transactions[0];
        assert!(tx.is_success());
        assert_eq!(tx.status(), TransactionStatus::Success);
        assert_eq!(tx.transfers.len(), 2);
        assert_eq!(tx.charged_tx_fee, Some(85_000_000));
    }

    #[test]
    fn failed_result_maps_to_failed_status() {
        let tx: MirrorTransaction = serde_json::from_value(serde_json::json!({
            "transaction_id": "0.0.1001-1700000000-1",
            "consensus_timestamp": "1700000005.000000000",
            "result": "INVALID_SIGNATURE"
        }))
        .unwrap();
        assert_eq!(tx.status(), TransactionStatus::Failed);
        assert!(tx.transaction_hash.is_none());
    }

    #[test]
    fn topic_query_params_use_mirror_names() {
        let query = TopicMessageQuery {
            limit: Some(25),
            sequence_number: Some("gt:10".into()),
            timestamp: None,
        };
        assert_eq!(
            query.to_params(),
            vec![("limit", "25".to_string()), ("sequencenumber", "gt:10".to_string())]
        );
    }

    #[test]
    fn account_query_params_use_mirror_names() {
        let query = AccountTransactionQuery {
            limit: None,
            transaction_type: Some("TOKENMINT".into()),
            timestamp: Some("lt:1700000000".into()),
        };
        assert_eq!(
            query.to_params(),
            vec![
                ("transactiontype", "TOKENMINT".to_string()),
                ("timestamp", "lt:1700000000".to_string())
            ]
        );
    }
}
