//! Mirror REST client implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use certledger_core::{AccountId, Network, TransactionId};
use reqwest::{Client, StatusCode};

use crate::error::MirrorError;
use crate::query::MirrorQuery;
use crate::types::{
    AccountTransactionQuery, MirrorHealth, MirrorTopicMessage, MirrorTransaction,
    TopicMessageQuery, TopicMessagesResponse, TransactionsResponse,
};

/// Longest error body kept in [`MirrorError::Api`].
const MAX_ERROR_BODY: usize = 512;

/// Mirror REST API client for one network.
#[derive(Debug, Clone)]
pub struct MirrorClient {
    client: Client,
    base_url: String,
    network: Network,
    health_timeout: Duration,
}

impl MirrorClient {
    /// Create a client for the network's public mirror with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(network: Network) -> Result<Self, MirrorError> {
        Self::with_options(network, MirrorOptions::default())
    }

    /// Create a client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(network: Network, options: MirrorOptions) -> Result<Self, MirrorError> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| MirrorError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let base_url = options
            .base_url
            .unwrap_or_else(|| network.mirror_base_url().to_string());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            network,
            health_timeout: options.health_timeout,
        })
    }

    /// Base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of topic messages, including the link to the next page.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status or a malformed body.
    pub async fn get_topic_messages_page(
        &self,
        topic_id: &str,
        query: &TopicMessageQuery,
    ) -> Result<TopicMessagesResponse, MirrorError> {
        let url = format!("{}/api/v1/topics/{}/messages", self.base_url, topic_id);
        self.get_json(&url, &query.to_params()).await
    }

    /// Fetch messages from a consensus topic.
    ///
    /// Topic sync is advisory: any failure yields an empty list.
    pub async fn get_topic_messages(
        &self,
        topic_id: &str,
        query: &TopicMessageQuery,
    ) -> Vec<MirrorTopicMessage> {
        match self.get_topic_messages_page(topic_id, query).await {
            Ok(response) => response.messages,
            Err(e) => {
                tracing::warn!(topic_id = %topic_id, error = %e, "Failed to fetch topic messages");
                Vec::new()
            }
        }
    }

    /// Fetch an account's transaction history.
    ///
    /// Any failure yields an empty list.
    pub async fn get_account_transactions(
        &self,
        account_id: &AccountId,
        query: &AccountTransactionQuery,
    ) -> Vec<MirrorTransaction> {
        let url = format!("{}/api/v1/accounts/{}/transactions", self.base_url, account_id);

        match self
            .get_json::<TransactionsResponse>(&url, &query.to_params())
            .await
        {
            Ok(response) => response.transactions,
            Err(e) => {
                tracing::warn!(
                    account_id = %account_id,
                    error = %e,
                    "Failed to fetch account transactions"
                );
                Vec::new()
            }
        }
    }

    /// GET a JSON document, treating every non-2xx status as an error.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, MirrorError> {
        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(api_error(response).await);
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl MirrorQuery for MirrorClient {
    fn network(&self) -> Network {
        self.network
    }

    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<MirrorTransaction>, MirrorError> {
        let url = format!(
            "{}/api/v1/transactions/{}",
            self.base_url,
            transaction_id.to_mirror_format()
        );

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                // Timeouts and connection failures look the same as "not propagated yet".
                tracing::debug!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "Mirror request did not complete"
                );
                return Ok(None);
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(api_error(response).await);
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "Mirror response body did not complete"
                );
                return Ok(None);
            }
        };

        match serde_json::from_slice::<TransactionsResponse>(&bytes) {
            Ok(body) => Ok(body.transactions.into_iter().next()),
            Err(e) => {
                tracing::warn!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "Malformed mirror transaction response"
                );
                Ok(None)
            }
        }
    }

    async fn check_health(&self) -> MirrorHealth {
        let url = format!("{}/api/v1/network/supply", self.base_url);
        let started = Instant::now();

        match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => MirrorHealth {
                mirror_node_available: true,
                mirror_node_latency_ms: Some(
                    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                ),
            },
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Mirror health probe failed");
                MirrorHealth::unavailable()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Mirror health probe failed");
                MirrorHealth::unavailable()
            }
        }
    }
}

/// Convert a non-success response into [`MirrorError::Api`].
async fn api_error(response: reqwest::Response) -> MirrorError {
    let status = response.status().as_u16();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    MirrorError::Api { status, body }
}

/// Mirror client options.
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Override for the network's public mirror URL (private mirrors, tests).
    pub base_url: Option<String>,
    /// Timeout for query requests (default: 30s).
    pub request_timeout: Duration,
    /// Timeout for health probes (default: 5s).
    pub health_timeout: Duration,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl MirrorOptions {
    /// Options pointing at a specific base URL.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }
}
