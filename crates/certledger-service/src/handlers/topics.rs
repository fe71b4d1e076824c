//! Topic message lookup (service API key auth).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use certledger_core::AccountId;
use certledger_mirror::{TopicMessageQuery, TopicMessagesResponse};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Topic message query parameters, in the mirror's own syntax.
#[derive(Debug, Deserialize)]
pub struct TopicMessagesParams {
    /// Page size (default: 25, max: 100).
    pub limit: Option<u32>,
    /// Sequence number filter, e.g. `gt:10`.
    pub sequencenumber: Option<String>,
    /// Consensus timestamp filter, e.g. `gte:1700000000.000000000`.
    pub timestamp: Option<String>,
}

/// Fetch one page of messages from a consensus topic.
///
/// `links.next` in the response pages forward.
pub async fn list_topic_messages(
    State(state): State<Arc<AppState>>,
    _service: ServiceAuth,
    Path(topic_id): Path<String>,
    Query(params): Query<TopicMessagesParams>,
) -> Result<Json<TopicMessagesResponse>, ApiError> {
    // Topic ids share the shard.realm.num entity format.
    topic_id
        .parse::<AccountId>()
        .map_err(|_| ApiError::BadRequest(format!("invalid topic id: {topic_id}")))?;

    let query = TopicMessageQuery {
        limit: Some(params.limit.unwrap_or(25).clamp(1, 100)),
        sequence_number: params.sequencenumber,
        timestamp: params.timestamp,
    };

    let page = state.mirror.get_topic_messages_page(&topic_id, &query).await?;

    Ok(Json(page))
}
