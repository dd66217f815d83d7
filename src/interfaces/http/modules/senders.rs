//! Sender interface: paginated listing of locally owned objects

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::ensure_version;
use crate::application::{SynchronizerFor, Synchronizers};
use crate::domain::SyncEntity;
use crate::interfaces::http::common::{ApiResult, Paged};
use crate::interfaces::http::router::AppState;
use crate::shared::pagination::PageRequest;
use crate::shared::validations::validate_pagination;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

pub async fn list_objects<T: SyncEntity>(
    State(state): State<AppState>,
    Path(version): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Paged<Value>>
where
    Synchronizers: SynchronizerFor<T>,
{
    ensure_version(&state.identity, &version)?;
    let (offset, limit) = validate_pagination(params.offset, params.limit);
    let page = state
        .synchronizers
        .get::<T>()
        .list_local(params.date_from, params.date_to, PageRequest::new(offset, limit))
        .await?;

    let next = page.has_more().then(|| {
        let mut url = format!(
            "{}?offset={}&limit={}",
            state.identity.module_url(&version, T::MODULE),
            offset + page.items.len() as u64,
            limit
        );
        if let Some(from) = params.date_from {
            url.push_str(&format!("&date_from={}", from.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)));
        }
        if let Some(to) = params.date_to {
            url.push_str(&format!("&date_to={}", to.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)));
        }
        url
    });

    Ok(Paged {
        items: page.items,
        total: page.total,
        limit,
        next,
    })
}
