//! Paged reads from a remote sender interface
//!
//! A `PageReader` yields one page per `next_page` call. State only advances
//! after a page was received, so a failed call can simply be repeated.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::application::ports::HttpMethod;
use crate::application::registry::RemoteClient;
use crate::shared::errors::TransportError;

#[derive(Debug)]
pub struct Page {
    pub items: Vec<Value>,
    pub offset: u64,
    /// `X-Total-Count` as echoed by the counterpart
    pub total: Option<u64>,
}

pub struct PageReader {
    client: Arc<RemoteClient>,
    url: String,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    offset: u64,
    limit: u64,
    next_link: Option<String>,
    total: Option<u64>,
    done: bool,
}

impl PageReader {
    pub fn new(
        client: Arc<RemoteClient>,
        url: impl Into<String>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            from,
            to,
            offset: 0,
            limit: limit.max(1),
            next_link: None,
            total: None,
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch the next page; `Ok(None)` once the result set is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Page>, TransportError> {
        if self.done {
            return Ok(None);
        }

        let request = match &self.next_link {
            Some(link) => self.client.request(HttpMethod::Get, link.clone()),
            None => {
                let mut request = self
                    .client
                    .request(HttpMethod::Get, self.url.clone())
                    .query("offset", self.offset)
                    .query("limit", self.limit);
                if let Some(from) = self.from {
                    request = request.query("date_from", from.to_rfc3339_opts(SecondsFormat::Secs, true));
                }
                if let Some(to) = self.to {
                    request = request.query("date_to", to.to_rfc3339_opts(SecondsFormat::Secs, true));
                }
                request
            }
        };
        let url = request.url.clone();
        let response = self.client.send(request).await?;

        let items = match response.data {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(TransportError::Malformed {
                    url,
                    reason: format!("expected a list, got {}", type_name(&other)),
                })
            }
        };

        let page_offset = self.offset;
        let limit = response.limit.unwrap_or(self.limit).max(1);
        self.offset += items.len() as u64;
        self.total = response.total_count.or(self.total);
        self.next_link = response.next_link;

        let short = (items.len() as u64) < limit;
        let reached = self.total.map_or(false, |t| self.offset >= t);
        if items.is_empty() || short || reached {
            self.done = true;
        }
        if items.is_empty() {
            return Ok(None);
        }

        Ok(Some(Page {
            items,
            offset: page_offset,
            total: self.total,
        }))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
