use std::future::Future;

use serde::{Deserialize, Deserializer, Serialize};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Caller-side paging knobs. `limit` caps the total number of items across all pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageConfig {
    pub page_size: Option<u32>,
    pub limit: Option<u64>,
}

/// What the fetch callback receives for one page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_size: u32,
    /// 1-based
    pub page_number: u32,
}

/// Pagination block returned by the REST API.
///
/// Tableau serialises these counters as JSON strings; numbers are accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(deserialize_with = "lenient_u64")]
    pub page_number: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub page_size: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub total_available: u64,
}

impl Pagination {
    /// True when the page described by this block is the last one.
    pub fn is_exhausted(&self) -> bool {
        self.page_number.saturating_mul(self.page_size) >= self.total_available
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub pagination: Pagination,
    pub data: Vec<T>,
}

/// Combine the server-wide cap with a per-call limit; the smaller one wins.
pub fn effective_limit(max_result_limit: Option<u64>, limit: Option<u64>) -> Option<u64> {
    match (max_result_limit, limit) {
        (Some(max), Some(limit)) => Some(max.min(limit)),
        (Some(max), None) => Some(max),
        (None, limit) => limit,
    }
}

/// Fetch pages in order until the server runs out of data or `limit` items are collected.
///
/// Each page is awaited before the next is requested. Errors from `fetch` abort the
/// accumulation and are returned unchanged; nothing partial is handed back.
pub async fn paginate<T, E, F, Fut>(config: PageConfig, mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let page_size = config.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    let mut accumulated: Vec<T> = Vec::new();

    if config.limit == Some(0) {
        return Ok(accumulated);
    }

    let mut page_number = 1;
    loop {
        let Page { pagination, mut data } = fetch(PageRequest {
            page_size,
            page_number,
        })
        .await?;

        if data.is_empty() {
            break;
        }

        if let Some(limit) = config.limit {
            let remaining = usize::try_from(limit)
                .unwrap_or(usize::MAX)
                .saturating_sub(accumulated.len());
            if data.len() >= remaining {
                data.truncate(remaining);
                accumulated.append(&mut data);
                break;
            }
        }
        accumulated.append(&mut data);

        if pagination.is_exhausted() {
            break;
        }
        page_number += 1;
    }

    Ok(accumulated)
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
