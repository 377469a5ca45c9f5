use joblab_core::domain::job::JobRow;
use tracing::{debug, info};

use crate::query::JobQuery;
use crate::store::{JobStore, StoreError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageSpec {
    pub page_size: u32,
    pub max_rows: u32,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self { page_size: 1000, max_rows: 15_000 }
    }
}

/// Reads every row matching `query` in offset/limit pages. Stops on an empty
/// page, a short page, or once `max_rows` rows have been collected.
pub async fn fetch_all(
    store: &dyn JobStore,
    query: &JobQuery,
    spec: PageSpec,
) -> Result<Vec<JobRow>, StoreError> {
    let page_size = spec.page_size.max(1);
    let mut rows: Vec<JobRow> = Vec::new();
    let mut offset: u32 = 0;

    while offset < spec.max_rows {
        let requested = page_size.min(spec.max_rows - offset);
        let page = store.fetch(&query.clone().page(offset, requested)).await?;
        let received = page.len();
        debug!(event_name = "store.page", offset, requested, received, "page fetched");

        rows.extend(page);
        if received < requested as usize {
            break;
        }
        offset += requested;
    }

    if offset >= spec.max_rows {
        info!(
            event_name = "store.page.cap_reached",
            max_rows = spec.max_rows,
            "row cap reached while paginating"
        );
    }
    Ok(rows)
}
