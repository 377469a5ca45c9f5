use std::sync::Arc;

use async_trait::async_trait;
use joblab_core::aggregation::aggregate;
use joblab_core::errors::ValidationError;
use joblab_core::filters::{GroupBy, JobStatsInput, SearchJobsInput};
use joblab_db::{fetch_all, JobQuery, JobStore, PageSpec, StoreError};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::{ContentBlock, ToolSpec};

pub const SEARCH_JOBS: &str = "search_jobs";
pub const JOB_STATS: &str = "job_stats";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid tool input: {0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn input_schema(&self) -> Value;

    async fn execute(&self, input: &Value) -> Result<Value, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name(),
            description: self.description(),
            input_schema: self.input_schema(),
        }
    }
}

/// Filtered listing of job postings.
pub struct SearchJobsTool {
    store: Arc<dyn JobStore>,
}

impl SearchJobsTool {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SearchJobsTool {
    fn name(&self) -> &'static str {
        SEARCH_JOBS
    }

    fn description(&self) -> &'static str {
        "Search the jobs database using structured filters and return matching postings. \
         Use it when the user wants to list, show, find or search for specific jobs."
    }

    fn input_schema(&self) -> Value {
        let mut properties = filter_properties();
        properties.insert(
            "role_keyword".to_owned(),
            json!({
                "type": "string",
                "description": "Keyword matched against the position title (e.g. Data Scientist, Product Manager)."
            }),
        );
        properties.insert(
            "limit".to_owned(),
            json!({
                "type": "integer",
                "description": "Maximum postings to return (default 20, max 100)"
            }),
        );
        json!({ "type": "object", "properties": properties })
    }

    async fn execute(&self, input: &Value) -> Result<Value, ToolError> {
        let input = SearchJobsInput::from_value(input)?;
        let rows = self.store.fetch(&JobQuery::for_search(&input)).await?;
        info!(event_name = "tool.search_jobs", rows = rows.len(), "listing query executed");
        Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
    }
}

/// Grouped counts computed in-process over the paginated row set.
pub struct JobStatsTool {
    store: Arc<dyn JobStore>,
    pages: PageSpec,
}

impl JobStatsTool {
    pub fn new(store: Arc<dyn JobStore>, pages: PageSpec) -> Self {
        Self { store, pages }
    }
}

#[async_trait]
impl Tool for JobStatsTool {
    fn name(&self) -> &'static str {
        JOB_STATS
    }

    fn description(&self) -> &'static str {
        "Count job postings grouped by one dimension. Use it for totals, distributions, \
         comparisons across categories and trends over time (group_by posted_month)."
    }

    fn input_schema(&self) -> Value {
        let mut properties = filter_properties();
        properties.insert(
            "metric".to_owned(),
            json!({
                "type": "string",
                "enum": ["count"],
                "description": "Aggregation metric; only count is supported"
            }),
        );
        properties.insert(
            "group_by".to_owned(),
            json!({
                "type": "string",
                "enum": GroupBy::ALL.iter().map(|group| group.as_str()).collect::<Vec<_>>(),
                "description": "Dimension to group by. Use posted_month for month-over-month trends."
            }),
        );
        json!({ "type": "object", "properties": properties, "required": ["metric", "group_by"] })
    }

    async fn execute(&self, input: &Value) -> Result<Value, ToolError> {
        let input = JobStatsInput::from_value(input)?;
        let rows = fetch_all(self.store.as_ref(), &JobQuery::for_stats(&input), self.pages).await?;
        let aggregation = aggregate(&rows, &input);
        info!(
            event_name = "tool.job_stats",
            group_by = %input.group_by,
            rows = rows.len(),
            groups = aggregation.rows().len(),
            "statistic query executed"
        );
        Ok(aggregation.to_value())
    }
}

fn filter_properties() -> Map<String, Value> {
    let string = |description: &str| json!({ "type": "string", "description": description });
    let boolean = |description: &str| json!({ "type": "boolean", "description": description });

    let mut properties = Map::new();
    for (name, schema) in [
        ("country", string("Country name, partial case-insensitive match (e.g. Germany, Sweden)")),
        ("is_remote", boolean("true for remote postings only, false for on-site only")),
        ("is_research", boolean("true for research positions only, false for non-research only")),
        (
            "job_level_std",
            string("Standardised seniority (e.g. Junior, Mid, Senior, Lead, Director)"),
        ),
        (
            "job_function_std",
            string("Standardised function (e.g. Engineering, Data Science, Marketing)"),
        ),
        (
            "company_industry_std",
            string("Standardised industry (e.g. Technology, Finance, Healthcare)"),
        ),
        (
            "job_type_filled",
            string("Employment type (e.g. Full-time, Part-time, Contract, Internship)"),
        ),
        ("platform", string("Source platform (e.g. LinkedIn, Indeed, Glassdoor)")),
        ("posted_start", string("ISO date YYYY-MM-DD, postings on or after this date")),
        ("posted_end", string("ISO date YYYY-MM-DD, postings on or before this date")),
    ] {
        properties.insert(name.to_owned(), schema);
    }
    properties
}

/// Result of routing one tool call. Every variant becomes a tool-result
/// message; none of them abort the dialogue.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    Completed(Value),
    Rejected(ValidationError),
    Failed(String),
    UnknownTool(String),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Completed(_))
    }

    /// Text fed back to the model for this call.
    pub fn content(&self) -> String {
        match self {
            Self::Completed(value) => value.to_string(),
            Self::Rejected(error) => error_payload(format!("Invalid tool input: {error}")),
            Self::Failed(reason) => error_payload(format!("Tool execution failed: {reason}")),
            Self::UnknownTool(name) => error_payload(format!("Unknown tool: {name}")),
        }
    }

    pub fn to_block(&self, tool_use_id: &str) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.to_owned(),
            content: self.content(),
            is_error: self.is_error(),
        }
    }
}

fn error_payload(message: String) -> String {
    json!({ "error": message }).to_string()
}

/// The closed set of tools the model may call.
pub struct ToolRouter {
    search: SearchJobsTool,
    stats: JobStatsTool,
}

impl ToolRouter {
    pub fn new(store: Arc<dyn JobStore>, pages: PageSpec) -> Self {
        Self { search: SearchJobsTool::new(store.clone()), stats: JobStatsTool::new(store, pages) }
    }

    pub fn resolve(&self, name: &str) -> Option<&dyn Tool> {
        match name {
            SEARCH_JOBS => Some(&self.search),
            JOB_STATS => Some(&self.stats),
            _ => None,
        }
    }

    pub fn catalogue(&self) -> Vec<ToolSpec> {
        vec![self.search.spec(), self.stats.spec()]
    }

    pub async fn invoke(&self, name: &str, input: &Value) -> ToolOutcome {
        let Some(tool) = self.resolve(name) else {
            warn!(event_name = "tool.unknown", tool_name = name, "model requested an unknown tool");
            return ToolOutcome::UnknownTool(name.to_owned());
        };

        match tool.execute(input).await {
            Ok(value) => ToolOutcome::Completed(value),
            Err(ToolError::Invalid(error)) => {
                warn!(
                    event_name = "tool.rejected",
                    tool_name = name,
                    error = %error,
                    "tool input rejected"
                );
                ToolOutcome::Rejected(error)
            }
            Err(ToolError::Store(error)) => {
                warn!(
                    event_name = "tool.failed",
                    tool_name = name,
                    error = %error,
                    "tool execution failed"
                );
                ToolOutcome::Failed(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use joblab_core::domain::job::JobRow;
    use joblab_core::errors::ValidationError;
    use joblab_db::{InMemoryJobStore, PageSpec};
    use serde_json::{json, Value};

    use super::{ToolOutcome, ToolRouter};

    fn row(value: Value) -> JobRow {
        let mut row = value.as_object().cloned().unwrap_or_default();
        row.insert("has_url_duplicate".to_owned(), json!(0));
        row
    }

    fn posting(id: &str, role: &str, country: &str, posted: &str) -> JobRow {
        row(json!({ "job_id": id, "actual_role": role, "country": country, "posted_date": posted }))
    }

    fn router(store: Arc<InMemoryJobStore>) -> ToolRouter {
        ToolRouter::new(store, PageSpec { page_size: 2, max_rows: 100 })
    }

    fn sample_store() -> Arc<InMemoryJobStore> {
        Arc::new(InMemoryJobStore::with_rows(vec![
            posting("1", "Data Scientist", "Germany", "2025-01-04"),
            posting("2", "Data Engineer", "Germany", "2025-02-11"),
            posting("3", "Designer", "Sweden", "2025-02-20"),
        ]))
    }

    #[tokio::test]
    async fn search_returns_matching_rows() {
        let router = router(sample_store());

        let outcome =
            router.invoke("search_jobs", &json!({ "role_keyword": "data", "limit": 5 })).await;

        let ToolOutcome::Completed(Value::Array(rows)) = outcome else {
            panic!("expected rows, got {outcome:?}");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["job_id"], "2");
    }

    #[tokio::test]
    async fn stats_paginate_and_group() {
        let store = sample_store();
        let router = router(store.clone());

        let outcome =
            router.invoke("job_stats", &json!({ "metric": "count", "group_by": "country" })).await;

        assert_eq!(
            outcome,
            ToolOutcome::Completed(json!([
                { "value": "Germany", "count": 2 },
                { "value": "Sweden", "count": 1 }
            ]))
        );
        assert_eq!(store.recorded_queries().await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_the_store() {
        let store = sample_store();
        let router = router(store.clone());

        let outcome =
            router.invoke("job_stats", &json!({ "metric": "count", "group_by": "salary" })).await;

        assert_eq!(
            outcome,
            ToolOutcome::Rejected(ValidationError::UnsupportedGroupBy("salary".into()))
        );
        assert!(outcome.is_error());
        assert!(store.recorded_queries().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_and_store_failure_become_error_results() {
        let store = sample_store();
        let router = router(store.clone());

        let unknown = router.invoke("drop_table", &json!({})).await;
        assert_eq!(unknown.content(), r#"{"error":"Unknown tool: drop_table"}"#);

        store.set_unavailable(Some("maintenance")).await;
        let failed = router.invoke("search_jobs", &json!({})).await;
        assert!(matches!(failed, ToolOutcome::Failed(_)));
        assert!(failed.content().contains("Tool execution failed"));
    }

    #[test]
    fn catalogue_lists_both_tools() {
        let router = router(sample_store());

        let names: Vec<&str> = router.catalogue().iter().map(|spec| spec.name).collect();

        assert_eq!(names, ["search_jobs", "job_stats"]);
        let stats = &router.catalogue()[1];
        assert_eq!(stats.input_schema["required"], json!(["metric", "group_by"]));
        let groupings = &stats.input_schema["properties"]["group_by"]["enum"];
        assert_eq!(groupings.as_array().map(Vec::len), Some(8));
    }
}
