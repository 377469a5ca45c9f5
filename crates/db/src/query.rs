//! Typed data-store queries rendered to PostgREST query parameters.
//!
//! Only whitelisted columns appear here and every value travels as a filter
//! operand, never as query text.

use std::cmp::Ordering;

use joblab_core::domain::job::{columns, text_field, JobRow, SAFE_COLUMNS};
use joblab_core::filters::{JobFilters, JobStatsInput, SearchJobsInput};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    Eq(String),
    /// Case-insensitive partial match.
    ILike(String),
    Gte(String),
    Lte(String),
    In(Vec<String>),
}

impl Filter {
    fn operand(&self) -> String {
        match self {
            Self::Eq(value) => format!("eq.{value}"),
            Self::ILike(value) => format!("ilike.%{value}%"),
            Self::Gte(value) => format!("gte.{value}"),
            Self::Lte(value) => format!("lte.{value}"),
            Self::In(values) => format!("in.({})", values.join(",")),
        }
    }

    fn accepts(&self, cell: Option<&str>) -> bool {
        let Some(cell) = cell else {
            return false;
        };
        match self {
            Self::Eq(value) => cell == value,
            Self::ILike(value) => cell.to_lowercase().contains(&value.to_lowercase()),
            Self::Gte(value) => cell >= value.as_str(),
            Self::Lte(value) => cell <= value.as_str(),
            Self::In(values) => values.iter().any(|value| value == cell),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: &'static str,
    pub filter: Filter,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobQuery {
    pub select: Vec<&'static str>,
    pub filters: Vec<ColumnFilter>,
    /// Descending, nulls last.
    pub order_desc: Option<&'static str>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl JobQuery {
    pub fn new(select: &[&'static str]) -> Self {
        Self {
            select: select.to_vec(),
            filters: Vec::new(),
            order_desc: None,
            limit: None,
            offset: None,
        }
    }

    pub fn filter(mut self, column: &'static str, filter: Filter) -> Self {
        self.filters.push(ColumnFilter { column, filter });
        self
    }

    pub fn page(mut self, offset: u32, limit: u32) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// Listing query: safe columns, newest first, capped at the validated limit.
    pub fn for_search(input: &SearchJobsInput) -> Self {
        let mut query = Self::new(SAFE_COLUMNS);
        query.order_desc = Some(columns::POSTED_DATE);
        query.limit = Some(input.limit);

        if let Some(keyword) = &input.role_keyword {
            query = query.filter(columns::ACTUAL_ROLE, Filter::ILike(keyword.clone()));
        }
        query.with_common_filters(&input.filters)
    }

    /// Statistic query: only the column the grouping is computed from.
    pub fn for_stats(input: &JobStatsInput) -> Self {
        Self::new(&[input.group_by.source_column()]).with_common_filters(&input.filters)
    }

    /// Metadata lookup for a known set of job ids.
    pub fn for_ids(ids: &[String]) -> Self {
        Self::new(SAFE_COLUMNS).filter(columns::JOB_ID, Filter::In(ids.to_vec()))
    }

    fn with_common_filters(mut self, filters: &JobFilters) -> Self {
        self = self.filter(columns::HAS_URL_DUPLICATE, Filter::Eq("0".to_owned()));

        if let Some(country) = &filters.country {
            self = self.filter(columns::COUNTRY, Filter::ILike(country.clone()));
        }
        if let Some(remote) = filters.is_remote {
            self = self.filter(columns::IS_REMOTE, Filter::Eq(remote.to_string()));
        }
        if let Some(research) = filters.is_research {
            self = self.filter(columns::IS_RESEARCH, Filter::Eq(research.to_string()));
        }
        for (column, value) in [
            (columns::JOB_LEVEL_STD, &filters.job_level_std),
            (columns::JOB_FUNCTION_STD, &filters.job_function_std),
            (columns::COMPANY_INDUSTRY_STD, &filters.company_industry_std),
            (columns::JOB_TYPE_FILLED, &filters.job_type_filled),
            (columns::PLATFORM, &filters.platform),
        ] {
            if let Some(value) = value {
                self = self.filter(column, Filter::ILike(value.clone()));
            }
        }
        if let Some(start) = &filters.posted_start {
            self = self.filter(columns::POSTED_DATE, Filter::Gte(start.clone()));
        }
        if let Some(end) = &filters.posted_end {
            self = self.filter(columns::POSTED_DATE, Filter::Lte(end.clone()));
        }
        self
    }

    /// PostgREST query string pairs. A column constrained more than once is
    /// folded into a single `and=(...)` group.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_owned(), self.select.join(","))];
        let mut grouped: Vec<String> = Vec::new();

        for (index, entry) in self.filters.iter().enumerate() {
            let repeated = self
                .filters
                .iter()
                .enumerate()
                .any(|(other, candidate)| other != index && candidate.column == entry.column);
            if repeated {
                grouped.push(format!("{}.{}", entry.column, entry.filter.operand()));
            } else {
                params.push((entry.column.to_owned(), entry.filter.operand()));
            }
        }
        if !grouped.is_empty() {
            params.push(("and".to_owned(), format!("({})", grouped.join(","))));
        }

        if let Some(column) = self.order_desc {
            params.push(("order".to_owned(), format!("{column}.desc.nullslast")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_owned(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_owned(), offset.to_string()));
        }
        params
    }

    pub fn matches(&self, row: &JobRow) -> bool {
        self.filters.iter().all(|entry| {
            let cell = text_field(row, entry.column);
            entry.filter.accepts(cell.as_deref())
        })
    }

    /// Evaluates the query over rows held in memory: filter, order, page,
    /// project.
    pub fn apply(&self, rows: &[JobRow]) -> Vec<JobRow> {
        let mut selected: Vec<&JobRow> = rows.iter().filter(|row| self.matches(row)).collect();

        if let Some(column) = self.order_desc {
            selected.sort_by(|left, right| {
                match (text_field(left, column), text_field(right, column)) {
                    (Some(left), Some(right)) => right.cmp(&left),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        }

        let offset = self.offset.unwrap_or(0) as usize;
        let limit = self.limit.map(|limit| limit as usize).unwrap_or(usize::MAX);

        selected
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                row.iter()
                    .filter(|(key, _)| self.select.iter().any(|column| *column == key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use joblab_core::domain::job::JobRow;
    use joblab_core::filters::{JobStatsInput, SearchJobsInput};

    use super::JobQuery;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    #[test]
    fn search_query_renders_partial_matches_and_date_range() {
        let input = SearchJobsInput::from_value(&json!({
            "role_keyword": "Data Scientist",
            "country": "Germany",
            "is_remote": true,
            "posted_start": "2024-01-01",
            "posted_end": "2024-03-31",
            "limit": 5,
        }))
        .expect("valid input");

        let params = JobQuery::for_search(&input).to_params();

        assert_eq!(param(&params, "actual_role"), Some("ilike.%Data Scientist%"));
        assert_eq!(param(&params, "country"), Some("ilike.%Germany%"));
        assert_eq!(param(&params, "is_remote"), Some("eq.true"));
        assert_eq!(param(&params, "has_url_duplicate"), Some("eq.0"));
        assert_eq!(
            param(&params, "and"),
            Some("(posted_date.gte.2024-01-01,posted_date.lte.2024-03-31)")
        );
        assert_eq!(param(&params, "posted_date"), None);
        assert_eq!(param(&params, "order"), Some("posted_date.desc.nullslast"));
        assert_eq!(param(&params, "limit"), Some("5"));
        assert!(param(&params, "select").is_some_and(|select| select.starts_with("job_id,")));
    }

    #[test]
    fn single_date_bound_renders_plainly() {
        let input = JobStatsInput::from_value(&json!({
            "metric": "count",
            "group_by": "posted_month",
            "posted_start": "2024-01-01",
        }))
        .expect("valid input");

        let params = JobQuery::for_stats(&input).to_params();

        assert_eq!(param(&params, "select"), Some("posted_date"));
        assert_eq!(param(&params, "posted_date"), Some("gte.2024-01-01"));
        assert_eq!(param(&params, "and"), None);
        assert_eq!(param(&params, "limit"), None);
    }

    #[test]
    fn in_memory_evaluation_filters_orders_and_projects() {
        let posting = |id: &str, country: &str, posted: Value, duplicate: u8| {
            json!({
                "job_id": id,
                "country": country,
                "posted_date": posted,
                "has_url_duplicate": duplicate,
                "secret": "x"
            })
        };
        let rows: Vec<JobRow> = [
            posting("1", "Germany", json!("2024-01-05"), 0),
            posting("2", "germany", Value::Null, 0),
            posting("3", "Germany", json!("2024-02-01"), 0),
            posting("4", "Germany", json!("2024-02-02"), 1),
            posting("5", "France", json!("2024-02-03"), 0),
        ]
        .into_iter()
        .filter_map(|row| row.as_object().cloned())
        .collect();
        let input = SearchJobsInput::from_value(&json!({"country": "GERMANY"})).expect("valid");

        let result = JobQuery::for_search(&input).apply(&rows);

        let ids: Vec<&str> = result.iter().filter_map(|row| row["job_id"].as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert!(result.iter().all(|row| !row.contains_key("secret")));
    }
}
