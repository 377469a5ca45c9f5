use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A job posting as returned by the data store: a flat column/value record.
pub type JobRow = Map<String, Value>;

pub mod columns {
    pub const JOB_ID: &str = "job_id";
    pub const ACTUAL_ROLE: &str = "actual_role";
    pub const COMPANY_NAME: &str = "company_name";
    pub const COUNTRY: &str = "country";
    pub const LOCATION: &str = "location";
    pub const IS_REMOTE: &str = "is_remote";
    pub const IS_RESEARCH: &str = "is_research";
    pub const JOB_LEVEL_STD: &str = "job_level_std";
    pub const JOB_FUNCTION_STD: &str = "job_function_std";
    pub const COMPANY_INDUSTRY_STD: &str = "company_industry_std";
    pub const JOB_TYPE_FILLED: &str = "job_type_filled";
    pub const PLATFORM: &str = "platform";
    pub const POSTED_DATE: &str = "posted_date";
    pub const URL: &str = "url";
    pub const HAS_URL_DUPLICATE: &str = "has_url_duplicate";
}

/// Columns a listing query may return. Anything else stays server-side.
pub const SAFE_COLUMNS: &[&str] = &[
    columns::JOB_ID,
    columns::ACTUAL_ROLE,
    columns::COMPANY_NAME,
    columns::COUNTRY,
    columns::LOCATION,
    columns::IS_REMOTE,
    columns::IS_RESEARCH,
    columns::JOB_LEVEL_STD,
    columns::JOB_FUNCTION_STD,
    columns::COMPANY_INDUSTRY_STD,
    columns::JOB_TYPE_FILLED,
    columns::PLATFORM,
    columns::POSTED_DATE,
    columns::URL,
];

/// Reads a column as text. Numbers are stringified so numeric ids compare
/// the same way as textual ones.
pub fn text_field<'a>(row: &'a JobRow, column: &str) -> Option<std::borrow::Cow<'a, str>> {
    match row.get(column)? {
        Value::String(value) => Some(std::borrow::Cow::Borrowed(value.as_str())),
        Value::Number(value) => Some(std::borrow::Cow::Owned(value.to_string())),
        Value::Bool(value) => Some(std::borrow::Cow::Owned(value.to_string())),
        _ => None,
    }
}

/// Reads a flag column. The store may hold flags as booleans, as `0`/`1`, or
/// as text; a non-zero number or non-empty string counts as set.
pub fn bool_field(row: &JobRow, column: &str) -> bool {
    match row.get(column) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Some(Value::String(text)) => !text.is_empty(),
        _ => false,
    }
}

/// A job recommended for a CV, flattened for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobMatch {
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub similarity: f64,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub posted_date: String,
    #[serde(default)]
    pub job_level_std: String,
    #[serde(default)]
    pub job_function_std: String,
    #[serde(default)]
    pub job_type_filled: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub is_remote: bool,
    #[serde(default)]
    pub relaxed_criteria: bool,
}

impl JobMatch {
    pub fn from_row(job_id: &str, row: &JobRow, similarity: f64, relaxed: bool) -> Self {
        let text = |column: &str, fallback: &str| {
            text_field(row, column)
                .map(|value| value.into_owned())
                .unwrap_or_else(|| fallback.to_owned())
        };

        Self {
            job_id: job_id.to_owned(),
            title: text(columns::ACTUAL_ROLE, "Unknown"),
            company: text(columns::COMPANY_NAME, "Unknown"),
            similarity: (similarity * 10_000.0).round() / 10_000.0,
            country: text(columns::COUNTRY, ""),
            location: text(columns::LOCATION, ""),
            url: text(columns::URL, ""),
            posted_date: text(columns::POSTED_DATE, ""),
            job_level_std: text(columns::JOB_LEVEL_STD, ""),
            job_function_std: text(columns::JOB_FUNCTION_STD, ""),
            job_type_filled: text(columns::JOB_TYPE_FILLED, ""),
            platform: text(columns::PLATFORM, ""),
            is_remote: bool_field(row, columns::IS_REMOTE),
            relaxed_criteria: relaxed,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{bool_field, JobMatch, JobRow};

    fn row(value: serde_json::Value) -> JobRow {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn match_from_row_defaults_missing_fields() {
        let row = row(json!({
            "company_name": "Acme",
            "country": "Germany",
            "job_level_std": null,
            "is_remote": true,
        }));

        let job = JobMatch::from_row("42", &row, 0.876_543_21, true);

        assert_eq!(job.title, "Unknown");
        assert_eq!(job.company, "Acme");
        assert_eq!(job.job_level_std, "");
        assert_eq!(job.similarity, 0.8765);
        assert!(job.is_remote);
        assert!(job.relaxed_criteria);
    }

    #[test]
    fn numeric_remote_flag_is_read_as_boolean() {
        let remote = row(json!({ "job_id": "7", "is_remote": 1 }));
        let onsite = row(json!({ "job_id": "8", "is_remote": 0 }));

        assert!(bool_field(&remote, "is_remote"));
        assert!(!bool_field(&onsite, "is_remote"));
        assert!(!bool_field(&onsite, "missing"));
        assert!(JobMatch::from_row("7", &remote, 0.5, false).is_remote);
        assert!(!JobMatch::from_row("8", &onsite, 0.5, false).is_remote);
    }
}
