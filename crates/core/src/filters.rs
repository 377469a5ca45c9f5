//! Whitelisted tool arguments.
//!
//! Tool calls arrive as loosely-typed JSON from the completion service. Every
//! field is coerced into one of the typed inputs below before any query is
//! built; unknown keys are ignored and anything outside the whitelist is a
//! [`ValidationError`].

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::domain::job::columns;
use crate::errors::ValidationError;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupBy {
    Country,
    CompanyName,
    JobLevel,
    JobFunction,
    CompanyIndustry,
    JobType,
    Platform,
    PostedMonth,
}

impl GroupBy {
    pub const ALL: [GroupBy; 8] = [
        GroupBy::Country,
        GroupBy::CompanyName,
        GroupBy::JobLevel,
        GroupBy::JobFunction,
        GroupBy::CompanyIndustry,
        GroupBy::JobType,
        GroupBy::Platform,
        GroupBy::PostedMonth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::CompanyName => "company_name",
            Self::JobLevel => "job_level_std",
            Self::JobFunction => "job_function_std",
            Self::CompanyIndustry => "company_industry_std",
            Self::JobType => "job_type_filled",
            Self::Platform => "platform",
            Self::PostedMonth => "posted_month",
        }
    }

    /// The stored column the dimension is computed from.
    pub fn source_column(self) -> &'static str {
        match self {
            Self::PostedMonth => columns::POSTED_DATE,
            other => other.as_str(),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == value)
            .ok_or_else(|| ValidationError::UnsupportedGroupBy(value.to_owned()))
    }
}

impl Serialize for GroupBy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Count,
}

impl FromStr for Metric {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "count" => Ok(Self::Count),
            other => Err(ValidationError::UnsupportedMetric(other.to_owned())),
        }
    }
}

/// Filters shared by the listing and statistic tools.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct JobFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_remote: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_research: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_level_std: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_function_std: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_industry_std: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type_filled: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_end: Option<String>,
}

/// Keys of [`JobFilters`], in the order follow-up calls copy them.
pub const SHARED_FILTER_KEYS: &[&str] = &[
    "country",
    "is_remote",
    "is_research",
    "job_level_std",
    "job_function_std",
    "company_industry_std",
    "job_type_filled",
    "platform",
    "posted_start",
    "posted_end",
];

impl JobFilters {
    pub fn from_map(input: &Map<String, Value>) -> Result<Self, ValidationError> {
        Ok(Self {
            country: text_arg(input, "country")?,
            is_remote: bool_arg(input, "is_remote")?,
            is_research: bool_arg(input, "is_research")?,
            job_level_std: text_arg(input, "job_level_std")?,
            job_function_std: text_arg(input, "job_function_std")?,
            company_industry_std: text_arg(input, "company_industry_std")?,
            job_type_filled: text_arg(input, "job_type_filled")?,
            platform: text_arg(input, "platform")?,
            posted_start: date_arg(input, "posted_start")?,
            posted_end: date_arg(input, "posted_end")?,
        })
    }

    /// The active partial-match filter on the same dimension as `group_by`.
    pub fn value_for(&self, group_by: GroupBy) -> Option<&str> {
        let value = match group_by {
            GroupBy::Country => self.country.as_deref(),
            GroupBy::JobLevel => self.job_level_std.as_deref(),
            GroupBy::JobFunction => self.job_function_std.as_deref(),
            GroupBy::CompanyIndustry => self.company_industry_std.as_deref(),
            GroupBy::JobType => self.job_type_filled.as_deref(),
            GroupBy::Platform => self.platform.as_deref(),
            GroupBy::CompanyName | GroupBy::PostedMonth => None,
        };
        value.filter(|value| !value.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchJobsInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_keyword: Option<String>,
    #[serde(flatten)]
    pub filters: JobFilters,
    pub limit: u32,
}

impl SearchJobsInput {
    pub fn from_value(input: &Value) -> Result<Self, ValidationError> {
        let map = as_object(input)?;
        Ok(Self {
            role_keyword: text_arg(map, "role_keyword")?,
            filters: JobFilters::from_map(map)?,
            limit: limit_arg(map)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobStatsInput {
    pub metric: Metric,
    pub group_by: GroupBy,
    #[serde(flatten)]
    pub filters: JobFilters,
}

impl JobStatsInput {
    pub fn from_value(input: &Value) -> Result<Self, ValidationError> {
        let map = as_object(input)?;
        let metric = match map.get("metric") {
            Some(Value::String(value)) => value.trim().parse()?,
            Some(other) => return Err(ValidationError::UnsupportedMetric(other.to_string())),
            None => return Err(ValidationError::MalformedInput("metric is required".to_owned())),
        };
        let group_by = match map.get("group_by") {
            Some(Value::String(value)) => value.trim().parse()?,
            Some(other) => return Err(ValidationError::UnsupportedGroupBy(other.to_string())),
            None => {
                return Err(ValidationError::MalformedInput("group_by is required".to_owned()))
            }
        };

        Ok(Self { metric, group_by, filters: JobFilters::from_map(map)? })
    }

    pub fn new(group_by: GroupBy, filters: JobFilters) -> Self {
        Self { metric: Metric::Count, group_by, filters }
    }
}

/// `YYYY-MM-DD` with a real calendar date behind it.
pub fn is_iso_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    let shape = bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        });
    shape && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn as_object(input: &Value) -> Result<&Map<String, Value>, ValidationError> {
    input.as_object().ok_or_else(|| {
        ValidationError::MalformedInput("tool input must be a JSON object".to_owned())
    })
}

fn text_arg(input: &Map<String, Value>, key: &str) -> Result<Option<String>, ValidationError> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => {
            let trimmed = value.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
        }
        Some(Value::Number(value)) => Ok(Some(value.to_string())),
        Some(other) => {
            Err(ValidationError::MalformedInput(format!("{key} must be a string, got {other}")))
        }
    }
}

fn bool_arg(input: &Map<String, Value>, key: &str) -> Result<Option<bool>, ValidationError> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(Value::String(value)) => match value.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            "" => Ok(None),
            _ => Err(ValidationError::MalformedInput(format!(
                "{key} must be a boolean, got `{value}`"
            ))),
        },
        Some(other) => {
            Err(ValidationError::MalformedInput(format!("{key} must be a boolean, got {other}")))
        }
    }
}

fn date_arg(
    input: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, ValidationError> {
    let Some(value) = text_arg(input, key)? else {
        return Ok(None);
    };
    if is_iso_date(&value) {
        Ok(Some(value))
    } else {
        Err(ValidationError::InvalidDate { field: key, value })
    }
}

fn limit_arg(input: &Map<String, Value>) -> Result<u32, ValidationError> {
    let raw = match input.get("limit") {
        None | Some(Value::Null) => return Ok(DEFAULT_LIMIT),
        Some(Value::Number(value)) => value
            .as_i64()
            .or_else(|| {
                value.as_f64().filter(|float| float.fract() == 0.0).map(|float| float as i64)
            })
            .ok_or_else(|| {
                ValidationError::MalformedInput(format!("limit must be an integer, got {value}"))
            })?,
        Some(Value::String(value)) => value.trim().parse::<i64>().map_err(|_| {
            ValidationError::MalformedInput(format!("limit must be an integer, got `{value}`"))
        })?,
        Some(other) => {
            return Err(ValidationError::MalformedInput(format!(
                "limit must be an integer, got {other}"
            )))
        }
    };

    if (1..=i64::from(MAX_LIMIT)).contains(&raw) {
        Ok(raw as u32)
    } else {
        Err(ValidationError::LimitOutOfRange { value: raw, max: MAX_LIMIT })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{GroupBy, JobStatsInput, Metric, SearchJobsInput, DEFAULT_LIMIT};
    use crate::errors::ValidationError;

    #[test]
    fn search_input_defaults_limit_and_trims_strings() {
        let input = SearchJobsInput::from_value(&json!({
            "role_keyword": "  Data Scientist ",
            "country": "",
            "is_remote": "true",
            "unexpected": "ignored",
        }))
        .expect("valid input");

        assert_eq!(input.role_keyword.as_deref(), Some("Data Scientist"));
        assert_eq!(input.filters.country, None);
        assert_eq!(input.filters.is_remote, Some(true));
        assert_eq!(input.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn rejections_happen_before_any_query() {
        struct Case {
            input: serde_json::Value,
            expected: fn(&ValidationError) -> bool,
        }

        let cases = [
            Case {
                input: json!({"limit": 101}),
                expected: |error| {
                    matches!(error, ValidationError::LimitOutOfRange { value: 101, .. })
                },
            },
            Case {
                input: json!({"limit": 0}),
                expected: |error| {
                    matches!(error, ValidationError::LimitOutOfRange { value: 0, .. })
                },
            },
            Case {
                input: json!({"posted_start": "01/02/2024"}),
                expected: |error| {
                    matches!(error, ValidationError::InvalidDate { field: "posted_start", .. })
                },
            },
            Case {
                input: json!({"posted_end": "2024-02-30"}),
                expected: |error| {
                    matches!(error, ValidationError::InvalidDate { field: "posted_end", .. })
                },
            },
            Case {
                input: json!({"is_research": "maybe"}),
                expected: |error| matches!(error, ValidationError::MalformedInput(_)),
            },
            Case {
                input: json!(["not", "an", "object"]),
                expected: |error| matches!(error, ValidationError::MalformedInput(_)),
            },
        ];

        for case in cases {
            let error =
                SearchJobsInput::from_value(&case.input).expect_err("input must be rejected");
            assert!((case.expected)(&error), "unexpected error {error:?} for {}", case.input);
        }
    }

    #[test]
    fn stats_input_requires_whitelisted_dimension_and_metric() {
        let parsed = JobStatsInput::from_value(&json!({
            "metric": "count",
            "group_by": "posted_month",
            "posted_start": "2024-01-01",
        }))
        .expect("valid stats input");
        assert_eq!(parsed.metric, Metric::Count);
        assert_eq!(parsed.group_by, GroupBy::PostedMonth);
        assert_eq!(parsed.group_by.source_column(), "posted_date");

        let bad_group =
            JobStatsInput::from_value(&json!({"metric": "count", "group_by": "salary"}));
        assert_eq!(bad_group, Err(ValidationError::UnsupportedGroupBy("salary".to_owned())));

        let bad_metric =
            JobStatsInput::from_value(&json!({"metric": "avg", "group_by": "country"}));
        assert_eq!(bad_metric, Err(ValidationError::UnsupportedMetric("avg".to_owned())));
    }

    #[test]
    fn filter_value_only_reports_matching_dimension() {
        let parsed = JobStatsInput::from_value(&json!({
            "metric": "count",
            "group_by": "country",
            "country": "Germany",
        }))
        .expect("valid stats input");

        assert_eq!(parsed.filters.value_for(GroupBy::Country), Some("Germany"));
        assert_eq!(parsed.filters.value_for(GroupBy::Platform), None);
        assert_eq!(parsed.filters.value_for(GroupBy::CompanyName), None);
    }

    #[test]
    fn validated_input_serializes_without_unset_filters() {
        let input = SearchJobsInput::from_value(&json!({"country": "Sweden", "limit": 5}))
            .expect("valid input");

        assert_eq!(
            serde_json::to_value(&input).expect("serializable"),
            json!({"country": "Sweden", "limit": 5})
        );
    }
}
