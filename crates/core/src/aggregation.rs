use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::job::{text_field, JobRow};
use crate::filters::{GroupBy, JobStatsInput, Metric};

pub const MAX_GROUPS: usize = 25;
pub const MISSING_GROUP: &str = "Unknown";
pub const TOTAL_GROUP: &str = "total";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregationRow {
    pub value: String,
    pub count: u64,
    pub delta_from_previous: Option<i64>,
    pub percent_change: Option<f64>,
}

impl AggregationRow {
    fn plain(value: String, count: u64) -> Self {
        Self { value, count, delta_from_previous: None, percent_change: None }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Aggregation {
    /// Chronological month buckets with deltas against the previous bucket.
    Trend(Vec<AggregationRow>),
    /// The grouped dimension is pinned by a filter; only the row count matters.
    Total(u64),
    /// Most frequent groups first, at most [`MAX_GROUPS`].
    Groups(Vec<AggregationRow>),
}

impl Aggregation {
    pub fn rows(&self) -> Vec<AggregationRow> {
        match self {
            Self::Trend(rows) | Self::Groups(rows) => rows.clone(),
            Self::Total(count) => vec![AggregationRow::plain(TOTAL_GROUP.to_owned(), *count)],
        }
    }

    /// Tool-result payload. Trend rows always carry the delta fields (null for
    /// the first month); group and total rows carry only `value` and `count`.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Trend(rows) => json!(rows),
            Self::Total(count) => json!([{ "value": TOTAL_GROUP, "count": count }]),
            Self::Groups(rows) => Value::Array(
                rows.iter().map(|row| json!({ "value": row.value, "count": row.count })).collect(),
            ),
        }
    }
}

pub fn aggregate(rows: &[JobRow], input: &JobStatsInput) -> Aggregation {
    let Metric::Count = input.metric;

    if input.group_by == GroupBy::PostedMonth {
        return Aggregation::Trend(monthly_trend(rows, input.group_by.source_column()));
    }

    if let Some(filter) = input.filters.value_for(input.group_by) {
        tracing::debug!(
            event_name = "aggregation.total_only",
            group_by = %input.group_by,
            filter,
            total_count = rows.len(),
            "grouped dimension is filtered; collapsing to total"
        );
        return Aggregation::Total(rows.len() as u64);
    }

    Aggregation::Groups(top_groups(rows, input.group_by.source_column(), MAX_GROUPS))
}

/// `YYYY-MM` from a date-like value, or `None` when the prefix is not shaped
/// like a month.
pub fn month_bucket(value: &str) -> Option<&str> {
    let bucket = value.get(..7)?;
    (bucket.as_bytes()[4] == b'-').then_some(bucket)
}

fn monthly_trend(rows: &[JobRow], column: &str) -> Vec<AggregationRow> {
    let mut months: BTreeMap<String, u64> = BTreeMap::new();
    for row in rows {
        let Some(date) = text_field(row, column) else {
            continue;
        };
        if let Some(bucket) = month_bucket(&date) {
            *months.entry(bucket.to_owned()).or_default() += 1;
        }
    }

    let trend = trend_series(months);
    tracing::debug!(event_name = "aggregation.trend", months = trend.len(), "monthly trend built");
    trend
}

/// Deltas and percent changes over month buckets given in chronological order.
/// A zero previous count leaves the percent change undefined.
pub fn trend_series(months: impl IntoIterator<Item = (String, u64)>) -> Vec<AggregationRow> {
    let mut previous: Option<u64> = None;
    let mut trend = Vec::new();
    for (month, count) in months {
        let (delta, percent_change) = match previous {
            None => (None, None),
            Some(previous_count) => {
                let delta = count as i64 - previous_count as i64;
                let percent = (previous_count != 0).then(|| {
                    (delta as f64 / previous_count as f64 * 100.0 * 100.0).round() / 100.0
                });
                (Some(delta), percent)
            }
        };
        trend.push(AggregationRow {
            value: month,
            count,
            delta_from_previous: delta,
            percent_change,
        });
        previous = Some(count);
    }
    trend
}

fn top_groups(rows: &[JobRow], column: &str, limit: usize) -> Vec<AggregationRow> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<AggregationRow> = Vec::new();

    for row in rows {
        let key = text_field(row, column)
            .filter(|value| !value.is_empty())
            .map(|value| value.into_owned())
            .unwrap_or_else(|| MISSING_GROUP.to_owned());
        match index.get(&key) {
            Some(position) => groups[*position].count += 1,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(AggregationRow::plain(key, 1));
            }
        }
    }

    let distinct = groups.len();
    groups.sort_by(|left, right| right.count.cmp(&left.count));
    groups.truncate(limit);

    tracing::debug!(
        event_name = "aggregation.groups",
        distinct,
        returned = groups.len(),
        total_rows = rows.len(),
        "grouped counts built"
    );
    groups
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{aggregate, month_bucket, trend_series, Aggregation, MAX_GROUPS};
    use crate::domain::job::JobRow;
    use crate::filters::{GroupBy, JobFilters, JobStatsInput};

    fn rows(values: impl IntoIterator<Item = Value>) -> Vec<JobRow> {
        values.into_iter().filter_map(|value| value.as_object().cloned()).collect()
    }

    fn dated(month: &str, count: usize) -> Vec<Value> {
        (0..count)
            .map(|day| json!({ "posted_date": format!("{month}-{:02}", day % 28 + 1) }))
            .collect()
    }

    #[test]
    fn monthly_trend_reports_deltas_and_percent_changes() {
        let trend = trend_series([
            ("2024-01".to_owned(), 10),
            ("2024-02".to_owned(), 15),
            ("2024-03".to_owned(), 0),
        ]);

        let deltas: Vec<Option<i64>> = trend.iter().map(|row| row.delta_from_previous).collect();
        let percents: Vec<Option<f64>> = trend.iter().map(|row| row.percent_change).collect();
        assert_eq!(deltas, vec![None, Some(5), Some(-15)]);
        assert_eq!(percents, vec![None, Some(50.0), Some(-100.0)]);
    }

    #[test]
    fn zero_previous_month_leaves_percent_undefined() {
        let trend = trend_series([("2024-01".to_owned(), 0), ("2024-02".to_owned(), 4)]);

        assert_eq!(trend[1].delta_from_previous, Some(4));
        assert_eq!(trend[1].percent_change, None);
    }

    #[test]
    fn trend_buckets_rows_chronologically_and_skips_bad_dates() {
        let mut values = dated("2024-02", 3);
        values.extend(dated("2024-01", 2));
        values.push(json!({ "posted_date": "bad" }));
        values.push(json!({ "posted_date": null }));
        let data = rows(values);

        let result =
            aggregate(&data, &JobStatsInput::new(GroupBy::PostedMonth, JobFilters::default()));

        assert_eq!(
            result.to_value(),
            json!([
                {
                    "value": "2024-01",
                    "count": 2,
                    "delta_from_previous": null,
                    "percent_change": null
                },
                {
                    "value": "2024-02",
                    "count": 3,
                    "delta_from_previous": 1,
                    "percent_change": 50.0
                },
            ])
        );
    }

    #[test]
    fn month_buckets_are_validated() {
        assert_eq!(month_bucket("2024-03-15"), Some("2024-03"));
        assert_eq!(month_bucket("2024-03"), Some("2024-03"));
        assert_eq!(month_bucket("20240315"), None);
        assert_eq!(month_bucket("2024"), None);
    }

    #[test]
    fn total_only_collapse_when_grouping_by_filtered_dimension() {
        let data = rows((0..37).map(|index| json!({ "country": format!("Germany {index}") })));
        let filters = JobFilters { country: Some("Germany".to_owned()), ..JobFilters::default() };

        let result = aggregate(&data, &JobStatsInput::new(GroupBy::Country, filters));

        assert_eq!(result, Aggregation::Total(37));
        assert_eq!(result.to_value(), json!([{ "value": "total", "count": 37 }]));
    }

    #[test]
    fn grouped_counts_truncate_to_top_groups_with_stable_ties() {
        let mut values = Vec::new();
        for group in 0..40 {
            let repeats = if group < 5 { 10 - group } else { 1 };
            for _ in 0..repeats {
                values.push(json!({ "platform": format!("p{group:02}") }));
            }
        }
        let data = rows(values);

        let Aggregation::Groups(groups) =
            aggregate(&data, &JobStatsInput::new(GroupBy::Platform, JobFilters::default()))
        else {
            panic!("expected groups");
        };

        assert_eq!(groups.len(), MAX_GROUPS);
        assert!(groups.windows(2).all(|pair| pair[0].count >= pair[1].count));
        let labels: Vec<&str> = groups.iter().map(|row| row.value.as_str()).collect();
        assert_eq!(&labels[..7], &["p00", "p01", "p02", "p03", "p04", "p05", "p06"]);
        assert_eq!(labels[24], "p24");
        let summed: u64 = groups.iter().map(|row| row.count).sum();
        assert!(summed <= data.len() as u64);
    }

    #[test]
    fn missing_group_values_use_sentinel() {
        let data = rows([
            json!({ "job_level_std": "Senior" }),
            json!({ "job_level_std": null }),
            json!({ "job_level_std": "" }),
            json!({}),
        ]);

        let result =
            aggregate(&data, &JobStatsInput::new(GroupBy::JobLevel, JobFilters::default()));

        assert_eq!(
            result.to_value(),
            json!([{ "value": "Unknown", "count": 3 }, { "value": "Senior", "count": 1 }])
        );
    }
}
