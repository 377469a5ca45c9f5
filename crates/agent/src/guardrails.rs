use serde_json::{Map, Value};
use tracing::info;

use crate::tools::{JOB_STATS, SEARCH_JOBS};

/// A boolean filter inferred from explicit wording in the user's text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferredFilter {
    pub field: &'static str,
    pub keyword: &'static str,
    pub negated_phrases: &'static [&'static str],
}

impl InferredFilter {
    /// `Some(false)` for a negated phrase, `Some(true)` for the bare keyword.
    fn detect(&self, lowered_text: &str) -> Option<bool> {
        if self.negated_phrases.iter().any(|phrase| lowered_text.contains(phrase)) {
            Some(false)
        } else if lowered_text.contains(self.keyword) {
            Some(true)
        } else {
            None
        }
    }
}

pub const RESEARCH_FILTER: InferredFilter = InferredFilter {
    field: "is_research",
    keyword: "research",
    negated_phrases: &[
        "non research",
        "non-research",
        "not research",
        "exclude research",
        "excluding research",
        "without research",
    ],
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Adjustment {
    pub field: &'static str,
    pub value: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    pub input: Value,
    pub adjustments: Vec<Adjustment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub inferred_filters: Vec<InferredFilter>,
    pub guarded_tools: &'static [&'static str],
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { inferred_filters: vec![RESEARCH_FILTER], guarded_tools: &[SEARCH_JOBS, JOB_STATS] }
    }
}

impl GuardrailPolicy {
    /// Fills filters the model left unset from explicit signals in
    /// `raw_text`. Values the model chose are never overwritten.
    pub fn reconcile(&self, tool_name: &str, proposed: &Value, raw_text: &str) -> Reconciliation {
        let unchanged = || Reconciliation { input: proposed.clone(), adjustments: Vec::new() };
        if !self.guarded_tools.iter().any(|guarded| *guarded == tool_name) {
            return unchanged();
        }

        let lowered = raw_text.to_lowercase();
        let mut input = match proposed {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => return unchanged(),
        };

        let mut adjustments = Vec::new();
        for filter in &self.inferred_filters {
            let unset = input.get(filter.field).map_or(true, Value::is_null);
            if !unset {
                continue;
            }
            if let Some(value) = filter.detect(&lowered) {
                input.insert(filter.field.to_owned(), Value::Bool(value));
                adjustments.push(Adjustment { field: filter.field, value });
            }
        }

        for adjustment in &adjustments {
            info!(
                event_name = "guardrail.adjusted",
                tool_name,
                field = adjustment.field,
                value = adjustment.value,
                "filled unset filter from user wording"
            );
        }
        Reconciliation { input: Value::Object(input), adjustments }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Adjustment, GuardrailPolicy};

    #[test]
    fn negated_phrase_forces_false_when_unset() {
        let policy = GuardrailPolicy::default();

        let result = policy.reconcile(
            "search_jobs",
            &json!({ "is_research": null, "country": "Germany" }),
            "Show non-research roles in Germany",
        );

        assert_eq!(result.input, json!({ "is_research": false, "country": "Germany" }));
        assert_eq!(result.adjustments, vec![Adjustment { field: "is_research", value: false }]);
    }

    #[test]
    fn explicit_model_choice_wins() {
        let policy = GuardrailPolicy::default();

        let result = policy.reconcile(
            "job_stats",
            &json!({ "is_research": true }),
            "how many non-research jobs",
        );

        assert_eq!(result.input, json!({ "is_research": true }));
        assert!(result.adjustments.is_empty());
    }

    #[test]
    fn bare_keyword_forces_true_when_absent() {
        let policy = GuardrailPolicy::default();

        let result = policy.reconcile(
            "job_stats",
            &json!({ "group_by": "country" }),
            "Research jobs by country",
        );

        assert_eq!(result.input["is_research"], true);
    }

    #[test]
    fn other_tools_and_unrelated_text_are_untouched() {
        let policy = GuardrailPolicy::default();

        let other = policy.reconcile("lookup", &json!({}), "research");
        assert_eq!(other.input, json!({}));

        let unrelated =
            policy.reconcile("search_jobs", &json!({ "country": "France" }), "jobs in France");
        assert_eq!(unrelated.input, json!({ "country": "France" }));
        assert!(unrelated.adjustments.is_empty());
    }
}
