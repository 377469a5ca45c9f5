//! Phrase tables and prompt text for the dialogue loop.
//!
//! The classifiers here are plain string matches over fixed tables. They are
//! not meant to understand intent beyond the listed phrases.

use joblab_core::filters::{GroupBy, Metric, SHARED_FILTER_KEYS};
use serde_json::{json, Map, Value};

use crate::memory::ToolInvocation;
use crate::tools::{JOB_STATS, SEARCH_JOBS};

pub const DECLINE_ACKNOWLEDGEMENT: &str = "Alright. Let me know if you'd like additional insights.";
pub const NO_TOOL_REFUSAL: &str =
    "I could not complete this database request because no tool call was produced.";
pub const ROUNDS_EXHAUSTED: &str = "I was unable to complete the request within the allowed steps.";
pub const TOOL_REQUIRED_NUDGE: &str =
    "This question requires database access. You must call an appropriate tool.";

/// Listing size used when a statistic is expanded into postings.
pub const FOLLOWUP_LISTING_LIMIT: u32 = 20;
pub const FOLLOWUP_GROUP_BY: GroupBy = GroupBy::JobFunction;

const DATABASE_KEYWORDS: &[&str] = &[
    "job",
    "jobs",
    "how many",
    "count",
    "list",
    "show",
    "find",
    "trend",
    "increase",
    "decrease",
    "growth",
    "decline",
    "month-over-month",
    "comparison",
    "compare",
    "change",
    "hiring",
    "posted",
    "research",
    "remote",
    "industry",
    "full-time",
    "part-time",
    "contract",
    "internship",
    "related to",
    "about",
    "similar to",
    "positions mentioning",
    "jobs involving",
    "skills like",
    "roles that deal with",
];

const AFFIRMATIVE_PHRASES: &[&str] = &[
    "yes",
    "yeah",
    "yep",
    "yup",
    "sure",
    "please",
    "ok",
    "okay",
    "go ahead",
    "do it",
    "show me",
    "tell me",
    "absolutely",
    "of course",
    "why not",
    "right",
    "correct",
    "exactly",
    "more",
    "details",
    "elaborate",
    "explain",
    "break it down",
    "breakdown",
    "continue",
    "go on",
    "please do",
];

const NEGATIVE_PHRASES: &[&str] = &[
    "no",
    "nah",
    "nope",
    "no thanks",
    "no thank you",
    "not now",
    "not really",
    "never mind",
    "nevermind",
    "skip",
    "pass",
    "i'm good",
    "im good",
    "that's all",
    "thats all",
    "all good",
    "nothing else",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentLexicon {
    pub database_keywords: Vec<&'static str>,
    pub affirmative: Vec<&'static str>,
    pub negative: Vec<&'static str>,
}

impl Default for IntentLexicon {
    fn default() -> Self {
        Self {
            database_keywords: DATABASE_KEYWORDS.to_vec(),
            affirmative: AFFIRMATIVE_PHRASES.to_vec(),
            negative: NEGATIVE_PHRASES.to_vec(),
        }
    }
}

impl IntentLexicon {
    /// Lowercased, trimmed, trailing `!.,?` removed.
    pub fn normalize(prompt: &str) -> String {
        prompt.trim().to_lowercase().trim_end_matches(['!', '.', ',', '?']).to_owned()
    }

    pub fn is_affirmative(&self, prompt: &str) -> bool {
        let normalized = Self::normalize(prompt);
        self.affirmative.iter().any(|phrase| *phrase == normalized)
    }

    pub fn is_negative(&self, prompt: &str) -> bool {
        let normalized = Self::normalize(prompt);
        self.negative.iter().any(|phrase| *phrase == normalized)
    }

    pub fn mentions_database(&self, prompt: &str) -> bool {
        let lowered = prompt.to_lowercase();
        self.database_keywords.iter().any(|keyword| lowered.contains(keyword))
    }
}

pub fn token_count(prompt: &str) -> usize {
    prompt.split_whitespace().count()
}

/// The call run when the user accepts a follow-up offer. Statistics become a
/// listing with the same filters; listings become a breakdown by job
/// function; anything else repeats unchanged.
pub fn expand_followup(previous: &ToolInvocation) -> ToolInvocation {
    let shared = || -> Map<String, Value> {
        let Some(input) = previous.input.as_object() else {
            return Map::new();
        };
        SHARED_FILTER_KEYS
            .iter()
            .filter_map(|key| input.get(*key).map(|value| ((*key).to_owned(), value.clone())))
            .collect()
    };

    match previous.name.as_str() {
        JOB_STATS => {
            let mut input = shared();
            input.insert("limit".to_owned(), json!(FOLLOWUP_LISTING_LIMIT));
            ToolInvocation::new(SEARCH_JOBS, Value::Object(input))
        }
        SEARCH_JOBS => {
            let mut input = shared();
            input.insert("metric".to_owned(), json!(Metric::Count));
            input.insert("group_by".to_owned(), json!(FOLLOWUP_GROUP_BY.as_str()));
            ToolInvocation::new(JOB_STATS, Value::Object(input))
        }
        _ => previous.clone(),
    }
}

/// Hidden context prepended to a short prompt that follows a tool call.
pub fn context_hint(last: &ToolInvocation, prompt: &str, affirmative: bool) -> String {
    if affirmative {
        format!(
            "[Context: The previous tool used was '{}' with arguments {}. The user said \"{}\" \
             which is an affirmative response. They want more details or a breakdown of the \
             previous results. You MUST call a tool to provide this. Re-use the same filters and \
             add grouping or detail to give a richer answer.]",
            last.name, last.input, prompt
        )
    } else {
        format!(
            "[Context: The previous tool used was '{}' with arguments {}. The user is likely \
             refining those filters.]\n\n{}",
            last.name, last.input, prompt
        )
    }
}

pub fn followup_summary_request(invocation: &ToolInvocation, result: &str) -> String {
    format!(
        "The user confirmed they want more details. I executed {} with {}.\n\nResults:\n{}\n\n\
         Summarize these results clearly. Do not expose raw JSON.",
        invocation.name, invocation.input, result
    )
}

pub const SYSTEM_PROMPT: &str = "\
You are JobLab, an analytics assistant backed by a structured database of job postings. \
Follow these rules exactly.

DATABASE ACCESS
Questions about job listings, counts, trends, comparisons, specific titles or any filter \
(country, date, remote, level, platform, research) require a tool call. Never answer them \
from memory and never invent numbers. Answer directly only when the question has nothing to \
do with the jobs database.

CHOOSING A TOOL
- Counts, totals, percentages, distributions: job_stats with metric \"count\".
- Listings (show, list, find, search, named positions): search_jobs.
- Trends, growth, decline, month-over-month change, comparisons over time: job_stats with \
group_by \"posted_month\".
Use one tool per step unless more are genuinely needed.

FILTERS
country (real country name, e.g. Germany), is_remote, is_research, job_level_std (Junior, Mid, \
Senior, Lead, Manager, Director), job_function_std (Engineering, Data Science, Marketing, ...), \
company_industry_std, job_type_filled (Full-time, Part-time, Contract, Internship), platform \
(LinkedIn, Indeed), posted_start and posted_end (ISO dates), role_keyword (search_jobs only).
job_stats can group by: country, company_name, job_level_std, job_function_std, \
company_industry_std, job_type_filled, platform, posted_month.

DATES
The dataset starts on 2026-01-01. Turn every month, year, range, \"after\" or \"before\" \
phrase into posted_start and/or posted_end. January 2026 means posted_start 2026-01-01 and \
posted_end 2026-01-31. Never drop a time constraint.

DATA POLICY
Rely only on tool output; do not approximate or assume. Keep every filter the user stated: \
research means is_research true, remote means is_remote true, a country goes into country as \
written, an employment type goes into job_type_filled. A zero count is reported as zero and an \
empty result as no data found.

MINIMAL FILTERS
Apply only the filters the user asked for. Extra filters shrink the result and make counts \
wrong; when in doubt, leave a filter out.

ANSWERS
Be concise and analytical. Do not show raw JSON. For monthly series with delta and \
percent_change, state the direction and size of the change. Offer an optional follow-up \
breakdown.

SHORT FOLLOW-UPS
A short instruction such as \"only remote\", \"now Germany\" or \"senior only\" refines the \
previous tool call: adjust its filters instead of starting over. A short affirmative reply \
(\"yes\", \"sure\", \"please\") to an offered breakdown means run the expanded query; never \
refuse it.";
