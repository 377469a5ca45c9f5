pub mod aggregation;
pub mod config;
pub mod domain;
pub mod errors;
pub mod filters;
pub mod matching;

pub use aggregation::{aggregate, Aggregation, AggregationRow};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::job::{JobMatch, JobRow, SAFE_COLUMNS};
pub use errors::{ApplicationError, DomainError, InterfaceError, ValidationError};
pub use filters::{GroupBy, JobFilters, JobStatsInput, Metric, SearchJobsInput};
pub use matching::{MatchCandidate, MatchFilters, RelaxationPolicy, ScoredChunk};
