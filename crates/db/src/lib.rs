pub mod connection;
pub mod memory;
pub mod migrations;
pub mod pagination;
pub mod query;
pub mod repositories;
pub mod store;

pub use connection::{connect, connect_with_settings, DbPool};
pub use memory::InMemoryJobStore;
pub use pagination::{fetch_all, PageSpec};
pub use query::{Filter, JobQuery};
pub use store::{JobStore, PostgrestJobStore, StoreError};
