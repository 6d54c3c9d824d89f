pub mod prompt;
pub mod summary_models;
pub mod summary_service;
pub mod summary_store;

pub use prompt::SummaryPrompt;
pub use summary_models::{DocumentPayload, SummaryFormat, SummaryRecord};
pub use summary_service::{SummaryProvider, SummaryService};
pub use summary_store::{StoreError, SummaryStore};
