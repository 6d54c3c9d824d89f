// The infra module contains implementations of core traits.
// Each external service gets its own submodule.

#[path = "google_auth/mod.rs"]
pub mod google_auth;

#[path = "drive/mod.rs"]
pub mod drive;

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "summaries/csv_store.rs"]
pub mod summaries;
