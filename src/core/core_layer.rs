// The core module holds the two workflows and the traits they depend on.
// Remote services and file formats live in `infra/`.

#[path = "drive/mod.rs"]
pub mod drive;

#[path = "summaries/mod.rs"]
pub mod summaries;
