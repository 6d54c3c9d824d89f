pub mod drive_models;
pub mod drive_service;

pub use drive_models::{FileQuery, NewFile, RemoteFile, UploadOutcome, UploadRequest};
pub use drive_service::{DriveClient, DriveError, DriveService};
