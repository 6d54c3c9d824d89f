// Google Drive v3 implementation of the core `DriveClient` trait.

pub mod drive_client;

pub use drive_client::GoogleDriveClient;
