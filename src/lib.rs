pub mod config;
pub mod db;
pub mod drive;
pub mod error;
pub mod google_oauth;
pub mod service;
pub mod utils;

pub use config::Config;
pub use db::{MessageLedger, MessageRecord};
pub use drive::{FolderReference, FolderResolver, UploadedFile, Uploader};
pub use error::{CourierError, Result};
pub use google_oauth::{AuthorizationManager, CodeProvider, StdinCodeProvider, StoredCredential};
pub use service::{InboundMessage, IngestOutcome, Ingestor};
