//! Export of generated documents to Google Drive folders.

pub mod folder;
pub mod uploader;

pub use folder::{FolderReference, FolderResolver};
pub use uploader::{DOCX_MIME_TYPE, UploadedFile, Uploader};
