//! Delegated authorization against Google: client registration, the cached
//! credential file, and the interactive authorization-code grant.

pub mod code_provider;
pub mod credentials;
mod endpoints;
pub mod service;

pub use code_provider::{CodeProvider, StdinCodeProvider};
pub use credentials::{ClientRegistration, StoredCredential};
pub use service::{AuthState, AuthorizationManager};
