//! Page render cache and speculative prefetch engine for paginated
//! document viewers.

pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod registry;
pub mod request;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod store;
pub mod synthetic;
pub mod types;

pub mod test_utils;

pub use config::CacheConfig;
pub use controller::CacheController;
pub use document::{DocumentId, DocumentProvider, PageRenderer};
pub use error::{ConfigError, RenderFault, SessionError};
pub use request::{Preload, Settlement};
pub use session::{DocumentSession, PageView};
pub use state::{Command, Effect, ViewState};
pub use types::*;
