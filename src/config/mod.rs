//! Static configuration: app registry and prompt templates.

mod apps;
pub mod prompts;

pub use apps::{get_package, resolve_package, APP_PACKAGES};
