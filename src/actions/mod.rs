//! Action vocabulary: parsing model replies and executing them.

mod handler;
mod parser;

pub use handler::{ActionDelays, ActionHandler, ActionResult};
pub use parser::{clean_action_line, parse_action, Action, ActionError, ACTION_VOCABULARY};
