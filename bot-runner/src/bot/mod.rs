//! Bot sessions and the query pipeline they drive.
//!
//! Actions received from the sync server flow through the classifier into a
//! [`QueryBatch`], the batch is sent to the model server through the
//! deployment client, and predictions come back as new edit actions.

mod batch;
mod classifier;
mod registry;
mod session;

pub use batch::QueryBatch;
pub use classifier::{action_to_query, build_result_action, classify};
pub use registry::BotRegistry;
pub use session::{Session, SessionState, SessionStatus};
