//! Labeling bot runner: mirrors task documents from a sync server and answers
//! human edits with model predictions.

pub mod api;
pub mod bot;
pub mod config;
pub mod deployment;
pub mod error;
pub mod replica;
pub mod state;
pub mod sync;
pub mod test_util;
