//! Shared state for stepwise invocation trees.
//!
//! A [`Context`] is created once by the outermost caller and lent mutably to
//! every step in the tree. Steps read and write named fields on it and mark it
//! failed to abort the whole tree with an expected failure.

mod context;
mod error;
mod failure;

pub use context::Context;
pub use error::ContextError;
pub use failure::Failure;
