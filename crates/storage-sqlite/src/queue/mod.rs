//! Mutation queue persistence.

mod model;
mod repository;

pub use repository::SqliteMutationStore;
