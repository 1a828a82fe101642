//! Core domain for the slainte offline-first client.
//!
//! The centerpiece is [`queue`]: a durable offline mutation queue with a
//! connectivity-aware sync engine that replays recorded user intents against
//! the remote service once a usable network path exists.

pub mod errors;
pub mod queue;
