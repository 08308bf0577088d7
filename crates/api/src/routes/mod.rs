//! Route Handlers

pub mod echo;
pub mod events;
pub mod history;
pub mod ingest;
