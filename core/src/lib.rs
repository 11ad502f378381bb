//! Lottery draw ingestion: parse, validate, reconcile, aggregate, and
//! persist ranked statistical studies per game.

pub mod aggregation;
pub mod api;
pub mod config;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod reconciliation;
pub mod store;
pub mod studies;
pub mod study_writer;
pub mod tabular;
pub mod types;
pub mod validator;
