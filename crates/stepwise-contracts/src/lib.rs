//! # stepwise-contracts
//!
//! Shared types for the stepwise agent runtime: steps and protocols, tool
//! descriptors and policy verdicts, capabilities, transcript records and
//! the error type.
//!
//! Every crate in the workspace imports from here. No behavior lives in this
//! crate beyond small accessors on the data types.

pub mod capability;
pub mod error;
pub mod step;
pub mod tool;
pub mod turn;
