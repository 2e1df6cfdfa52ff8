//! Core types for Tally

pub mod document;
pub mod report;
pub mod verb;
