//! Library patron spreadsheet loader
//!
//! Reads the patron export (one row per patron), normalizes every row into a
//! patron record plus three deduplicated reference entities, performs a full
//! reload of the store and serves a small query shell over the result.

pub mod cli;
pub mod config;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod shell;
pub mod spreadsheet;
pub mod store;
