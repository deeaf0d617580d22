//! CLI module for Deeplinker
//!
//! `serve` runs the resolution server; the other commands administer the
//! link file or run the client hand-off flows locally.

pub mod error;
pub mod output;

pub mod config;
pub mod handoff;
pub mod links;
pub mod resolve;
pub mod serve;
