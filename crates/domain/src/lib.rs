//! Shared configuration types for the editor bridge.
//!
//! Every crate in the workspace reads its tunables from [`config::Config`]
//! so that the CLI, the bridge client, and the tool lifecycle manager agree
//! on defaults without depending on each other.

pub mod config;
