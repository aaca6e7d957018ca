//! gsv-console library
//!
//! Core components of a terminal console for a remote GPT-SoVITS training
//! service: starting jobs and tailing their logs.

pub mod app;
pub mod client;
pub mod error;
pub mod event;
pub mod logging;
pub mod monitor;
pub mod state;
pub mod ui;
