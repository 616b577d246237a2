//! Command-line front end for the PDF bundler.
pub mod cli;
pub mod config;
pub mod logging;
pub mod pipeline;
