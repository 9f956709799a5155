//! Rendering of dashboard data for people and machines.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report, write_report};
