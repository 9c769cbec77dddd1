//! Report output: console text and JSON documents

pub mod json;
pub mod text;
