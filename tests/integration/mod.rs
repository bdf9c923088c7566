//! Integration test modules

pub mod test_utils;
pub mod support;

mod calculator_integration;
mod engine_create;
