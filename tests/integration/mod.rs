//! Integration tests for the benchrig experiment driver

mod engine_lifecycle;
mod sequence_execution;
mod test_utils;
