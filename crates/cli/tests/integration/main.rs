//! Integration tests that run full builds through the phasekit binary.

mod build_tests;
mod common;
