//! End-to-end tests of the public phasekit-lib API: recipes written as
//! JSON, resolved against an input table and built on disk.

mod inputs_tests;
mod recipe_tests;
