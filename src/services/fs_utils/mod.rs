pub mod file_utils;
pub mod path_utils;
pub mod scratch;

#[cfg(test)]
#[path = "tests/file_utils_tests.rs"]
mod file_utils_tests;

#[cfg(test)]
#[path = "tests/scratch_tests.rs"]
mod scratch_tests;
