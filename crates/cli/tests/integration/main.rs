mod add_tests;
mod common;
mod list_tests;
mod remove_tests;
