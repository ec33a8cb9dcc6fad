//! Integration tests for the `validate` command.
use riskmap::cli::handle_validate_command;
use riskmap::log::is_logger_initialised;
use riskmap::settings::Settings;
use std::path::PathBuf;

/// Get the path to the demo project.
fn get_project_dir() -> PathBuf {
    PathBuf::from("demos/flood")
}

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("RISKMAP_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());

    handle_validate_command(&get_project_dir(), Some(Settings::default())).unwrap();

    assert!(is_logger_initialised());
}
