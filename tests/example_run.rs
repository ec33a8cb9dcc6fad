//! Integration tests for the `example run` command.
use riskmap::cli::RunOpts;
use riskmap::cli::example::handle_example_run_command;
use riskmap::settings::Settings;
use tempfile::tempdir;

/// An integration test for the `example run` command.
#[test]
fn test_handle_example_run_command() {
    unsafe { std::env::set_var("RISKMAP_LOG_LEVEL", "off") };

    let output_dir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(output_dir.path().to_path_buf()),
        overwrite: false,
    };
    handle_example_run_command("flood", &opts, Some(Settings::default())).unwrap();
    assert!(output_dir.path().join("report.csv").is_file());
}
