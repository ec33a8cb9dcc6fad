//! The command line interface for riskmap.
use crate::definitions::Definitions;
use crate::error::Stage;
use crate::impact::ImpactFunction;
use crate::input::layer::{read_layer, write_layer};
use crate::input::load_project;
use crate::input::observation::read_observations;
use crate::log;
use crate::observation::{categorise, merge_observations};
use crate::output::metadata::write_metadata;
use crate::output::{create_output_directory, get_output_dir, write_results};
use crate::settings::Settings;
use ::log::{debug, info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for riskmap.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run an impact assessment.
    Run {
        /// Path to the project directory.
        project_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Validate a project.
    Validate {
        /// The path to the project directory.
        project_dir: PathBuf,
    },
    /// Merge flood observations into a layer of administrative units.
    MergeObservations {
        /// CSV file of observations, with ID_RWKEL and KETINGGIAN columns.
        dim_file: PathBuf,
        /// GeoJSON layer of administrative units with an ID_RWKEL attribute.
        layer_file: PathBuf,
        /// Path for the merged GeoJSON layer.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Manage example projects.
    Example {
        /// The available subcommands for managing example projects.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Manage program settings.
    Settings {
        /// The available subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { project_dir, opts } => handle_run_command(&project_dir, &opts, None),
            Self::Validate { project_dir } => handle_validate_command(&project_dir, None),
            Self::MergeObservations {
                dim_file,
                layer_file,
                output,
            } => handle_merge_observations_command(&dim_file, &layer_file, &output, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start riskmap
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ riskmap --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Handle the `run` command.
pub fn handle_run_command(
    project_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(project_path)?;
        &pathbuf
    };

    // The command-line flag can only turn overwriting on
    let allow_overwrite = opts.overwrite || settings.overwrite;
    let overwrite = create_output_directory(output_path, allow_overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    // Initialise program logger
    log::init(Some(&settings.log_level), Some(output_path))
        .context("Failed to initialise logging.")?;

    // Load the project to run
    let project = load_project(project_path).context("Failed to load project.")?;
    info!("Loaded project from {}", project_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let mut progress = |current: usize, total: usize, stage: Stage| {
        if current + 1 == total {
            debug!("{stage} stage processed {total} features");
        }
    };
    let (function, result) = project
        .run(Some(&mut progress))
        .context("Impact assessment failed.")?;
    info!("Loss breakdown:\n{}", result.report);

    write_results(output_path, &result, function.hazard_rings())
        .context("Failed to write results.")?;
    write_metadata(output_path, project_path, function.info().id)
        .context("Failed to write metadata.")?;
    info!("Impact assessment complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(project_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    // Load the project and check that an impact function can be built from it
    let project = load_project(project_path).context("Failed to validate project.")?;
    ImpactFunction::build(
        project.hazard,
        &project.parameters,
        project.vulnerability,
        None,
    )
    .context("Failed to validate project.")?;
    info!("Project validation successful!");

    Ok(())
}

/// Handle the `merge-observations` command.
pub fn handle_merge_observations_command(
    dim_path: &Path,
    layer_path: &Path,
    output_path: &Path,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    let observations = read_observations(dim_path)?;
    let categories = categorise(observations);
    info!(
        "Read flood observations for {} units from {}",
        categories.len(),
        dim_path.display()
    );

    let layer = read_layer(layer_path)?;
    let merged = merge_observations(&layer, &categories, &Definitions::default())?;
    write_layer(output_path, &merged)?;
    info!("Wrote merged layer to {}", output_path.display());

    Ok(())
}
