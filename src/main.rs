use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use termsnap::error::find_termsnap_error;
use termsnap::{
    CaptureArchiveExpander, Config, DiskResources, ImageExpander, OsFileSystem, PeriodicJob,
    ScreenRenderer,
};

const JOB_NAME: &str = "image-expander";

#[derive(Debug, Parser)]
#[command(name = "termsnap")]
#[command(about = "Render captured 3270 terminal screens into PNG images")]
struct Cli {
    /// YAML settings file; command line flags take precedence.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Expand every capture archive under ROOT once.
    Expand(ExpandArgs),
    /// Keep expanding new archives under ROOT until stdin reaches end of line.
    Watch {
        #[command(flatten)]
        args: ExpandArgs,
        #[arg(long = "interval-ms")]
        interval_ms: Option<u64>,
    },
}

#[derive(Debug, Args)]
struct ExpandArgs {
    root: PathBuf,
    /// Overwrite images that already exist.
    #[arg(long)]
    force: bool,
    /// Add a summary line below each screen.
    #[arg(long = "status-line")]
    status_line: bool,
    #[arg(long = "fonts-dir")]
    fonts_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let code = find_termsnap_error(&error)
                .map(|error| error.code())
                .unwrap_or("UNEXPECTED_ERROR");
            eprintln!("{code}: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    match cli.command {
        Commands::Expand(args) => {
            let config = apply_overrides(config, &args, None)?;
            run_expand(&config, &args.root)
        }
        Commands::Watch { args, interval_ms } => {
            let config = apply_overrides(config, &args, interval_ms)?;
            run_watch(&config, &args.root)
        }
    }
}

fn apply_overrides(
    mut config: Config,
    args: &ExpandArgs,
    interval_ms: Option<u64>,
) -> Result<Config> {
    config.force_overwrite |= args.force;
    config.status_line |= args.status_line;
    if let Some(fonts_dir) = &args.fonts_dir {
        config.fonts_dir = fonts_dir.clone();
    }
    if let Some(interval_ms) = interval_ms {
        config.poll_interval_ms = interval_ms;
    }
    config.validate()?;
    Ok(config)
}

fn build_expander(config: &Config) -> Arc<dyn ImageExpander> {
    let resources = DiskResources::new(&config.fonts_dir);
    let renderer =
        ScreenRenderer::from_resources(&resources, config.font_size, config.render_options());
    Arc::new(CaptureArchiveExpander::new(
        Arc::new(OsFileSystem::new()),
        Arc::new(renderer),
        config.force_overwrite,
    ))
}

fn run_expand(config: &Config, root: &Path) -> Result<()> {
    let expander = build_expander(config);
    expander
        .expand_images(root)
        .with_context(|| format!("failed to expand images under '{}'", root.display()))?;
    print_summary(expander.as_ref());
    Ok(())
}

fn run_watch(config: &Config, root: &Path) -> Result<()> {
    let expander = build_expander(config);
    let job_expander = Arc::clone(&expander);
    let job_root = root.to_path_buf();
    let job = PeriodicJob::new(JOB_NAME, config.poll_interval(), move || {
        job_expander
            .expand_images(&job_root)
            .with_context(|| format!("failed to expand images under '{}'", job_root.display()))
    });

    job.start()?;
    info!(root = %root.display(), "watching for new captures, press Enter to stop");
    let mut line = String::new();
    let read = io::stdin()
        .read_line(&mut line)
        .context("failed to read from stdin");
    job.stop();
    read?;

    print_summary(expander.as_ref());
    Ok(())
}

fn print_summary(expander: &dyn ImageExpander) {
    println!(
        "Expanded a total of {} images from .gz files.",
        expander.expanded_image_file_count()
    );
}
