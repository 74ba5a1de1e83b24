use anyhow::{Context, Result};
use casegen_core::generation::FormatKind;
use casegen_infrastructure::{CasegenPaths, ConfigService};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

mod commands;

#[derive(Parser)]
#[command(name = "casegen")]
#[command(about = "casegen - generate and refine test cases for a requirement", long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to ~/.config/casegen/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Project the requirement belongs to
    #[arg(long, short = 'p', global = true, default_value = "default")]
    project: String,

    /// Requirement identifier
    #[arg(long, short = 'r', global = true, default_value = "default")]
    requirement: String,

    /// Requirement title stored with every version
    #[arg(long, global = true, default_value = "")]
    title: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate test cases and store them as a new version
    Generate {
        /// Requirement text, or @path to read it from a file
        #[arg(long)]
        requirements: String,
        /// Functional context, or @path to read it from a file
        #[arg(long)]
        context: String,
        #[arg(long, value_enum, default_value_t = FormatArg::Default)]
        format: FormatArg,
        /// Example test case for the custom format, or @path
        #[arg(long)]
        example: Option<String>,
    },
    /// Replace the content of a version with a file ("-" reads stdin)
    Edit {
        file: PathBuf,
        /// Version to edit (defaults to the latest)
        #[arg(long)]
        version: Option<String>,
    },
    /// Ask the assistant to revise the test cases
    Chat {
        /// Messages, sent one after the other
        #[arg(required = true)]
        messages: Vec<String>,
        /// Ask for the whole rewritten document
        #[arg(long)]
        direct: bool,
        /// Version the conversation works on (defaults to the latest)
        #[arg(long)]
        version: Option<String>,
        /// Requirement text sent as context to the assistant
        #[arg(long, default_value = "")]
        requirements: String,
    },
    /// List stored versions
    History {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the content of a version
    Activate { version: String },
    /// Delete a version
    Delete { version: String },
    /// Write a default config file if none exists
    Init,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Default,
    Gherkin,
    Custom,
}

impl From<FormatArg> for FormatKind {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Default => FormatKind::Default,
            FormatArg::Gherkin => FormatKind::Gherkin,
            FormatArg::Custom => FormatKind::Custom,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_service = match &cli.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new()?,
    };
    let _guard = init_tracing(config_service.path().parent().map(PathBuf::from));

    if let Commands::Init = cli.command {
        let created = config_service.write_default_if_missing()?;
        let state = if created { "Created" } else { "Kept existing" };
        println!("{} {}", state, config_service.path().display());
        return Ok(());
    }

    let mut config = config_service
        .get_config()
        .context("Failed to load configuration")?;
    if let Some(base_url) = cli.base_url.clone() {
        config.client.base_url = base_url;
    }
    tracing::info!("[Bootstrap] casegen starting against {}", config.client.base_url);

    let target = commands::Target {
        project: cli.project,
        requirement: cli.requirement,
        title: cli.title,
    };

    match cli.command {
        Commands::Generate {
            requirements,
            context,
            format,
            example,
        } => {
            let example = example.map(|e| commands::read_arg(&e)).transpose()?;
            commands::document::generate(
                &config.client,
                &target,
                commands::read_arg(&requirements)?,
                commands::read_arg(&context)?,
                format.into(),
                example,
            )
            .await
        }
        Commands::Edit { file, version } => {
            commands::document::edit(&config.client, &target, &file, version.as_deref()).await
        }
        Commands::Chat {
            messages,
            direct,
            version,
            requirements,
        } => {
            let requirements = commands::read_arg(&requirements)?;
            commands::document::chat(
                &config.client,
                &target,
                requirements,
                messages,
                direct,
                version.as_deref(),
            )
            .await
        }
        Commands::History { json } => commands::history::list(&config.client, &target, json).await,
        Commands::Activate { version } => {
            commands::history::activate(&config.client, &target, &version).await
        }
        Commands::Delete { version } => {
            commands::history::delete(&config.client, &target, &version).await
        }
        Commands::Init => Ok(()),
    }
}

/// Warnings go to stderr; the `RUST_LOG` filter (default `info`) applies to
/// the daily log file under the config directory.
fn init_tracing(config_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let logs_dir = CasegenPaths::new(config_dir.as_deref()).logs_dir().ok();

    let stderr_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::WARN);

    let (file_layer, guard) = match logs_dir {
        Some(dir) if std::fs::create_dir_all(&dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, "casegen.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}
