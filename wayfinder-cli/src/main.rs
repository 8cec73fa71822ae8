// Wayfinder Command Line Interface
// Grounds detector output in a scene and resolves navigation instructions

mod console;
mod session;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use session::{FrameArgs, GroundingSession};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wayfinder_eye::{summarize, VisionConfig};

#[derive(Parser)]
#[command(name = "wayfinder")]
#[command(about = "Wayfinder - ground object detections in a 3D scene and navigate to them", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Vision configuration file (JSON or TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one grounding cycle and print the snapshot
    Ground {
        #[command(flatten)]
        frame: FrameArgs,

        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ground one frame and resolve a navigation instruction against it
    Navigate {
        #[command(flatten)]
        frame: FrameArgs,

        /// Instruction, e.g. "guide me to the red car"
        message: String,
    },

    /// Interactive console over a grounded frame
    Console {
        #[command(flatten)]
        frame: FrameArgs,
    },

    /// List the detector label vocabulary
    Labels,

    /// Show the effective configuration
    Config {
        /// Output format (toml, json)
        #[arg(long, short, default_value = "toml")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = session::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ground { frame, json } => {
            ground(config, &frame, json)?;
        }
        Commands::Navigate { frame, message } => {
            navigate(config, &frame, &message)?;
        }
        Commands::Console { frame } => {
            let session = GroundingSession::open(config, &frame)?;
            let mut console = console::InteractiveConsole::new(session);
            console.run().await?;
        }
        Commands::Labels => {
            show_labels(&config)?;
        }
        Commands::Config { format } => {
            show_config(&config, &format)?;
        }
    }

    Ok(())
}

/// Run one cycle and print the summary or JSON snapshot
fn ground(config: VisionConfig, args: &FrameArgs, json: bool) -> anyhow::Result<()> {
    let mut session = GroundingSession::open(config, args)?;
    let snapshot = session.cycle()?;

    if json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    } else {
        println!("Frame {} ({} detections)", snapshot.frame_id, snapshot.len());
        println!("{}", summarize(&snapshot));
    }

    session.close();
    Ok(())
}

/// Resolve `message` and print the target point
fn navigate(config: VisionConfig, args: &FrameArgs, message: &str) -> anyhow::Result<()> {
    let phrases = config.navigation_phrases.clone();
    let mut session = GroundingSession::open(config, args)?;
    let snapshot = session.cycle()?;
    info!("Resolving {:?} against frame {}", message, snapshot.frame_id);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let controller = session.pipeline.navigation_controller(tx);
    let outcome = controller.handle_message(message);
    session.close();

    match outcome.context("Navigation failed")? {
        Some(_) => {
            let target = rx.try_recv().map_err(|_| anyhow!("Navigation target was not delivered"))?;
            println!("Target: ({:.3}, {:.3}, {:.3})", target.x, target.y, target.z);
            Ok(())
        }
        None => bail!(
            "Not a navigation request; start the message with one of: {}",
            phrases.join(", ")
        ),
    }
}

fn show_labels(config: &VisionConfig) -> anyhow::Result<()> {
    let labels = config.label_vocabulary()?;
    for (index, label) in labels.iter().enumerate() {
        println!("{:>3}  {}", index, label);
    }
    Ok(())
}

fn show_config(config: &VisionConfig, format: &str) -> anyhow::Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(config)?),
        "toml" => println!("{}", toml::to_string_pretty(config)?),
        other => bail!("Unknown format '{}' (expected toml or json)", other),
    }
    Ok(())
}
