mod commands;
mod config;
mod launcher;
mod monitor;
mod static_server;

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use client_core::wizard::DEFAULT_SAMPLE_TARGET;
use tracing_subscriber::EnvFilter;

use crate::commands::{NewGesture, StatusChange};

#[derive(Parser, Debug)]
#[command(name = "glide-desktop", about = "Desktop shell for the gesture-control engine")]
struct Cli {
    /// Settings file; defaults to ./glide.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the dashboard and run the backend until Ctrl-C.
    Launch {
        /// Open the dashboard in the system browser once the backend is up.
        #[arg(long)]
        open: bool,
    },
    /// Follow the push channel and log detections and status changes.
    Monitor,
    #[command(subcommand)]
    Gestures(GestureCommand),
    /// Change camera, detection or tuning settings on the backend.
    Status {
        #[arg(long)]
        camera: Option<Switch>,
        #[arg(long)]
        detection: Option<Switch>,
        /// Confidence threshold in percent.
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        speed: Option<f64>,
    },
    /// Retrain the model on every recorded gesture.
    Retrain {
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },
}

#[derive(Subcommand, Debug)]
enum GestureCommand {
    List,
    /// Desktop actions a gesture can trigger.
    Actions,
    /// Record samples for a new gesture and save it.
    Add {
        name: String,
        #[arg(long, default_value = shared::actions::NO_ACTION)]
        action: String,
        #[arg(long, default_value_t = DEFAULT_SAMPLE_TARGET)]
        samples: u32,
        #[arg(long)]
        emoji: Option<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        action: Option<String>,
    },
    Map {
        id: String,
        action: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl From<Switch> for bool {
    fn from(value: Switch) -> Self {
        matches!(value, Switch::On)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_settings(cli.config.as_deref())?;

    match cli.command {
        Command::Launch { open } => launcher::run(config, open).await,
        Command::Monitor => monitor::run(config.client).await,
        Command::Gestures(command) => match command {
            GestureCommand::List => commands::list_gestures(&config.client).await,
            GestureCommand::Actions => {
                commands::list_actions();
                Ok(())
            }
            GestureCommand::Add {
                name,
                action,
                samples,
                emoji,
            } => {
                let new = NewGesture {
                    name,
                    action,
                    emoji,
                    samples,
                };
                commands::add_gesture(&config.client, new).await
            }
            GestureCommand::Edit { id, name, action } => {
                commands::rename_gesture(&config.client, &id, &name, action.as_deref()).await
            }
            GestureCommand::Map { id, action } => {
                commands::map_action(&config.client, &id, &action).await
            }
            GestureCommand::Delete { id } => commands::delete_gesture(&config.client, &id).await,
        },
        Command::Status {
            camera,
            detection,
            threshold,
            speed,
        } => {
            let change = StatusChange {
                camera: camera.map(bool::from),
                detection: detection.map(bool::from),
                threshold,
                speed,
            };
            commands::update_status(&config.client, change).await
        }
        Command::Retrain { timeout_secs } => {
            commands::retrain(&config.client, Duration::from_secs(timeout_secs)).await
        }
    }
}
