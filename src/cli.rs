//! Command line interface
//!
//! `xytable` without a subcommand starts the interactive console. The
//! remaining subcommands issue one request to the control backend and
//! print the reply.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xytable_communication::{
    websocket_url, CommandResponse, ControlApi, HttpControlClient, Program, WebSocketTransport,
};
use xytable_console::{run_terminal, Console, ConsoleConfig};
use xytable_core::{Axis, DigitalOutput};
use xytable_settings::{default_config_path, default_log_path, Config};

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "xytable", version, about = "Operator console for an XY motion table")]
pub struct Cli {
    /// Settings file (.toml or .json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Control backend URL, overriding the settings file
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Interactive keyboard console (default)
    Console,
    /// Print the table status
    Status,
    /// Print the travel limits
    Limits,
    /// Move one axis by a relative distance
    Move {
        axis: Axis,
        #[arg(allow_negative_numbers = true)]
        distance: f64,
        #[arg(long)]
        speed: Option<f64>,
    },
    /// Move to an absolute position
    MoveTo {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(long)]
        speed: Option<f64>,
    },
    /// Engage the emergency stop
    Estop,
    /// Release the emergency stop
    ClearEstop,
    /// Home both axes
    Home,
    /// Switch a digital output
    Output { name: DigitalOutput, state: Switch },
    /// Manage stored programs
    #[command(subcommand)]
    Programs(ProgramsCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ProgramsCommand {
    /// List stored programs
    List,
    /// Print a program as JSON
    Show { name: String },
    /// Upload a program from a JSON file
    Save {
        file: PathBuf,
        /// Replace an existing program of the same name
        #[arg(long)]
        update: bool,
    },
    /// Delete a program
    Delete { name: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Switch::On
    }
}

impl Cli {
    /// Whether this invocation runs the interactive console
    pub fn is_console(&self) -> bool {
        matches!(self.command, None | Some(Command::Console))
    }

    /// Where logs go: the console never writes to the terminal it draws on
    pub fn log_target(&self) -> anyhow::Result<Option<PathBuf>> {
        match (&self.log_file, self.is_console()) {
            (Some(path), _) => Ok(Some(path.clone())),
            (None, true) => Ok(Some(default_log_path()?)),
            (None, false) => Ok(None),
        }
    }
}

/// Load settings for this invocation, applying the `--backend` override
pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = if cli.config.is_some() {
        Config::load_from_file(&path)
    } else {
        Config::load_or_default(&path)
    }
    .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    match &cli.backend {
        Some(url) => Ok(config.with_backend_url(url.as_str())?),
        None => Ok(config),
    }
}

/// Run the invocation to completion
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    tracing::info!("Using control backend {}", config.backend.base_url);

    match cli.command.unwrap_or(Command::Console) {
        Command::Console => run_console(&config).await,
        command => {
            let api = HttpControlClient::new(
                &config.backend.base_url,
                config.backend.request_timeout(),
            )?;
            run_command(&api, command).await
        }
    }
}

async fn run_console(config: &Config) -> anyhow::Result<()> {
    let api: Arc<dyn ControlApi> = Arc::new(HttpControlClient::new(
        &config.backend.base_url,
        config.backend.request_timeout(),
    )?);
    let transport = WebSocketTransport::new(websocket_url(
        &config.backend.base_url,
        &config.backend.jog_path,
    )?);
    tracing::info!("Jog link at {}", transport.url());

    let (console, handle) = Console::new(api, transport, ConsoleConfig::from_settings(config));
    let runtime = tokio::spawn(console.run());

    let frontend = run_terminal(handle).await;
    runtime.await.context("Console runtime failed")?;
    frontend.context("Terminal frontend failed")
}

/// Issue one request and print the reply
pub async fn run_command(api: &dyn ControlApi, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Console => anyhow::bail!("the console is not a one-shot command"),
        Command::Status => {
            let status = api.status().await?;
            println!("Connected:      {}", yes_no(status.connected));
            println!("Position:       {}", status.current_position);
            println!("Emergency stop: {}", yes_no(status.emergency_stop));
            println!("Moving:         {}", yes_no(status.movement_in_progress));
        }
        Command::Limits => {
            let limits = api.limits().await?;
            for axis in Axis::ALL {
                let l = limits.axis(axis);
                match l.max_speed {
                    Some(speed) => println!(
                        "{}: {:.4} .. {:.4} (max speed {})",
                        axis, l.min, l.max, speed
                    ),
                    None => println!("{}: {:.4} .. {:.4}", axis, l.min, l.max),
                }
            }
            if let Some(movement) = limits.movement {
                println!(
                    "Default speed {}, tolerance {}",
                    movement.default_speed, movement.position_tolerance
                );
            }
        }
        Command::Move {
            axis,
            distance,
            speed,
        } => print_reply(api.move_relative(axis, distance, speed).await?),
        Command::MoveTo { x, y, speed } => print_reply(api.move_absolute(x, y, speed).await?),
        Command::Estop => print_reply(api.emergency_stop().await?),
        Command::ClearEstop => print_reply(api.clear_emergency_stop().await?),
        Command::Home => print_reply(api.home().await?),
        Command::Output { name, state } => print_reply(api.set_output(name, state.is_on()).await?),
        Command::Programs(command) => run_programs(api, command).await?,
    }
    Ok(())
}

async fn run_programs(api: &dyn ControlApi, command: ProgramsCommand) -> anyhow::Result<()> {
    match command {
        ProgramsCommand::List => {
            let list = api.list_programs().await?;
            for program in &list.programs {
                let modified = program
                    .modified
                    .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{:<24} {:>5} steps  {:<16} {}",
                    program.name, program.command_count, modified, program.description
                );
            }
            println!("{} program(s)", list.total);
        }
        ProgramsCommand::Show { name } => {
            let program = api.load_program(&name).await?;
            println!("{}", serde_json::to_string_pretty(&program)?);
        }
        ProgramsCommand::Save { file, update } => {
            let program = read_program(&file)?;
            let reply = if update {
                api.update_program(&program.name, &program).await?
            } else {
                api.save_program(&program).await?
            };
            print_reply(reply);
        }
        ProgramsCommand::Delete { name } => print_reply(api.delete_program(&name).await?),
    }
    Ok(())
}

/// Read a program from a JSON file
pub fn read_program(path: &Path) -> anyhow::Result<Program> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let program: Program = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a valid program", path.display()))?;
    if program.name.trim().is_empty() {
        anyhow::bail!("{} has no program name", path.display());
    }
    Ok(program)
}

fn print_reply(reply: CommandResponse) {
    if !reply.message.is_empty() {
        println!("{}", reply.message);
    } else {
        println!("{}", reply.status);
    }
    if let Some(position) = reply.position {
        println!("Position: {}", position);
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
