//! Cinder CLI - command-line front end for the particle engine

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{hash, simulate, validate};

#[derive(Parser)]
#[command(name = "cinder")]
#[command(about = "Headless particle effect engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an effect file and report its emitters
    Validate {
        /// Path to effect file
        effect: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Hash a name the way the engine hashes animation ids
    Hash {
        /// Name to hash
        name: String,
    },

    /// Run an effect headless and report simulation stats
    Simulate {
        /// Path to effect file
        effect: String,

        /// Number of update ticks
        #[arg(long, default_value = "60")]
        ticks: u32,

        /// Seconds per tick
        #[arg(long, default_value = "0.016666668")]
        dt: f32,

        /// Context seed
        #[arg(long, default_value = "0")]
        seed: u32,

        /// Particle cap per emitter pool
        #[arg(long, default_value = "1024")]
        max_particles: u32,

        /// Instance position (comma-separated x,y,z)
        #[arg(long, value_parser = parse_vec3)]
        position: Option<[f32; 3]>,

        /// Tiles in the synthetic flipbook strip
        #[arg(long, default_value = "1")]
        tiles: u32,

        /// Stop the instance at this tick and let it drain
        #[arg(long)]
        stop_at: Option<u32>,

        /// Emit the final report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_vec3(s: &str) -> Result<[f32; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected 3 comma-separated values, got {}", parts.len()));
    }
    let x: f32 = parts[0].trim().parse().map_err(|e| format!("invalid x: {}", e))?;
    let y: f32 = parts[1].trim().parse().map_err(|e| format!("invalid y: {}", e))?;
    let z: f32 = parts[2].trim().parse().map_err(|e| format!("invalid z: {}", e))?;
    Ok([x, y, z])
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { effect, format } => validate::run(&effect, &format),
        Commands::Hash { name } => hash::run(&name),
        Commands::Simulate {
            effect,
            ticks,
            dt,
            seed,
            max_particles,
            position,
            tiles,
            stop_at,
            json,
        } => simulate::run(simulate::SimulateArgs {
            effect,
            ticks,
            dt,
            seed,
            max_particles,
            position,
            tiles,
            stop_at,
            json,
        }),
    }
}
