use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use pcb_trace_core::{AppearanceConfig, Board};

#[derive(Args, Debug)]
#[command(about = "Convert a board between .jpcb and .pcb")]
pub struct ConvertArgs {
    /// Board file to read
    pub input: PathBuf,

    /// Destination; the format follows the extension (.jpcb or .pcb)
    pub output: PathBuf,

    /// Recompute track graphs before writing
    #[arg(long)]
    pub recompute: bool,

    /// Appearance settings (TOML) to store in the output
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

pub fn execute(args: ConvertArgs) -> Result<()> {
    let mut board = Board::open(&args.input)
        .with_context(|| format!("Failed to load board {}", args.input.display()))?;

    if let Some(path) = &args.config {
        let appearance = AppearanceConfig::from_file(path)
            .with_context(|| format!("Failed to read appearance config {}", path.display()))?;
        board.set_appearance(appearance);
    }

    if args.recompute {
        let graphs = board.recompute_track_graphs()?;
        log::info!("Assigned {} track graph(s)", graphs.len());
    }

    let written = board
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    eprintln!(
        "{} {} -> {}",
        "Converted".green().bold(),
        args.input.display(),
        written.display()
    );
    Ok(())
}
