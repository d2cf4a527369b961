use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use pcb_trace_core::{partition, Board, LastIds};
use serde::Serialize;

#[derive(Args, Debug)]
#[command(about = "Display board contents and id counters")]
pub struct InfoArgs {
    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Board file (.jpcb or .pcb)
    pub path: PathBuf,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[derive(Debug, Serialize)]
struct BoardSummary {
    path: String,
    components: Vec<ComponentSummary>,
    free_points: usize,
    pads: usize,
    links: usize,
    links_by_side: BTreeMap<String, usize>,
    track_graphs: usize,
    unassigned_links: usize,
    notes: usize,
    image_layers: Vec<String>,
    last_ids: LastIds,
}

#[derive(Debug, Serialize)]
struct ComponentSummary {
    id: i32,
    name: String,
    pads: usize,
    #[serde(skip)]
    display: String,
}

pub fn execute(args: InfoArgs) -> Result<()> {
    let board = Board::open(&args.path)
        .with_context(|| format!("Failed to load board {}", args.path.display()))?;
    let summary = summarize(&args.path, &board);

    match args.format {
        OutputFormat::Human => print_human_readable(&summary),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    Ok(())
}

fn summarize(path: &std::path::Path, board: &Board) -> BoardSummary {
    let mut links_by_side = BTreeMap::new();
    for link in board.links() {
        *links_by_side.entry(link.side().to_string()).or_insert(0) += 1;
    }

    BoardSummary {
        path: path.display().to_string(),
        components: board
            .components()
            .map(|c| ComponentSummary {
                id: c.id().0,
                name: c.name().to_string(),
                pads: c.pad_count(),
                display: c.to_string(),
            })
            .collect(),
        free_points: board.points().filter(|p| !p.is_pad()).count(),
        pads: board.points().filter(|p| p.is_pad()).count(),
        links: board.link_count(),
        links_by_side,
        track_graphs: partition(board).len(),
        unassigned_links: board.links().filter(|l| l.graph_id().is_none()).count(),
        notes: board.notes().count(),
        image_layers: board.image_layers().map(|l| l.side.to_string()).collect(),
        last_ids: board.registry().last_ids(),
    }
}

fn print_human_readable(summary: &BoardSummary) {
    println!("{}", "Board Information".blue().bold());
    println!("File: {}", summary.path);
    println!();

    if summary.components.is_empty() {
        println!("No components");
    } else {
        println!(
            "{} ({})",
            "Components".blue(),
            summary.components.len()
        );
        for component in &summary.components {
            println!("  {}", component.display.green());
        }
    }
    println!();

    let (free, pads) = (summary.free_points, summary.pads);
    println!("Points: {free} free, {pads} pads");
    if summary.links_by_side.is_empty() {
        println!("Links: 0");
    } else {
        let sides: Vec<String> = summary
            .links_by_side
            .iter()
            .map(|(side, count)| format!("{side}: {count}"))
            .collect();
        println!("Links: {} ({})", summary.links, sides.join(", "));
    }
    println!(
        "Track graphs: {} ({} unassigned link(s))",
        summary.track_graphs, summary.unassigned_links
    );
    println!("Notes: {}", summary.notes);
    if !summary.image_layers.is_empty() {
        println!("Image layers: {}", summary.image_layers.join(", "));
    }

    let ids = &summary.last_ids;
    println!(
        "Counters: point {}, link {}, track graph {}, component {}",
        ids.point, ids.link, ids.track_graph, ids.component
    );
}
