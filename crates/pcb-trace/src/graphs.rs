use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, Table};
use pcb_trace_core::{partition, Board, Side, TrackGraph};

#[derive(Args, Debug)]
#[command(about = "List connected groups of links")]
pub struct GraphsArgs {
    /// Board file (.jpcb or .pcb)
    pub path: PathBuf,

    /// Renumber the groups instead of showing the stored ids. The file is
    /// not modified.
    #[arg(long)]
    pub recompute: bool,
}

pub fn execute(args: GraphsArgs) -> Result<()> {
    let mut board = Board::open(&args.path)
        .with_context(|| format!("Failed to load board {}", args.path.display()))?;

    let graphs = if args.recompute {
        board.recompute_track_graphs()?
    } else {
        partition(&board)
    };

    if graphs.is_empty() {
        println!("No links");
        return Ok(());
    }

    println!("{}", render(&board, &graphs));
    Ok(())
}

fn render(board: &Board, graphs: &[TrackGraph]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);

    table.set_header(vec![
        Cell::new("Graph")
            .fg(Color::Blue)
            .add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Links")
            .fg(Color::Blue)
            .add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Points")
            .fg(Color::Blue)
            .add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Pads")
            .fg(Color::Blue)
            .add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Sides")
            .fg(Color::Blue)
            .add_attribute(comfy_table::Attribute::Bold),
    ]);

    for graph in graphs {
        let id = match graph.id {
            Some(id) => Cell::new(id.0),
            None => Cell::new("-").fg(Color::Yellow),
        };
        let pads = graph
            .points
            .iter()
            .filter_map(|&p| board.point(p))
            .filter(|p| p.is_pad())
            .count();
        let sides: BTreeSet<Side> = graph
            .links
            .iter()
            .filter_map(|&l| board.link(l))
            .map(|l| l.side())
            .collect();
        let sides: Vec<&str> = sides.iter().map(|s| s.as_str()).collect();

        table.add_row(vec![
            id,
            Cell::new(graph.links.len()),
            Cell::new(graph.points.len()),
            Cell::new(pads),
            Cell::new(sides.join(", ")),
        ]);
    }

    table
}
