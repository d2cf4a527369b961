use clap::{Parser, Subcommand};

mod convert;
mod graphs;
mod info;

#[derive(Parser)]
#[command(name = "pcb-trace")]
#[command(about = "Inspect and convert traced board connectivity files")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a board file
    #[command(alias = "i")]
    Info(info::InfoArgs),

    /// List the track graphs of a board
    #[command(alias = "g")]
    Graphs(graphs::GraphsArgs),

    /// Rewrite a board in another format
    #[command(alias = "c")]
    Convert(convert::ConvertArgs),
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info(args) => info::execute(args),
        Commands::Graphs(args) => graphs::execute(args),
        Commands::Convert(args) => convert::execute(args),
    }
}
