use crate::demo::{run_demo, run_simulation, DemoArgs, SimulateArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use mechmatch::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Roadside Mechanic Marketplace",
    about = "Run the roadside mechanic marketplace service and its matching demos",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk the matching and rating feedback loop on the command line
    Demo(DemoArgs),
    /// Explore candidate weight pairs offline with the epsilon-greedy bandit
    Simulate(SimulateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Simulate(args) => run_simulation(args),
    }
}
