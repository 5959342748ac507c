use crate::report::{run_migrate, run_report, MigrateArgs, ReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use shopfloor::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "shopfloor-api",
    about = "Record shop-floor production and report operator productivity",
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
    /// Print an operator productivity report from CSV exports
    Report(ReportArgs),
    /// Convert legacy JSON log documents to the current log shape
    Migrate(MigrateArgs),
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
        Command::Report(args) => run_report(args),
        Command::Migrate(args) => run_migrate(args),
    }
}
