use crate::commands::{run_admin, run_history, run_status, run_submit, AdminArgs, SubmitArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use securekyc::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "securekyc",
    about = "Validate, upload and submit identity documents for verification",
    version
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the in-memory verification sandbox (default command)
    Sandbox(ServeArgs),
    /// Show the account's verification status and the next available action
    Status(OutputArgs),
    /// Validate, upload and submit one document
    Submit(SubmitArgs),
    /// List the account's previous submissions
    History(OutputArgs),
    /// List every submission (admin token required)
    Admin(AdminArgs),
}

/// Overrides for reaching the verification service.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct ConnectionArgs {
    /// Base URL of the verification service
    #[arg(long, global = true)]
    pub(crate) api_url: Option<String>,
    /// Bearer token for the verification service
    #[arg(long, global = true)]
    pub(crate) token: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the sandbox server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the sandbox server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct OutputArgs {
    /// Print the raw JSON view instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Sandbox(ServeArgs::default()));

    match command {
        Command::Sandbox(args) => server::run(args).await,
        Command::Status(args) => run_status(cli.connection, args).await,
        Command::Submit(args) => run_submit(cli.connection, args).await,
        Command::History(args) => run_history(cli.connection, args).await,
        Command::Admin(args) => run_admin(cli.connection, args).await,
    }
}
