use crate::demo::{run_demo, DemoArgs};
use crate::rider::{run_password, run_request, run_suggest, PasswordArgs, RequestArgs, SuggestArgs};
use campus_ride::error::AppError;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "campus-ride",
    about = "Request and follow campus rides from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up address suggestions for a pickup or drop-off
    Suggest(SuggestArgs),
    /// Check a candidate password against the credential policy
    Password(PasswordArgs),
    /// Submit a ride request and follow it until it ends
    Request(RequestArgs),
    /// Run the end-to-end rider scenario against in-memory services (default command)
    Demo(DemoArgs),
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Demo(DemoArgs::default()));

    match command {
        Command::Suggest(args) => run_suggest(args).await,
        Command::Password(args) => run_password(args),
        Command::Request(args) => run_request(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
