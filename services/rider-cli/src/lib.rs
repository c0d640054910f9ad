mod cli;
mod demo;
mod infra;
mod rider;

use campus_ride::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
