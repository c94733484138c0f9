mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use securekyc::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

/// What the binary prints for a failed command, followed by the next step when one exists.
pub fn failure_lines(err: &AppError) -> Vec<String> {
    let mut lines = vec![format!("error: {}", err.user_message())];
    if err.requires_authentication() {
        lines.push("Rerun with --token <TOKEN> or set KYC_API_TOKEN.".to_string());
    } else if err.retry_permitted() {
        lines.push("The submission can be retried with the same command.".to_string());
    }
    lines
}
