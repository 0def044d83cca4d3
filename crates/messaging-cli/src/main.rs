use messaging_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!(error = %e, "Command failed");
        eprintln!("messaging: {}", e);

        std::process::exit(e.exit_code());
    }
}
