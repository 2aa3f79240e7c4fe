use clap::Parser;
use xytable::cli::{self, Cli};
use xytable::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The console owns the terminal, so it logs to a file.
    let level = if cli.is_console() {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    init_logging(cli.log_target()?.as_deref(), level)?;
    tracing::info!("xytable {} (built {})", xytable::VERSION, xytable::BUILD_DATE);

    cli::run(cli).await
}
