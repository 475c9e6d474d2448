use camp_enroll::interfaces::cli::{self, Cli};
use camp_enroll::logging;
use clap::Parser;
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let shutdown = async {
        // If the handler cannot be installed, polling runs until confirmation.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    cli::run(cli, shutdown).await?;
    Ok(())
}
