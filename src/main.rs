use clap::Parser;
use docscan_ocr::cli::{self, Args};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the JSON reports, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Starting docscan-ocr v{}", env!("CARGO_PKG_VERSION"));

    if let Err(err) = cli::run(&args) {
        tracing::error!("{}", err);
        println!("{}", serde_json::to_string(&err.to_response())?);
        std::process::exit(1);
    }

    Ok(())
}
