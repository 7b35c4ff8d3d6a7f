use clap::Parser;
use ocr_session::cli::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting ocr-session v{}", env!("CARGO_PKG_VERSION"));

    #[cfg(feature = "engine-leptess")]
    let result =
        ocr_session::cli::run(args, ocr_session::engines::leptess::LeptessEngine::new()).await;

    #[cfg(not(feature = "engine-leptess"))]
    let result: anyhow::Result<()> = {
        drop(args);
        Err(anyhow::anyhow!(
            "No OCR engines available. Build with --features engine-leptess"
        ))
    };

    result
}
