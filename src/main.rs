//! Image Stream - image transformation server and converter.
//!
//! This binary starts the HTTP server or runs a single conversion.

use clap::Parser;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_stream::{
    config::{Cli, Command, ConvertConfig, ProcessingConfig, ServeConfig},
    create_router, QueryStore, RasterCodec, ReaderSource, RouterConfig, Stream, WriterSink,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Convert(config) => run_convert(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    log_processing_config(&config.processing);

    let router_config = build_router_config(&config);
    let router = create_router(RasterCodec::new(), config.processing.clone(), router_config);

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Image Stream v{}", env!("CARGO_PKG_VERSION"));
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!(
        "    curl --data-binary @in.jpg 'http://{}/?w=300&output=webp' -o out.webp",
        addr
    );
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn log_processing_config(config: &ProcessingConfig) {
    info!("Configuration:");
    info!("  Savers: {}", config.savers.names());
    info!(
        "  Quality: jpeg {}, webp {}, avif {}, tiff {}",
        config.jpeg_quality, config.webp_quality, config.avif_quality, config.tiff_quality
    );
    info!(
        "  Limits: {} pages, {} pixels, {}s timeout",
        config.max_pages, config.limit_input_pixels, config.process_timeout
    );
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_stream=debug,tower_http=debug"
    } else {
        "image_stream=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_max_body_size(config.max_body_size)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Convert Command
// =============================================================================

fn run_convert(config: ConvertConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.processing.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let input = match File::open(&config.input) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to open {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let output = match File::create(&config.output) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to create {}: {}", config.output.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut source = ReaderSource::new(BufReader::new(input), config.input.display().to_string());
    let mut sink = WriterSink::new(BufWriter::new(output));
    let mut query = QueryStore::parse(&config.query);

    let codec = RasterCodec::new();
    match Stream::new(&codec, &config.processing).process(&mut source, &mut query, &mut sink) {
        Ok(processed) => {
            info!(
                "Wrote {} ({})",
                config.output.display(),
                processed.mime_type
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            let status = image_stream::Status::from(&e);
            error!(status = status.code, "Conversion failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
