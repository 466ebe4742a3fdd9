//! # Storefront Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter
//! - Build the exchange rate matrix and the payment gateway client
//! - Start the HTTP server

mod config;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_hex::{StorefrontService, inbound::HttpServer, outbound::ZarinpalGateway};
use storefront_repo::build_repo;

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("storefront-service"), provider))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // OpenTelemetry export is opt-in
    let (telemetry, otel_provider) = if config::otel_enabled() {
        let (tracer, provider) = init_tracer()?;
        (
            Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            Some(provider),
        )
    } else {
        (None, None)
    };

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront_app=debug,storefront_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting storefront server on port {}", config.port);
    tracing::info!(
        sandbox = config.gateway.sandbox,
        currency = ?config.gateway.currency,
        "Using Zarinpal gateway"
    );

    for (from, to) in config.rates.missing_pairs() {
        tracing::warn!(%from, %to, "No exchange rate configured; prices will pass through unconverted");
    }

    // Build repository (handles connection and migration)
    let repo = build_repo(&config.database_url).await?;

    let gateway = ZarinpalGateway::new(config.gateway)?;

    let service = StorefrontService::new(repo, gateway, Arc::new(config.rates))
        .with_lock_ttl(config.lock_ttl);

    // Create and run the HTTP server
    let server = HttpServer::with_rate_limit(service, config.rate_limit_per_minute);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    if let Some(provider) = otel_provider {
        let _ = provider.shutdown();
    }
    Ok(())
}
