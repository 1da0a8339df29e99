use std::sync::Arc;

use actix_web::{App, HttpServer};
use anyhow::Context;
use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::runtime::TokioCurrentThread;
use paperclip::actix::{web, OpenApiExt};
use serde::Deserialize;
use tracing_actix_web::TracingLogger;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use bookreservation_service::app_config::config_app;
use bookreservation_service::books_repository::{
    BookRepository, InMemoryBookRepository, PostgresBooksRepository,
    PostgresBooksRepositoryConfig,
};
use bookreservation_service::reservation_service::ReservationService;

// Based on https://github.com/LukeMathWalker/tracing-actix-web/blob/main/examples/opentelemetry/src/main.rs#L15
fn init_telemetry() {
    let app_name = "bookreservation_service";

    // Start a new Jaeger trace pipeline.
    // Spans are exported in batch - recommended setup for a production application.
    global::set_text_map_propagator(TraceContextPropagator::new());
    #[allow(deprecated)]
    let tracer = opentelemetry_jaeger::new_agent_pipeline()
        .with_service_name(app_name)
        .install_batch(TokioCurrentThread)
        .expect("Failed to install OpenTelemetry tracer.");

    // Filter based on level - trace, debug, info, warn, error
    // Tunable via `RUST_LOG` env variable
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info"));
    // Create a `tracing` layer using the Jaeger tracer
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);
    // Create a `tracing` layer to emit spans as structured logs to stdout
    let formatting_layer = BunyanFormattingLayer::new(app_name.into(), std::io::stdout);
    // Combined them all together in a `tracing` subscriber
    let subscriber = Registry::default()
        .with(env_filter)
        .with(telemetry)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to install `tracing` subscriber.")
}

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    use_in_memory_db: bool,
    db_host: String,
    db_username: String,
    db_password: String,
    bind_address: String,
}

impl ServiceConfig {
    fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .set_default("use_in_memory_db", false)?
            .set_default("db_host", "127.0.0.1")?
            .set_default("db_username", "postgres")?
            .set_default("db_password", "postgres")?
            .set_default("bind_address", "0.0.0.0:8080")?
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("Failed to build service configuration")?;

        settings
            .try_deserialize()
            .context("Failed to deserialize service configuration")
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    let service_config = ServiceConfig::load().expect("Failed to load configuration");
    println!(
        "starting HTTP server at http://{}",
        service_config.bind_address
    );

    let books_repository: Arc<dyn BookRepository> = if service_config.use_in_memory_db {
        Arc::new(InMemoryBookRepository::default())
    } else {
        Arc::new(
            PostgresBooksRepository::init(PostgresBooksRepositoryConfig {
                hostname: service_config.db_host.clone(),
                username: service_config.db_username.clone(),
                password: service_config.db_password.clone(),
            })
            .await
            .expect("Failed to init postgres"),
        )
    };
    let reservation_service = Arc::new(ReservationService::new(books_repository.clone()));

    let bind_address = service_config.bind_address.clone();
    HttpServer::new(move || {
        App::new()
            .wrap_api()
            .app_data(web::Data::new(books_repository.clone()))
            .app_data(web::Data::new(reservation_service.clone()))
            .wrap(TracingLogger::default())
            .configure(config_app)
            .with_json_spec_at("/apispec/v2")
            .build()
    })
    .bind(bind_address)?
    .run()
    .await
}
