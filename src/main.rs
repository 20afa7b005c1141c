use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use parley::cli::{commands::{Cli, Commands}, run_cli};
use parley::config::AppConfig;
use parley::llm::ProviderFactory;
use tracing::{error, info};

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        if let Err(e) = run_cli(cli.command, cli.config).await {
            error!("{}", e);
            std::process::exit(1);
        }
        // The stdin reader thread may still be parked on a read.
        std::process::exit(0);
    }

    info!("Starting Parley relay...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let llm_provider = match ProviderFactory::create_default(&config) {
        Some(p) => p,
        None => {
            error!("Unknown upstream provider '{}'", config.upstream.provider);
            std::process::exit(1);
        }
    };

    let host = config.server.host.clone();
    let port = config.server.port;

    info!(
        "Relaying to {} ({}) with model {}",
        config.upstream.base_url,
        llm_provider.name(),
        llm_provider.model()
    );
    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(llm_provider.clone()))
            .route("/health", web::get().to(health))
            .configure(parley::api::routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
