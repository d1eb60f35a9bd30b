use log::{error, info};

use opinion_poll::config::{Config, Environment};

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    let environment = Environment::from_env();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(environment.default_log_filter()),
    )
    .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    info!("Starting in {:?} mode", config.environment);

    if let Err(e) = opinion_poll::start_server(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
