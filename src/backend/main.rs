/**
 * Pagewright Server Entry Point
 *
 * Serves the application described by the declarative config file
 * (`PAGEWRIGHT_CONFIG`, else `./rsconfig.json`). Routes, components and
 * plugins come from the config; programs needing code registrations embed
 * the library instead.
 */

#[cfg(feature = "ssr")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use pagewright::backend::server::config::{config_file_from_env, overrides_from_env};
    use pagewright::backend::server::Server;

    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let mut builder = Server::builder().overrides(overrides_from_env()?);
    if let Some(file) = config_file_from_env() {
        builder = builder.config_file(file);
    }
    let mut server = builder.build()?;

    let addr = server.start().await?;
    tracing::info!("[Server] Serving on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    tracing::info!("[Server] Shutting down");
    server.stop().await;
    Ok(())
}

#[cfg(not(feature = "ssr"))]
fn main() {
    eprintln!("Server requires the 'ssr' feature to be enabled.");
    eprintln!("Run with: cargo run --bin pagewright-server --features ssr");
    std::process::exit(1);
}
