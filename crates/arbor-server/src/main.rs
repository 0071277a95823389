use arbor_grammar::PresetLibrary;
use arbor_server::{AppState, Config, app};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).compact().init();

    let library = match &config.presets_file {
        Some(path) => PresetLibrary::load(path)?,
        None => PresetLibrary::builtin()?,
    };
    let library = if config.inject_variation {
        library.with_injected_variation()
    } else {
        library
    };
    info!(
        presets = library.len(),
        max_segments = config.max_segments,
        "preset library ready"
    );

    let address = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(%address, "arbor server listening");
    axum::serve(listener, app(AppState::new(library, config.max_segments))).await?;
    Ok(())
}
