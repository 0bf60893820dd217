use calvert::calendar::{GoogleCalendarClient, OAuthClient};
use calvert::extraction::{AnthropicVision, EventExtractor, ImagePreparer};
use calvert::startup;
use calvert::web::{router, AppState, SessionService};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    startup::init_logging("info,calvert=debug,tower_http=debug")?;

    info!("Starting calvert web server");

    let config = startup::load_config()?;
    config.require_google()?;

    // Ensure upload directory exists
    std::fs::create_dir_all(&config.upload_dir).map_err(calvert::Error::from)?;

    let model = AnthropicVision::from_config(&config);
    info!("Using model {}", model.model());

    let extractor = EventExtractor::new(Arc::new(model))
        .with_preparer(ImagePreparer::new(config.max_image_bytes));

    let state = AppState::new(
        config.upload_dir.clone(),
        config.max_upload_bytes,
        Arc::new(extractor),
        Arc::new(GoogleCalendarClient::new(&config.calendar_id)),
        Arc::new(OAuthClient::from_config(&config)),
        Arc::new(SessionService::new(&config.session_secret)),
    );

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(calvert::Error::from)?;
    axum::serve(listener, app)
        .await
        .map_err(calvert::Error::from)?;

    Ok(())
}
