use calvert::calendar::{CalendarGateway, GoogleCalendarClient};
use calvert::error::{other_error, CalResult};
use calvert::extraction::{AnthropicVision, EventExtractor, Extraction, ImagePreparer};
use calvert::models::EventRecord;
use calvert::startup;
use calvert::utils::GalleryDownloader;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "calvert")]
#[command(about = "Create calendar events from photos of event flyers")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Insert every extracted event into the configured Google Calendar
    #[arg(long, global = true, requires = "access_token")]
    add_to_calendar: bool,

    /// OAuth access token with the calendar scope
    #[arg(long, global = true, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract the event from a single image
    Extract {
        /// Path to the image
        image: PathBuf,
    },
    /// Extract one event per image in a directory
    Batch {
        /// Directory of images
        directory: PathBuf,
    },
    /// Download a gallery with gallery-dl and extract its events
    Gallery {
        /// Gallery URL understood by gallery-dl
        url: String,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    startup::init_logging("info")?;

    let args = Args::parse();
    let config = startup::load_config()?;

    let model = Arc::new(AnthropicVision::from_config(&config));
    info!("Using model {}", model.model());
    let extractor = EventExtractor::new(model)
        .with_preparer(ImagePreparer::new(config.max_image_bytes));

    let events = match &args.command {
        Command::Extract { image } => match extractor.extract_event_from_image(image).await? {
            Extraction::Extracted(event) => vec![Some(event)],
            Extraction::Rejected(rejected) => {
                return Err(other_error(&format!(
                    "The model reply for {} was not valid JSON: {}",
                    image.display(),
                    rejected.reason
                ))
                .into());
            }
        },
        Command::Batch { directory } => extractor.extract_events_from_dir(directory).await?,
        Command::Gallery { url } => {
            let directory = GalleryDownloader::default().download(url).await?;
            extract_gallery(&extractor, &directory).await?
        }
    };

    let output = match &args.command {
        Command::Extract { .. } => serde_json::to_string_pretty(&events[0]),
        _ => serde_json::to_string_pretty(&events),
    }
    .map_err(calvert::Error::from)?;
    println!("{}", output);

    if args.add_to_calendar {
        let access_token = args.access_token.as_deref().unwrap_or_default();
        let calendar = GoogleCalendarClient::new(&config.calendar_id);
        add_to_calendar(&calendar, access_token, &events).await;
    }

    Ok(())
}

async fn extract_gallery(extractor: &EventExtractor, directory: &Path) -> CalResult<Vec<Option<EventRecord>>> {
    let result = extractor.extract_events_from_dir(directory).await;
    if let Err(e) = tokio::fs::remove_dir_all(directory).await {
        warn!("Failed to clean up {}: {}", directory.display(), e);
    }
    result
}

/// Insert each extracted event, logging failures without stopping. Returns
/// how many were added and how many were attempted; empty slots don't count.
async fn add_to_calendar(
    calendar: &dyn CalendarGateway,
    access_token: &str,
    events: &[Option<EventRecord>],
) -> (usize, usize) {
    let mut added = 0;
    let mut attempted = 0;
    for event in events.iter().flatten() {
        attempted += 1;
        match calendar.insert_event(access_token, event).await {
            Ok(_) => added += 1,
            Err(e) => error!("Failed to add \"{}\": {}", event.summary, e),
        }
    }
    info!("Added {} of {} events to the calendar", added, attempted);
    (added, attempted)
}
