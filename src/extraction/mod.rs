pub mod preparer;
pub mod model;
pub mod prompt;
pub mod response;

pub use preparer::{ImageKind, ImagePreparer, PreparedImage, MAX_ENCODED_BYTES};
pub use model::{AnthropicVision, VisionModel};
pub use prompt::build_system_prompt;

use chrono::{Datelike, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{other_error, CalResult};
use crate::models::EventRecord;

/// Outcome of one extraction that reached the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The reply described a complete event
    Extracted(EventRecord),
    /// The reply was not JSON
    Rejected(RejectedReply),
}

/// A model reply that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedReply {
    pub reason: String,
    pub reply: String,
}

impl Extraction {
    pub fn into_event(self) -> Option<EventRecord> {
        match self {
            Extraction::Extracted(event) => Some(event),
            Extraction::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Extraction::Rejected(_))
    }
}

/// Turns image files into events using a vision model
pub struct EventExtractor {
    model: Arc<dyn VisionModel>,
    preparer: ImagePreparer,
}

impl EventExtractor {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self {
            model,
            preparer: ImagePreparer::default(),
        }
    }

    pub fn with_preparer(mut self, preparer: ImagePreparer) -> Self {
        self.preparer = preparer;
        self
    }

    /// Extract a single event from the image at `path`.
    ///
    /// A reply that is not JSON is a `Rejected` outcome, not an error. A reply
    /// that is JSON but lacks a required field is `Error::Schema`. Unsupported
    /// files and model failures propagate unchanged.
    pub async fn extract_event_from_image(&self, path: &Path) -> CalResult<Extraction> {
        debug!("Preparing {}", path.display());
        let preparer = self.preparer;
        let owned_path = path.to_path_buf();
        let image = tokio::task::spawn_blocking(move || preparer.prepare(&owned_path))
            .await
            .map_err(|e| other_error(&format!("Image preparation task failed: {}", e)))??;

        debug!("Building prompt");
        let system_prompt = build_system_prompt(Local::now().year());

        debug!("Invoking model for {}", path.display());
        let reply = self.model.invoke(&system_prompt, &image).await?;

        debug!("Parsing model reply");
        let value = match response::parse_reply(&reply) {
            Ok(value) => value,
            Err(e) => {
                error!("Error decoding response for {}: {}", path.display(), e);
                return Ok(Extraction::Rejected(RejectedReply {
                    reason: e.to_string(),
                    reply,
                }));
            }
        };

        let event = EventRecord::from_value(&value)?;
        info!("Extracted \"{}\" from {}", event.summary, path.display());
        Ok(Extraction::Extracted(event))
    }

    /// Extract one event per supported image in `dir`, in file-name order.
    ///
    /// The result has one slot per image; slots whose extraction was rejected
    /// or failed are `None`.
    pub async fn extract_events_from_dir(&self, dir: &Path) -> CalResult<Vec<Option<EventRecord>>> {
        let images = collect_images(dir)?;
        info!("Extracting events from {} images in {}", images.len(), dir.display());

        let mut events = Vec::with_capacity(images.len());
        for path in images {
            let event = match self.extract_event_from_image(&path).await {
                Ok(extraction) => extraction.into_event(),
                Err(e) => {
                    warn!("Extraction failed for {}: {}", path.display(), e);
                    None
                }
            };
            events.push(event);
        }

        Ok(events)
    }
}

/// List the files in `dir` with a supported image extension, sorted by name
pub fn collect_images(dir: &Path) -> CalResult<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && ImageKind::from_path(&path).is_ok() {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}
