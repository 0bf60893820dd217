#![allow(dead_code)]

use async_trait::async_trait;
use calvert::calendar::{CalendarGateway, InsertedEvent};
use calvert::error::{google_calendar_error, model_error, CalResult};
use calvert::extraction::{PreparedImage, VisionModel};
use calvert::models::EventRecord;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const VALID_REPLY: &str = r#"{"summary":"Test Event","description":"This is a test event.","start":{"dateTime":"2023-01-01T00:00:00Z","timeZone":"UTC"},"end":{"dateTime":"2023-01-01T01:00:00Z","timeZone":"UTC"}}"#;

/// What the model was sent on one call
#[derive(Debug, Clone)]
pub struct SeenCall {
    pub system_prompt: String,
    pub media_type: String,
    pub data: String,
}

/// Mock vision model that answers with pre-scripted replies in order
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<CalResult<String>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<SeenCall>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<CalResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    /// Always-successful replies
    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenCall> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    async fn invoke(&self, system_prompt: &str, image: &PreparedImage) -> CalResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(SeenCall {
            system_prompt: system_prompt.to_string(),
            media_type: image.media_type().to_string(),
            data: image.data.clone(),
        });

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(model_error("no scripted reply left")))
    }
}

/// Mock calendar that records inserted events
#[derive(Default)]
pub struct RecordingCalendar {
    pub inserted: Mutex<Vec<(String, EventRecord)>>,
    pub fail_with: Option<String>,
}

impl RecordingCalendar {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn inserted(&self) -> Vec<(String, EventRecord)> {
        self.inserted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarGateway for RecordingCalendar {
    async fn insert_event(&self, access_token: &str, event: &EventRecord) -> CalResult<InsertedEvent> {
        if let Some(message) = &self.fail_with {
            return Err(google_calendar_error(message));
        }

        let mut inserted = self.inserted.lock().unwrap();
        inserted.push((access_token.to_string(), event.clone()));
        let id = format!("evt{}", inserted.len());
        Ok(InsertedEvent {
            html_link: Some(format!("https://calendar.google.com/event?eid={}", id)),
            id,
        })
    }
}

/// Write a small opaque RGB image; the format follows the extension
pub fn write_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(12, 8, Rgb([20, 120, 220]))
        .save(&path)
        .unwrap();
    path
}

/// Write a small PNG with a translucent alpha channel
pub fn write_rgba_png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(6, 6, Rgba([255, 0, 0, 100]))
        .save(&path)
        .unwrap();
    path
}

/// PNG bytes for multipart uploads
pub fn png_bytes() -> Vec<u8> {
    let mut buffer = Vec::new();
    RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))
        .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}
