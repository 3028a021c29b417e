#![allow(dead_code)]

use anyhow::{anyhow, Result};
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use mask_editor::collab::{
    AssetStore, GenerateReply, GenerateRequest, GenerationService, ImageFetcher, ImageRecord,
    NewImageRecord, RecordSource, RecordStore, RecordUpdate, SegmentReply, SegmentRequest,
    SegmentationService,
};
use mask_editor::editor::{EditError, InlineImage};
use mask_editor::settings::EditorSettings;
use mask_editor::EditorServices;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(5);
pub const SOURCE_URL: &str = "https://cdn.example/source.png";

/// Black/white PNG, white where `covered` holds.
pub fn bw_png(width: u32, height: u32, covered: impl Fn(u32, u32) -> bool) -> InlineImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        if covered(x, y) {
            image::Rgb([255, 255, 255])
        } else {
            image::Rgb([0, 0, 0])
        }
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    InlineImage::new("image/png", bytes)
}

/// Square covering the centre quarter of the image.
pub fn centre_mask() -> InlineImage {
    bw_png(64, 64, |x, y| (16..48).contains(&x) && (16..48).contains(&y))
}

pub fn record(id: &str) -> ImageRecord {
    ImageRecord {
        id: id.into(),
        source: RecordSource::MoodBoard,
        image_url: SOURCE_URL.into(),
        name: Some("Beach".into()),
        description: Some("Golden hour".into()),
        session_id: Some("board-1".into()),
        folder_id: None,
        mask_url: None,
        order_index: Some(0),
        derived_from: None,
    }
}

/// Holds a fake call open until the returned sender is dropped or fires.
fn hold_slot() -> (Mutex<Option<Receiver<()>>>, Sender<()>) {
    let (tx, rx) = channel();
    (Mutex::new(Some(rx)), tx)
}

fn wait_on(slot: &Mutex<Option<Receiver<()>>>) {
    let held = slot.lock().unwrap().take();
    if let Some(rx) = held {
        let _ = rx.recv();
    }
}

pub struct FakeSegmentation {
    reply: Mutex<Result<SegmentReply, EditError>>,
    hold: Mutex<Option<Receiver<()>>>,
    pub requests: Mutex<Vec<SegmentRequest>>,
}

impl FakeSegmentation {
    pub fn replying(result: serde_json::Value) -> Self {
        Self::with(Ok(SegmentReply {
            success: true,
            result: Some(result),
            error: None,
            details: None,
        }))
    }

    pub fn with(reply: Result<SegmentReply, EditError>) -> Self {
        Self {
            reply: Mutex::new(reply),
            hold: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Block calls until the returned sender is dropped.
    pub fn held(self) -> (Self, Sender<()>) {
        let (slot, tx) = hold_slot();
        (Self { hold: slot, ..self }, tx)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl SegmentationService for FakeSegmentation {
    fn segment(&self, request: &SegmentRequest) -> Result<SegmentReply, EditError> {
        self.requests.lock().unwrap().push(request.clone());
        wait_on(&self.hold);
        self.reply.lock().unwrap().clone()
    }
}

pub struct FakeGeneration {
    reply: Mutex<Result<GenerateReply, EditError>>,
    hold: Mutex<Option<Receiver<()>>>,
    pub requests: Mutex<Vec<GenerateRequest>>,
}

impl FakeGeneration {
    pub fn returning(image: &InlineImage) -> Self {
        Self::with(Ok(GenerateReply {
            success: true,
            image_data: Some(image.to_data_url()),
            error: None,
            details: None,
        }))
    }

    pub fn with(reply: Result<GenerateReply, EditError>) -> Self {
        Self {
            reply: Mutex::new(reply),
            hold: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn held(self) -> (Self, Sender<()>) {
        let (slot, tx) = hold_slot();
        (Self { hold: slot, ..self }, tx)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl GenerationService for FakeGeneration {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateReply, EditError> {
        self.requests.lock().unwrap().push(request.clone());
        wait_on(&self.hold);
        self.reply.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct MemoryAssets {
    pub uploads: Mutex<Vec<(String, InlineImage)>>,
    pub fail: AtomicBool,
}

impl MemoryAssets {
    pub fn prefixes(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(prefix, _)| prefix.clone())
            .collect()
    }
}

impl AssetStore for MemoryAssets {
    fn upload(&self, image: &InlineImage, path_prefix: &str) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("bucket unavailable"));
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((path_prefix.to_string(), image.clone()));
        Ok(format!(
            "memory://{path_prefix}/{}.{}",
            uploads.len(),
            image.file_extension()
        ))
    }
}

#[derive(Default)]
pub struct MemoryRecords {
    pub rows: Mutex<Vec<ImageRecord>>,
    pub fail_updates: AtomicBool,
    pub fail_inserts: AtomicBool,
}

impl MemoryRecords {
    pub fn seeded(records: Vec<ImageRecord>) -> Self {
        Self {
            rows: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn get(&self, source: RecordSource, id: &str) -> Option<ImageRecord> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.source == source && row.id == id)
            .cloned()
    }

    pub fn in_source(&self, source: RecordSource) -> Vec<ImageRecord> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.source == source)
            .cloned()
            .collect()
    }
}

impl RecordStore for MemoryRecords {
    fn load(&self, id: &str) -> Result<Option<ImageRecord>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| row.source == RecordSource::MoodBoard && row.id == id)
            .or_else(|| rows.iter().find(|row| row.id == id))
            .cloned())
    }

    fn update(&self, source: RecordSource, id: &str, update: &RecordUpdate) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(anyhow!("record write rejected"));
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.source == source && row.id == id)
            .ok_or_else(|| anyhow!("no row {id}"))?;
        if let Some(url) = &update.image_url {
            row.image_url = url.clone();
        }
        if let Some(url) = &update.mask_url {
            row.mask_url = Some(url.clone());
        }
        if let Some(name) = &update.name {
            row.name = Some(name.clone());
        }
        if let Some(description) = &update.description {
            row.description = Some(description.clone());
        }
        Ok(())
    }

    fn insert(&self, record: NewImageRecord) -> Result<String> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(anyhow!("insert rejected"));
        }
        let mut rows = self.rows.lock().unwrap();
        let id = format!("new-{}", rows.len());
        rows.push(ImageRecord {
            id: id.clone(),
            source: record.source,
            image_url: record.image_url,
            name: Some(record.name),
            description: Some(record.description),
            session_id: record.session_id,
            folder_id: record.folder_id,
            mask_url: None,
            order_index: record.order_index,
            derived_from: record.derived_from,
        });
        Ok(id)
    }

    fn next_order_index(&self, session_id: &str) -> Result<i64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| {
                row.source == RecordSource::MoodBoard
                    && row.session_id.as_deref() == Some(session_id)
            })
            .filter_map(|row| row.order_index)
            .max()
            .map_or(0, |max| max + 1))
    }
}

/// Serves registered references; anything else is an error.
#[derive(Default)]
pub struct MemoryFetcher {
    pub images: Mutex<HashMap<String, InlineImage>>,
}

impl MemoryFetcher {
    pub fn with_source() -> Self {
        let fetcher = Self::default();
        fetcher.insert(SOURCE_URL, bw_png(8, 8, |_, _| false));
        fetcher
    }

    pub fn insert(&self, reference: &str, image: InlineImage) {
        self.images
            .lock()
            .unwrap()
            .insert(reference.to_string(), image);
    }
}

impl ImageFetcher for MemoryFetcher {
    fn fetch(&self, reference: &str) -> Result<InlineImage> {
        self.images
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| anyhow!("404 for {reference}"))
    }
}

pub fn test_settings() -> EditorSettings {
    EditorSettings {
        default_surface_size: (64, 64),
        ..EditorSettings::default()
    }
}

/// Fakes plus the services wired from them.
pub struct Harness {
    pub segmentation: Arc<FakeSegmentation>,
    pub generation: Arc<FakeGeneration>,
    pub assets: Arc<MemoryAssets>,
    pub records: Arc<MemoryRecords>,
    pub fetcher: Arc<MemoryFetcher>,
}

impl Harness {
    pub fn new(segmentation: FakeSegmentation, generation: FakeGeneration) -> Self {
        Self {
            segmentation: Arc::new(segmentation),
            generation: Arc::new(generation),
            assets: Arc::new(MemoryAssets::default()),
            records: Arc::new(MemoryRecords::seeded(vec![record("img-1")])),
            fetcher: Arc::new(MemoryFetcher::with_source()),
        }
    }

    pub fn services(&self) -> EditorServices {
        EditorServices {
            settings: Arc::new(test_settings()),
            segmentation: self.segmentation.clone(),
            generation: self.generation.clone(),
            assets: self.assets.clone(),
            records: self.records.clone(),
            fetcher: self.fetcher.clone(),
        }
    }
}

pub fn idle_generation() -> FakeGeneration {
    FakeGeneration::with(Err(EditError::Busy))
}

pub fn idle_segmentation() -> FakeSegmentation {
    FakeSegmentation::replying(serde_json::json!({ "outputs": [] }))
}
