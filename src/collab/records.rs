use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Collection an image record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordSource {
    #[default]
    #[serde(rename = "mood_board_items")]
    MoodBoard,
    #[serde(rename = "folder_items")]
    Folder,
}

impl RecordSource {
    pub fn table(self) -> &'static str {
        match self {
            RecordSource::MoodBoard => "mood_board_items",
            RecordSource::Folder => "folder_items",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    #[serde(skip)]
    pub source: RecordSource,
    pub image_url: String,
    #[serde(default, alias = "title")]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub mask_url: Option<String>,
    #[serde(default)]
    pub order_index: Option<i64>,
    /// Id of the record this one was generated from.
    #[serde(default)]
    pub derived_from: Option<String>,
}

/// Field changes for an existing record; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    pub image_url: Option<String>,
    pub mask_url: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImageRecord {
    pub source: RecordSource,
    pub image_url: String,
    pub name: String,
    pub description: String,
    pub session_id: Option<String>,
    pub folder_id: Option<String>,
    pub order_index: Option<i64>,
    pub derived_from: Option<String>,
}

pub trait RecordStore: Send + Sync {
    /// Look the id up in the mood board first, then the folder library.
    fn load(&self, id: &str) -> Result<Option<ImageRecord>>;
    fn update(&self, source: RecordSource, id: &str, update: &RecordUpdate) -> Result<()>;
    /// Returns the id of the inserted record.
    fn insert(&self, record: NewImageRecord) -> Result<String>;
    /// Next free board position within a session.
    fn next_order_index(&self, session_id: &str) -> Result<i64>;
}

pub fn new_record_id() -> String {
    hex::encode(rand::random::<[u8; 12]>())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordFile {
    #[serde(default)]
    mood_board_items: Vec<ImageRecord>,
    #[serde(default)]
    folder_items: Vec<ImageRecord>,
}

impl RecordFile {
    fn rows_mut(&mut self, source: RecordSource) -> &mut Vec<ImageRecord> {
        match source {
            RecordSource::MoodBoard => &mut self.mood_board_items,
            RecordSource::Folder => &mut self.folder_items,
        }
    }
}

/// Record store backed by a single JSON file holding both collections.
pub struct JsonRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RecordFile> {
        if !self.path.exists() {
            return Ok(RecordFile::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read record store {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(RecordFile::default());
        }
        let mut file: RecordFile = serde_json::from_str(&content)
            .with_context(|| format!("deserialize record store {}", self.path.display()))?;
        for row in &mut file.mood_board_items {
            row.source = RecordSource::MoodBoard;
        }
        for row in &mut file.folder_items {
            row.source = RecordSource::Folder;
        }
        Ok(file)
    }

    fn write(&self, file: &RecordFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create record store folder {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(file).context("serialize record store")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("write record store {}", self.path.display()))
    }

    /// Insert a fully formed record, keeping its id. Used to seed stores.
    pub fn put(&self, record: ImageRecord) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("record store lock poisoned"))?;
        let mut file = self.read()?;
        let rows = file.rows_mut(record.source);
        rows.retain(|row| row.id != record.id);
        rows.push(record);
        self.write(&file)
    }
}

impl RecordStore for JsonRecordStore {
    fn load(&self, id: &str) -> Result<Option<ImageRecord>> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("record store lock poisoned"))?;
        let file = self.read()?;
        Ok(file
            .mood_board_items
            .into_iter()
            .chain(file.folder_items)
            .find(|row| row.id == id))
    }

    fn update(&self, source: RecordSource, id: &str, update: &RecordUpdate) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("record store lock poisoned"))?;
        let mut file = self.read()?;
        let row = file
            .rows_mut(source)
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| anyhow!("no {} row with id {id}", source.table()))?;

        if let Some(image_url) = &update.image_url {
            row.image_url = image_url.clone();
        }
        if let Some(mask_url) = &update.mask_url {
            row.mask_url = Some(mask_url.clone());
        }
        if let Some(name) = &update.name {
            row.name = Some(name.clone());
        }
        if let Some(description) = &update.description {
            row.description = Some(description.clone());
        }
        self.write(&file)
    }

    fn insert(&self, record: NewImageRecord) -> Result<String> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("record store lock poisoned"))?;
        let mut file = self.read()?;
        let id = new_record_id();
        file.rows_mut(record.source).push(ImageRecord {
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
        self.write(&file)?;
        Ok(id)
    }

    fn next_order_index(&self, session_id: &str) -> Result<i64> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("record store lock poisoned"))?;
        let file = self.read()?;
        Ok(file
            .mood_board_items
            .iter()
            .filter(|row| row.session_id.as_deref() == Some(session_id))
            .filter_map(|row| row.order_index)
            .max()
            .map(|max| max + 1)
            .unwrap_or(0))
    }
}
