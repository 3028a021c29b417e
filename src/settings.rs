use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::editor::model::{BrushRadius, MAX_BRUSH_RADIUS, MIN_BRUSH_RADIUS};

pub const SETTINGS_FILE_NAME: &str = "mask_editor_settings.json";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_AUTO_SEGMENT_PROMPT: &str = "all objects";
pub const DEFAULT_BACKGROUND_REMOVAL_PROMPT: &str =
    "Remove the background of the masked object, keep the object on a transparent background";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditorSettings {
    #[serde(default = "default_segment_endpoint")]
    pub segment_endpoint: String,
    #[serde(default = "default_generate_endpoint")]
    pub generate_endpoint: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default = "default_brush_radius")]
    pub brush_radius: u32,
    #[serde(default = "default_surface_size")]
    pub default_surface_size: (u32, u32),
    #[serde(default = "default_auto_segment_prompt")]
    pub auto_segment_prompt: String,
    #[serde(default = "default_background_removal_prompt")]
    pub background_removal_prompt: String,
    /// Directory the local asset store writes uploaded images into.
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,
    /// JSON file backing the local record store.
    #[serde(default = "default_record_store_path")]
    pub record_store_path: PathBuf,
    /// When enabled the logger is initialised at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            segment_endpoint: default_segment_endpoint(),
            generate_endpoint: default_generate_endpoint(),
            generation_model: default_generation_model(),
            brush_radius: default_brush_radius(),
            default_surface_size: default_surface_size(),
            auto_segment_prompt: default_auto_segment_prompt(),
            background_removal_prompt: default_background_removal_prompt(),
            asset_root: default_asset_root(),
            record_store_path: default_record_store_path(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl EditorSettings {
    pub fn brush(&self) -> BrushRadius {
        BrushRadius::new(self.brush_radius)
    }

    /// Clamp values a hand-edited settings file may have pushed out of range.
    pub fn sanitize(&mut self) {
        self.brush_radius = self.brush_radius.clamp(MIN_BRUSH_RADIUS, MAX_BRUSH_RADIUS);
        let (w, h) = self.default_surface_size;
        self.default_surface_size = (w.max(1), h.max(1));
        if self.auto_segment_prompt.trim().is_empty() {
            self.auto_segment_prompt = default_auto_segment_prompt();
        }
        if self.generation_model.trim().is_empty() {
            self.generation_model = default_generation_model();
        }
    }
}

fn default_segment_endpoint() -> String {
    "http://localhost:3000/api/segment".into()
}

fn default_generate_endpoint() -> String {
    "http://localhost:3000/api/interact".into()
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.into()
}

fn default_brush_radius() -> u32 {
    20
}

fn default_surface_size() -> (u32, u32) {
    (512, 512)
}

fn default_auto_segment_prompt() -> String {
    DEFAULT_AUTO_SEGMENT_PROMPT.into()
}

fn default_background_removal_prompt() -> String {
    DEFAULT_BACKGROUND_REMOVAL_PROMPT.into()
}

fn data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mask_editor")
}

fn default_asset_root() -> PathBuf {
    data_dir().join("uploads")
}

fn default_record_store_path() -> PathBuf {
    data_dir().join("records.json")
}

pub fn settings_path_from_exe_path(exe_path: &Path) -> Result<PathBuf> {
    let parent = exe_path
        .parent()
        .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
    Ok(parent.join(SETTINGS_FILE_NAME))
}

pub fn resolve_settings_path() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("resolve current executable")?;
    settings_path_from_exe_path(&exe_path)
}

pub fn load() -> Result<EditorSettings> {
    load_from_path(&resolve_settings_path()?)
}

pub fn load_from_path(path: &Path) -> Result<EditorSettings> {
    if !path.exists() {
        return Ok(EditorSettings::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read editor settings file {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(EditorSettings::default());
    }

    let mut loaded: EditorSettings = serde_json::from_str(&content)
        .with_context(|| format!("deserialize editor settings file {}", path.display()))?;
    loaded.sanitize();
    Ok(loaded)
}

pub fn save_to_path(path: &Path, settings: &EditorSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create settings parent folder {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(settings).context("serialize editor settings")?;
    std::fs::write(path, json)
        .with_context(|| format!("write editor settings file {}", path.display()))?;
    Ok(())
}
