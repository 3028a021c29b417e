use crate::collab::{
    AssetStore, GenerationService, HttpGenerationService, HttpImageFetcher,
    HttpSegmentationService, ImageFetcher, ImageRecord, JsonRecordStore, LocalAssetStore,
    RecordStore, RecordUpdate, SegmentationService,
};
use crate::editor::codec::{self, InlineImage};
use crate::editor::controller::{self, AutoSegmentAffordance};
use crate::editor::error::{EditError, Operation};
use crate::editor::messages::{Notice, ResolveAction, ResolveOutcome};
use crate::editor::model::{BrushRadius, Point, Tool};
use crate::editor::orchestrator::EditOrchestrator;
use crate::editor::render::DirtyRect;
use crate::editor::state::{EditContext, EditResult, SessionState, ToolMode};
use crate::editor::stroke::StrokeEngine;
use crate::editor::surface::CanvasSurface;
use crate::settings::EditorSettings;
use std::sync::Arc;
use std::time::Duration;

/// Collaborators shared by a session and its worker threads.
#[derive(Clone)]
pub struct EditorServices {
    pub settings: Arc<EditorSettings>,
    pub segmentation: Arc<dyn SegmentationService>,
    pub generation: Arc<dyn GenerationService>,
    pub assets: Arc<dyn AssetStore>,
    pub records: Arc<dyn RecordStore>,
    pub fetcher: Arc<dyn ImageFetcher>,
}

impl EditorServices {
    /// HTTP services, local asset directory and JSON record file as configured.
    pub fn from_settings(settings: EditorSettings) -> anyhow::Result<Self> {
        let segmentation = HttpSegmentationService::new(settings.segment_endpoint.clone())?;
        let generation = HttpGenerationService::new(settings.generate_endpoint.clone())?;
        let fetcher = HttpImageFetcher::new()?;
        let assets = LocalAssetStore::new(settings.asset_root.clone());
        let records = JsonRecordStore::new(settings.record_store_path.clone());
        Ok(Self {
            settings: Arc::new(settings),
            segmentation: Arc::new(segmentation),
            generation: Arc::new(generation),
            assets: Arc::new(assets),
            records: Arc::new(records),
            fetcher: Arc::new(fetcher),
        })
    }
}

/// One image open for mask editing.
pub struct EditorSession {
    ctx: EditContext,
    orchestrator: EditOrchestrator,
    notices: Vec<Notice>,
}

impl EditorSession {
    /// Load `record_id` from the mood board or the folder library. A mask
    /// saved with the record is drawn and becomes the toggleable AI mask.
    pub fn open(services: EditorServices, record_id: &str) -> Result<Self, EditError> {
        let record = services
            .records
            .load(record_id)
            .map_err(|err| EditError::TransportFailure {
                operation: Operation::Load,
                detail: format!("{err:#}"),
            })?
            .ok_or_else(|| EditError::RecordNotFound {
                id: record_id.to_string(),
            })?;
        tracing::info!(record = %record.id, source = record.source.table(), "image opened");

        let mut session = Self::with_record(services, record);
        session.restore_saved_mask();
        Ok(session)
    }

    pub fn with_record(services: EditorServices, record: ImageRecord) -> Self {
        let (width, height) = services.settings.default_surface_size;
        let strokes = StrokeEngine::new(services.settings.brush());
        let ctx = EditContext::new(record, CanvasSurface::new(width, height), strokes);
        Self {
            ctx,
            orchestrator: EditOrchestrator::new(services),
            notices: Vec::new(),
        }
    }

    fn restore_saved_mask(&mut self) {
        let Some(mask_url) = self.ctx.record.mask_url.clone() else {
            return;
        };
        let mask = match self.orchestrator.services().fetcher.fetch(&mask_url) {
            Ok(mask) => mask,
            Err(err) => {
                tracing::warn!(%mask_url, error = %format!("{err:#}"), "saved mask unavailable");
                self.notices.push(Notice::warning(
                    Some(Operation::Load),
                    format!("saved mask could not be loaded: {err}"),
                ));
                return;
            }
        };
        self.show_mask(mask);
    }

    /// Adopt `mask` as the AI mask and draw it.
    fn show_mask(&mut self, mask: InlineImage) {
        let ctx = &mut self.ctx;
        ctx.state.ai_mask = Some(mask);
        if let Err(err) =
            controller::set_mask_visible(&mut ctx.state, &mut ctx.surface, &mut ctx.strokes, true)
        {
            tracing::warn!(error = %err, "saved mask could not be drawn");
            ctx.state.ai_mask = None;
            self.notices
                .push(Notice::warning(Some(Operation::Load), err.to_string()));
        }
    }

    /// Rebind the surface to the displayed image size. Any change recreates
    /// the surface, dropping strokes; a visible AI mask is redrawn.
    pub fn bind_dimensions(&mut self, width: u32, height: u32) {
        let ctx = &mut self.ctx;
        if ctx.surface.size() == (width.max(1), height.max(1)) {
            return;
        }
        tracing::debug!(width, height, "surface reinitialised");
        ctx.surface = CanvasSurface::new(width, height);
        ctx.strokes.cancel_stroke();
        if ctx.state.mask_visible {
            if let Err(err) =
                controller::set_mask_visible(&mut ctx.state, &mut ctx.surface, &mut ctx.strokes, true)
            {
                tracing::warn!(error = %err, "mask not redrawn after resize");
                ctx.state.mask_visible = false;
            }
        }
    }

    pub fn pointer_down(&mut self, point: Point) -> Option<DirtyRect> {
        let tool = self.ctx.state.tool.input_tool();
        let ctx = &mut self.ctx;
        ctx.strokes.begin_stroke(&mut ctx.surface, point, tool)
    }

    pub fn pointer_move(&mut self, point: Point) -> Option<DirtyRect> {
        let ctx = &mut self.ctx;
        ctx.strokes.extend_stroke(&mut ctx.surface, point)
    }

    pub fn pointer_up(&mut self) -> Option<DirtyRect> {
        let ctx = &mut self.ctx;
        ctx.strokes.end_stroke(&mut ctx.surface)
    }

    pub fn select_tool(&mut self, tool: Tool) -> bool {
        controller::select_tool(&mut self.ctx.state, tool)
    }

    /// Clamped to the slider range; applies from the next stroke.
    pub fn set_brush_radius(&mut self, radius: u32) -> BrushRadius {
        let radius = BrushRadius::new(radius);
        self.ctx.strokes.set_radius(radius);
        radius
    }

    pub fn set_instruction(&mut self, instruction: impl Into<String>) {
        self.ctx.state.instruction = instruction.into();
    }

    pub fn set_metadata(&mut self, name: impl Into<String>, description: impl Into<String>) {
        self.ctx.name = name.into();
        self.ctx.description = description.into();
    }

    pub fn save_metadata(&mut self) -> Result<(), EditError> {
        let ctx = &mut self.ctx;
        self.orchestrator
            .services()
            .records
            .update(
                ctx.record.source,
                &ctx.record.id,
                &RecordUpdate {
                    name: Some(ctx.name.clone()),
                    description: Some(ctx.description.clone()),
                    ..RecordUpdate::default()
                },
            )
            .map_err(|err| EditError::PersistFailure {
                operation: Operation::Metadata,
                detail: format!("{err:#}"),
                uploaded_url: None,
            })?;
        ctx.record.name = Some(ctx.name.clone());
        ctx.record.description = Some(ctx.description.clone());
        tracing::info!(record = %ctx.record.id, "metadata saved");
        Ok(())
    }

    /// The auto-segment control: segments with the configured prompt until an
    /// AI mask exists, then toggles its visibility.
    pub fn press_auto_segment(&mut self) -> Result<AutoSegmentAffordance, EditError> {
        let affordance = controller::auto_segment_affordance(&self.ctx.state);
        match affordance {
            AutoSegmentAffordance::Busy => return Err(EditError::Busy),
            AutoSegmentAffordance::Trigger => {
                let prompt = self.orchestrator.services().settings.auto_segment_prompt.clone();
                self.request_segmentation(&prompt)?;
            }
            AutoSegmentAffordance::Hide | AutoSegmentAffordance::Show => {
                self.toggle_mask_visibility()?;
            }
        }
        Ok(affordance)
    }

    pub fn request_segmentation(&mut self, prompt: &str) -> Result<(), EditError> {
        self.orchestrator.request_segmentation(&mut self.ctx, prompt)
    }

    pub fn toggle_mask_visibility(&mut self) -> Result<bool, EditError> {
        let ctx = &mut self.ctx;
        Ok(controller::toggle_mask_visibility(
            &mut ctx.state,
            &mut ctx.surface,
            &mut ctx.strokes,
        )?)
    }

    pub fn clear_mask(&mut self) {
        let ctx = &mut self.ctx;
        ctx.strokes.clear(&mut ctx.surface);
        ctx.state.mask_visible = false;
    }

    /// Generate with the current instruction.
    pub fn generate(&mut self) -> Result<(), EditError> {
        self.orchestrator.request_generation(&mut self.ctx, None)
    }

    pub fn generate_with(&mut self, instruction: &str) -> Result<(), EditError> {
        self.orchestrator
            .request_generation(&mut self.ctx, Some(instruction))
    }

    /// Generation preset that cuts the masked object out of its background.
    pub fn remove_background(&mut self) -> Result<(), EditError> {
        let prompt = self
            .orchestrator
            .services()
            .settings
            .background_removal_prompt
            .clone();
        self.generate_with(&prompt)
    }

    pub fn resolve(&mut self, action: ResolveAction) -> Result<ResolveOutcome, EditError> {
        self.orchestrator.resolve(&mut self.ctx, action)
    }

    /// Apply finished requests and return the notices raised since last call.
    pub fn pump(&mut self) -> Vec<Notice> {
        let mut notices = std::mem::take(&mut self.notices);
        notices.extend(self.orchestrator.pump(&mut self.ctx));
        notices
    }

    pub fn wait_for_idle(&mut self, timeout: Duration) -> Vec<Notice> {
        let mut notices = std::mem::take(&mut self.notices);
        notices.extend(self.orchestrator.wait_for_idle(&mut self.ctx, timeout));
        notices
    }

    pub fn wait_until_settled(&mut self, timeout: Duration) -> Vec<Notice> {
        let mut notices = std::mem::take(&mut self.notices);
        notices.extend(self.orchestrator.wait_until_settled(&mut self.ctx, timeout));
        notices
    }

    /// Current surface as a mask payload, `None` when nothing is painted.
    pub fn encode_mask(&self) -> Result<Option<InlineImage>, EditError> {
        if self.ctx.surface.is_empty() {
            return Ok(None);
        }
        codec::encode(&self.ctx.surface)
            .map(Some)
            .map_err(|err| EditError::EncodeFailure(err.to_string()))
    }

    pub fn state(&self) -> &SessionState {
        &self.ctx.state
    }

    pub fn tool(&self) -> ToolMode {
        self.ctx.state.tool
    }

    pub fn surface(&self) -> &CanvasSurface {
        &self.ctx.surface
    }

    pub fn strokes(&self) -> &StrokeEngine {
        &self.ctx.strokes
    }

    pub fn record(&self) -> &ImageRecord {
        &self.ctx.record
    }

    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    pub fn description(&self) -> &str {
        &self.ctx.description
    }

    pub fn instruction(&self) -> &str {
        &self.ctx.state.instruction
    }

    pub fn edit_result(&self) -> Option<&EditResult> {
        self.ctx.state.edit_result.as_ref()
    }

    pub fn services(&self) -> &EditorServices {
        self.orchestrator.services()
    }
}
