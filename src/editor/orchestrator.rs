//! Sequences the segmentation and generation requests and the review of a
//! generated edit.
//!
//! Requests run on named worker threads and report back over an mpsc channel;
//! [`EditOrchestrator::pump`] applies their results to the [`EditContext`] on
//! the caller's thread, so session state is only ever mutated there. At most
//! one request is pending at a time. Resolving an edit is synchronous.

use crate::collab::{
    failure_message, GenerateRequest, NewImageRecord, RecordSource, RecordUpdate, SegmentRequest,
};
use crate::editor::codec::{self, InlineImage, MaskBitmap, MaskImage};
use crate::editor::controller::{begin_auto_segment, finish_auto_segment};
use crate::editor::error::{DecodeError, EditError, Operation};
use crate::editor::messages::{Notice, ResolveAction, ResolveOutcome, WorkerEvent};
use crate::editor::scan::embedded_images;
use crate::editor::session::EditorServices;
use crate::editor::state::{EditContext, EditResult, PendingOperation};
use chrono::Utc;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// First decodable mask of a segmentation reply.
#[derive(Debug, Clone)]
pub struct SegmentedMask {
    pub mask: MaskImage,
    pub bitmap: MaskBitmap,
}

pub struct EditOrchestrator {
    services: EditorServices,
    events_tx: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
    workers: Vec<JoinHandle<()>>,
}

impl EditOrchestrator {
    pub fn new(services: EditorServices) -> Self {
        let (events_tx, events_rx) = channel();
        Self {
            services,
            events_tx,
            events_rx,
            workers: Vec::new(),
        }
    }

    pub fn services(&self) -> &EditorServices {
        &self.services
    }

    /// Segment the open image with `prompt`. The tool enters
    /// `AutoSegmenting` until the reply is pumped.
    pub fn request_segmentation(&mut self, ctx: &mut EditContext, prompt: &str) -> Result<(), EditError> {
        if !ctx.state.pending.is_idle() {
            tracing::debug!(pending = ?ctx.state.pending, "segmentation rejected, busy");
            return Err(EditError::Busy);
        }
        begin_auto_segment(&mut ctx.state);
        ctx.state.pending = PendingOperation::Segmenting;

        let request = SegmentRequest {
            image_url: ctx.record.image_url.clone(),
            prompt: prompt.to_string(),
        };
        let persist = MaskPersistJob {
            source: ctx.record.source,
            record_id: ctx.record.id.clone(),
            path_prefix: ctx.mask_prefix(),
        };
        let services = self.services.clone();
        let tx = self.events_tx.clone();

        tracing::info!(record = %ctx.record.id, prompt, "segmentation requested");
        let spawned = std::thread::Builder::new()
            .name("mask-editor-segment".into())
            .spawn(move || {
                let outcome = run_segmentation(&services, &request);
                let mask = outcome.as_ref().ok().map(|seg| seg.mask.clone());
                if tx.send(WorkerEvent::Segmented(outcome)).is_err() {
                    return;
                }
                if let Some(mask) = mask {
                    let _ = tx.send(WorkerEvent::MaskPersisted(persist.run(&services, &mask)));
                }
            });
        self.track_spawn(ctx, spawned, Operation::Segmentation)
    }

    /// Generate an edit of the open image. `instruction` replaces the session
    /// instruction when given. The current surface is sent as the mask unless
    /// nothing is painted.
    pub fn request_generation(
        &mut self,
        ctx: &mut EditContext,
        instruction: Option<&str>,
    ) -> Result<(), EditError> {
        if !ctx.state.pending.is_idle() {
            tracing::debug!(pending = ?ctx.state.pending, "generation rejected, busy");
            return Err(EditError::Busy);
        }
        if let Some(instruction) = instruction {
            ctx.state.instruction = instruction.to_string();
        }
        let instruction = ctx.state.instruction.trim().to_string();
        if instruction.is_empty() {
            return Err(EditError::MissingInstruction);
        }

        let mask = if ctx.surface.is_empty() {
            None
        } else {
            let encoded = codec::encode(&ctx.surface)
                .map_err(|err| EditError::EncodeFailure(err.to_string()))?;
            Some(encoded.to_data_url())
        };

        if ctx.state.edit_result.take().is_some() {
            tracing::debug!("unresolved edit dropped by new generation");
        }
        ctx.state.pending = PendingOperation::Generating;

        let job = GenerationJob {
            image_ref: ctx.record.image_url.clone(),
            mask,
            instruction,
            model: self.services.settings.generation_model.clone(),
        };
        let services = self.services.clone();
        let tx = self.events_tx.clone();

        tracing::info!(
            record = %ctx.record.id,
            has_mask = job.mask.is_some(),
            "generation requested"
        );
        let spawned = std::thread::Builder::new()
            .name("mask-editor-generate".into())
            .spawn(move || {
                let _ = tx.send(WorkerEvent::Generated(job.run(&services)));
            });
        self.track_spawn(ctx, spawned, Operation::Generation)
    }

    fn track_spawn(
        &mut self,
        ctx: &mut EditContext,
        spawned: std::io::Result<JoinHandle<()>>,
        operation: Operation,
    ) -> Result<(), EditError> {
        match spawned {
            Ok(handle) => {
                self.workers.push(handle);
                Ok(())
            }
            Err(err) => {
                tracing::error!(?err, %operation, "failed to spawn worker");
                ctx.state.pending = PendingOperation::Idle;
                finish_auto_segment(&mut ctx.state);
                Err(EditError::TransportFailure {
                    operation,
                    detail: format!("could not start request: {err}"),
                })
            }
        }
    }

    /// Apply every finished worker result. Never blocks.
    pub fn pump(&mut self, ctx: &mut EditContext) -> Vec<Notice> {
        let mut notices = Vec::new();
        loop {
            match self.events_rx.try_recv() {
                Ok(event) => notices.extend(apply_event(ctx, event)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.workers.retain(|handle| !handle.is_finished());
        notices
    }

    pub fn has_running_workers(&self) -> bool {
        self.workers.iter().any(|handle| !handle.is_finished())
    }

    /// Pump until nothing is pending or `timeout` elapses.
    pub fn wait_for_idle(&mut self, ctx: &mut EditContext, timeout: Duration) -> Vec<Notice> {
        let deadline = Instant::now() + timeout;
        let mut notices = self.pump(ctx);
        while !ctx.state.pending.is_idle() && Instant::now() < deadline {
            std::thread::sleep(WAIT_POLL_INTERVAL);
            notices.extend(self.pump(ctx));
        }
        notices
    }

    /// Like [`wait_for_idle`](Self::wait_for_idle) but also waits for
    /// background mask persistence to finish.
    pub fn wait_until_settled(&mut self, ctx: &mut EditContext, timeout: Duration) -> Vec<Notice> {
        let deadline = Instant::now() + timeout;
        let mut notices = Vec::new();
        loop {
            let finished = !self.has_running_workers();
            notices.extend(self.pump(ctx));
            if finished || Instant::now() >= deadline {
                return notices;
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Discard, append or replace the held edit. An empty slot is a no-op.
    /// On a failed append or replace the edit is kept so it can be retried.
    pub fn resolve(
        &mut self,
        ctx: &mut EditContext,
        action: ResolveAction,
    ) -> Result<ResolveOutcome, EditError> {
        let Some(result) = ctx.state.edit_result.clone() else {
            tracing::debug!(?action, "nothing to resolve");
            return Ok(ResolveOutcome::NothingToResolve);
        };
        // a result landing after Append/Replace would target the old image
        if action != ResolveAction::Discard && !ctx.state.pending.is_idle() {
            tracing::debug!(?action, pending = ?ctx.state.pending, "resolve refused while busy");
            return Err(EditError::Busy);
        }

        let outcome = match action {
            ResolveAction::Discard => ResolveOutcome::Discarded,
            ResolveAction::Append => self.append(ctx, &result)?,
            ResolveAction::Replace => self.replace(ctx, &result)?,
        };
        ctx.state.edit_result = None;
        tracing::info!(?outcome, "edit resolved");
        Ok(outcome)
    }

    fn append(&self, ctx: &EditContext, result: &EditResult) -> Result<ResolveOutcome, EditError> {
        let operation = Operation::Append;
        let Some(session_id) = ctx
            .record
            .session_id
            .clone()
            .filter(|session| !session.trim().is_empty())
        else {
            return Err(EditError::PersistFailure {
                operation,
                detail: "no active board session".into(),
                uploaded_url: None,
            });
        };

        let image_url = self.upload(&result.image, &ctx.upload_prefix(), operation)?;
        let orphaned = |detail: String| EditError::PersistFailure {
            operation,
            detail,
            uploaded_url: Some(image_url.clone()),
        };

        let name = format!("{} (Edit)", ctx.name);
        let description = format!("Edit of {}: {}", ctx.name, result.instruction);
        let order_index = self
            .services
            .records
            .next_order_index(&session_id)
            .map_err(|err| orphaned(format!("{err:#}")))?;
        let record_id = self
            .services
            .records
            .insert(NewImageRecord {
                source: RecordSource::MoodBoard,
                image_url: image_url.clone(),
                name: name.clone(),
                description: description.clone(),
                session_id: Some(session_id),
                folder_id: ctx.record.folder_id.clone(),
                order_index: Some(order_index),
                derived_from: Some(ctx.record.id.clone()),
            })
            .map_err(|err| orphaned(format!("{err:#}")))?;

        if let Some(folder_id) = ctx.record.folder_id.clone() {
            let mirrored = self.services.records.insert(NewImageRecord {
                source: RecordSource::Folder,
                image_url: image_url.clone(),
                name,
                description,
                session_id: None,
                folder_id: Some(folder_id),
                order_index: None,
                derived_from: Some(ctx.record.id.clone()),
            });
            if let Err(err) = mirrored {
                tracing::warn!(error = %format!("{err:#}"), "failed to mirror edit into folder");
            }
        }

        Ok(ResolveOutcome::Appended {
            record_id,
            image_url,
        })
    }

    fn replace(&self, ctx: &mut EditContext, result: &EditResult) -> Result<ResolveOutcome, EditError> {
        let operation = Operation::Replace;
        let image_url = self.upload(&result.image, &ctx.upload_prefix(), operation)?;

        let description = if ctx.description.trim().is_empty() {
            format!("Edit: {}", result.instruction)
        } else {
            format!("{}\n\nLast Edit: {}", ctx.description, result.instruction)
        };
        self.services
            .records
            .update(
                ctx.record.source,
                &ctx.record.id,
                &RecordUpdate {
                    image_url: Some(image_url.clone()),
                    description: Some(description.clone()),
                    ..RecordUpdate::default()
                },
            )
            .map_err(|err| EditError::PersistFailure {
                operation,
                detail: format!("{err:#}"),
                uploaded_url: Some(image_url.clone()),
            })?;

        ctx.record.image_url = image_url.clone();
        ctx.record.description = Some(description.clone());
        ctx.description = description;
        match self.services.records.load(&ctx.record.id) {
            Ok(Some(record)) => ctx.adopt_record(record),
            Ok(None) => tracing::warn!(record = %ctx.record.id, "replaced record vanished on reload"),
            Err(err) => tracing::warn!(error = %format!("{err:#}"), "failed to reload replaced record"),
        }

        ctx.strokes.clear(&mut ctx.surface);
        ctx.state.mask_visible = false;
        ctx.state.ai_mask = None;
        ctx.state.instruction.clear();
        Ok(ResolveOutcome::Replaced { image_url })
    }

    fn upload(&self, image: &InlineImage, prefix: &str, operation: Operation) -> Result<String, EditError> {
        self.services
            .assets
            .upload(image, prefix)
            .map_err(|err| EditError::PersistFailure {
                operation,
                detail: format!("{err:#}"),
                uploaded_url: None,
            })
    }
}

fn apply_event(ctx: &mut EditContext, event: WorkerEvent) -> Option<Notice> {
    match event {
        WorkerEvent::Segmented(outcome) => {
            if ctx.state.pending == PendingOperation::Segmenting {
                ctx.state.pending = PendingOperation::Idle;
            }
            finish_auto_segment(&mut ctx.state);
            match outcome {
                Ok(segmented) => {
                    ctx.strokes.cancel_stroke();
                    codec::draw_bitmap(&mut ctx.surface, &segmented.bitmap);
                    ctx.state.ai_mask = Some(segmented.mask);
                    ctx.state.mask_visible = true;
                    tracing::info!(
                        covered = segmented.bitmap.covered_count(),
                        "segmentation mask displayed"
                    );
                    Some(Notice::info(Operation::Segmentation, "Segmentation complete"))
                }
                Err(err) => {
                    tracing::warn!(error = %err, "segmentation failed");
                    Some(Notice::from_error(&err))
                }
            }
        }
        WorkerEvent::MaskPersisted(Ok(url)) => {
            tracing::info!(%url, "segmentation mask saved");
            ctx.record.mask_url = Some(url);
            None
        }
        WorkerEvent::MaskPersisted(Err(err)) => {
            tracing::warn!(error = %err, "segmentation mask not saved");
            Some(Notice::from_error(&err))
        }
        WorkerEvent::Generated(outcome) => {
            if ctx.state.pending == PendingOperation::Generating {
                ctx.state.pending = PendingOperation::Idle;
            }
            match outcome {
                Ok(result) => {
                    tracing::info!(bytes = result.image.bytes().len(), "edit generated");
                    ctx.state.edit_result = Some(result);
                    Some(Notice::info(Operation::Generation, "Edit ready for review"))
                }
                Err(err) => {
                    tracing::warn!(error = %err, "generation failed");
                    Some(Notice::from_error(&err))
                }
            }
        }
    }
}

fn run_segmentation(
    services: &EditorServices,
    request: &SegmentRequest,
) -> Result<SegmentedMask, EditError> {
    let operation = Operation::Segmentation;
    let reply = services.segmentation.segment(request)?;
    if !reply.success {
        return Err(EditError::Rejected {
            operation,
            message: failure_message(reply.details, reply.error),
        });
    }

    let payloads = reply
        .result
        .as_ref()
        .map(embedded_images)
        .unwrap_or_default();
    tracing::debug!(found = payloads.len(), "embedded images in segmentation reply");
    if payloads.is_empty() {
        return Err(EditError::EmptyResult { operation });
    }

    let mut last_error = None;
    for payload in &payloads {
        let decoded = InlineImage::parse(payload)
            .and_then(|mask| codec::decode(&mask).map(|bitmap| SegmentedMask { mask, bitmap }));
        match decoded {
            Ok(segmented) => return Ok(segmented),
            Err(err) => {
                tracing::debug!(error = %err, "skipping undecodable segmentation payload");
                last_error = Some(err);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| DecodeError::new("no decodable mask"))
        .into())
}

struct MaskPersistJob {
    source: RecordSource,
    record_id: String,
    path_prefix: String,
}

impl MaskPersistJob {
    /// Upload first, then point the record at it.
    fn run(&self, services: &EditorServices, mask: &MaskImage) -> Result<String, EditError> {
        let operation = Operation::MaskPersist;
        let url = services
            .assets
            .upload(mask, &self.path_prefix)
            .map_err(|err| EditError::PersistFailure {
                operation,
                detail: format!("{err:#}"),
                uploaded_url: None,
            })?;
        services
            .records
            .update(
                self.source,
                &self.record_id,
                &RecordUpdate {
                    mask_url: Some(url.clone()),
                    ..RecordUpdate::default()
                },
            )
            .map_err(|err| EditError::PersistFailure {
                operation,
                detail: format!("{err:#}"),
                uploaded_url: Some(url.clone()),
            })?;
        Ok(url)
    }
}

struct GenerationJob {
    image_ref: String,
    mask: Option<String>,
    instruction: String,
    model: String,
}

impl GenerationJob {
    fn run(self, services: &EditorServices) -> Result<EditResult, EditError> {
        let operation = Operation::Generation;
        let source = services
            .fetcher
            .fetch(&self.image_ref)
            .map_err(|err| EditError::TransportFailure {
                operation,
                detail: format!("load source image: {err:#}"),
            })?;

        let reply = services.generation.generate(&GenerateRequest {
            prompt: self.instruction.clone(),
            mask: self.mask,
            image: Some(source.to_data_url()),
            model: self.model,
        })?;
        if !reply.success {
            return Err(EditError::Rejected {
                operation,
                message: failure_message(reply.details, reply.error),
            });
        }

        let payload = reply
            .image_data
            .filter(|data| !data.trim().is_empty())
            .ok_or(EditError::EmptyResult { operation })?;
        let image = InlineImage::parse(&payload)?;
        Ok(EditResult {
            image,
            instruction: self.instruction,
            created_at: Utc::now(),
        })
    }
}
