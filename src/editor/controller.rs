//! Tool mode and mask visibility transitions. These functions only touch
//! [`SessionState`] and the surface; sending requests is the orchestrator's job.

use crate::editor::codec;
use crate::editor::error::DecodeError;
use crate::editor::model::Tool;
use crate::editor::state::{can_transition, SessionState, ToolMode};
use crate::editor::stroke::StrokeEngine;
use crate::editor::surface::CanvasSurface;

/// What pressing the auto-segment control does right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSegmentAffordance {
    /// No AI mask yet: run segmentation.
    Trigger,
    Hide,
    Show,
    /// Another request is in flight; the press is ignored.
    Busy,
}

/// Explicit Paint/Select choice. Ignored while auto-segmenting.
pub fn select_tool(state: &mut SessionState, tool: Tool) -> bool {
    let next = ToolMode::from(tool);
    if state.tool == ToolMode::AutoSegmenting || !can_transition(state.tool, next) {
        tracing::debug!(from = ?state.tool, to = ?next, "tool change ignored");
        return false;
    }
    state.tool = next;
    true
}

/// Enter `AutoSegmenting`; refused while any request is pending.
pub fn begin_auto_segment(state: &mut SessionState) -> bool {
    if !state.pending.is_idle() || !can_transition(state.tool, ToolMode::AutoSegmenting) {
        return false;
    }
    tracing::debug!(from = ?state.tool, "auto-segment started");
    state.tool = ToolMode::AutoSegmenting;
    true
}

/// Segmentation resolved, whatever the outcome.
pub fn finish_auto_segment(state: &mut SessionState) {
    if state.tool == ToolMode::AutoSegmenting {
        state.tool = ToolMode::Paint;
    }
}

pub fn auto_segment_affordance(state: &SessionState) -> AutoSegmentAffordance {
    if !state.pending.is_idle() {
        AutoSegmentAffordance::Busy
    } else if !state.has_ai_mask() {
        AutoSegmentAffordance::Trigger
    } else if state.mask_visible {
        AutoSegmentAffordance::Hide
    } else {
        AutoSegmentAffordance::Show
    }
}

/// Hiding clears the surface. Showing redraws the stored mask; if it cannot
/// be decoded the surface is left as it was and the mask stays hidden.
pub fn set_mask_visible(
    state: &mut SessionState,
    surface: &mut CanvasSurface,
    strokes: &mut StrokeEngine,
    visible: bool,
) -> Result<(), DecodeError> {
    if !visible {
        strokes.clear(surface);
        state.mask_visible = false;
        return Ok(());
    }

    let Some(mask) = state.ai_mask.as_ref() else {
        state.mask_visible = false;
        return Ok(());
    };
    strokes.cancel_stroke();
    codec::draw(surface, mask)?;
    state.mask_visible = true;
    Ok(())
}

pub fn toggle_mask_visibility(
    state: &mut SessionState,
    surface: &mut CanvasSurface,
    strokes: &mut StrokeEngine,
) -> Result<bool, DecodeError> {
    let visible = !state.mask_visible;
    set_mask_visible(state, surface, strokes, visible)?;
    Ok(state.mask_visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::model::{BrushRadius, Rgba};
    use crate::editor::render::draw_brush;
    use crate::editor::state::PendingOperation;

    fn mask_state() -> (SessionState, CanvasSurface, StrokeEngine) {
        let mut painted = CanvasSurface::new(40, 40);
        draw_brush(&mut painted, (20, 20), 10, Rgba::COVERED);
        let mask = codec::encode(&painted).expect("encode");

        let mut surface = CanvasSurface::new(40, 40);
        codec::draw(&mut surface, &mask).expect("draw");
        let state = SessionState {
            ai_mask: Some(mask),
            mask_visible: true,
            ..SessionState::default()
        };
        (state, surface, StrokeEngine::new(BrushRadius::default()))
    }

    #[test]
    fn tool_selection_is_ignored_while_auto_segmenting() {
        let mut state = SessionState::default();
        assert!(select_tool(&mut state, Tool::Select));
        assert!(begin_auto_segment(&mut state));
        assert!(!select_tool(&mut state, Tool::Paint));
        assert_eq!(state.tool, ToolMode::AutoSegmenting);

        finish_auto_segment(&mut state);
        assert_eq!(state.tool, ToolMode::Paint);
    }

    #[test]
    fn auto_segment_refused_while_generating() {
        let mut state = SessionState {
            pending: PendingOperation::Generating,
            ..SessionState::default()
        };
        assert!(!begin_auto_segment(&mut state));
        assert_eq!(state.tool, ToolMode::Paint);
        assert_eq!(auto_segment_affordance(&state), AutoSegmentAffordance::Busy);
    }

    #[test]
    fn affordance_follows_mask_presence_and_visibility() {
        let mut state = SessionState::default();
        assert_eq!(auto_segment_affordance(&state), AutoSegmentAffordance::Trigger);

        let (with_mask, _, _) = mask_state();
        state = with_mask;
        assert_eq!(auto_segment_affordance(&state), AutoSegmentAffordance::Hide);
        state.mask_visible = false;
        assert_eq!(auto_segment_affordance(&state), AutoSegmentAffordance::Show);
    }

    #[test]
    fn toggling_visibility_twice_restores_identical_pixels() {
        let (mut state, mut surface, mut strokes) = mask_state();
        let before = surface.snapshot();

        assert!(!toggle_mask_visibility(&mut state, &mut surface, &mut strokes).expect("hide"));
        assert!(surface.is_empty());

        assert!(toggle_mask_visibility(&mut state, &mut surface, &mut strokes).expect("show"));
        assert_eq!(surface.snapshot(), before);
    }

    #[test]
    fn showing_without_a_mask_stays_hidden() {
        let mut state = SessionState::default();
        let mut surface = CanvasSurface::new(10, 10);
        let mut strokes = StrokeEngine::default();
        set_mask_visible(&mut state, &mut surface, &mut strokes, true).expect("no-op");
        assert!(!state.mask_visible);
    }
}
