use crate::editor::model::{BrushRadius, Point, Rgba, Tool};
use crate::editor::render::{
    draw_brush, draw_segment, fill_polygon, segment_dirty_bounds, DirtyRect,
};
use crate::editor::surface::CanvasSurface;

/// Lasso vertices closer than this (squared) to the previous one are dropped.
const MIN_LASSO_POINT_DIST_SQ: i64 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveStroke {
    Paint { radius: BrushRadius, points: Vec<Point> },
    Select { points: Vec<Point> },
}

impl ActiveStroke {
    pub fn points(&self) -> &[Point] {
        match self {
            ActiveStroke::Paint { points, .. } | ActiveStroke::Select { points } => points,
        }
    }
}

/// Turns pointer input into surface coverage. Paint strokes composite on
/// every extend; lasso outlines only touch the surface when closed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StrokeEngine {
    radius: BrushRadius,
    active: Option<ActiveStroke>,
}

impl StrokeEngine {
    pub fn new(radius: BrushRadius) -> Self {
        Self {
            radius,
            active: None,
        }
    }

    pub fn radius(&self) -> BrushRadius {
        self.radius
    }

    /// Takes effect from the next stroke; an active stroke keeps its radius.
    pub fn set_radius(&mut self, radius: BrushRadius) {
        self.radius = radius;
    }

    pub fn active_stroke(&self) -> Option<&ActiveStroke> {
        self.active.as_ref()
    }

    pub fn is_stroking(&self) -> bool {
        self.active.is_some()
    }

    pub fn begin_stroke(
        &mut self,
        surface: &mut CanvasSurface,
        point: Point,
        tool: Tool,
    ) -> Option<DirtyRect> {
        match tool {
            Tool::Paint => {
                let radius = self.radius;
                draw_brush(surface, point, radius.get(), Rgba::COVERED);
                self.active = Some(ActiveStroke::Paint {
                    radius,
                    points: vec![point],
                });
                Some(segment_dirty_bounds(point, point, radius.get()))
            }
            Tool::Select => {
                self.active = Some(ActiveStroke::Select {
                    points: vec![point],
                });
                None
            }
        }
    }

    /// Returns the region of the surface that changed, if any.
    pub fn extend_stroke(&mut self, surface: &mut CanvasSurface, point: Point) -> Option<DirtyRect> {
        match self.active.as_mut()? {
            ActiveStroke::Paint { radius, points } => {
                let last = points.last().copied().unwrap_or(point);
                draw_segment(surface, last, point, radius.get(), Rgba::COVERED);
                points.push(point);
                Some(segment_dirty_bounds(last, point, radius.get()))
            }
            ActiveStroke::Select { points } => {
                if should_append_point(points.last().copied(), point) {
                    points.push(point);
                }
                None
            }
        }
    }

    pub fn end_stroke(&mut self, surface: &mut CanvasSurface) -> Option<DirtyRect> {
        match self.active.take()? {
            ActiveStroke::Paint { .. } => None,
            ActiveStroke::Select { points } => {
                if points.len() < 3 {
                    tracing::debug!(vertices = points.len(), "lasso discarded, too few vertices");
                    return None;
                }
                fill_polygon(surface, &points, Rgba::COVERED)
            }
        }
    }

    /// Drop the in-progress path without touching the surface.
    pub fn cancel_stroke(&mut self) {
        self.active = None;
    }

    pub fn clear(&mut self, surface: &mut CanvasSurface) {
        self.active = None;
        surface.clear();
    }
}

fn should_append_point(last: Option<Point>, point: Point) -> bool {
    let Some((last_x, last_y)) = last else {
        return true;
    };

    let dx = point.0 as i64 - last_x as i64;
    let dy = point.1 as i64 - last_y as i64;
    dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy)) >= MIN_LASSO_POINT_DIST_SQ
}
