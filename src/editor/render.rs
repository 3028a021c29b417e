use crate::editor::model::{Point, Rgba};
use crate::editor::surface::CanvasSurface;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Changed region of the surface. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl DirtyRect {
    /// Bounding box of `a` and `b` grown by `pad` on every side. Saturates
    /// instead of wrapping for coordinates near the `i32` limits.
    pub fn around(a: Point, b: Point, pad: i32) -> Self {
        Self {
            left: a.0.min(b.0).saturating_sub(pad),
            top: a.1.min(b.1).saturating_sub(pad),
            right: a.0.max(b.0).saturating_add(pad).saturating_add(1),
            bottom: a.1.max(b.1).saturating_add(pad).saturating_add(1),
        }
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn union(self, other: DirtyRect) -> DirtyRect {
        DirtyRect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Intersection with a `width` x `height` surface, `None` when empty.
    pub fn clip_to(self, width: u32, height: u32) -> Option<DirtyRect> {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);
        let clipped = DirtyRect {
            left: self.left.clamp(0, max_x),
            top: self.top.clamp(0, max_y),
            right: self.right.clamp(0, max_x),
            bottom: self.bottom.clamp(0, max_y),
        };
        (clipped.width() > 0 && clipped.height() > 0).then_some(clipped)
    }
}

pub fn segment_dirty_bounds(start: Point, end: Point, radius: u32) -> DirtyRect {
    let pad = i32::try_from(radius).unwrap_or(i32::MAX).saturating_add(1);
    DirtyRect::around(start, end, pad)
}

/// Stamp a filled disc of `radius` centred on `center`.
pub fn draw_brush(surface: &mut CanvasSurface, center: Point, radius: u32, color: Rgba) -> u64 {
    let bounds = segment_dirty_bounds(center, center, radius);
    let Some(clip) = bounds.clip_to(surface.width(), surface.height()) else {
        return 0;
    };
    let spans = disc_spans(radius);
    let r = spans.len() as i32 / 2;

    let mut writes: u64 = 0;
    for y in clip.top..clip.bottom {
        let Some(dy) = y.checked_sub(center.1) else {
            continue;
        };
        if dy < -r || dy > r {
            continue;
        }
        let half = spans[(dy + r) as usize];
        let x0 = center.0.saturating_sub(half).max(clip.left);
        let x1 = center.0.saturating_add(half).saturating_add(1).min(clip.right);
        for x in x0..x1 {
            set_pixel(surface, x, y, color);
            writes = writes.saturating_add(1);
        }
    }
    writes
}

/// Round-capped segment: every pixel within `radius` of the segment.
pub fn draw_segment(
    surface: &mut CanvasSurface,
    start: Point,
    end: Point,
    radius: u32,
    color: Rgba,
) -> u64 {
    if start == end {
        return draw_brush(surface, start, radius, color);
    }

    let (width, height) = surface.size();
    let Some(clip) = segment_dirty_bounds(start, end, radius).clip_to(width, height) else {
        return 0;
    };

    let radius_sq = (radius as f32) * (radius as f32);
    let mut operations: u64 = 0;
    for y in clip.top..clip.bottom {
        for x in clip.left..clip.right {
            if point_segment_distance_sq((x, y), start, end) <= radius_sq {
                set_pixel(surface, x, y, color);
                operations = operations.saturating_add(1);
            }
        }
    }
    operations
}

/// Scanline fill of the closed polygon through `points`. The closing edge
/// from the last vertex back to the first is implicit.
pub fn fill_polygon(surface: &mut CanvasSurface, points: &[Point], color: Rgba) -> Option<DirtyRect> {
    if points.len() < 3 {
        return None;
    }

    let (width, height) = surface.size();
    let bounds = polygon_bounds(points).clip_to(width, height)?;

    let n = points.len();
    let mut nodes: Vec<f32> = Vec::with_capacity(n);
    for y in bounds.top..bounds.bottom {
        let yf = y as f32 + 0.5;
        nodes.clear();
        for i in 0..n {
            let j = (i + 1) % n;
            let (xi, yi) = (points[i].0 as f32, points[i].1 as f32);
            let (xj, yj) = (points[j].0 as f32, points[j].1 as f32);
            if (yi < yf && yj >= yf) || (yj < yf && yi >= yf) {
                let t = (yf - yi) / (yj - yi);
                nodes.push(xi + t * (xj - xi));
            }
        }
        nodes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        for pair in nodes.chunks_exact(2) {
            let x_start = ((pair[0] - 0.5).ceil() as i32).max(0);
            let x_end = ((pair[1] - 0.5).floor() as i32).min(width as i32 - 1);
            for x in x_start..=x_end {
                set_pixel(surface, x, y, color);
            }
        }
    }
    Some(bounds)
}

fn polygon_bounds(points: &[Point]) -> DirtyRect {
    let first = points[0];
    points
        .iter()
        .skip(1)
        .fold(DirtyRect::around(first, first, 0), |rect, point| {
            rect.union(DirtyRect::around(*point, *point, 0))
        })
}

fn point_segment_distance_sq(point: Point, start: Point, end: Point) -> f32 {
    let px = point.0 as f32;
    let py = point.1 as f32;
    let x0 = start.0 as f32;
    let y0 = start.1 as f32;
    let vx = end.0 as f32 - x0;
    let vy = end.1 as f32 - y0;
    let wx = px - x0;
    let wy = py - y0;
    let len_sq = vx * vx + vy * vy;
    if len_sq <= f32::EPSILON {
        return wx * wx + wy * wy;
    }
    let t = ((wx * vx + wy * vy) / len_sq).clamp(0.0, 1.0);
    let dx = px - (x0 + vx * t);
    let dy = py - (y0 + vy * t);
    dx * dx + dy * dy
}

fn set_pixel(surface: &mut CanvasSurface, x: i32, y: i32, color: Rgba) {
    let (width, height) = surface.size();
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }
    let idx = ((y as u32 * width + x as u32) * 4) as usize;
    surface.pixels_mut()[idx..idx + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
}

/// Half-width of each disc row, indexed by `dy + radius`.
static DISC_SPAN_CACHE: Lazy<Mutex<HashMap<u32, Arc<[i32]>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn disc_spans(radius: u32) -> Arc<[i32]> {
    if let Ok(cache) = DISC_SPAN_CACHE.lock() {
        if let Some(spans) = cache.get(&radius) {
            return spans.clone();
        }
    }

    let r = i64::from(radius);
    let spans: Arc<[i32]> = (-r..=r)
        .map(|dy| {
            let mut half = ((r * r - dy * dy) as f64).sqrt() as i64;
            while half * half + dy * dy > r * r {
                half -= 1;
            }
            while (half + 1) * (half + 1) + dy * dy <= r * r {
                half += 1;
            }
            half as i32
        })
        .collect();
    if let Ok(mut cache) = DISC_SPAN_CACHE.lock() {
        cache.insert(radius, spans.clone());
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brush_stamp_is_a_disc_of_the_requested_radius() {
        let mut surface = CanvasSurface::new(40, 40);
        draw_brush(&mut surface, (20, 20), 5, Rgba::COVERED);

        assert!(surface.is_covered(20, 20));
        assert!(surface.is_covered(25, 20));
        assert!(surface.is_covered(20, 15));
        assert!(!surface.is_covered(26, 20));
        // (4, 4) is outside a radius-5 disc
        assert!(!surface.is_covered(24, 24));
    }

    #[test]
    fn brush_is_clipped_at_surface_edges() {
        let mut surface = CanvasSurface::new(10, 10);
        let writes = draw_brush(&mut surface, (0, 0), 5, Rgba::COVERED);
        assert!(surface.is_covered(0, 0));
        assert_eq!(writes as usize, surface.covered_count());
    }

    #[test]
    fn segment_covers_a_capsule_between_endpoints() {
        let mut surface = CanvasSurface::new(100, 40);
        draw_segment(&mut surface, (10, 20), (90, 20), 5, Rgba::COVERED);

        assert!(surface.is_covered(50, 20));
        assert!(surface.is_covered(50, 25));
        assert!(!surface.is_covered(50, 26));
        // round caps
        assert!(surface.is_covered(5, 20));
        assert!(surface.is_covered(95, 20));
        assert!(!surface.is_covered(96, 20));
    }

    #[test]
    fn polygon_fill_covers_square_interior() {
        let mut surface = CanvasSurface::new(40, 40);
        let square = [(10, 10), (20, 10), (20, 20), (10, 20)];
        let bounds = fill_polygon(&mut surface, &square, Rgba::COVERED).expect("bounds");

        assert_eq!(surface.covered_count(), 100);
        assert!(surface.is_covered(15, 15));
        assert!(!surface.is_covered(25, 15));
        assert_eq!((bounds.left, bounds.top), (10, 10));
        assert_eq!((bounds.width(), bounds.height()), (11, 11));
    }

    #[test]
    fn polygon_with_two_points_is_ignored() {
        let mut surface = CanvasSurface::new(10, 10);
        assert!(fill_polygon(&mut surface, &[(0, 0), (9, 9)], Rgba::COVERED).is_none());
        assert!(surface.is_empty());
    }

    #[test]
    fn polygon_fully_outside_surface_changes_nothing() {
        let mut surface = CanvasSurface::new(10, 10);
        let triangle = [(50, 50), (60, 50), (55, 60)];
        assert!(fill_polygon(&mut surface, &triangle, Rgba::COVERED).is_none());
        assert!(surface.is_empty());
    }

    #[test]
    fn dirty_rect_clip_rejects_disjoint_rects() {
        let rect = DirtyRect::around((-20, -20), (-10, -10), 0);
        assert_eq!(rect.clip_to(10, 10), None);
    }

    #[test]
    fn extreme_coordinates_saturate_instead_of_overflowing() {
        let rect = segment_dirty_bounds((i32::MAX - 1, i32::MIN + 1), (i32::MAX, i32::MIN), 100);
        assert_eq!(rect.right, i32::MAX);
        assert_eq!(rect.top, i32::MIN);
        assert_eq!(rect.clip_to(10, 10), None);

        let mut surface = CanvasSurface::new(10, 10);
        assert_eq!(draw_brush(&mut surface, (i32::MAX, i32::MAX), 100, Rgba::COVERED), 0);
        assert_eq!(draw_brush(&mut surface, (i32::MIN, i32::MIN), 100, Rgba::COVERED), 0);
        draw_segment(&mut surface, (-1_000, 5), (i32::MAX, 5), 3, Rgba::COVERED);
        assert!(surface.is_covered(5, 5));
        assert!(surface.is_covered(9, 7));
        assert!(!surface.is_covered(5, 0));
    }
}
