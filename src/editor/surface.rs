use crate::editor::model::Rgba;

/// Alpha at or above which a surface pixel counts as covered.
pub const COVERAGE_ALPHA_THRESHOLD: u8 = 128;

/// Mask layer bound to the displayed image size. Painted pixels are opaque
/// [`Rgba::COVERED`], everything else is fully transparent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CanvasSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let idx = ((y * self.width + x) * 4) as usize;
        Rgba {
            r: self.pixels[idx],
            g: self.pixels[idx + 1],
            b: self.pixels[idx + 2],
            a: self.pixels[idx + 3],
        }
    }

    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.pixel(x, y).a >= COVERAGE_ALPHA_THRESHOLD
    }

    pub fn covered_count(&self) -> usize {
        self.pixels
            .chunks_exact(4)
            .filter(|px| px[3] >= COVERAGE_ALPHA_THRESHOLD)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels
            .chunks_exact(4)
            .all(|px| px[3] < COVERAGE_ALPHA_THRESHOLD)
    }

    /// Row-major covered/uncovered classification, one entry per pixel.
    pub fn coverage(&self) -> Vec<bool> {
        self.pixels
            .chunks_exact(4)
            .map(|px| px[3] >= COVERAGE_ALPHA_THRESHOLD)
            .collect()
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Copy of the raw RGBA bytes, used when encoding for submission.
    pub fn snapshot(&self) -> Vec<u8> {
        self.pixels.clone()
    }

    /// Overwrite every pixel from a coverage map of exactly `width * height`
    /// entries. Callers validate the length before touching the surface.
    pub(crate) fn replace_with_coverage(&mut self, coverage: &[bool]) {
        assert_eq!(coverage.len(), (self.width as usize) * (self.height as usize));
        for (px, covered) in self.pixels.chunks_exact_mut(4).zip(coverage) {
            let color = if *covered {
                Rgba::COVERED
            } else {
                Rgba::TRANSPARENT
            };
            px.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surface_is_transparent_and_empty() {
        let surface = CanvasSurface::new(4, 3);
        assert_eq!(surface.size(), (4, 3));
        assert_eq!(surface.pixels().len(), 4 * 3 * 4);
        assert!(surface.is_empty());
        assert_eq!(surface.pixel(3, 2), Rgba::TRANSPARENT);
    }

    #[test]
    fn zero_dimensions_are_raised_to_one_pixel() {
        let surface = CanvasSurface::new(0, 0);
        assert_eq!(surface.size(), (1, 1));
    }

    #[test]
    fn replace_then_clear_resets_coverage() {
        let mut surface = CanvasSurface::new(2, 2);
        surface.replace_with_coverage(&[true, false, false, true]);
        assert_eq!(surface.covered_count(), 2);
        assert!(surface.is_covered(0, 0));
        assert!(!surface.is_covered(1, 0));
        assert_eq!(surface.pixel(1, 1), Rgba::COVERED);

        surface.clear();
        assert!(surface.is_empty());
    }

    #[test]
    fn out_of_bounds_is_never_covered() {
        let mut surface = CanvasSurface::new(1, 1);
        surface.replace_with_coverage(&[true]);
        assert!(!surface.is_covered(1, 0));
        assert!(!surface.is_covered(0, 5));
    }
}
