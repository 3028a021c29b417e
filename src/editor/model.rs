use serde::{Deserialize, Serialize};

pub const MIN_BRUSH_RADIUS: u32 = 5;
pub const MAX_BRUSH_RADIUS: u32 = 100;

/// Input modality a pointer stroke is interpreted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Paint,
    Select,
}

pub type Point = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    /// Colour written for covered mask pixels.
    pub const COVERED: Self = Self::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Brush radius in surface pixels, always within
/// `MIN_BRUSH_RADIUS..=MAX_BRUSH_RADIUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BrushRadius(u32);

impl BrushRadius {
    pub fn new(radius: u32) -> Self {
        Self(radius.clamp(MIN_BRUSH_RADIUS, MAX_BRUSH_RADIUS))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for BrushRadius {
    fn default() -> Self {
        Self(20)
    }
}
