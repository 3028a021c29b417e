use mask_editor::editor::{codec, BrushRadius, CanvasSurface, InlineImage, StrokeEngine, Tool};

fn painted(width: u32, height: u32) -> CanvasSurface {
    let mut surface = CanvasSurface::new(width, height);
    let mut strokes = StrokeEngine::new(BrushRadius::new(7));

    strokes.begin_stroke(&mut surface, (5, 5), Tool::Paint);
    strokes.extend_stroke(&mut surface, (60, 30));
    strokes.extend_stroke(&mut surface, (20, 70));
    strokes.end_stroke(&mut surface);

    strokes.begin_stroke(&mut surface, (70, 10), Tool::Select);
    for point in [(110, 10), (110, 60), (90, 75), (70, 60)] {
        strokes.extend_stroke(&mut surface, point);
    }
    strokes.end_stroke(&mut surface);
    surface
}

#[test]
fn encoded_surface_redraws_with_identical_coverage() {
    let surface = painted(120, 80);
    let mask = codec::encode(&surface).unwrap();

    let mut restored = CanvasSurface::new(120, 80);
    codec::draw(&mut restored, &mask).unwrap();
    assert_eq!(restored.coverage(), surface.coverage());

    // and through the textual form a record or service would carry
    let reparsed = InlineImage::parse(&mask.to_data_url()).unwrap();
    let again = codec::encode(&{
        let mut s = CanvasSurface::new(120, 80);
        codec::draw(&mut s, &reparsed).unwrap();
        s
    })
    .unwrap();
    assert_eq!(codec::decode(&again).unwrap(), codec::decode(&mask).unwrap());
}

#[test]
fn empty_surface_encodes_to_empty_coverage() {
    let surface = CanvasSurface::new(16, 16);
    let bitmap = codec::decode(&codec::encode(&surface).unwrap()).unwrap();
    assert_eq!(bitmap.covered_count(), 0);
    assert_eq!((bitmap.width(), bitmap.height()), (16, 16));
}

#[test]
fn jpeg_masks_decode_by_brightness() {
    use image::{DynamicImage, ImageOutputFormat, RgbImage};
    use std::io::Cursor;

    let img = RgbImage::from_fn(32, 32, |x, _| {
        if x < 16 {
            image::Rgb([255, 255, 255])
        } else {
            image::Rgb([0, 0, 0])
        }
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Jpeg(95))
        .unwrap();
    let mask = InlineImage::from_bytes(bytes);
    assert_eq!(mask.mime(), "image/jpeg");

    let mut surface = CanvasSurface::new(32, 32);
    codec::draw(&mut surface, &mask).unwrap();
    assert!(surface.is_covered(4, 16));
    assert!(!surface.is_covered(28, 16));
}

#[test]
fn lasso_of_two_points_leaves_surface_empty() {
    let mut surface = CanvasSurface::new(40, 40);
    let mut strokes = StrokeEngine::default();
    strokes.begin_stroke(&mut surface, (5, 5), Tool::Select);
    strokes.extend_stroke(&mut surface, (35, 35));
    assert_eq!(strokes.end_stroke(&mut surface), None);
    assert!(surface.is_empty());
}
