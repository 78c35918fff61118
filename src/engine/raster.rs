use resvg::{tiny_skia, usvg};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("malformed vector graphic: {0}")]
    Svg(String),
    #[error("unsupported raster dimensions {width}x{height}")]
    Dimensions { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// Rasterize an SVG document to PNG bytes. When only one target dimension
/// is given the other follows from the document's aspect ratio; with
/// neither, the document's own size is used.
pub fn rasterize(
    svg: &str,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<Vec<u8>, RasterError> {
    let options = usvg::Options::default();
    let tree = usvg::Tree::from_str(svg, &options).map_err(|err| RasterError::Svg(err.to_string()))?;

    let size = tree.size();
    let (target_width, target_height) =
        target_dimensions(size.width(), size.height(), width, height);
    let mut pixmap = tiny_skia::Pixmap::new(target_width, target_height).ok_or(
        RasterError::Dimensions {
            width: target_width,
            height: target_height,
        },
    )?;

    let transform = tiny_skia::Transform::from_scale(
        target_width as f32 / size.width(),
        target_height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|err| RasterError::Encode(err.to_string()))
}

fn target_dimensions(
    svg_width: f32,
    svg_height: f32,
    width: Option<u32>,
    height: Option<u32>,
) -> (u32, u32) {
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scaled(svg_height, w as f32 / svg_width)),
        (None, Some(h)) => (scaled(svg_width, h as f32 / svg_height), h),
        (None, None) => (rounded_up(svg_width), rounded_up(svg_height)),
    }
}

fn scaled(dimension: f32, factor: f32) -> u32 {
    (dimension * factor).round().max(1.0) as u32
}

fn rounded_up(dimension: f32) -> u32 {
    dimension.ceil().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const SAMPLE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10" viewBox="0 0 20 10"><rect width="20" height="10" fill="#000"/></svg>"##;

    #[test]
    fn output_starts_with_the_png_signature() {
        let bytes = rasterize(SAMPLE, None, None).expect("valid SVG");
        assert_eq!(&bytes[..PNG_SIGNATURE.len()], &PNG_SIGNATURE);
    }

    #[test]
    fn single_dimension_preserves_aspect_ratio() {
        assert_eq!(target_dimensions(20.0, 10.0, Some(100), None), (100, 50));
        assert_eq!(target_dimensions(20.0, 10.0, None, Some(40)), (80, 40));
        assert_eq!(target_dimensions(20.0, 10.0, Some(30), Some(30)), (30, 30));
        assert_eq!(target_dimensions(20.5, 10.2, None, None), (21, 11));
    }

    #[test]
    fn malformed_svg_is_reported() {
        let error = rasterize("not an svg", None, None).expect_err("invalid SVG");
        assert!(matches!(error, RasterError::Svg(_)));
    }
}
