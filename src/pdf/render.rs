//! Page rasterisation with pdfium: previews, page images and visual diffs.
//!
//! pdfium keeps thread-local state, so every function here is blocking and
//! is called from `spawn_blocking` by the engine.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::PdfError;

/// Longest edge of a rendered page in pixels
const RENDER_SIZE: i32 = 1600;

/// Per-channel difference below which pixels count as equal
const DIFF_TOLERANCE: u8 = 24;

/// Pages rendered for a comparison are capped so the result stays sendable
const MAX_COMPARED_PAGES: usize = 20;

const HIGHLIGHT: Rgb<u8> = Rgb([230, 30, 30]);

fn load<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, PdfError> {
    pdfium.load_pdf_from_file(path, None).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.contains("Password") || detail.contains("password") {
            PdfError::Encrypted
        } else {
            PdfError::InvalidPdf(detail)
        }
    })
}

fn render_config() -> PdfRenderConfig {
    PdfRenderConfig::new()
        .set_target_width(RENDER_SIZE)
        .set_maximum_height(RENDER_SIZE)
}

fn render_all(path: &Path, limit: Option<usize>) -> Result<Vec<DynamicImage>, PdfError> {
    let pdfium = Pdfium::default();
    let document = load(&pdfium, path)?;
    let config = render_config();

    let pages = document.pages();
    let total = pages.len() as usize;
    let count = limit.map_or(total, |limit| total.min(limit));
    info!(pages = total, rendering = count, "PDF loaded for rendering");

    let mut images = Vec::with_capacity(count);
    for index in 0..count {
        let page = pages
            .get(index as u16)
            .map_err(|e| PdfError::tool("pdfium", format!("page {}: {e:?}", index + 1)))?;
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PdfError::tool("pdfium", format!("page {}: {e:?}", index + 1)))?;
        images.push(bitmap.as_image());
    }
    Ok(images)
}

/// First page as a PNG
pub fn preview(input: &Path, output: &Path) -> Result<(), PdfError> {
    let first = render_all(input, Some(1))?
        .into_iter()
        .next()
        .ok_or_else(|| PdfError::InvalidPdf("document has no pages".to_string()))?;
    first.to_rgb8().save_with_format(output, ImageFormat::Png)?;
    Ok(())
}

/// Every page as `page_<n>.png` in `out_dir`
pub fn to_images(input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PdfError> {
    let mut written = Vec::new();
    for (index, image) in render_all(input, None)?.into_iter().enumerate() {
        let path = out_dir.join(format!("page_{}.png", index + 1));
        image.to_rgb8().save_with_format(&path, ImageFormat::Png)?;
        written.push(path);
    }
    if written.is_empty() {
        return Err(PdfError::InvalidPdf("document has no pages".to_string()));
    }
    Ok(written)
}

/// Render both documents and write the pages that differ, stacked, with
/// the changed pixels highlighted
pub fn compare(first: &Path, second: &Path, output: &Path) -> Result<(), PdfError> {
    let a = render_all(first, Some(MAX_COMPARED_PAGES))?;
    let b = render_all(second, Some(MAX_COMPARED_PAGES))?;

    let mut changed = Vec::new();
    for index in 0..a.len().max(b.len()) {
        let diff = match (a.get(index), b.get(index)) {
            (Some(a), Some(b)) => diff_pages(&a.to_rgb8(), &b.to_rgb8()),
            // a page only one side has is entirely different
            (Some(page), None) | (None, Some(page)) => Some(highlight_all(&page.to_rgb8())),
            (None, None) => None,
        };
        if let Some(diff) = diff {
            debug!(page = index + 1, "Page differs");
            changed.push(diff);
        }
    }

    if changed.is_empty() {
        return Err(PdfError::NoDifferences);
    }

    stack(&changed).save_with_format(output, ImageFormat::Png)?;
    Ok(())
}

/// `None` when the pages look the same
pub fn diff_pages(a: &RgbImage, b: &RgbImage) -> Option<RgbImage> {
    let width = a.width().max(b.width());
    let height = a.height().max(b.height());
    let white = Rgb([255, 255, 255]);
    let mut out = RgbImage::new(width, height);
    let mut differs = false;

    for y in 0..height {
        for x in 0..width {
            let pa = pixel_or(a, x, y, white);
            let pb = pixel_or(b, x, y, white);
            let same = pa
                .0
                .iter()
                .zip(pb.0.iter())
                .all(|(ca, cb)| ca.abs_diff(*cb) <= DIFF_TOLERANCE);
            if same {
                out.put_pixel(x, y, fade(pa));
            } else {
                differs = true;
                out.put_pixel(x, y, HIGHLIGHT);
            }
        }
    }

    differs.then_some(out)
}

fn highlight_all(page: &RgbImage) -> RgbImage {
    RgbImage::from_pixel(page.width(), page.height(), HIGHLIGHT)
}

fn pixel_or(image: &RgbImage, x: u32, y: u32, default: Rgb<u8>) -> Rgb<u8> {
    if x < image.width() && y < image.height() {
        *image.get_pixel(x, y)
    } else {
        default
    }
}

/// Lighten unchanged content so highlights stand out
fn fade(pixel: Rgb<u8>) -> Rgb<u8> {
    Rgb(pixel.0.map(|c| 255 - (255 - c) / 3))
}

fn stack(pages: &[RgbImage]) -> RgbImage {
    let width = pages.iter().map(RgbImage::width).max().unwrap_or(1);
    let height = pages.iter().map(RgbImage::height).sum::<u32>().max(1);
    let mut out = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut top = 0;
    for page in pages {
        image::imageops::replace(&mut out, page, 0, i64::from(top));
        top += page.height();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_pages_have_no_diff() {
        let page = RgbImage::from_pixel(10, 10, Rgb([250, 250, 250]));
        assert!(diff_pages(&page, &page.clone()).is_none());
    }

    #[test]
    fn test_small_noise_is_tolerated() {
        let a = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        let b = RgbImage::from_pixel(4, 4, Rgb([110, 95, 100]));
        assert!(diff_pages(&a, &b).is_none());
    }

    #[test]
    fn test_changed_pixels_are_highlighted() {
        let a = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let mut b = a.clone();
        b.put_pixel(2, 1, Rgb([0, 0, 0]));

        let diff = diff_pages(&a, &b).unwrap();
        assert_eq!(*diff.get_pixel(2, 1), HIGHLIGHT);
        assert_eq!(*diff.get_pixel(0, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_stack_sums_heights() {
        let pages = vec![RgbImage::new(10, 5), RgbImage::new(8, 7)];
        let out = stack(&pages);
        assert_eq!(out.dimensions(), (10, 12));
    }
}
