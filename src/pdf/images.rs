//! Images in and out of PDF documents.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{load_plain, save};
use crate::errors::PdfError;

const JPEG_QUALITY: u8 = 90;

/// Luma above which a beautified pixel becomes pure white
const BACKGROUND_THRESHOLD: u8 = 200;

/// Write every decodable embedded image into `out_dir`
pub fn extract_images(input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PdfError> {
    let doc = load_plain(input)?;
    let mut written = Vec::new();

    for (id, object) in &doc.objects {
        let Object::Stream(stream) = object else {
            continue;
        };
        if !is_name(stream.dict.get(b"Subtype").ok(), b"Image") {
            continue;
        }

        let index = written.len() + 1;
        let filter = stream
            .dict
            .get(b"Filter")
            .ok()
            .and_then(|filter| match filter {
                Object::Array(filters) => filters.last().cloned(),
                other => Some(other.clone()),
            });

        if is_name(filter.as_ref(), b"DCTDecode") {
            let path = out_dir.join(format!("image_{index}.jpg"));
            std::fs::write(&path, &stream.content)?;
            written.push(path);
            continue;
        }

        match decode_raw_image(stream) {
            Some(image) => {
                let path = out_dir.join(format!("image_{index}.png"));
                image.save_with_format(&path, ImageFormat::Png)?;
                written.push(path);
            }
            None => debug!(object = ?id, "Skipping image with unsupported encoding"),
        }
    }

    if written.is_empty() {
        return Err(PdfError::NoImages);
    }
    Ok(written)
}

/// 8-bit RGB or gray samples, optionally Flate compressed
fn decode_raw_image(stream: &Stream) -> Option<DynamicImage> {
    let dict = &stream.dict;
    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|bits| bits.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let color_space = dict.get(b"ColorSpace").ok();

    if is_name(color_space, b"DeviceRGB") {
        RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
    } else if is_name(color_space, b"DeviceGray") {
        GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8)
    } else {
        None
    }
}

fn is_name(object: Option<&Object>, name: &[u8]) -> bool {
    matches!(object, Some(Object::Name(value)) if value.as_slice() == name)
}

/// One page per image, sized to the image in points
pub fn images_to_pdf(inputs: &[PathBuf], output: &Path) -> Result<(), PdfError> {
    let images = inputs
        .iter()
        .map(|path| image::open(path).map_err(PdfError::from))
        .collect::<Result<Vec<_>, _>>()?;
    write_image_pdf(images, output)
}

/// Flatten backgrounds and boost contrast of photographed pages, then
/// combine them into one PDF
pub fn beautify_to_pdf(inputs: &[PathBuf], output: &Path) -> Result<(), PdfError> {
    let mut pages = Vec::with_capacity(inputs.len());
    for path in inputs {
        pages.push(beautify(image::open(path)?));
    }
    write_image_pdf(pages, output)
}

/// Stretch the gray levels to the full range and whiten the paper
pub fn beautify(image: DynamicImage) -> DynamicImage {
    let mut gray = image.to_luma8();

    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(min, max), pixel| {
            (min.min(pixel.0[0]), max.max(pixel.0[0]))
        });
    let span = f32::from(max.saturating_sub(min)).max(1.0);

    for pixel in gray.pixels_mut() {
        let stretched = (f32::from(pixel.0[0] - min) * 255.0 / span).round() as u8;
        pixel.0[0] = if stretched >= BACKGROUND_THRESHOLD {
            u8::MAX
        } else {
            stretched
        };
    }

    DynamicImage::ImageLuma8(gray)
}

fn write_image_pdf(images: Vec<DynamicImage>, output: &Path) -> Result<(), PdfError> {
    if images.is_empty() {
        return Err(PdfError::Image("no images to convert".to_string()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(images.len());

    for image in images {
        let (width, height) = (image.width(), image.height());
        let (color_space, jpeg) = encode_jpeg(&image)?;

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (width as i64).into(),
                        0.into(),
                        0.into(),
                        (height as i64).into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    debug!(pages = count, "Writing image document");
    save(&mut doc, output)
}

/// JPEG bytes plus the matching PDF colour space
fn encode_jpeg(image: &DynamicImage) -> Result<(&'static str, Vec<u8>), PdfError> {
    let mut bytes = Vec::new();
    let color_space = {
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
        match image {
            DynamicImage::ImageLuma8(gray) => {
                encoder.encode_image(gray)?;
                "DeviceGray"
            }
            other => {
                if other.color().has_alpha() {
                    warn!("Dropping alpha channel of converted image");
                }
                encoder.encode_image(&other.to_rgb8())?;
                "DeviceRGB"
            }
        }
    };

    Ok((color_space, bytes))
}
