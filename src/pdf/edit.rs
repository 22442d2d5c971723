//! Page level edits with lopdf: rotate, scale, split, crop and watermark.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;
use tracing::debug;

use super::{load_plain, save};
use crate::errors::PdfError;
use crate::page_range::PageRange;
use crate::tasks::{Crop, Rotation, Scale};

const WATERMARK_NAME: &str = "PdfBotWatermark";

/// Page rectangle in points
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PageBox {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    fn to_object(self) -> Object {
        Object::Array(vec![real(self.x0), real(self.y0), real(self.x1), real(self.y1)])
    }
}

pub fn rotate(input: &Path, rotation: Rotation, output: &Path) -> Result<(), PdfError> {
    let mut doc = load_plain(input)?;

    for page_id in page_ids(&doc) {
        let current = inherited(&doc, page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);
        let rotated = (current + rotation.degrees()).rem_euclid(360);
        page_dict_mut(&mut doc, page_id)?.set("Rotate", rotated);
    }

    save(&mut doc, output)
}

pub fn split(input: &Path, range: &PageRange, output: &Path) -> Result<(), PdfError> {
    let mut doc = load_plain(input)?;
    let page_count = doc.get_pages().len() as u32;

    let keep = range.select(page_count);
    if keep.is_empty() {
        return Err(PdfError::PageRangeOutOfBounds { page_count });
    }

    let dropped: Vec<u32> = (1..=page_count).filter(|page| !keep.contains(page)).collect();
    debug!(page_count, kept = keep.len(), "Splitting document");
    doc.delete_pages(&dropped);
    doc.prune_objects();

    save(&mut doc, output)
}

pub fn crop(input: &Path, crop: Crop, output: &Path) -> Result<(), PdfError> {
    let mut doc = load_plain(input)?;

    for page_id in page_ids(&doc) {
        let media = media_box(&doc, page_id)?;
        let cropped = crop_box(media, crop);
        page_dict_mut(&mut doc, page_id)?.set("CropBox", cropped.to_object());
    }

    save(&mut doc, output)
}

/// Visible area left after cropping `media`. A crop that would leave
/// nothing keeps the page unchanged.
pub fn crop_box(media: PageBox, crop: Crop) -> PageBox {
    let (dx, dy) = match crop {
        Crop::Percent(percent) => {
            let keep = (percent / 100.0).clamp(0.0, 1.0);
            (
                media.width() * (1.0 - keep) / 2.0,
                media.height() * (1.0 - keep) / 2.0,
            )
        }
        Crop::Margin(margin) => (margin, margin),
    };

    if dx * 2.0 >= media.width() || dy * 2.0 >= media.height() {
        return media;
    }

    PageBox {
        x0: media.x0 + dx,
        y0: media.y0 + dy,
        x1: media.x1 - dx,
        y1: media.y1 - dy,
    }
}

pub fn scale(input: &Path, scale: Scale, output: &Path) -> Result<(), PdfError> {
    let mut doc = load_plain(input)?;

    for page_id in page_ids(&doc) {
        let media = media_box(&doc, page_id)?;
        if media.width() <= 0.0 || media.height() <= 0.0 {
            return Err(PdfError::InvalidPdf(format!(
                "page has an empty media box ({} x {})",
                media.width(),
                media.height()
            )));
        }
        let (sx, sy) = match scale {
            Scale::ByPercent(percent) => (percent / 100.0, percent / 100.0),
            Scale::ToDimensions { width, height } => (width / media.width(), height / media.height()),
        };

        let prefix = format!(
            "q {sx:.6} 0 0 {sy:.6} {:.6} {:.6} cm\n",
            -media.x0 * sx,
            -media.y0 * sy
        );
        wrap_contents(&mut doc, page_id, prefix.into_bytes(), b"\nQ\n".to_vec())?;

        let scaled = PageBox {
            x0: 0.0,
            y0: 0.0,
            x1: media.width() * sx,
            y1: media.height() * sy,
        };
        let page = page_dict_mut(&mut doc, page_id)?;
        page.set("MediaBox", scaled.to_object());
        for key in ["CropBox", "BleedBox", "TrimBox", "ArtBox"] {
            page.remove(key.as_bytes());
        }
    }

    save(&mut doc, output)
}

/// Draw the first page of `watermark` over every page of `source`
pub fn watermark(source: &Path, watermark: &Path, output: &Path) -> Result<(), PdfError> {
    let mut doc = load_plain(source)?;
    let mut mark = load_plain(watermark)?;

    mark.renumber_objects_with(doc.max_id + 1);
    let mark_page = *mark
        .get_pages()
        .values()
        .next()
        .ok_or_else(|| PdfError::InvalidPdf("watermark has no pages".to_string()))?;
    let mark_box = media_box(&mark, mark_page)?;
    let mark_content = mark.get_page_content(mark_page)?;
    let mark_resources = inherited(&mark, mark_page, b"Resources")
        .cloned()
        .unwrap_or_else(|| Object::Dictionary(Dictionary::new()));

    let mark_max = mark.objects.keys().map(|(id, _)| *id).max().unwrap_or(0);
    doc.max_id = doc.max_id.max(mark_max);
    doc.objects.extend(mark.objects);

    let mut form = Dictionary::new();
    form.set("Type", "XObject");
    form.set("Subtype", "Form");
    form.set("BBox", mark_box.to_object());
    form.set("Resources", mark_resources);
    let form_id = doc.add_object(Stream::new(form, mark_content));

    for page_id in page_ids(&doc) {
        add_xobject(&mut doc, page_id, WATERMARK_NAME, form_id)?;
        let overlay = format!("\nQ\nq /{WATERMARK_NAME} Do Q\n");
        wrap_contents(&mut doc, page_id, b"q\n".to_vec(), overlay.into_bytes())?;
    }

    doc.prune_objects();
    save(&mut doc, output)
}

fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, PdfError> {
    Ok(doc.get_object_mut(page_id)?.as_dict_mut()?)
}

/// Look up a page attribute, following the page tree for inherited ones
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // page trees are shallow, the bound only guards against cycles
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok(),
                value => Some(value),
            };
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> Result<PageBox, PdfError> {
    let values = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .map(|array| array.iter().filter_map(number).collect::<Vec<_>>())
        .unwrap_or_default();

    match values[..] {
        [a, b, c, d] => Ok(PageBox {
            x0: a.min(c),
            y0: b.min(d),
            x1: a.max(c),
            y1: b.max(d),
        }),
        // US Letter, the PDF default
        _ => Ok(PageBox {
            x0: 0.0,
            y0: 0.0,
            x1: 612.0,
            y1: 792.0,
        }),
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Surround the page's content streams with `prefix` and `suffix` streams
fn wrap_contents(
    doc: &mut Document,
    page_id: ObjectId,
    prefix: Vec<u8>,
    suffix: Vec<u8>,
) -> Result<(), PdfError> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let prefix_id = doc.add_object(Stream::new(Dictionary::new(), prefix));
    let suffix_id = doc.add_object(Stream::new(Dictionary::new(), suffix));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(prefix_id));
    contents.extend(existing);
    contents.push(Object::Reference(suffix_id));

    page_dict_mut(doc, page_id)?.set("Contents", contents);
    Ok(())
}

/// Register `xobject_id` under `name` in the page's own resources
fn add_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    xobject_id: ObjectId,
) -> Result<(), PdfError> {
    let mut resources = match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    };
    xobjects.set(name, Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(())
}
