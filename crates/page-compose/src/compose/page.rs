//! Output page materialization, one function per source kind

use super::copy::{CopyCache, embedded_rotation, import_page, page_box};
use super::raster::embed_image;
use crate::types::*;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;

/// User-space frame of an output page, plus the `/Rotate` a viewer applies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub x0: f32,
    pub y0: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: u16,
}

/// A parsed PDF source with its page ids and the objects already copied out
/// of it
pub(crate) struct PdfSourceState {
    page_ids: BTreeMap<u32, ObjectId>,
    cache: CopyCache,
}

impl PdfSourceState {
    pub(crate) fn new(source: &Document) -> Self {
        Self {
            page_ids: source.get_pages(),
            cache: CopyCache::new(),
        }
    }
}

fn media_box(x0: f32, y0: f32, width: f32, height: f32) -> Object {
    Object::Array(vec![
        Object::Real(x0),
        Object::Real(y0),
        Object::Real(x0 + width),
        Object::Real(y0 + height),
    ])
}

/// An empty page at `size`, rotated by the page's own rotation
pub(crate) fn materialize_blank(
    output: &mut Document,
    parent_id: ObjectId,
    size: PageSize,
    rotation: u16,
) -> (ObjectId, PageGeometry) {
    let mut page_dict = Dictionary::new();
    page_dict.set("Type", Object::Name(b"Page".to_vec()));
    page_dict.set("Parent", Object::Reference(parent_id));
    page_dict.set("MediaBox", media_box(0.0, 0.0, size.width_pt, size.height_pt));
    page_dict.set("Resources", Object::Dictionary(Dictionary::new()));
    page_dict.set("Rotate", Object::Integer(rotation as i64));

    let geometry = PageGeometry {
        x0: 0.0,
        y0: 0.0,
        width: size.width_pt,
        height: size.height_pt,
        rotation,
    };
    (output.add_object(page_dict), geometry)
}

/// A page sized to the image's visually upright dimensions, with the image
/// drawn already turned by `rotation` (clockwise)
pub(crate) fn materialize_image(
    output: &mut Document,
    parent_id: ObjectId,
    bytes: &[u8],
    rotation: u16,
) -> Result<(ObjectId, PageGeometry)> {
    let image = embed_image(output, bytes)?;
    let (w, h) = (image.width as f32, image.height as f32);

    let (page_width, page_height, matrix) = match rotation {
        90 => (h, w, [0.0, -w, h, 0.0, 0.0, w]),
        180 => (w, h, [-w, 0.0, 0.0, -h, w, h]),
        270 => (h, w, [0.0, w, -h, 0.0, h, 0.0]),
        _ => (w, h, [w, 0.0, 0.0, h, 0.0, 0.0]),
    };

    let content = format!(
        "q {} {} {} {} {} {} cm /Im0 Do Q\n",
        matrix[0], matrix[1], matrix[2], matrix[3], matrix[4], matrix[5]
    );
    let content_id = output.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", Object::Reference(image.id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page_dict = Dictionary::new();
    page_dict.set("Type", Object::Name(b"Page".to_vec()));
    page_dict.set("Parent", Object::Reference(parent_id));
    page_dict.set("MediaBox", media_box(0.0, 0.0, page_width, page_height));
    page_dict.set("Resources", Object::Dictionary(resources));
    page_dict.set("Contents", Object::Reference(content_id));

    let geometry = PageGeometry {
        x0: 0.0,
        y0: 0.0,
        width: page_width,
        height: page_height,
        rotation: 0,
    };
    Ok((output.add_object(page_dict), geometry))
}

/// A copy of one source PDF page with the page's rotation added to the
/// rotation the source page already carries
pub(crate) fn materialize_pdf(
    output: &mut Document,
    parent_id: ObjectId,
    source: &Document,
    state: &mut PdfSourceState,
    source_page_index: u32,
    rotation: u16,
) -> Result<(ObjectId, PageGeometry)> {
    let source_page_id = *state
        .page_ids
        .get(&(source_page_index + 1))
        .ok_or_else(|| ComposeError::Decode {
            name: format!("page {}", source_page_index + 1),
            reason: "not present in the source document".to_string(),
        })?;

    let page_id = import_page(output, source, source_page_id, parent_id, &mut state.cache)?;

    let total = normalize_rotation(embedded_rotation(source, source_page_id) + rotation as i64);
    output
        .get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Rotate", Object::Integer(total as i64));

    let (x0, y0, width, height) = page_box(source, source_page_id);
    let geometry = PageGeometry {
        x0,
        y0,
        width,
        height,
        rotation: total,
    };
    Ok((page_id, geometry))
}
