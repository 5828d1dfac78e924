//! Copying pages between PDF documents
//!
//! A source page is imported as a real page of the output document: its
//! dictionary is deep-copied (following references), inherited attributes are
//! pulled down from the source page tree, and the copy is re-parented under
//! the output's page tree.

use crate::constants::{DEFAULT_PAGE_DIMENSIONS, INHERITABLE_PAGE_KEYS, MAX_PAGE_TREE_DEPTH};
use crate::types::Result;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

/// Maps source object ids to their copies in the output document
pub(crate) type CopyCache = HashMap<ObjectId, ObjectId>;

// =============================================================================
// Page Import
// =============================================================================

/// Import one source page into `output` under `parent_id`.
///
/// `cache` is shared by all pages imported from the same source so common
/// resources (fonts, images) are copied once. Annotations are copied per
/// import so a page imported twice never shares them.
pub(crate) fn import_page(
    output: &mut Document,
    source: &Document,
    source_page_id: ObjectId,
    parent_id: ObjectId,
    cache: &mut CopyCache,
) -> Result<ObjectId> {
    let page_dict = source.get_dictionary(source_page_id)?;
    let new_page_id = output.new_object_id();

    let mut annots_cache = cache.clone();
    annots_cache.insert(source_page_id, new_page_id);
    cache.insert(source_page_id, new_page_id);

    let mut new_dict = Dictionary::new();
    for (key, value) in page_dict.iter() {
        let copied = match key.as_slice() {
            b"Parent" => continue,
            b"Annots" => copy_object_deep(output, source, value, &mut annots_cache)?,
            _ => copy_object_deep(output, source, value, cache)?,
        };
        new_dict.set(key.clone(), copied);
    }

    for key in INHERITABLE_PAGE_KEYS {
        if new_dict.has(key) {
            continue;
        }
        if let Some(value) = inherited_attribute(source, source_page_id, key) {
            let copied = copy_object_deep(output, source, value, cache)?;
            new_dict.set(key.to_vec(), copied);
        }
    }

    if !new_dict.has(b"MediaBox") {
        new_dict.set("MediaBox", default_media_box());
    }
    if !new_dict.has(b"Resources") {
        new_dict.set("Resources", Object::Dictionary(Dictionary::new()));
    }
    new_dict.set("Parent", Object::Reference(parent_id));

    // Later imports of the same page get their own id
    cache.remove(&source_page_id);

    output
        .objects
        .insert(new_page_id, Object::Dictionary(new_dict));
    Ok(new_page_id)
}

/// Get default MediaBox for US Letter size
fn default_media_box() -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(DEFAULT_PAGE_DIMENSIONS.0 as i64),
        Object::Integer(DEFAULT_PAGE_DIMENSIONS.1 as i64),
    ])
}

// =============================================================================
// Deep Copy
// =============================================================================

/// Deep copy an object from source to output document, following references.
///
/// Ids are reserved before recursing, so reference cycles (e.g. an
/// annotation pointing back at its page) terminate. References that do not
/// resolve in the source are copied as null.
pub(crate) fn copy_object_deep(
    output: &mut Document,
    source: &Document,
    obj: &Object,
    cache: &mut CopyCache,
) -> Result<Object> {
    match obj {
        Object::Reference(id) => {
            if let Some(&new_id) = cache.get(id) {
                return Ok(Object::Reference(new_id));
            }

            let new_id = output.new_object_id();
            cache.insert(*id, new_id);

            let copied = match source.get_object(*id) {
                Ok(referenced) => copy_object_deep(output, source, referenced, cache)?,
                Err(_) => Object::Null,
            };
            output.objects.insert(new_id, copied);

            Ok(Object::Reference(new_id))
        }
        Object::Dictionary(dict) => Ok(Object::Dictionary(copy_dictionary(
            output, source, dict, cache,
        )?)),
        Object::Array(arr) => {
            let new_arr: Result<Vec<_>> = arr
                .iter()
                .map(|item| copy_object_deep(output, source, item, cache))
                .collect();
            Ok(Object::Array(new_arr?))
        }
        Object::Stream(stream) => Ok(Object::Stream(Stream {
            dict: copy_dictionary(output, source, &stream.dict, cache)?,
            content: stream.content.clone(),
            allows_compression: stream.allows_compression,
            start_position: None,
        })),
        // Primitive types: just clone
        _ => Ok(obj.clone()),
    }
}

fn copy_dictionary(
    output: &mut Document,
    source: &Document,
    dict: &Dictionary,
    cache: &mut CopyCache,
) -> Result<Dictionary> {
    let mut new_dict = Dictionary::new();
    for (key, value) in dict.iter() {
        new_dict.set(key.clone(), copy_object_deep(output, source, value, cache)?);
    }
    Ok(new_dict)
}

// =============================================================================
// Page Attributes
// =============================================================================

/// Look up `key` on the page, then on its ancestors in the page tree
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

/// Follow a reference to the object it names
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// The page box as (x0, y0, width, height) in points
pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> (f32, f32, f32, f32) {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .and_then(|arr| rect_from_array(arr))
        .unwrap_or((0.0, 0.0, DEFAULT_PAGE_DIMENSIONS.0, DEFAULT_PAGE_DIMENSIONS.1))
}

fn rect_from_array(arr: &[Object]) -> Option<(f32, f32, f32, f32)> {
    if arr.len() != 4 {
        return None;
    }
    let llx = extract_number(&arr[0])?;
    let lly = extract_number(&arr[1])?;
    let urx = extract_number(&arr[2])?;
    let ury = extract_number(&arr[3])?;
    Some((llx.min(urx), lly.min(ury), (urx - llx).abs(), (ury - lly).abs()))
}

/// Rotation stored in the page (or inherited), in degrees
pub(crate) fn embedded_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0)
}

/// Extract numeric value from a PDF object
fn extract_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}
