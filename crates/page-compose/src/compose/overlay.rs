//! Text overlay placement and drawing
//!
//! Overlay positions are percentages of the page *as displayed*, y from the
//! top. Output coordinates are PDF user space, y from the bottom, before the
//! page's `/Rotate` is applied by the viewer. `place_overlay` maps between
//! the two; `draw_overlays` appends the text to a page's content.

use super::fonts::{baseline_offset, encode_win_ansi, escape_literal, resource_name, text_width};
use super::page::PageGeometry;
use crate::types::*;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::collections::HashMap;
use std::io::Write;

/// Where an overlay's centre lands in user space, and the counter-clockwise
/// angle its text run is drawn at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayPlacement {
    pub x: f32,
    pub y: f32,
    pub angle_deg: f32,
}

/// Map an overlay's percentage position onto a page's user space
pub fn place_overlay(overlay: &TextOverlay, geometry: &PageGeometry) -> OverlayPlacement {
    let PageGeometry {
        x0,
        y0,
        width,
        height,
        rotation,
    } = *geometry;

    let (visual_width, visual_height) = if rotation % 180 == 90 {
        (height, width)
    } else {
        (width, height)
    };
    let vx = visual_width * overlay.x_percent / 100.0;
    let vy = visual_height - visual_height * overlay.y_percent / 100.0;

    // Undo the viewer's clockwise page rotation
    let (x, y) = match rotation {
        90 => (width - vy, vx),
        180 => (width - vx, height - vy),
        270 => (vy, height - vx),
        _ => (vx, vy),
    };

    OverlayPlacement {
        x: x0 + x,
        y: y0 + y,
        angle_deg: rotation as f32 - overlay.rotation_deg as f32,
    }
}

/// Font and graphics-state objects shared by every page of one export
#[derive(Debug, Default)]
pub(crate) struct OverlayResources {
    fonts: HashMap<StandardFont, ObjectId>,
    opacity_states: HashMap<u32, ObjectId>,
}

impl OverlayResources {
    fn font(&mut self, doc: &mut Document, font: StandardFont) -> ObjectId {
        *self.fonts.entry(font).or_insert_with(|| {
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            })
        })
    }

    fn opacity_state(&mut self, doc: &mut Document, opacity: f32) -> ObjectId {
        *self
            .opacity_states
            .entry(opacity.to_bits())
            .or_insert_with(|| {
                doc.add_object(dictionary! {
                    "Type" => "ExtGState",
                    "ca" => Object::Real(opacity),
                    "CA" => Object::Real(opacity),
                })
            })
    }
}

/// Draw `overlays` on top of the existing content of `page_id`, in order
pub(crate) fn draw_overlays(
    doc: &mut Document,
    page_id: ObjectId,
    geometry: &PageGeometry,
    overlays: &[TextOverlay],
    shared: &mut OverlayResources,
) -> Result<()> {
    if overlays.is_empty() {
        return Ok(());
    }

    let mut resources = inline_dictionary(doc, page_dictionary(doc, page_id)?.get(b"Resources").ok())?;
    let mut fonts = inline_dictionary(doc, resources.get(b"Font").ok())?;
    let mut states = inline_dictionary(doc, resources.get(b"ExtGState").ok())?;

    let mut ops = Vec::new();
    for overlay in overlays {
        let (r, g, b) = overlay.rgb().ok_or_else(|| {
            ComposeError::InvalidOverlay(format!("color {:?} is not #RRGGBB", overlay.color_hex))
        })?;

        let font_id = shared.font(doc, overlay.font);
        let font_name = bind_name(&mut fonts, resource_name(overlay.font), font_id);
        let state_id = shared.opacity_state(doc, overlay.opacity);
        let state_name = bind_name(&mut states, "PcGs", state_id);

        let (encoded, replaced) = encode_win_ansi(&overlay.text);
        if replaced {
            log::warn!(
                "Overlay text {:?} has characters {} cannot draw; substituted '?'",
                overlay.text,
                overlay.font.base_font()
            );
        }

        let placement = place_overlay(overlay, geometry);
        let (sin, cos) = placement.angle_deg.to_radians().sin_cos();
        let half_width = text_width(overlay.font, &encoded, overlay.size_pt) / 2.0;
        let baseline = baseline_offset(overlay.font, overlay.size_pt);

        write!(
            ops,
            "q /{} gs {:.4} {:.4} {:.4} rg {:.4} {:.4} {:.4} {:.4} {:.2} {:.2} cm BT /{} {:.2} Tf {:.2} {:.2} Td (",
            state_name,
            r,
            g,
            b,
            cos,
            sin,
            -sin,
            cos,
            placement.x,
            placement.y,
            font_name,
            overlay.size_pt,
            -half_width,
            -baseline,
        )?;
        ops.extend(escape_literal(&encoded));
        ops.extend_from_slice(b") Tj ET Q\n");
    }

    resources.set("Font", Object::Dictionary(fonts));
    resources.set("ExtGState", Object::Dictionary(states));

    let existing = content_references(page_dictionary(doc, page_id)?);
    let mut contents = Vec::with_capacity(existing.len() + 3);
    if !existing.is_empty() {
        // Isolate the original content's graphics state from the overlays
        contents.push(Object::Reference(
            doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec())),
        ));
        contents.extend(existing);
        contents.push(Object::Reference(
            doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec())),
        ));
    }
    contents.push(Object::Reference(
        doc.add_object(Stream::new(Dictionary::new(), ops)),
    ));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));
    Ok(())
}

fn page_dictionary(doc: &Document, page_id: ObjectId) -> Result<&Dictionary> {
    Ok(doc.get_dictionary(page_id)?)
}

/// A private copy of a possibly-referenced dictionary, so edits never reach
/// objects shared with other pages
fn inline_dictionary(doc: &Document, obj: Option<&Object>) -> Result<Dictionary> {
    match obj {
        Some(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Dictionary(dict) => Ok(dict.clone()),
            _ => Ok(Dictionary::new()),
        },
        Some(Object::Dictionary(dict)) => Ok(dict.clone()),
        _ => Ok(Dictionary::new()),
    }
}

/// Bind `id` under `base` (or `base` plus a suffix if that name is taken by
/// something else) and return the name used
fn bind_name(dict: &mut Dictionary, base: &str, id: ObjectId) -> String {
    let mut name = base.to_string();
    let mut suffix = 1;
    loop {
        match dict.get(name.as_bytes()) {
            Ok(Object::Reference(bound)) if *bound == id => return name,
            Ok(_) => {
                suffix += 1;
                name = format!("{}{}", base, suffix);
            }
            Err(_) => {
                dict.set(name.as_bytes().to_vec(), Object::Reference(id));
                return name;
            }
        }
    }
}

/// The page's content streams, in drawing order
fn content_references(page: &Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Null) | Err(_) => Vec::new(),
        Ok(other) => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(width: f32, height: f32, rotation: u16) -> PageGeometry {
        PageGeometry {
            x0: 0.0,
            y0: 0.0,
            width,
            height,
            rotation,
        }
    }

    #[test]
    fn test_place_overlay_top_centre() {
        let overlay = TextOverlay::new("x").at(50.0, 0.0);
        let placement = place_overlay(&overlay, &geometry(600.0, 800.0, 0));
        assert_eq!((placement.x, placement.y), (300.0, 800.0));
        assert_eq!(placement.angle_deg, 0.0);
    }

    #[test]
    fn test_place_overlay_on_rotated_page() {
        // Displayed as 800 wide x 600 tall; top-left corner of the display
        // is the user-space origin after a 90 degree clockwise turn
        let overlay = TextOverlay::new("x").at(0.0, 0.0);
        let placement = place_overlay(&overlay, &geometry(600.0, 800.0, 90));
        assert_eq!((placement.x, placement.y), (0.0, 0.0));
        assert_eq!(placement.angle_deg, 90.0);

        let overlay = TextOverlay::new("x").at(100.0, 100.0);
        let placement = place_overlay(&overlay, &geometry(600.0, 800.0, 180));
        assert_eq!((placement.x, placement.y), (0.0, 800.0));

        let overlay = TextOverlay::new("x").at(0.0, 100.0);
        let placement = place_overlay(&overlay, &geometry(600.0, 800.0, 270));
        assert_eq!((placement.x, placement.y), (0.0, 800.0));
    }

    #[test]
    fn test_place_overlay_offsets_by_media_box_origin() {
        let overlay = TextOverlay::new("x").at(0.0, 100.0);
        let placement = place_overlay(
            &overlay,
            &PageGeometry {
                x0: 10.0,
                y0: 20.0,
                width: 100.0,
                height: 100.0,
                rotation: 0,
            },
        );
        assert_eq!((placement.x, placement.y), (10.0, 20.0));
    }

    #[test]
    fn test_overlay_rotation_is_clockwise() {
        let mut overlay = TextOverlay::new("x");
        overlay.rotation_deg = 45;
        let placement = place_overlay(&overlay, &geometry(100.0, 100.0, 0));
        assert_eq!(placement.angle_deg, -45.0);
    }

    #[test]
    fn test_bind_name_avoids_collisions() {
        let mut dict = Dictionary::new();
        dict.set("PcHelv", Object::Reference((1, 0)));
        assert_eq!(bind_name(&mut dict, "PcHelv", (1, 0)), "PcHelv");
        assert_eq!(bind_name(&mut dict, "PcHelv", (2, 0)), "PcHelv2");
        assert_eq!(bind_name(&mut dict, "PcHelv", (2, 0)), "PcHelv2");
    }
}
