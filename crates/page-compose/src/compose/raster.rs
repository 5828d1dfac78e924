//! Raster image embedding
//!
//! PNG is decoded and embedded as raw 8-bit samples, with any alpha channel
//! split into a soft mask. JPEG bytes are embedded unchanged behind
//! `DCTDecode` after a decode check; their colour space comes from the
//! frame header, since the decoder converts CMYK to RGB.

use crate::types::*;
use image::{ColorType, ImageFormat};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

/// An image XObject added to the output document
#[derive(Debug, Clone, Copy)]
pub(crate) struct EmbeddedImage {
    pub id: ObjectId,
    /// Natural size in pixels (one pixel per point)
    pub width: u32,
    pub height: u32,
}

/// Embed `bytes` as an image XObject
pub(crate) fn embed_image(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage> {
    match image::guess_format(bytes)? {
        ImageFormat::Png => embed_png(doc, bytes),
        ImageFormat::Jpeg => embed_jpeg(doc, bytes),
        other => Err(ComposeError::Decode {
            name: format!("{:?} image", other),
            reason: "only PNG and JPEG images can be embedded".to_string(),
        }),
    }
}

fn embed_png(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage> {
    let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    let (width, height) = (decoded.width(), decoded.height());

    let id = if decoded.color().has_alpha() {
        let rgba = decoded.to_rgba8();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        let smask_id = add_image_stream(doc, width, height, "DeviceGray", alpha, None);
        add_image_stream(doc, width, height, "DeviceRGB", rgb, Some(smask_id))
    } else {
        let (color_space, samples) = match decoded.color() {
            ColorType::L8 | ColorType::L16 => ("DeviceGray", decoded.to_luma8().into_raw()),
            _ => ("DeviceRGB", decoded.to_rgb8().into_raw()),
        };
        add_image_stream(doc, width, height, color_space, samples, None)
    };

    Ok(EmbeddedImage { id, width, height })
}

fn embed_jpeg(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage> {
    image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
    let header = read_jpeg_header(bytes)?;
    let (width, height) = (header.width, header.height);

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "BitsPerComponent" => 8,
        "Filter" => "DCTDecode",
    };
    match header.components {
        1 => dict.set("ColorSpace", "DeviceGray"),
        3 => dict.set("ColorSpace", "DeviceRGB"),
        4 => {
            dict.set("ColorSpace", "DeviceCMYK");
            // Adobe applications write CMYK JPEGs inverted
            if header.adobe {
                let decode = [1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer).to_vec();
                dict.set("Decode", decode);
            }
        }
        n => {
            return Err(ComposeError::Decode {
                name: "JPEG image".to_string(),
                reason: format!("unsupported component count {}", n),
            });
        }
    }

    let mut stream = Stream::new(dict, bytes.to_vec());
    // Already compressed
    stream.allows_compression = false;

    let id = doc.add_object(stream);
    Ok(EmbeddedImage { id, width, height })
}

/// What the embedder needs from a JPEG's markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegHeader {
    width: u32,
    height: u32,
    components: u8,
    /// An Adobe APP14 segment precedes the frame header
    adobe: bool,
}

/// Walk the marker segments up to the first start-of-frame
fn read_jpeg_header(bytes: &[u8]) -> Result<JpegHeader> {
    let malformed = |reason: &str| ComposeError::Decode {
        name: "JPEG image".to_string(),
        reason: reason.to_string(),
    };

    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return Err(malformed("missing start-of-image marker"));
    }

    let mut adobe = false;
    let mut pos = 2;
    loop {
        // Markers may be preceded by any number of 0xFF fill bytes
        while bytes.get(pos) == Some(&0xFF) {
            pos += 1;
        }
        let marker = *bytes
            .get(pos)
            .ok_or_else(|| malformed("no frame header"))?;
        pos += 1;

        match marker {
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return Err(malformed("no frame header before scan data")),
            _ => {}
        }

        let length = match bytes.get(pos..pos + 2) {
            Some(&[hi, lo]) => u16::from_be_bytes([hi, lo]) as usize,
            _ => return Err(malformed("truncated segment")),
        };
        let segment = bytes
            .get(pos + 2..pos + length)
            .ok_or_else(|| malformed("truncated segment"))?;

        match marker {
            // SOF0..SOF15, excluding DHT, JPG and DAC
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return match segment {
                    &[_precision, h0, h1, w0, w1, components, ..] => Ok(JpegHeader {
                        width: u16::from_be_bytes([w0, w1]) as u32,
                        height: u16::from_be_bytes([h0, h1]) as u32,
                        components,
                        adobe,
                    }),
                    _ => Err(malformed("truncated frame header")),
                };
            }
            0xEE if segment.starts_with(b"Adobe") => adobe = true,
            _ => {}
        }
        pos += length;
    }
}

fn add_image_stream(
    doc: &mut Document,
    width: u32,
    height: u32,
    color_space: &str,
    samples: Vec<u8>,
    smask: Option<ObjectId>,
) -> ObjectId {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
    };
    if let Some(smask_id) = smask {
        dict.set("SMask", smask_id);
    }
    doc.add_object(Stream::new(dict, samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage, RgbaImage};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_embed_png_without_alpha() {
        let png = encode(
            DynamicImage::ImageRgb8(RgbImage::new(4, 3)),
            ImageFormat::Png,
        );
        let mut doc = Document::with_version("1.7");
        let embedded = embed_image(&mut doc, &png).unwrap();
        assert_eq!((embedded.width, embedded.height), (4, 3));

        let stream = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        assert_eq!(stream.content.len(), 4 * 3 * 3);
        assert!(stream.dict.get(b"SMask").is_err());
    }

    #[test]
    fn test_embed_png_with_alpha_adds_soft_mask() {
        let png = encode(
            DynamicImage::ImageRgba8(RgbaImage::new(2, 2)),
            ImageFormat::Png,
        );
        let mut doc = Document::with_version("1.7");
        let embedded = embed_image(&mut doc, &png).unwrap();

        let stream = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        let smask_id = stream.dict.get(b"SMask").unwrap().as_reference().unwrap();
        let smask = doc.get_object(smask_id).unwrap().as_stream().unwrap();
        assert_eq!(smask.content.len(), 4);
    }

    #[test]
    fn test_embed_jpeg_passes_bytes_through() {
        let jpeg = encode(
            DynamicImage::ImageRgb8(RgbImage::new(8, 8)),
            ImageFormat::Jpeg,
        );
        let mut doc = Document::with_version("1.7");
        let embedded = embed_image(&mut doc, &jpeg).unwrap();

        let stream = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, jpeg);
        assert_eq!(
            stream.dict.get(b"Filter").unwrap().as_name().unwrap(),
            b"DCTDecode"
        );
        assert_eq!(
            stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(),
            b"DeviceRGB"
        );
    }

    /// A baseline 8x8 four-component JPEG whose only MCU is flat grey,
    /// optionally tagged by an Adobe APP14 segment
    fn cmyk_jpeg(adobe: bool) -> Vec<u8> {
        let mut jpeg = vec![0xFF, 0xD8];
        if adobe {
            jpeg.extend_from_slice(&[0xFF, 0xEE, 0x00, 0x0E]);
            jpeg.extend_from_slice(b"Adobe");
            jpeg.extend_from_slice(&[0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00]);
        }
        // Quantization table 0, all ones
        jpeg.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x43, 0x00]);
        jpeg.extend_from_slice(&[1; 64]);
        // Frame: 8 bits, 8x8, four components sharing table 0
        jpeg.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x14, 0x08, 0x00, 0x08, 0x00, 0x08, 0x04]);
        for id in 1..=4 {
            jpeg.extend_from_slice(&[id, 0x11, 0x00]);
        }
        // DC and AC tables, each with a single one-bit code for symbol 0
        for class in [0x00, 0x10] {
            jpeg.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x14, class, 1]);
            jpeg.extend_from_slice(&[0; 15]);
            jpeg.push(0x00);
        }
        // Scan over all four components
        jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x0E, 0x04]);
        for id in 1..=4 {
            jpeg.extend_from_slice(&[id, 0x00]);
        }
        jpeg.extend_from_slice(&[0x00, 0x3F, 0x00]);
        // Four blocks, each a zero DC difference then end-of-block
        jpeg.push(0x00);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn test_read_jpeg_header() {
        let header = read_jpeg_header(&cmyk_jpeg(true)).unwrap();
        assert_eq!(
            header,
            JpegHeader {
                width: 8,
                height: 8,
                components: 4,
                adobe: true,
            }
        );
        assert!(!read_jpeg_header(&cmyk_jpeg(false)).unwrap().adobe);

        let gray = encode(
            DynamicImage::ImageLuma8(image::GrayImage::new(5, 3)),
            ImageFormat::Jpeg,
        );
        let header = read_jpeg_header(&gray).unwrap();
        assert_eq!((header.width, header.height, header.components), (5, 3, 1));

        assert!(read_jpeg_header(b"\xFF\xD8\xFF\xDA").is_err());
        assert!(read_jpeg_header(b"\xFF\xD8\xFF\xC0\x00\x11\x08").is_err());
    }

    #[test]
    fn test_embed_cmyk_jpeg() {
        let jpeg = cmyk_jpeg(true);
        let mut doc = Document::with_version("1.7");
        let embedded = embed_image(&mut doc, &jpeg).unwrap();
        assert_eq!((embedded.width, embedded.height), (8, 8));

        let stream = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, jpeg);
        assert_eq!(
            stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(),
            b"DeviceCMYK"
        );
        let decode = stream.dict.get(b"Decode").unwrap().as_array().unwrap();
        assert_eq!(decode.len(), 8);
        assert_eq!(decode[0].as_i64().unwrap(), 1);
        assert_eq!(decode[1].as_i64().unwrap(), 0);

        // Without the Adobe segment the samples are not inverted
        let mut doc = Document::with_version("1.7");
        let embedded = embed_image(&mut doc, &cmyk_jpeg(false)).unwrap();
        let stream = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        assert!(stream.dict.get(b"Decode").is_err());
    }

    #[test]
    fn test_corrupt_image_is_an_error() {
        let mut doc = Document::with_version("1.7");
        assert!(embed_image(&mut doc, b"\x89PNG\r\n\x1a\nbroken").is_err());
        assert!(embed_image(&mut doc, b"plain text").is_err());
    }
}
