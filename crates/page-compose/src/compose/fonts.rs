//! Metrics and encoding for the standard fonts text overlays use
//!
//! Widths are the AFM advance widths (1/1000 em) for every WinAnsi code from
//! 0x20 up. Text is encoded with WinAnsiEncoding.

use crate::types::StandardFont;

/// Helvetica widths for 0x20..=0xFF
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 224] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, 350, // 0x70
    556, 350, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 350, 611, 350, // 0x80
    350, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 350, 500, 667, // 0x90
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333, // 0xA0
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611, // 0xB0
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // 0xC0
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // 0xD0
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278, // 0xE0
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500, // 0xF0
];

/// Times-Roman widths for 0x20..=0xFF
#[rustfmt::skip]
const TIMES_ROMAN_WIDTHS: [u16; 224] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, // 0x20
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, // 0x30
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, // 0x40
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, // 0x50
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, // 0x60
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, 350, // 0x70
    500, 350, 333, 500, 444, 1000, 500, 500, 333, 1000, 556, 333, 889, 350, 611, 350, // 0x80
    350, 333, 333, 444, 444, 350, 500, 1000, 333, 980, 389, 333, 722, 350, 444, 722, // 0x90
    250, 333, 500, 500, 500, 500, 200, 500, 333, 760, 276, 500, 564, 333, 760, 333, // 0xA0
    400, 564, 300, 300, 333, 500, 453, 250, 333, 300, 310, 500, 750, 750, 750, 444, // 0xB0
    722, 722, 722, 722, 722, 722, 889, 667, 611, 611, 611, 611, 333, 333, 333, 333, // 0xC0
    722, 722, 722, 722, 722, 722, 722, 564, 722, 722, 722, 722, 722, 722, 556, 500, // 0xD0
    444, 444, 444, 444, 444, 444, 667, 444, 444, 444, 444, 444, 278, 278, 278, 278, // 0xE0
    500, 500, 500, 500, 500, 500, 500, 564, 500, 500, 500, 500, 500, 500, 500, 500, // 0xF0
];

/// Every Courier glyph has the same advance
const COURIER_WIDTH: u16 = 600;

/// Resource name used for a font on output pages
pub(crate) fn resource_name(font: StandardFont) -> &'static str {
    match font {
        StandardFont::Helvetica => "PcHelv",
        StandardFont::TimesRoman => "PcTiRo",
        StandardFont::Courier => "PcCour",
    }
}

/// (ascender, descender) in 1/1000 em
fn vertical_metrics(font: StandardFont) -> (f32, f32) {
    match font {
        StandardFont::Helvetica => (718.0, -207.0),
        StandardFont::TimesRoman => (683.0, -217.0),
        StandardFont::Courier => (629.0, -157.0),
    }
}

/// Advance width of one WinAnsi-encoded byte
fn glyph_width(font: StandardFont, byte: u8) -> u16 {
    if font == StandardFont::Courier {
        return COURIER_WIDTH;
    }
    let table = match font {
        StandardFont::TimesRoman => &TIMES_ROMAN_WIDTHS,
        _ => &HELVETICA_WIDTHS,
    };
    // Control codes are never produced by the encoder
    byte.checked_sub(0x20).map_or(0, |i| table[i as usize])
}

/// Width of encoded text at `size` points
pub(crate) fn text_width(font: StandardFont, encoded: &[u8], size: f32) -> f32 {
    let units: u32 = encoded.iter().map(|&b| glyph_width(font, b) as u32).sum();
    units as f32 * size / 1000.0
}

/// Offset from the visual centre of a line to its baseline
pub(crate) fn baseline_offset(font: StandardFont, size: f32) -> f32 {
    let (ascender, descender) = vertical_metrics(font);
    (ascender + descender) / 2.0 * size / 1000.0
}

/// Encode text with WinAnsiEncoding.
///
/// Returns the encoded bytes and whether any character had to be replaced
/// with `?`.
pub(crate) fn encode_win_ansi(text: &str) -> (Vec<u8>, bool) {
    let mut replaced = false;
    let bytes = text
        .chars()
        .map(|c| {
            let code = c as u32;
            match c {
                ' '..='~' => c as u8,
                '\t' => b' ',
                '\u{A0}'..='\u{FF}' => code as u8,
                '€' => 0x80,
                '‚' => 0x82,
                'ƒ' => 0x83,
                '„' => 0x84,
                '…' => 0x85,
                '†' => 0x86,
                '‡' => 0x87,
                'ˆ' => 0x88,
                '‰' => 0x89,
                'Š' => 0x8A,
                '‹' => 0x8B,
                'Œ' => 0x8C,
                'Ž' => 0x8E,
                '‘' => 0x91,
                '’' => 0x92,
                '“' => 0x93,
                '”' => 0x94,
                '•' => 0x95,
                '–' => 0x96,
                '—' => 0x97,
                '˜' => 0x98,
                '™' => 0x99,
                'š' => 0x9A,
                '›' => 0x9B,
                'œ' => 0x9C,
                'ž' => 0x9E,
                'Ÿ' => 0x9F,
                _ => {
                    replaced = true;
                    b'?'
                }
            }
        })
        .collect();
    (bytes, replaced)
}

/// Escape bytes for a PDF literal string
pub(crate) fn escape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    for &b in bytes {
        if matches!(b, b'(' | b')' | b'\\') {
            out.push(b'\\');
        }
        out.push(b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        let (encoded, _) = encode_win_ansi("Hi");
        // H = 722, i = 222
        assert!((text_width(StandardFont::Helvetica, &encoded, 10.0) - 9.44).abs() < 1e-4);
        assert_eq!(text_width(StandardFont::Courier, &encoded, 10.0), 12.0);
    }

    #[test]
    fn test_text_width_outside_ascii() {
        let (encoded, replaced) = encode_win_ansi("Æ—é");
        assert!(!replaced);
        // AE = 1000, emdash = 1000, eacute = 556
        assert_eq!(text_width(StandardFont::Helvetica, &encoded, 1.0), 2.556);
        // AE = 889, emdash = 1000, eacute = 444
        assert_eq!(text_width(StandardFont::TimesRoman, &encoded, 1.0), 2.333);

        let (encoded, _) = encode_win_ansi("Œ™");
        assert_eq!(encoded, vec![0x8C, 0x99]);
        assert_eq!(text_width(StandardFont::TimesRoman, &encoded, 1.0), 1.869);
    }

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("café").0, vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(encode_win_ansi("a—b").0, vec![b'a', 0x97, b'b']);

        let (encoded, replaced) = encode_win_ansi("日本");
        assert_eq!(encoded, b"??");
        assert!(replaced);
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal(b"a(b)\\"), b"a\\(b\\)\\\\".to_vec());
    }
}
