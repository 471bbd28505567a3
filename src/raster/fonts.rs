//! Font loading and glyph lookup for text rasterization.
//!
//! Outlines come from the embedded font program (TrueType, OpenType or
//! bare CFF, read with `ttf-parser`). A font that is not embedded, or whose
//! program cannot be read, is drawn with the closest system face `fontdb`
//! can find. Type3 fonts carry their own glyph procedures and are executed
//! by the page renderer instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tiny_skia::{Path, PathBuilder, Transform};
use ttf_parser::{cff, Face, GlyphId, OutlineBuilder, PlatformId};

use crate::parser::{BaseEncoding, FontEncoding, FontProgram, FontResource, ResourceScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutlineFormat {
    Sfnt,
    Cff,
}

/// Font program bytes backing a [`LoadedFont`].
#[derive(Debug, Clone)]
struct OutlineData {
    data: Arc<Vec<u8>>,
    index: u32,
    format: OutlineFormat,
    /// A system face standing in for a font that is not embedded
    substitute: bool,
}

impl OutlineData {
    fn embedded(data: Vec<u8>, format: OutlineFormat) -> Self {
        Self {
            data: Arc::new(data),
            index: 0,
            format,
            substitute: false,
        }
    }
}

/// Parsed view over a font program, borrowed for one text-showing operator.
pub(crate) enum Outlines<'a> {
    Face(Box<Face<'a>>),
    Cff(cff::Table<'a>),
}

impl<'a> Outlines<'a> {
    fn parse(data: &'a OutlineData) -> Option<Self> {
        match data.format {
            OutlineFormat::Sfnt => Face::parse(&data.data, data.index)
                .ok()
                .map(|face| Outlines::Face(Box::new(face))),
            OutlineFormat::Cff => cff::Table::parse(&data.data).map(Outlines::Cff),
        }
    }

    fn glyph_by_char(&self, ch: char) -> Option<GlyphId> {
        match self {
            Outlines::Face(face) => face.glyph_index(ch),
            Outlines::Cff(_) => None,
        }
    }

    fn glyph_by_name(&self, name: &str) -> Option<GlyphId> {
        match self {
            Outlines::Face(face) => face.glyph_index_by_name(name),
            Outlines::Cff(table) => table.glyph_index_by_name(name),
        }
    }

    /// Look a raw one-byte code up in symbol and Macintosh cmaps, or the CFF encoding.
    fn glyph_by_code(&self, code: u8) -> Option<GlyphId> {
        match self {
            Outlines::Face(face) => {
                let code = code as u32;
                if let Some(cmap) = face.tables().cmap {
                    for subtable in cmap.subtables {
                        let found = match (subtable.platform_id, subtable.encoding_id) {
                            (PlatformId::Windows, 0) => subtable
                                .glyph_index(0xF000 | code)
                                .or_else(|| subtable.glyph_index(code)),
                            (PlatformId::Macintosh, 0) => subtable.glyph_index(code),
                            _ => None,
                        };
                        if found.is_some() {
                            return found;
                        }
                    }
                }
                char::from_u32(code).and_then(|ch| face.glyph_index(ch))
            }
            Outlines::Cff(table) => table.glyph_index(code),
        }
    }

    /// Font units to glyph space of a 1-point font.
    pub fn units(&self) -> Transform {
        match self {
            Outlines::Face(face) => {
                let scale = 1.0 / face.units_per_em() as f32;
                Transform::from_scale(scale, scale)
            }
            Outlines::Cff(table) => {
                let m = table.matrix();
                Transform::from_row(m.sx, m.ky, m.kx, m.sy, m.tx, m.ty)
            }
        }
    }

    /// Advance width in thousandths of an em.
    fn advance(&self, glyph: GlyphId) -> Option<f32> {
        match self {
            Outlines::Face(face) => {
                let advance = face.glyph_hor_advance(glyph)? as f32;
                Some(advance * 1000.0 / face.units_per_em() as f32)
            }
            Outlines::Cff(table) => {
                let width = table.glyph_width(glyph)? as f32;
                Some(width * table.matrix().sx * 1000.0)
            }
        }
    }

    fn outline(&self, glyph: GlyphId) -> Option<Path> {
        let mut sink = PathSink(PathBuilder::new());
        match self {
            Outlines::Face(face) => {
                face.outline_glyph(glyph, &mut sink)?;
            }
            Outlines::Cff(table) => {
                table.outline(glyph, &mut sink).ok()?;
            }
        }
        sink.0.finish()
    }
}

struct PathSink(PathBuilder);

impl OutlineBuilder for PathSink {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

/// A font resource prepared for drawing.
#[derive(Debug)]
pub(crate) struct LoadedFont {
    resource: FontResource,
    outlines: Option<OutlineData>,
}

impl LoadedFont {
    pub fn new(mut resource: FontResource) -> Self {
        if let FontProgram::Type3 { .. } = resource.program {
            return Self {
                resource,
                outlines: None,
            };
        }

        let embedded = match &mut resource.program {
            FontProgram::Sfnt(data) => Some(OutlineData::embedded(
                std::mem::take(data),
                OutlineFormat::Sfnt,
            )),
            FontProgram::Cff(data) => Some(OutlineData::embedded(
                std::mem::take(data),
                OutlineFormat::Cff,
            )),
            _ => None,
        };

        let outlines = match embedded {
            Some(data) if Outlines::parse(&data).is_some() => Some(data),
            Some(_) => {
                log::debug!(
                    "Font {}: embedded program is unreadable, using a system face",
                    resource.base_font
                );
                system_face(&resource.base_font)
            }
            None => system_face(&resource.base_font),
        };

        Self { resource, outlines }
    }

    /// Parse the outline program for one text-showing operator.
    pub fn outlines(&self) -> Option<Outlines<'_>> {
        self.outlines.as_ref().and_then(Outlines::parse)
    }

    /// Split string bytes into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        match self.resource.encoding {
            FontEncoding::Identity { .. } => bytes
                .chunks(2)
                .map(|pair| match *pair {
                    [hi, lo] => u16::from_be_bytes([hi, lo]) as u32,
                    [b] => b as u32,
                    _ => 0,
                })
                .collect(),
            FontEncoding::Simple { .. } => bytes.iter().map(|b| *b as u32).collect(),
        }
    }

    /// Word spacing applies to the single-byte code 32 only.
    pub fn is_word_space(&self, code: u32) -> bool {
        code == 32 && matches!(self.resource.encoding, FontEncoding::Simple { .. })
    }

    /// Horizontal displacement of a code in text space, for a 1-point font.
    pub fn advance(&self, code: u32, outlines: Option<&Outlines<'_>>) -> f32 {
        let width = self.width(code, outlines);
        match self.resource.program {
            FontProgram::Type3 { matrix, .. } => width * matrix[0],
            _ => width / 1000.0,
        }
    }

    fn width(&self, code: u32, outlines: Option<&Outlines<'_>>) -> f32 {
        let r = &self.resource;
        if let FontEncoding::Identity { .. } = r.encoding {
            return r
                .cid_widths
                .iter()
                .find(|(first, last, _)| (*first..=*last).contains(&code))
                .map(|(_, _, w)| *w)
                .unwrap_or(r.default_width);
        }

        if !r.widths.is_empty() {
            return code
                .checked_sub(r.first_char)
                .and_then(|i| r.widths.get(i as usize))
                .copied()
                .unwrap_or(r.default_width);
        }

        outlines
            .and_then(|o| o.advance(self.glyph_id(o, code)?))
            .unwrap_or(if r.default_width > 0.0 {
                r.default_width
            } else {
                500.0
            })
    }

    /// Outline of a code in font units.
    pub fn glyph_outline(&self, outlines: &Outlines<'_>, code: u32) -> Option<Path> {
        outlines.outline(self.glyph_id(outlines, code)?)
    }

    fn glyph_id(&self, outlines: &Outlines<'_>, code: u32) -> Option<GlyphId> {
        let (base, differences) = match &self.resource.encoding {
            FontEncoding::Identity { cid_to_gid } => {
                let gid = match cid_to_gid {
                    Some(map) => *map.get(code as usize)?,
                    None => u16::try_from(code).ok()?,
                };
                return Some(GlyphId(gid));
            }
            FontEncoding::Simple { base, differences } => (*base, differences),
        };
        let code = u8::try_from(code).ok()?;

        if let Some((_, name)) = differences.iter().rev().find(|(c, _)| *c == code) {
            let by_name = outlines.glyph_by_name(name).or_else(|| {
                glyph_name_to_char(name).and_then(|ch| outlines.glyph_by_char(ch))
            });
            if by_name.is_some() {
                return by_name;
            }
        }

        let substitute = self.outlines.as_ref().is_some_and(|o| o.substitute);
        if substitute && is_dingbats(&self.resource.base_font) {
            if let Some(glyph) = dingbat_char(code).and_then(|ch| outlines.glyph_by_char(ch)) {
                return Some(glyph);
            }
        }

        if !self.resource.symbolic || substitute {
            if let Some(glyph) = decode_base(base, code).and_then(|ch| outlines.glyph_by_char(ch))
            {
                return Some(glyph);
            }
        }

        outlines.glyph_by_code(code)
    }

    /// Type3 glyph procedure for a code.
    pub fn type3_proc(&self, code: u32) -> Option<&[u8]> {
        let FontProgram::Type3 { ref procs, .. } = self.resource.program else {
            return None;
        };
        let FontEncoding::Simple {
            ref differences, ..
        } = self.resource.encoding
        else {
            return None;
        };
        let code = u8::try_from(code).ok()?;
        let (_, name) = differences.iter().rev().find(|(c, _)| *c == code)?;
        procs
            .iter()
            .find(|(n, _)| n.as_slice() == name.as_bytes())
            .map(|(_, data)| data.as_slice())
    }

    /// Type3 glyph space to text space, and the font's own resources.
    pub fn type3_space(&self) -> Option<(Transform, Option<&ResourceScope>)> {
        match &self.resource.program {
            FontProgram::Type3 {
                matrix: [a, b, c, d, e, f],
                resources,
                ..
            } => Some((Transform::from_row(*a, *b, *c, *d, *e, *f), resources.as_ref())),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// System face lookup
// ---------------------------------------------------------------------------

static SYSTEM_FONTS: OnceLock<fontdb::Database> = OnceLock::new();
static SUBSTITUTES: OnceLock<Mutex<HashMap<String, Option<OutlineData>>>> = OnceLock::new();

/// Find an installed face for a font that is not embedded.
fn system_face(base_font: &str) -> Option<OutlineData> {
    let cache = SUBSTITUTES.get_or_init(Default::default);
    if let Ok(map) = cache.lock() {
        if let Some(hit) = map.get(base_font) {
            return hit.clone();
        }
    }

    let db = SYSTEM_FONTS.get_or_init(|| {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        db
    });

    let own_family = base_font
        .split(|c| c == ',' || c == '-')
        .next()
        .unwrap_or(base_font)
        .to_string();
    let mut families = vec![fontdb::Family::Name(&own_family)];
    families.extend(substitute_families(base_font));

    let lower = base_font.to_ascii_lowercase();
    let query = fontdb::Query {
        families: &families,
        weight: if lower.contains("bold") || lower.contains("black") {
            fontdb::Weight::BOLD
        } else {
            fontdb::Weight::NORMAL
        },
        stretch: fontdb::Stretch::Normal,
        style: if lower.contains("italic") || lower.contains("oblique") {
            fontdb::Style::Italic
        } else {
            fontdb::Style::Normal
        },
    };

    let found = db.query(&query).and_then(|id| {
        db.with_face_data(id, |data, index| OutlineData {
            data: Arc::new(data.to_vec()),
            index,
            format: OutlineFormat::Sfnt,
            substitute: true,
        })
    });
    if found.is_none() {
        log::debug!("Font {}: no system face found, text is not drawn", base_font);
    }

    if let Ok(mut map) = cache.lock() {
        map.insert(base_font.to_string(), found.clone());
    }
    found
}

/// Metric-compatible or look-alike families for the standard PDF fonts.
fn substitute_families(base_font: &str) -> Vec<fontdb::Family<'static>> {
    use fontdb::Family::{Monospace, Name, SansSerif, Serif};

    let lower = base_font.to_ascii_lowercase();
    if lower.contains("dingbat") {
        vec![
            Name("ZapfDingbats"),
            Name("Zapf Dingbats"),
            Name("D050000L"),
            Name("DejaVu Sans"),
            Name("Segoe UI Symbol"),
        ]
    } else if lower.contains("symbol") {
        vec![Name("Symbol"), Name("Standard Symbols PS"), Name("DejaVu Sans")]
    } else if lower.contains("courier") || lower.contains("mono") {
        vec![
            Name("Courier New"),
            Name("Courier"),
            Name("Liberation Mono"),
            Name("Nimbus Mono PS"),
            Name("DejaVu Sans Mono"),
            Monospace,
        ]
    } else if lower.contains("times") || lower.contains("roman") || lower.contains("serif") {
        vec![
            Name("Times New Roman"),
            Name("Times"),
            Name("Liberation Serif"),
            Name("Nimbus Roman"),
            Name("DejaVu Serif"),
            Serif,
        ]
    } else {
        vec![
            Name("Helvetica"),
            Name("Arial"),
            Name("Liberation Sans"),
            Name("Nimbus Sans"),
            Name("DejaVu Sans"),
            SansSerif,
        ]
    }
}

fn is_dingbats(base_font: &str) -> bool {
    base_font.to_ascii_lowercase().contains("dingbat")
}

// ---------------------------------------------------------------------------
// Encodings
// ---------------------------------------------------------------------------

/// WinAnsi codes 0x80..=0x9F; zero marks an unused slot.
const WIN_ANSI_HIGH: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// Character for a code under a base encoding, as far as it is Latin.
fn decode_base(base: BaseEncoding, code: u8) -> Option<char> {
    match (base, code) {
        (_, 0..=0x1F) => None,
        (BaseEncoding::Standard, 0x27) => Some('\u{2019}'),
        (BaseEncoding::Standard, 0x60) => Some('\u{2018}'),
        (_, 0x20..=0x7E) => Some(code as char),
        (BaseEncoding::WinAnsi, 0x80..=0x9F) => match WIN_ANSI_HIGH[(code - 0x80) as usize] {
            0 => None,
            u => char::from_u32(u as u32),
        },
        (BaseEncoding::WinAnsi | BaseEncoding::Builtin, 0xA0..=0xFF) => Some(code as char),
        _ => None,
    }
}

/// ZapfDingbats codes for box, check and cross marks.
fn dingbat_char(code: u8) -> Option<char> {
    let u = match code {
        b'3' => 0x2713,
        b'4' => 0x2714,
        b'5' => 0x2715,
        b'6' => 0x2716,
        b'7' => 0x2717,
        b'8' => 0x2718,
        b'l' => 0x25CF,
        b'm' => 0x274D,
        b'n' => 0x25A0,
        b'o' => 0x274F,
        b'p' => 0x2750,
        b'q' => 0x2751,
        b'r' => 0x2752,
        b'u' => 0x25C6,
        _ => return None,
    };
    char::from_u32(u)
}

/// Character named by a glyph name: `uniXXXX`, `uXXXX`, single letters
/// and digits, and common punctuation names.
fn glyph_name_to_char(name: &str) -> Option<char> {
    let hex = |s: &str| u32::from_str_radix(s, 16).ok().and_then(char::from_u32);
    if let Some(rest) = name.strip_prefix("uni") {
        if rest.len() == 4 {
            return hex(rest);
        }
    }
    if let Some(rest) = name.strip_prefix('u') {
        if (4..=6).contains(&rest.len()) && rest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return hex(rest);
        }
    }

    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_alphabetic() {
            return Some(ch);
        }
    }

    let ch = match name {
        "space" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" => '\'',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "underscore" => '_',
        "braceleft" => '{',
        "bar" => '|',
        "braceright" => '}',
        "bullet" => '\u{2022}',
        "endash" => '\u{2013}',
        "emdash" => '\u{2014}',
        "quoteleft" => '\u{2018}',
        "quoteright" => '\u{2019}',
        "quotedblleft" => '\u{201C}',
        "quotedblright" => '\u{201D}',
        _ => return None,
    };
    Some(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base() {
        assert_eq!(decode_base(BaseEncoding::WinAnsi, b'A'), Some('A'));
        assert_eq!(decode_base(BaseEncoding::WinAnsi, 0x93), Some('\u{201C}'));
        assert_eq!(decode_base(BaseEncoding::WinAnsi, 0x81), None);
        assert_eq!(decode_base(BaseEncoding::WinAnsi, 0xE9), Some('é'));
        assert_eq!(decode_base(BaseEncoding::Standard, 0x27), Some('\u{2019}'));
        assert_eq!(decode_base(BaseEncoding::MacRoman, 0xE9), None);
        assert_eq!(decode_base(BaseEncoding::Builtin, 0x05), None);
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_char("uni274F"), Some('\u{274F}'));
        assert_eq!(glyph_name_to_char("u1F600"), Some('\u{1F600}'));
        assert_eq!(glyph_name_to_char("O"), Some('O'));
        assert_eq!(glyph_name_to_char("period"), Some('.'));
        assert_eq!(glyph_name_to_char("box"), None);
    }

    #[test]
    fn test_dingbat_boxes() {
        assert_eq!(dingbat_char(b'o'), Some('\u{274F}'));
        assert_eq!(dingbat_char(b'n'), Some('\u{25A0}'));
        assert_eq!(dingbat_char(b'a'), None);
        assert!(is_dingbats("ZapfDingbats"));
    }

    #[test]
    fn test_widths_and_codes() {
        let font = LoadedFont {
            resource: FontResource {
                base_font: "Test".into(),
                encoding: FontEncoding::Simple {
                    base: BaseEncoding::WinAnsi,
                    differences: Vec::new(),
                },
                first_char: 65,
                widths: vec![600.0, 700.0],
                cid_widths: Vec::new(),
                default_width: 250.0,
                symbolic: false,
                program: FontProgram::None,
            },
            outlines: None,
        };
        assert_eq!(font.codes(b"AB"), vec![65, 66]);
        assert_eq!(font.advance(66, None), 0.7);
        assert_eq!(font.advance(90, None), 0.25);
        assert!(font.is_word_space(32));

        let cid = LoadedFont {
            resource: FontResource {
                encoding: FontEncoding::Identity { cid_to_gid: None },
                cid_widths: vec![(3, 3, 500.0), (10, 20, 800.0)],
                default_width: 1000.0,
                ..font.resource.clone()
            },
            outlines: None,
        };
        assert_eq!(cid.codes(&[0, 3, 0, 15]), vec![3, 15]);
        assert_eq!(cid.advance(15, None), 0.8);
        assert_eq!(cid.advance(40, None), 1.0);
        assert!(!cid.is_word_space(32));
    }

    #[test]
    fn test_type3_procs_by_encoding() {
        let font = LoadedFont {
            resource: FontResource {
                base_font: String::new(),
                encoding: FontEncoding::Simple {
                    base: BaseEncoding::Builtin,
                    differences: vec![(97, "box".into())],
                },
                first_char: 97,
                widths: vec![1000.0],
                cid_widths: Vec::new(),
                default_width: 0.0,
                symbolic: true,
                program: FontProgram::Type3 {
                    procs: vec![(b"box".to_vec(), b"0 0 1 1 re f".to_vec())],
                    matrix: [0.001, 0.0, 0.0, 0.001, 0.0, 0.0],
                    resources: None,
                },
            },
            outlines: None,
        };
        assert!(font.type3_space().is_some());
        assert_eq!(font.type3_proc(97), Some(&b"0 0 1 1 re f"[..]));
        assert_eq!(font.type3_proc(98), None);
        assert_eq!(font.advance(97, None), 1.0);
    }
}
