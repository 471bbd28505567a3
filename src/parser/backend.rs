//! PDF backend abstraction layer.
//!
//! Provides a trait-based interface for the document operations the
//! extraction pipeline needs, isolating the concrete PDF library (lopdf)
//! from rasterization and orchestration. Pages are addressed by their
//! 1-indexed page number so every failure can name the page it concerns.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use crate::detect::detect_header;
use crate::error::{Error, Result};
use crate::model::Metadata;

/// Indirect object identifier: (object number, generation number).
pub type ObjectRef = (u32, u16);

/// Form XObjects nested deeper than this are ignored.
pub(crate) const MAX_FORM_DEPTH: usize = 12;

/// A value from a PDF content stream operand.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Other,
}

/// A single operation from a PDF content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

/// Visible page area in PDF user space, plus the page's display rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Lower-left x of the crop (or media) box
    pub x: f32,
    /// Lower-left y of the crop (or media) box
    pub y: f32,
    /// Box width in points
    pub width: f32,
    /// Box height in points
    pub height: f32,
    /// Clockwise display rotation: 0, 90, 180 or 270
    pub rotation: u16,
}

impl PageGeometry {
    /// US Letter, unrotated.
    pub fn letter() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 612.0,
            height: 792.0,
            rotation: 0,
        }
    }

    /// Displayed (width, height) in points after rotation.
    pub fn display_size(&self) -> (f32, f32) {
        if self.rotation % 180 == 90 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// Named resources visible from a content stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceScope {
    xobjects: Vec<(Vec<u8>, ObjectRef)>,
    fonts: Vec<(Vec<u8>, ObjectRef)>,
    line_widths: Vec<(Vec<u8>, f32)>,
}

impl ResourceScope {
    /// Create a scope from (name, object) pairs in dictionary order.
    pub fn new(xobjects: Vec<(Vec<u8>, ObjectRef)>) -> Self {
        Self {
            xobjects,
            fonts: Vec::new(),
            line_widths: Vec::new(),
        }
    }

    /// Attach the `/Font` entries.
    pub fn with_fonts(mut self, fonts: Vec<(Vec<u8>, ObjectRef)>) -> Self {
        self.fonts = fonts;
        self
    }

    /// Resolve a font resource name.
    pub fn font(&self, name: &[u8]) -> Option<ObjectRef> {
        self.fonts
            .iter()
            .find(|(n, _)| n.as_slice() == name)
            .map(|(_, id)| *id)
    }

    /// Attach the `/LW` entries of named graphics state dictionaries.
    pub fn with_line_widths(mut self, line_widths: Vec<(Vec<u8>, f32)>) -> Self {
        self.line_widths = line_widths;
        self
    }

    /// Line width set by the named ExtGState, if it sets one.
    pub fn ext_gstate_line_width(&self, name: &[u8]) -> Option<f32> {
        self.line_widths
            .iter()
            .find(|(n, _)| n.as_slice() == name)
            .map(|(_, w)| *w)
    }

    /// Resolve an XObject name.
    pub fn xobject(&self, name: &[u8]) -> Option<ObjectRef> {
        self.xobjects
            .iter()
            .find(|(n, _)| n.as_slice() == name)
            .map(|(_, id)| *id)
    }

    /// XObjects in dictionary order.
    pub fn xobjects(&self) -> impl Iterator<Item = &(Vec<u8>, ObjectRef)> {
        self.xobjects.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.xobjects.is_empty()
    }
}

/// Color space of an image XObject.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette lookup into a base space
    Indexed {
        base: Box<ColorSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
    /// Anything else (Lab, DeviceN, Separation, ...)
    Other(String),
}

impl ColorSpace {
    /// Samples per pixel in the image data.
    pub fn components(&self) -> Option<usize> {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => Some(1),
            ColorSpace::Rgb => Some(3),
            ColorSpace::Cmyk => Some(4),
            ColorSpace::Other(_) => None,
        }
    }
}

/// How the bytes of an [`EmbeddedImage`] are encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageFilter {
    /// Raw samples (generic filters already removed)
    Raw,
    /// Baseline JPEG
    Dct,
    /// JPEG 2000
    Jpx,
    /// CCITT fax
    Ccitt,
    Jbig2,
    /// The stream could not be decompressed
    Corrupt(String),
}

/// An image XObject referenced from a page.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    /// Cross-reference id of the image stream
    pub object_id: ObjectRef,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color_space: ColorSpace,
    pub filter: ImageFilter,
    /// Stencil mask (1-bit, no color space)
    pub image_mask: bool,
    pub data: Vec<u8>,
}

/// A form XObject: a reusable content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct FormXObject {
    pub content: Vec<u8>,
    /// Form space to user space matrix `[a b c d e f]`
    pub matrix: [f32; 6],
    /// Clipping box in form space `[x0 y0 x1 y1]`
    pub bbox: Option<[f32; 4]>,
    /// Own resources, if the form declares them
    pub resources: Option<ResourceScope>,
}

/// A page annotation with its normal appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// `/Subtype`, e.g. `Widget` or `Square`
    pub subtype: String,
    /// Placement on the page `[x0 y0 x1 y1]`
    pub rect: [f32; 4],
    /// `/F` flag bits
    pub flags: u32,
    /// The `/AP /N` stream, in the `/AS` state when there are several
    pub appearance: Option<FormXObject>,
}

impl Annotation {
    pub const HIDDEN: u32 = 1 << 1;
    pub const NO_VIEW: u32 = 1 << 5;

    /// Whether a viewer draws this annotation on screen.
    pub fn is_visible(&self) -> bool {
        self.flags & (Self::HIDDEN | Self::NO_VIEW) == 0 && self.subtype != "Popup"
    }
}

/// Standard single-byte encodings a simple font can start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
    /// The font program's own encoding
    Builtin,
}

impl BaseEncoding {
    fn from_name(name: &[u8]) -> Self {
        match name {
            b"WinAnsiEncoding" => BaseEncoding::WinAnsi,
            b"MacRomanEncoding" | b"MacExpertEncoding" => BaseEncoding::MacRoman,
            b"StandardEncoding" => BaseEncoding::Standard,
            _ => BaseEncoding::Builtin,
        }
    }
}

/// How string bytes map to glyphs.
#[derive(Debug, Clone, PartialEq)]
pub enum FontEncoding {
    /// One byte per code, with `/Differences` glyph names
    Simple {
        base: BaseEncoding,
        differences: Vec<(u8, String)>,
    },
    /// Two bytes per code, code = CID (`Identity-H`/`Identity-V`)
    Identity {
        /// `/CIDToGIDMap` stream, `None` for the identity map
        cid_to_gid: Option<Vec<u16>>,
    },
}

/// Glyph outlines of a font.
#[derive(Debug, Clone, PartialEq)]
pub enum FontProgram {
    /// Embedded TrueType or OpenType data
    Sfnt(Vec<u8>),
    /// Embedded bare CFF data (`Type1C`, `CIDFontType0C`)
    Cff(Vec<u8>),
    /// Type3 glyph procedures by glyph name
    Type3 {
        procs: Vec<(Vec<u8>, Vec<u8>)>,
        /// Glyph space to text space
        matrix: [f32; 6],
        resources: Option<ResourceScope>,
    },
    /// Not embedded, or in a format without outline support
    None,
}

/// A font resource resolved from the document.
#[derive(Debug, Clone, PartialEq)]
pub struct FontResource {
    /// `/BaseFont` without a subset prefix
    pub base_font: String,
    pub encoding: FontEncoding,
    /// First code covered by `widths`
    pub first_char: u32,
    /// `/Widths` in glyph space units (thousandths of text space, except Type3)
    pub widths: Vec<f32>,
    /// CID width ranges `(first, last, width)` from `/W`
    pub cid_widths: Vec<(u32, u32, f32)>,
    /// Width of codes outside `widths`/`cid_widths`
    pub default_width: f32,
    /// Descriptor flag: glyphs outside the standard Latin set
    pub symbolic: bool,
    pub program: FontProgram,
}

/// A resolved XObject.
#[derive(Debug, Clone, PartialEq)]
pub enum XObject {
    Image(EmbeddedImage),
    Form(FormXObject),
    /// PostScript XObjects and unknown subtypes
    Other,
}

/// Abstract interface for PDF document access.
///
/// Implementations provide page enumeration, text, content streams and
/// XObject resolution without exposing any concrete PDF library types.
pub trait PdfBackend: Send + Sync {
    /// Number of pages.
    fn page_count(&self) -> u32;

    /// Document metadata.
    fn metadata(&self) -> Metadata;

    /// Plain text of a page's text layer.
    fn page_text(&self, page: u32) -> Result<String>;

    /// Visible area and rotation of a page.
    fn page_geometry(&self, page: u32) -> Result<PageGeometry>;

    /// Decompressed, concatenated content stream bytes of a page.
    fn page_content(&self, page: u32) -> Result<Vec<u8>>;

    /// XObjects visible from the page's content stream.
    fn page_resources(&self, page: u32) -> Result<ResourceScope>;

    /// Parse content stream bytes into operations.
    fn decode_content(&self, page: u32, data: &[u8]) -> Result<Vec<ContentOp>>;

    /// Resolve an XObject referenced from a page.
    fn xobject(&self, page: u32, id: ObjectRef) -> Result<XObject>;

    /// Resolve a font referenced from a page.
    fn font(&self, page: u32, id: ObjectRef) -> Result<FontResource>;

    /// Annotations of a page, in `/Annots` order.
    fn page_annotations(&self, page: u32) -> Result<Vec<Annotation>>;

    /// Image XObjects on a page, in resource order, nested forms included.
    ///
    /// Each image appears once even if several names or forms refer to it.
    /// An XObject that cannot be resolved fails the page, since every later
    /// image index would otherwise shift.
    fn page_images(&self, page: u32) -> Result<Vec<EmbeddedImage>> {
        let scope = self.page_resources(page)?;
        let mut seen = HashSet::new();
        let mut images = Vec::new();
        collect_images(self, page, &scope, 0, &mut seen, &mut images)?;
        Ok(images)
    }
}

fn collect_images<B: PdfBackend + ?Sized>(
    backend: &B,
    page: u32,
    scope: &ResourceScope,
    depth: usize,
    seen: &mut HashSet<ObjectRef>,
    images: &mut Vec<EmbeddedImage>,
) -> Result<()> {
    if depth > MAX_FORM_DEPTH {
        return Ok(());
    }
    for (_, id) in scope.xobjects() {
        if !seen.insert(*id) {
            continue;
        }
        match backend.xobject(page, *id)? {
            XObject::Image(image) => images.push(image),
            XObject::Form(form) => {
                if let Some(ref inner) = form.resources {
                    collect_images(backend, page, inner, depth + 1, seen, images)?;
                }
            }
            XObject::Other => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// LopdfBackend — concrete implementation backed by lopdf
// ---------------------------------------------------------------------------

use lopdf::{Dictionary, Document as LopdfDocument, Object, Stream};

/// Concrete [`PdfBackend`] backed by `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
    pages: BTreeMap<u32, lopdf::ObjectId>,
}

impl LopdfBackend {
    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        detect_header(data)?;
        let doc = LopdfDocument::load_mem(data)?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            log::warn!("Document is encrypted; text and images may be unreadable");
        }
        let pages = doc.get_pages();
        Ok(Self { doc, pages })
    }

    /// Load from a file path.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::load_bytes(&data)
    }

    /// Load from a reader.
    pub fn load_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::load_bytes(&data)
    }

    /// Get PDF version string.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }

    fn page_id(&self, page: u32) -> Result<lopdf::ObjectId> {
        self.pages.get(&page).copied().ok_or_else(|| {
            Error::page_render(
                page,
                format!("page out of range (document has {} pages)", self.pages.len()),
            )
        })
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(r) => self.doc.get_object(*r).ok(),
            other => Some(other),
        }
    }

    fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(obj)? {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Look up a page attribute, following the /Parent chain for
    /// inheritable keys.
    fn inherited<'a>(&'a self, page_id: lopdf::ObjectId, key: &[u8]) -> Option<&'a Object> {
        let mut current = self.doc.get_dictionary(page_id).ok();
        let mut hops = 0;
        while let Some(dict) = current {
            if let Ok(value) = dict.get(key) {
                return self.resolve(value);
            }
            hops += 1;
            if hops > 64 {
                break;
            }
            current = dict.get(b"Parent").ok().and_then(|p| self.resolve_dict(p));
        }
        None
    }

    fn scope_from_dict(&self, resources: &Dictionary) -> ResourceScope {
        let mut xobjects = Vec::new();
        if let Some(xobj_dict) = resources
            .get(b"XObject")
            .ok()
            .and_then(|x| self.resolve_dict(x))
        {
            for (name, obj) in xobj_dict.iter() {
                if let Ok(id) = obj.as_reference() {
                    xobjects.push((name.clone(), id));
                }
            }
        }

        let mut line_widths = Vec::new();
        if let Some(gs_dict) = resources
            .get(b"ExtGState")
            .ok()
            .and_then(|g| self.resolve_dict(g))
        {
            for (name, obj) in gs_dict.iter() {
                let width = self
                    .resolve_dict(obj)
                    .and_then(|d| d.get(b"LW").ok())
                    .and_then(|lw| self.resolve(lw))
                    .and_then(get_number);
                if let Some(width) = width {
                    line_widths.push((name.clone(), width));
                }
            }
        }

        let mut fonts = Vec::new();
        if let Some(font_dict) = resources
            .get(b"Font")
            .ok()
            .and_then(|f| self.resolve_dict(f))
        {
            for (name, obj) in font_dict.iter() {
                if let Ok(id) = obj.as_reference() {
                    fonts.push((name.clone(), id));
                }
            }
        }

        ResourceScope::new(xobjects)
            .with_fonts(fonts)
            .with_line_widths(line_widths)
    }

    /// Resolved value of a dictionary entry.
    fn entry<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        dict.get(key).ok().and_then(|o| self.resolve(o))
    }

    fn numbers(&self, obj: &Object) -> Vec<f32> {
        match self.resolve(obj) {
            Some(Object::Array(arr)) => arr
                .iter()
                .filter_map(|o| self.resolve(o).and_then(get_number))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn rect(&self, dict: &Dictionary, key: &[u8]) -> Option<[f32; 4]> {
        match self.entry(dict, key).map(|r| self.numbers(r))?[..] {
            [x0, y0, x1, y1] => Some([x0, y0, x1, y1]),
            _ => None,
        }
    }

    fn read_form(&self, stream: &Stream) -> std::result::Result<FormXObject, String> {
        let content = Self::stream_bytes(stream)?;
        let mut matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        if let Some(m) = self.entry(&stream.dict, b"Matrix") {
            let nums = self.numbers(m);
            if nums.len() == 6 {
                matrix.copy_from_slice(&nums);
            }
        }
        let resources = self
            .entry(&stream.dict, b"Resources")
            .and_then(|r| self.resolve_dict(r))
            .map(|d| self.scope_from_dict(d));
        Ok(FormXObject {
            content,
            matrix,
            bbox: self.rect(&stream.dict, b"BBox"),
            resources,
        })
    }

    /// The normal appearance stream, picking the `/AS` state if `/N` has several.
    fn normal_appearance<'a>(&'a self, annot: &'a Dictionary) -> Option<&'a Stream> {
        let normal = self
            .entry(annot, b"AP")
            .and_then(|ap| self.resolve_dict(ap))
            .and_then(|ap| self.entry(ap, b"N"))?;
        match normal {
            Object::Stream(s) => Some(s),
            Object::Dictionary(states) => {
                let state = self.entry(annot, b"AS")?.as_name().ok()?;
                match self.entry(states, state)? {
                    Object::Stream(s) => Some(s),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn read_font(&self, dict: &Dictionary) -> FontResource {
        let base_font = self
            .entry(dict, b"BaseFont")
            .and_then(|n| n.as_name().ok())
            .map(|n| strip_subset_prefix(&String::from_utf8_lossy(n)))
            .unwrap_or_default();

        match self.entry(dict, b"Subtype").and_then(|s| s.as_name().ok()) {
            Some(b"Type0") => self.read_composite_font(dict, base_font),
            Some(b"Type3") => self.read_type3_font(dict, base_font),
            _ => self.read_simple_font(dict, base_font),
        }
    }

    fn read_simple_font(&self, dict: &Dictionary, base_font: String) -> FontResource {
        let descriptor = self
            .entry(dict, b"FontDescriptor")
            .and_then(|d| self.resolve_dict(d));
        let flags = descriptor
            .and_then(|d| self.entry(d, b"Flags"))
            .and_then(|f| f.as_i64().ok())
            .unwrap_or(0);
        let missing_width = descriptor
            .and_then(|d| self.entry(d, b"MissingWidth"))
            .and_then(get_number)
            .unwrap_or(0.0);

        FontResource {
            base_font,
            encoding: self.simple_encoding(dict),
            first_char: self.first_char(dict),
            widths: self.entry(dict, b"Widths").map(|w| self.numbers(w)).unwrap_or_default(),
            cid_widths: Vec::new(),
            default_width: missing_width,
            symbolic: flags & 4 != 0,
            program: descriptor
                .map(|d| self.font_program(d))
                .unwrap_or(FontProgram::None),
        }
    }

    fn read_type3_font(&self, dict: &Dictionary, base_font: String) -> FontResource {
        let mut matrix = [0.001, 0.0, 0.0, 0.001, 0.0, 0.0];
        if let Some(m) = self.entry(dict, b"FontMatrix") {
            let nums = self.numbers(m);
            if nums.len() == 6 {
                matrix.copy_from_slice(&nums);
            }
        }

        let mut procs = Vec::new();
        if let Some(char_procs) = self
            .entry(dict, b"CharProcs")
            .and_then(|c| self.resolve_dict(c))
        {
            for (name, obj) in char_procs.iter() {
                if let Some(Object::Stream(s)) = self.resolve(obj) {
                    match Self::stream_bytes(s) {
                        Ok(data) => procs.push((name.clone(), data)),
                        Err(e) => log::debug!("Type3 glyph /{}: {}", String::from_utf8_lossy(name), e),
                    }
                }
            }
        }

        let resources = self
            .entry(dict, b"Resources")
            .and_then(|r| self.resolve_dict(r))
            .map(|d| self.scope_from_dict(d));

        FontResource {
            base_font,
            encoding: self.simple_encoding(dict),
            first_char: self.first_char(dict),
            widths: self.entry(dict, b"Widths").map(|w| self.numbers(w)).unwrap_or_default(),
            cid_widths: Vec::new(),
            default_width: 0.0,
            symbolic: true,
            program: FontProgram::Type3 {
                procs,
                matrix,
                resources,
            },
        }
    }

    fn read_composite_font(&self, dict: &Dictionary, base_font: String) -> FontResource {
        match self.entry(dict, b"Encoding").and_then(|e| e.as_name().ok()) {
            Some(b"Identity-H") | Some(b"Identity-V") => {}
            other => log::debug!(
                "Font {}: CMap {:?} read as Identity-H",
                base_font,
                other.map(String::from_utf8_lossy)
            ),
        }

        let descendant = match self.entry(dict, b"DescendantFonts") {
            Some(Object::Array(arr)) => arr.first().and_then(|d| self.resolve_dict(d)),
            _ => None,
        };

        let mut resource = FontResource {
            base_font,
            encoding: FontEncoding::Identity { cid_to_gid: None },
            first_char: 0,
            widths: Vec::new(),
            cid_widths: Vec::new(),
            default_width: 1000.0,
            symbolic: true,
            program: FontProgram::None,
        };
        let Some(cid_font) = descendant else {
            return resource;
        };

        if let Some(dw) = self.entry(cid_font, b"DW").and_then(get_number) {
            resource.default_width = dw;
        }
        if let Some(Object::Array(w)) = self.entry(cid_font, b"W") {
            resource.cid_widths = self.cid_widths(w);
        }
        if let Some(Object::Stream(map)) = self.entry(cid_font, b"CIDToGIDMap") {
            if let Ok(data) = Self::stream_bytes(map) {
                let gids = data
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                resource.encoding = FontEncoding::Identity {
                    cid_to_gid: Some(gids),
                };
            }
        }
        resource.program = self
            .entry(cid_font, b"FontDescriptor")
            .and_then(|d| self.resolve_dict(d))
            .map(|d| self.font_program(d))
            .unwrap_or(FontProgram::None);
        resource
    }

    /// Parse a `/W` array: `c [w1 w2 ...]` and `c_first c_last w` entries.
    fn cid_widths(&self, array: &[Object]) -> Vec<(u32, u32, f32)> {
        let mut ranges = Vec::new();
        let mut i = 0;
        while i < array.len() {
            let Some(first) = self.resolve(&array[i]).and_then(get_number) else {
                break;
            };
            let first = first.max(0.0) as u32;
            match array.get(i + 1).and_then(|o| self.resolve(o)) {
                Some(Object::Array(ws)) => {
                    for (offset, w) in ws.iter().filter_map(|o| self.resolve(o).and_then(get_number)).enumerate() {
                        let cid = first + offset as u32;
                        ranges.push((cid, cid, w));
                    }
                    i += 2;
                }
                Some(last) => {
                    let last = get_number(last).unwrap_or(0.0).max(0.0) as u32;
                    let width = array
                        .get(i + 2)
                        .and_then(|o| self.resolve(o))
                        .and_then(get_number)
                        .unwrap_or(0.0);
                    ranges.push((first, last, width));
                    i += 3;
                }
                None => break,
            }
        }
        ranges
    }

    fn first_char(&self, dict: &Dictionary) -> u32 {
        self.entry(dict, b"FirstChar")
            .and_then(|f| f.as_i64().ok())
            .unwrap_or(0)
            .clamp(0, 255) as u32
    }

    fn simple_encoding(&self, dict: &Dictionary) -> FontEncoding {
        match self.entry(dict, b"Encoding") {
            Some(Object::Name(name)) => FontEncoding::Simple {
                base: BaseEncoding::from_name(name),
                differences: Vec::new(),
            },
            Some(Object::Dictionary(enc)) => {
                let base = self
                    .entry(enc, b"BaseEncoding")
                    .and_then(|b| b.as_name().ok())
                    .map(BaseEncoding::from_name)
                    .unwrap_or(BaseEncoding::Builtin);
                let mut differences = Vec::new();
                if let Some(Object::Array(diffs)) = self.entry(enc, b"Differences") {
                    let mut code: i64 = 0;
                    for item in diffs {
                        match self.resolve(item) {
                            Some(Object::Integer(c)) => code = *c,
                            Some(Object::Name(name)) => {
                                if (0..=255).contains(&code) {
                                    differences
                                        .push((code as u8, String::from_utf8_lossy(name).into_owned()));
                                }
                                code += 1;
                            }
                            _ => {}
                        }
                    }
                }
                FontEncoding::Simple { base, differences }
            }
            _ => FontEncoding::Simple {
                base: BaseEncoding::Builtin,
                differences: Vec::new(),
            },
        }
    }

    fn font_program(&self, descriptor: &Dictionary) -> FontProgram {
        let stream = |key: &[u8]| match self.entry(descriptor, key) {
            Some(Object::Stream(s)) => Some(s),
            _ => None,
        };

        if let Some(s) = stream(b"FontFile2") {
            return match Self::stream_bytes(s) {
                Ok(data) => FontProgram::Sfnt(data),
                Err(e) => {
                    log::debug!("FontFile2: {}", e);
                    FontProgram::None
                }
            };
        }
        if let Some(s) = stream(b"FontFile3") {
            let opentype = matches!(
                s.dict.get(b"Subtype").and_then(|t| t.as_name()),
                Ok(b"OpenType")
            );
            return match Self::stream_bytes(s) {
                Ok(data) if opentype => FontProgram::Sfnt(data),
                Ok(data) => FontProgram::Cff(data),
                Err(e) => {
                    log::debug!("FontFile3: {}", e);
                    FontProgram::None
                }
            };
        }
        // Type1 (FontFile) programs have no outline reader; a system face stands in.
        FontProgram::None
    }

    fn stream_bytes(stream: &Stream) -> std::result::Result<Vec<u8>, String> {
        if stream.dict.get(b"Filter").is_err() {
            return Ok(stream.content.clone());
        }
        stream.decompressed_content().map_err(|e| e.to_string())
    }

    fn read_image(&self, id: ObjectRef, stream: &Stream) -> EmbeddedImage {
        let dict = &stream.dict;
        let int = |key: &[u8]| {
            dict.get(key)
                .ok()
                .and_then(|o| self.resolve(o))
                .and_then(|o| o.as_i64().ok())
        };

        let image_mask = matches!(
            dict.get(b"ImageMask").ok().and_then(|o| self.resolve(o)),
            Some(Object::Boolean(true))
        );
        let bits_per_component = if image_mask {
            1
        } else {
            int(b"BitsPerComponent").unwrap_or(8).clamp(0, 16) as u8
        };
        let color_space = if image_mask {
            ColorSpace::Gray
        } else {
            dict.get(b"ColorSpace")
                .ok()
                .map(|cs| self.parse_color_space(cs, 0))
                .unwrap_or(ColorSpace::Gray)
        };

        let filters: Vec<String> = match dict.get(b"Filter").ok().and_then(|f| self.resolve(f)) {
            Some(Object::Name(n)) => vec![String::from_utf8_lossy(n).to_string()],
            Some(Object::Array(arr)) => arr
                .iter()
                .filter_map(|o| o.as_name_str().ok())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };

        let special = filters.iter().rev().find_map(|f| match f.as_str() {
            "DCTDecode" | "DCT" => Some(ImageFilter::Dct),
            "JPXDecode" => Some(ImageFilter::Jpx),
            "CCITTFaxDecode" | "CCF" => Some(ImageFilter::Ccitt),
            "JBIG2Decode" => Some(ImageFilter::Jbig2),
            _ => None,
        });

        let (filter, data) = match special {
            Some(filter) => (filter, stream.content.clone()),
            None => match Self::stream_bytes(stream) {
                Ok(data) => (ImageFilter::Raw, data),
                Err(reason) => (ImageFilter::Corrupt(reason), stream.content.clone()),
            },
        };

        EmbeddedImage {
            object_id: id,
            width: int(b"Width").unwrap_or(0).max(0) as u32,
            height: int(b"Height").unwrap_or(0).max(0) as u32,
            bits_per_component,
            color_space,
            filter,
            image_mask,
            data,
        }
    }

    fn parse_color_space(&self, obj: &Object, depth: usize) -> ColorSpace {
        let Some(obj) = self.resolve(obj) else {
            return ColorSpace::Other("unresolved".to_string());
        };
        match obj {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"G" | b"CalGray" => ColorSpace::Gray,
                b"DeviceRGB" | b"RGB" | b"CalRGB" => ColorSpace::Rgb,
                b"DeviceCMYK" | b"CMYK" => ColorSpace::Cmyk,
                other => ColorSpace::Other(String::from_utf8_lossy(other).to_string()),
            },
            Object::Array(arr) if depth < 4 => {
                let family = arr.first().and_then(|o| o.as_name_str().ok()).unwrap_or("");
                match family {
                    "CalGray" => ColorSpace::Gray,
                    "CalRGB" => ColorSpace::Rgb,
                    "ICCBased" => {
                        let n = arr
                            .get(1)
                            .and_then(|o| self.resolve_dict(o))
                            .and_then(|d| d.get(b"N").ok())
                            .and_then(|n| n.as_i64().ok());
                        match n {
                            Some(1) => ColorSpace::Gray,
                            Some(3) => ColorSpace::Rgb,
                            Some(4) => ColorSpace::Cmyk,
                            _ => ColorSpace::Other("ICCBased".to_string()),
                        }
                    }
                    "Indexed" | "I" => {
                        let base = arr
                            .get(1)
                            .map(|b| self.parse_color_space(b, depth + 1))
                            .unwrap_or(ColorSpace::Rgb);
                        let hival = arr
                            .get(2)
                            .and_then(|h| self.resolve(h))
                            .and_then(|h| h.as_i64().ok())
                            .unwrap_or(255)
                            .clamp(0, 255) as u8;
                        let lookup = match arr.get(3).and_then(|l| self.resolve(l)) {
                            Some(Object::String(bytes, _)) => bytes.clone(),
                            Some(Object::Stream(s)) => Self::stream_bytes(s).unwrap_or_default(),
                            _ => Vec::new(),
                        };
                        ColorSpace::Indexed {
                            base: Box::new(base),
                            hival,
                            lookup,
                        }
                    }
                    other => ColorSpace::Other(other.to_string()),
                }
            }
            _ => ColorSpace::Other("invalid".to_string()),
        }
    }
}

impl PdfBackend for LopdfBackend {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::with_version(self.version());
        metadata.page_count = self.page_count();

        if let Some(info) = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|i| self.resolve_dict(i))
        {
            metadata.title = get_string_from_dict(info, b"Title");
            metadata.author = get_string_from_dict(info, b"Author");
            metadata.creator = get_string_from_dict(info, b"Creator");
            metadata.producer = get_string_from_dict(info, b"Producer");
            metadata.created =
                get_string_from_dict(info, b"CreationDate").and_then(|d| parse_pdf_date(&d));
            metadata.modified =
                get_string_from_dict(info, b"ModDate").and_then(|d| parse_pdf_date(&d));
        }

        metadata
    }

    fn page_text(&self, page: u32) -> Result<String> {
        self.page_id(page)?;
        self.doc
            .extract_text(&[page])
            .map_err(|e| Error::page_render(page, format!("text extraction failed: {}", e)))
    }

    fn page_geometry(&self, page: u32) -> Result<PageGeometry> {
        let page_id = self.page_id(page)?;

        let rect = ["CropBox", "MediaBox"].iter().find_map(|key| {
            let arr = self.inherited(page_id, key.as_bytes())?.as_array().ok()?;
            let nums: Vec<f32> = arr
                .iter()
                .filter_map(|o| self.resolve(o).and_then(get_number))
                .collect();
            (nums.len() == 4).then(|| [nums[0], nums[1], nums[2], nums[3]])
        });

        let mut geometry = PageGeometry::letter();
        if let Some([x0, y0, x1, y1]) = rect {
            geometry.x = x0.min(x1);
            geometry.y = y0.min(y1);
            geometry.width = (x1 - x0).abs();
            geometry.height = (y1 - y0).abs();
        }

        let rotate = self
            .inherited(page_id, b"Rotate")
            .and_then(|r| r.as_i64().ok())
            .unwrap_or(0);
        geometry.rotation = rotate.rem_euclid(360) as u16 / 90 * 90;

        Ok(geometry)
    }

    fn page_content(&self, page: u32) -> Result<Vec<u8>> {
        let page_id = self.page_id(page)?;
        let page_dict = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| Error::page_render(page, e))?;

        let contents = match page_dict.get(b"Contents") {
            Ok(c) => c,
            // A page without content is blank, not broken.
            Err(_) => return Ok(Vec::new()),
        };

        let streams: Vec<&Object> = match self.resolve(contents) {
            Some(Object::Array(arr)) => arr.iter().collect(),
            Some(other) => vec![other],
            None => return Err(Error::page_render(page, "unresolved content stream")),
        };

        let mut content = Vec::new();
        for obj in streams {
            match self.resolve(obj) {
                Some(Object::Stream(s)) => {
                    let data = Self::stream_bytes(s).map_err(|e| Error::page_render(page, e))?;
                    content.extend_from_slice(&data);
                    content.push(b'\n');
                }
                _ => return Err(Error::page_render(page, "invalid content stream")),
            }
        }
        Ok(content)
    }

    fn page_resources(&self, page: u32) -> Result<ResourceScope> {
        let page_id = self.page_id(page)?;
        Ok(self
            .inherited(page_id, b"Resources")
            .and_then(|r| self.resolve_dict(r))
            .map(|dict| self.scope_from_dict(dict))
            .unwrap_or_default())
    }

    fn decode_content(&self, page: u32, data: &[u8]) -> Result<Vec<ContentOp>> {
        let content = lopdf::content::Content::decode(data)
            .map_err(|e| Error::page_render(page, format!("bad content stream: {}", e)))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn xobject(&self, page: u32, id: ObjectRef) -> Result<XObject> {
        let stream = match self.doc.get_object(id) {
            Ok(Object::Stream(s)) => s,
            Ok(_) => return Ok(XObject::Other),
            Err(e) => return Err(Error::page_render(page, format!("XObject {:?}: {}", id, e))),
        };

        match stream.dict.get(b"Subtype").and_then(|s| s.as_name_str()) {
            Ok("Image") => Ok(XObject::Image(self.read_image(id, stream))),
            Ok("Form") => self
                .read_form(stream)
                .map(XObject::Form)
                .map_err(|e| Error::page_render(page, format!("form XObject: {}", e))),
            _ => Ok(XObject::Other),
        }
    }

    fn font(&self, page: u32, id: ObjectRef) -> Result<FontResource> {
        let dict = self
            .doc
            .get_dictionary(id)
            .map_err(|e| Error::page_render(page, format!("font {:?}: {}", id, e)))?;
        Ok(self.read_font(dict))
    }

    fn page_annotations(&self, page: u32) -> Result<Vec<Annotation>> {
        let page_id = self.page_id(page)?;
        let page_dict = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| Error::page_render(page, e))?;

        let Some(Object::Array(annots)) = self.entry(page_dict, b"Annots") else {
            return Ok(Vec::new());
        };

        let mut annotations = Vec::new();
        for obj in annots {
            let Some(annot) = self.resolve_dict(obj) else {
                continue;
            };
            let Some(rect) = self.rect(annot, b"Rect") else {
                continue;
            };
            let appearance = self.normal_appearance(annot).and_then(|s| {
                self.read_form(s)
                    .map_err(|e| log::debug!("Page {}: unreadable appearance stream: {}", page, e))
                    .ok()
            });
            annotations.push(Annotation {
                subtype: self
                    .entry(annot, b"Subtype")
                    .and_then(|s| s.as_name().ok())
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .unwrap_or_default(),
                rect,
                flags: self
                    .entry(annot, b"F")
                    .and_then(|f| f.as_i64().ok())
                    .unwrap_or(0)
                    .clamp(0, u32::MAX as i64) as u32,
                appearance,
            });
        }
        Ok(annotations)
    }
}

/// `ABCDEF+Helvetica` -> `Helvetica`.
fn strip_subset_prefix(name: &str) -> String {
    match name.split_once('+') {
        Some((prefix, rest))
            if prefix.len() == 6 && prefix.bytes().all(|b| b.is_ascii_uppercase()) =>
        {
            rest.to_string()
        }
        _ => name.to_string(),
    }
}

/// Convert a `lopdf::Object` to [`PdfValue`].
fn convert_object(obj: &Object) -> PdfValue {
    match obj {
        Object::Integer(i) => PdfValue::Integer(*i),
        Object::Real(r) => PdfValue::Real(*r),
        Object::Name(n) => PdfValue::Name(n.clone()),
        Object::String(b, _) => PdfValue::Str(b.clone()),
        Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        _ => PdfValue::Other,
    }
}

fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Helper: extract a number from a [`PdfValue`].
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(r) => Some(*r),
        _ => None,
    }
}

/// Helper to get a string from a PDF dictionary.
fn get_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
                let utf16: Vec<u16> = bytes[2..]
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&utf16).ok()
            } else {
                String::from_utf8(bytes.clone())
                    .ok()
                    .or_else(|| Some(bytes.iter().map(|&b| b as char).collect()))
            }
        }
        Object::Name(bytes) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

/// Parse a PDF date string (D:YYYYMMDDHHmmSSOHH'mm').
fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.strip_prefix("D:").unwrap_or(s);
    if s.len() < 4 {
        return None;
    }

    let field = |range: std::ops::Range<usize>, default: u32| -> u32 {
        s.get(range).and_then(|v| v.parse().ok()).unwrap_or(default)
    };
    let year: i32 = s.get(0..4)?.parse().ok()?;

    chrono::NaiveDate::from_ymd_opt(year, field(4..6, 1), field(6..8, 1))
        .and_then(|date| date.and_hms_opt(field(8..10, 0), field(10..12, 0), field(12..14, 0)))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
}
