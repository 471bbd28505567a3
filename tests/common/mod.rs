//! Shared fixtures: in-memory PDFs built with lopdf and test OCR engines.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Mutex;

use formscan::{Bitmap, Error, OcrEngine, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// An XObject placed in a page's resources.
pub enum XObjectSpec {
    Stream(Stream),
    /// A form XObject whose own resources hold one image
    FormWithImage {
        content: String,
        image_name: String,
        image: Stream,
    },
}

/// A font placed in a page's resources.
pub enum FontSpec {
    /// Type3 font whose glyph `a` is a 0.8 em square ring
    Type3Box,
    /// Embedded TrueType font whose glyph `O` is a 0.7 em square ring
    TrueTypeBox,
}

/// Normal appearance of a widget annotation.
pub enum Appearance {
    Single(String),
    /// `/N` holds one stream per state and `/AS` picks one
    States {
        current: String,
        states: Vec<(String, String)>,
    },
}

struct Widget {
    rect: [f32; 4],
    flags: i64,
    appearance: Appearance,
}

/// Description of one test page.
#[derive(Default)]
pub struct TestPage {
    text: Option<String>,
    graphics: String,
    xobjects: Vec<(String, XObjectSpec)>,
    dangling: Vec<String>,
    aliases: Vec<(String, String)>,
    fonts: Vec<(String, FontSpec)>,
    widgets: Vec<Widget>,
    rotate: Option<i64>,
}

impl TestPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text shown in 8 pt Helvetica near the top of the page.
    ///
    /// At 8 pt no glyph, or run of touching glyphs, is tall enough to pass
    /// for a checkbox in whatever face stands in for Helvetica.
    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    /// Append raw content stream operators.
    pub fn graphics(mut self, ops: &str) -> Self {
        self.graphics.push_str(ops);
        self.graphics.push('\n');
        self
    }

    /// Stroke a `size` x `size` square outline with its corner at `(x, y)`.
    pub fn checkbox(self, x: f32, y: f32, size: f32) -> Self {
        self.graphics(&format!("q 0 G 1 w {} {} {} {} re S Q", x, y, size, size))
    }

    /// Add an XObject under `name`.
    pub fn xobject(mut self, name: &str, stream: Stream) -> Self {
        self.xobjects.push((name.to_string(), XObjectSpec::Stream(stream)));
        self
    }

    /// Add a form XObject containing one image.
    pub fn form_with_image(mut self, name: &str, content: &str, image_name: &str, image: Stream) -> Self {
        self.xobjects.push((
            name.to_string(),
            XObjectSpec::FormWithImage {
                content: content.to_string(),
                image_name: image_name.to_string(),
                image,
            },
        ));
        self
    }

    /// Add an XObject name whose reference points at no object.
    pub fn dangling_xobject(mut self, name: &str) -> Self {
        self.dangling.push(name.to_string());
        self
    }

    /// Add a font resource under `name`.
    pub fn font(mut self, name: &str, spec: FontSpec) -> Self {
        self.fonts.push((name.to_string(), spec));
        self
    }

    /// Add a widget annotation over `rect` with `/F` set to `flags`.
    ///
    /// The appearance box spans the whole rectangle from the origin.
    pub fn widget(mut self, rect: [f32; 4], flags: i64, appearance: Appearance) -> Self {
        self.widgets.push(Widget {
            rect,
            flags,
            appearance,
        });
        self
    }

    /// Make `alias` refer to the same object as `target`.
    pub fn alias(mut self, alias: &str, target: &str) -> Self {
        self.aliases.push((alias.to_string(), target.to_string()));
        self
    }

    pub fn rotate(mut self, degrees: i64) -> Self {
        self.rotate = Some(degrees);
        self
    }
}

/// Build a PDF with one page per entry.
pub fn build_pdf(pages: Vec<TestPage>) -> Vec<u8> {
    assemble(pages, false)
}

/// Build a PDF whose pages take their resources from the page tree node.
pub fn build_pdf_inherited(pages: Vec<TestPage>) -> Vec<u8> {
    assemble(pages, true)
}

fn assemble(pages: Vec<TestPage>, inherit: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    let mut inherited: Option<Dictionary> = None;

    for page in pages {
        let mut xobjects = Dictionary::new();
        for (name, spec) in page.xobjects {
            let id = add_xobject(&mut doc, spec);
            xobjects.set(name.into_bytes(), Object::Reference(id));
        }
        for name in page.dangling {
            xobjects.set(name.into_bytes(), Object::Reference((9999, 0)));
        }
        for (alias, target) in page.aliases {
            if let Ok(obj) = xobjects.get(target.as_bytes()).cloned() {
                xobjects.set(alias.into_bytes(), obj);
            }
        }

        let mut fonts = dictionary! { "F1" => Object::Reference(font_id) };
        for (name, spec) in page.fonts {
            let id = add_font(&mut doc, spec);
            fonts.set(name.into_bytes(), Object::Reference(id));
        }

        let resources = dictionary! {
            "Font" => fonts,
            "XObject" => xobjects,
        };

        let mut content = page.graphics;
        if let Some(text) = page.text {
            content.push_str(&format!("BT /F1 8 Tf 72 720 Td ({}) Tj ET\n", text));
        }
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        if let Some(rotate) = page.rotate {
            page_dict.set("Rotate", rotate);
        }
        if !page.widgets.is_empty() {
            let annots: Vec<Object> = page
                .widgets
                .into_iter()
                .map(|w| Object::Reference(add_widget(&mut doc, w)))
                .collect();
            page_dict.set("Annots", annots);
        }
        if inherit {
            inherited = Some(resources);
        } else {
            page_dict.set("Resources", resources);
        }
        kids.push(Object::Reference(doc.add_object(page_dict)));
    }

    let mut pages_dict = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
    };
    if let Some(resources) = inherited {
        pages_dict.set("Resources", resources);
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn add_xobject(doc: &mut Document, spec: XObjectSpec) -> ObjectId {
    match spec {
        XObjectSpec::Stream(stream) => doc.add_object(stream),
        XObjectSpec::FormWithImage {
            content,
            image_name,
            image,
        } => {
            let image_id = doc.add_object(image);
            let mut xobjects = Dictionary::new();
            xobjects.set(image_name.into_bytes(), Object::Reference(image_id));
            let dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
                "Resources" => dictionary! { "XObject" => xobjects },
            };
            doc.add_object(Stream::new(dict, content.into_bytes()))
        }
    }
}

fn add_font(doc: &mut Document, spec: FontSpec) -> ObjectId {
    match spec {
        FontSpec::Type3Box => {
            let glyph = doc.add_object(Stream::new(
                dictionary! {},
                b"1000 0 d0 0 0 800 800 re 100 100 600 600 re f*".to_vec(),
            ));
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type3",
                "FontBBox" => vec![0.into(), 0.into(), 800.into(), 800.into()],
                "FontMatrix" => vec![Object::Real(0.001), 0.into(), 0.into(), Object::Real(0.001), 0.into(), 0.into()],
                "CharProcs" => dictionary! { "box" => Object::Reference(glyph) },
                "Encoding" => dictionary! {
                    "Type" => "Encoding",
                    "Differences" => vec![97.into(), Object::Name(b"box".to_vec())],
                },
                "FirstChar" => 97,
                "LastChar" => 97,
                "Widths" => vec![1000.into()],
                "Resources" => dictionary! {},
            })
        }
        FontSpec::TrueTypeBox => {
            let program = box_truetype();
            let length = program.len() as i64;
            let file = doc.add_object(Stream::new(dictionary! { "Length1" => length }, program));
            let descriptor = doc.add_object(dictionary! {
                "Type" => "FontDescriptor",
                "FontName" => "BoxSans",
                "Flags" => 32,
                "FontBBox" => vec![0.into(), 0.into(), 700.into(), 700.into()],
                "ItalicAngle" => 0,
                "Ascent" => 800,
                "Descent" => -200,
                "CapHeight" => 700,
                "StemV" => 80,
                "FontFile2" => Object::Reference(file),
            });
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => "ABCDEF+BoxSans",
                "FirstChar" => 79,
                "LastChar" => 79,
                "Widths" => vec![1000.into()],
                "Encoding" => "WinAnsiEncoding",
                "FontDescriptor" => Object::Reference(descriptor),
            })
        }
    }
}

/// A minimal TrueType font: glyph 1 is a square ring mapped from `O`.
fn box_truetype() -> Vec<u8> {
    fn be16(out: &mut Vec<u8>, values: &[i32]) {
        for v in values {
            out.extend_from_slice(&(*v as u16).to_be_bytes());
        }
    }

    let mut cmap = Vec::new();
    be16(&mut cmap, &[0, 1, 3, 1]);
    cmap.extend_from_slice(&12u32.to_be_bytes());
    // format 6: format, length, language, first code, count, glyph ids
    be16(&mut cmap, &[6, 12, 0, 0x4F, 1, 1]);

    let mut glyf = Vec::new();
    be16(&mut glyf, &[2, 0, 0, 700, 700]);
    be16(&mut glyf, &[3, 7, 0]);
    glyf.extend_from_slice(&[0x01; 8]);
    // Outer contour clockwise, inner counter-clockwise, as deltas.
    be16(&mut glyf, &[0, 0, 700, 0, -600, 500, 0, -500]);
    be16(&mut glyf, &[0, 700, 0, -700, 100, 0, 500, 0]);

    let mut head = Vec::new();
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    head.extend_from_slice(&0u32.to_be_bytes());
    head.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
    be16(&mut head, &[0, 1000]);
    head.extend_from_slice(&[0; 16]);
    be16(&mut head, &[0, 0, 700, 700, 0, 8, 2, 0, 0]);

    let mut hhea = Vec::new();
    hhea.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    be16(&mut hhea, &[800, -200, 0]);
    hhea.extend_from_slice(&[0; 24]);
    be16(&mut hhea, &[2]);

    let mut hmtx = Vec::new();
    be16(&mut hmtx, &[500, 0, 800, 0]);

    let mut loca = Vec::new();
    be16(&mut loca, &[0, 0, glyf.len() as i32 / 2]);

    let mut maxp = Vec::new();
    maxp.extend_from_slice(&0x0000_5000u32.to_be_bytes());
    be16(&mut maxp, &[2]);

    let tables: [(&[u8; 4], Vec<u8>); 7] = [
        (b"cmap", cmap),
        (b"glyf", glyf),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"loca", loca),
        (b"maxp", maxp),
    ];

    let mut font = Vec::new();
    font.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    be16(&mut font, &[tables.len() as i32, 64, 2, 48]);

    let mut offset = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in &tables {
        font.extend_from_slice(*tag);
        font.extend_from_slice(&0u32.to_be_bytes());
        font.extend_from_slice(&(offset as u32).to_be_bytes());
        font.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * tables.len() + body.len();
    }
    font.extend_from_slice(&body);
    font
}

fn appearance_stream(doc: &mut Document, rect: [f32; 4], content: &str) -> ObjectId {
    let (w, h) = (rect[2] - rect[0], rect[3] - rect[1]);
    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), w.into(), h.into()],
        },
        content.as_bytes().to_vec(),
    ))
}

fn add_widget(doc: &mut Document, widget: Widget) -> ObjectId {
    let mut annot = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "Rect" => widget.rect.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
        "F" => widget.flags,
    };
    match widget.appearance {
        Appearance::Single(content) => {
            let normal = appearance_stream(doc, widget.rect, &content);
            annot.set("AP", dictionary! { "N" => Object::Reference(normal) });
        }
        Appearance::States { current, states } => {
            let mut normal = Dictionary::new();
            for (state, content) in states {
                let id = appearance_stream(doc, widget.rect, &content);
                normal.set(state.into_bytes(), Object::Reference(id));
            }
            annot.set("AP", dictionary! { "N" => normal });
            annot.set("AS", Object::Name(current.into_bytes()));
        }
    }
    doc.add_object(annot)
}

/// Raw 8-bit DeviceGray image with every sample set to `value`.
pub fn gray_image(width: u32, height: u32, value: u8) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![value; (width * height) as usize],
    )
}

/// A real baseline JPEG, uniform light gray.
pub fn jpeg_image(width: u32, height: u32) -> Stream {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([230, 230, 230]));
    let mut data = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut data, image::ImageFormat::Jpeg)
        .unwrap();

    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        data.into_inner(),
    )
}

/// An image that claims to be JPEG but is not.
pub fn corrupt_jpeg() -> Stream {
    let mut stream = jpeg_image(8, 8);
    stream.set_content(b"this is not a jpeg stream".to_vec());
    stream
}

/// OCR engine that reports the image size and records every call.
#[derive(Default)]
pub struct MockOcr {
    calls: Mutex<Vec<(u32, u32)>>,
}

impl MockOcr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl OcrEngine for MockOcr {
    fn name(&self) -> &str {
        "mock"
    }

    fn recognize(&self, image: &Bitmap) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((image.width(), image.height()));
        Ok(format!("text {}x{}", image.width(), image.height()))
    }
}

/// OCR engine that is never available.
pub struct MissingOcr;

impl OcrEngine for MissingOcr {
    fn name(&self) -> &str {
        "missing"
    }

    fn recognize(&self, _image: &Bitmap) -> Result<String> {
        Err(Error::OcrUnavailable("engine not installed".to_string()))
    }
}
