//! Drawing on top of existing pages: text watermarks and page numbers.
//!
//! Each stamp is an extra content stream appended to the page. The
//! original content is wrapped in `q`/`Q` so its graphics state cannot leak
//! into ours.

use super::pages::parse_pages;
use super::{inherited, load, media_box, resolve, save};
use crate::tools::error::{ToolError, ToolResult};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use serde::Deserialize;

const FONT_KEY: &str = "PdStampFont";
const GSTATE_KEY: &str = "PdStampGs";

/// Average Helvetica glyph width as a fraction of the font size
const AVG_GLYPH_WIDTH: f32 = 0.55;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatermarkOptions {
    pub text: String,
    pub font_size: f32,
    /// 0.0 (invisible) to 1.0
    pub opacity: f32,
    /// Degrees counter-clockwise
    pub rotation: f32,
    /// RGB components, 0.0 to 1.0
    pub color: [f32; 3],
    pub pages: Option<String>,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 48.0,
            opacity: 0.3,
            rotation: 45.0,
            color: [0.5, 0.5, 0.5],
            pages: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumberPosition {
    BottomLeft,
    #[default]
    BottomCenter,
    BottomRight,
    TopLeft,
    TopCenter,
    TopRight,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageNumberOptions {
    pub position: NumberPosition,
    /// `{n}` is the page number, `{total}` the last page number
    pub format: String,
    pub start: u32,
    pub font_size: f32,
    pub margin: f32,
    pub pages: Option<String>,
}

impl Default for PageNumberOptions {
    fn default() -> Self {
        Self {
            position: NumberPosition::default(),
            format: "{n}".to_string(),
            start: 1,
            font_size: 12.0,
            margin: 30.0,
            pages: None,
        }
    }
}

pub fn watermark(bytes: &[u8], opts: &WatermarkOptions) -> ToolResult<Vec<u8>> {
    let text = opts.text.trim();
    if text.is_empty() {
        return Err(ToolError::invalid("Watermark text is required"));
    }
    if !(1.0..=500.0).contains(&opts.font_size) {
        return Err(ToolError::invalid("Font size must be between 1 and 500"));
    }
    if !(0.0..=1.0).contains(&opts.opacity) || opts.color.iter().any(|c| !(0.0..=1.0).contains(c)) {
        return Err(ToolError::invalid("Opacity and colour components must be between 0 and 1"));
    }

    let mut doc = load(bytes)?;
    let page_map = doc.get_pages();
    let pages = parse_pages(opts.pages.as_deref().unwrap_or(""), page_map.len() as u32)?;
    let font_id = add_font(&mut doc);
    let gs_id = add_opacity(&mut doc, opts.opacity);

    let (sin, cos) = opts.rotation.to_radians().sin_cos();
    let width = text_width(text, opts.font_size);
    for n in pages {
        let Some(&page_id) = page_map.get(&n) else {
            continue;
        };
        let [x0, y0, x1, y1] = media_box(&doc, page_id);
        let (cx, cy) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
        // Shift the baseline start so the text's centre lands on the page centre
        let (hw, hh) = (width / 2.0, opts.font_size * 0.35);
        let tx = cx - (cos * hw - sin * hh);
        let ty = cy - (sin * hw + cos * hh);

        let ops = vec![
            Operation::new("gs", vec![Object::Name(GSTATE_KEY.into())]),
            Operation::new("rg", opts.color.iter().map(|c| Object::Real(*c)).collect()),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(FONT_KEY.into()), Object::Real(opts.font_size)]),
            Operation::new(
                "Tm",
                vec![
                    Object::Real(cos),
                    Object::Real(sin),
                    Object::Real(-sin),
                    Object::Real(cos),
                    Object::Real(tx),
                    Object::Real(ty),
                ],
            ),
            Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
            Operation::new("ET", vec![]),
        ];
        stamp_page(&mut doc, page_id, ops, font_id, Some(gs_id))?;
    }
    save(&mut doc)
}

pub fn add_page_numbers(bytes: &[u8], opts: &PageNumberOptions) -> ToolResult<Vec<u8>> {
    if !opts.format.contains("{n}") {
        return Err(ToolError::invalid("Format must contain {n}"));
    }
    if !(1.0..=200.0).contains(&opts.font_size) {
        return Err(ToolError::invalid("Font size must be between 1 and 200"));
    }
    if opts.margin < 0.0 {
        return Err(ToolError::invalid("Margin cannot be negative"));
    }

    let mut doc = load(bytes)?;
    let page_map = doc.get_pages();
    let total = page_map.len() as u32;
    let pages = parse_pages(opts.pages.as_deref().unwrap_or(""), total)?;
    let last_number = opts.start.saturating_add(total - 1);
    let font_id = add_font(&mut doc);

    for n in pages {
        let Some(&page_id) = page_map.get(&n) else {
            continue;
        };
        let label = format_page_number(&opts.format, opts.start.saturating_add(n - 1), last_number);
        let width = text_width(&label, opts.font_size);
        let [x0, y0, x1, y1] = media_box(&doc, page_id);

        let x = match opts.position {
            NumberPosition::BottomLeft | NumberPosition::TopLeft => x0 + opts.margin,
            NumberPosition::BottomCenter | NumberPosition::TopCenter => (x0 + x1 - width) / 2.0,
            NumberPosition::BottomRight | NumberPosition::TopRight => x1 - opts.margin - width,
        };
        let y = match opts.position {
            NumberPosition::BottomLeft | NumberPosition::BottomCenter | NumberPosition::BottomRight => {
                y0 + opts.margin
            }
            _ => y1 - opts.margin - opts.font_size,
        };

        let ops = vec![
            Operation::new("rg", vec![0.into(), 0.into(), 0.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(FONT_KEY.into()), Object::Real(opts.font_size)]),
            Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
            Operation::new("Tj", vec![Object::string_literal(win_ansi(&label))]),
            Operation::new("ET", vec![]),
        ];
        stamp_page(&mut doc, page_id, ops, font_id, None)?;
    }
    save(&mut doc)
}

pub(crate) fn format_page_number(format: &str, n: u32, total: u32) -> String {
    format.replace("{n}", &n.to_string()).replace("{total}", &total.to_string())
}

fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * AVG_GLYPH_WIDTH
}

/// The standard fonts only cover Latin-1; anything else becomes '?'
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

fn add_font(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    })
}

fn add_opacity(doc: &mut Document, opacity: f32) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(opacity),
        "CA" => Object::Real(opacity),
    })
}

/// Append `ops` to the page and register the resources they use
fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    ops: Vec<Operation>,
    font_id: ObjectId,
    gs_id: Option<ObjectId>,
) -> ToolResult<()> {
    let mut resources = page_resources(doc, page_id);
    insert_into_subdict(doc, &mut resources, b"Font", FONT_KEY, font_id);
    if let Some(gs_id) = gs_id {
        insert_into_subdict(doc, &mut resources, b"ExtGState", GSTATE_KEY, gs_id);
    }

    let mut ours = Vec::from(&b"\nQ\nq\n"[..]);
    ours.extend(
        Content { operations: ops }
            .encode()
            .map_err(|e| ToolError::processing(format!("Failed to encode stamp: {}", e)))?,
    );
    ours.extend_from_slice(b"\nQ\n");
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let stamp_id = doc.add_object(Stream::new(Dictionary::new(), ours));

    let mut contents: Vec<Object> = vec![open_id.into()];
    contents.extend(existing_contents(doc, page_id));
    contents.push(stamp_id.into());

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| ToolError::processing(format!("Broken page: {}", e)))?;
    page.set("Resources", resources);
    page.set("Contents", contents);
    Ok(())
}

/// Page content stream references, flattening an indirect array
fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Some(contents) = doc.get_dictionary(page_id).ok().and_then(|p| p.get(b"Contents").ok()) else {
        return Vec::new();
    };
    match contents {
        Object::Array(items) => items.clone(),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    }
}

/// The page's effective resources as an inline dictionary
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

fn insert_into_subdict(doc: &Document, resources: &mut Dictionary, category: &[u8], key: &str, id: ObjectId) {
    let mut sub = resources
        .get(category)
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default();
    sub.set(key, id);
    resources.set(category.to_vec(), sub);
}
