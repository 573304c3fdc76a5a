//! Building new documents out of pages of existing ones: merge, split,
//! extract and remove.

use super::pages::{complement, parse_pages, parse_ranges};
use super::{flatten_inherited, load, resolve, save, type_of};
use crate::tools::error::{ToolError, ToolResult};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;

/// One output document of a split
#[derive(Debug, Clone)]
pub struct SplitPart {
    pub first_page: u32,
    pub last_page: u32,
    pub bytes: Vec<u8>,
}

impl SplitPart {
    pub fn file_name(&self, stem: &str) -> String {
        if self.first_page == self.last_page {
            format!("{}-page-{}.pdf", stem, self.first_page)
        } else {
            format!("{}-pages-{}-{}.pdf", stem, self.first_page, self.last_page)
        }
    }
}

/// Concatenate documents, order preserved
pub fn merge(inputs: &[Vec<u8>]) -> ToolResult<Vec<u8>> {
    if inputs.len() < 2 {
        return Err(ToolError::invalid("Merging needs at least two PDFs"));
    }
    let mut parts = Vec::with_capacity(inputs.len());
    for (i, bytes) in inputs.iter().enumerate() {
        let doc = load(bytes).map_err(|e| match e {
            ToolError::InvalidInput(msg) => ToolError::invalid(format!("File {}: {}", i + 1, msg)),
            other => other,
        })?;
        let pages = all_pages(&doc);
        parts.push((doc, pages));
    }
    save(&mut rebuild(parts)?)
}

/// Split into one document per range, or per page when no selection is given
pub fn split(bytes: &[u8], selection: Option<&str>) -> ToolResult<Vec<SplitPart>> {
    let doc = load(bytes)?;
    let page_map = doc.get_pages();
    let total = page_map.len() as u32;

    let ranges: Vec<RangeInclusive<u32>> = match selection.map(str::trim).filter(|s| !s.is_empty()) {
        Some(spec) => parse_ranges(spec, total)?,
        None => (1..=total).map(|p| p..=p).collect(),
    };

    ranges
        .into_iter()
        .map(|range| {
            let (first_page, last_page) = (*range.start(), *range.end());
            let selection: Vec<u32> = range.collect();
            let mut part = subset(&doc, &page_map, &selection)?;
            Ok(SplitPart {
                first_page,
                last_page,
                bytes: save(&mut part)?,
            })
        })
        .collect()
}

/// New document with only the selected pages, in selection order
pub fn extract_pages(bytes: &[u8], selection: &str) -> ToolResult<Vec<u8>> {
    let doc = load(bytes)?;
    let page_map = doc.get_pages();
    let pages = parse_pages(selection, page_map.len() as u32)?;
    save(&mut subset(&doc, &page_map, &pages)?)
}

pub fn remove_pages(bytes: &[u8], selection: &str) -> ToolResult<Vec<u8>> {
    let doc = load(bytes)?;
    let page_map = doc.get_pages();
    let total = page_map.len() as u32;
    let removed = parse_pages(selection, total)?;
    let keep = complement(&removed, total);
    if keep.is_empty() {
        return Err(ToolError::invalid("Cannot remove every page of the PDF"));
    }
    save(&mut subset(&doc, &page_map, &keep)?)
}

pub(crate) fn all_pages(doc: &Document) -> Vec<u32> {
    doc.get_pages().keys().copied().collect()
}

/// Copy the given pages of each document, in order, into a fresh document
/// with a flat page tree. Objects the pages no longer reach are pruned.
pub(crate) fn rebuild(parts: Vec<(Document, Vec<u32>)>) -> ToolResult<Document> {
    let mut out = Document::with_version("1.5");
    let mut next_id = 1;
    let mut kids: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut info: Option<Object> = None;

    for (mut doc, selection) in parts {
        if info.is_none() {
            info = doc
                .trailer
                .get(b"Info")
                .ok()
                .and_then(|obj| resolve(&doc, obj))
                .filter(|obj| obj.as_dict().is_ok())
                .cloned();
        }

        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let page_map = doc.get_pages();
        for n in &selection {
            let id = *page_map
                .get(n)
                .ok_or_else(|| ToolError::invalid(format!("Page {} does not exist", n)))?;
            let mut page = doc
                .get_dictionary(id)
                .map_err(|e| ToolError::processing(format!("Broken page {}: {}", n, e)))?
                .clone();
            flatten_inherited(&doc, id, &mut page);
            kids.push((id, page));
        }

        let page_ids: HashSet<ObjectId> = page_map.values().copied().collect();
        for (id, obj) in doc.objects {
            if page_ids.contains(&id) || matches!(type_of(&obj), Some(b"Catalog") | Some(b"Pages")) {
                continue;
            }
            out.objects.insert(id, obj);
        }
    }

    if kids.is_empty() {
        return Err(ToolError::invalid("No pages selected"));
    }

    out.max_id = next_id - 1;
    attach_page_tree(&mut out, kids, info);
    out.prune_objects();
    out.renumber_objects();
    Ok(out)
}

/// Copy pages of a single document without cloning it. Only the objects
/// the selected pages (and the document info) reach are carried over, so
/// each call costs what the selection touches.
fn subset(
    doc: &Document,
    page_map: &BTreeMap<u32, ObjectId>,
    selection: &[u32],
) -> ToolResult<Document> {
    let page_ids: HashSet<ObjectId> = page_map.values().copied().collect();
    let mut out = Document::with_version("1.5");
    // Fresh ids must not collide with copied ones
    out.max_id = doc.objects.keys().map(|id| id.0).max().unwrap_or(0).max(doc.max_id);

    let mut kids: Vec<(ObjectId, Dictionary)> = Vec::with_capacity(selection.len());
    let mut pending: Vec<ObjectId> = Vec::new();
    for n in selection {
        let id = *page_map
            .get(n)
            .ok_or_else(|| ToolError::invalid(format!("Page {} does not exist", n)))?;
        let mut page = doc
            .get_dictionary(id)
            .map_err(|e| ToolError::processing(format!("Broken page {}: {}", n, e)))?
            .clone();
        flatten_inherited(doc, id, &mut page);
        page.remove(b"Parent");
        dict_references(&page, &mut pending);
        kids.push((id, page));
    }
    if kids.is_empty() {
        return Err(ToolError::invalid("No pages selected"));
    }

    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .filter(|obj| obj.as_dict().is_ok())
        .cloned();
    if let Some(info) = &info {
        references(info, &mut pending);
    }

    let mut visited = HashSet::new();
    while let Some(id) = pending.pop() {
        // Pages are copied above; links to dropped ones stay dangling
        if page_ids.contains(&id) || !visited.insert(id) {
            continue;
        }
        let obj = match doc.get_object(id) {
            Ok(obj) => obj,
            Err(_) => continue,
        };
        if matches!(type_of(obj), Some(b"Catalog") | Some(b"Pages")) {
            continue;
        }
        references(obj, &mut pending);
        out.objects.insert(id, obj.clone());
    }

    attach_page_tree(&mut out, kids, info);
    out.renumber_objects();
    Ok(out)
}

fn references(obj: &Object, found: &mut Vec<ObjectId>) {
    match obj {
        Object::Reference(id) => found.push(*id),
        Object::Array(items) => items.iter().for_each(|item| references(item, found)),
        Object::Dictionary(dict) => dict_references(dict, found),
        Object::Stream(stream) => dict_references(&stream.dict, found),
        _ => {}
    }
}

fn dict_references(dict: &Dictionary, found: &mut Vec<ObjectId>) {
    for (_, value) in dict.iter() {
        references(value, found);
    }
}

/// Hang the pages under a new flat page tree and catalog. Every id already
/// in `out` must be at most `out.max_id`.
fn attach_page_tree(out: &mut Document, kids: Vec<(ObjectId, Dictionary)>, info: Option<Object>) {
    let pages_id = out.new_object_id();
    let count = kids.len() as i64;
    let mut kid_refs: Vec<Object> = Vec::with_capacity(kids.len());
    let mut seen = HashSet::new();
    for (id, mut page) in kids {
        // A page listed twice gets its own copy
        let id = if seen.insert(id) { id } else { out.new_object_id() };
        page.set("Parent", pages_id);
        out.objects.insert(id, Object::Dictionary(page));
        kid_refs.push(id.into());
    }

    out.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kid_refs,
            "Count" => count,
        }),
    );
    let catalog_id = out.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    out.trailer.set("Root", catalog_id);
    if let Some(info) = info {
        let info_id = out.add_object(info);
        out.trailer.set("Info", info_id);
    }
}
