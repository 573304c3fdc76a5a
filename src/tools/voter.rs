//! Voter list extraction from OCR text
//!
//! Electoral roll pages list voters as blocks keyed by an EPIC number
//! (three letters and seven digits). Each line holding at least one EPIC
//! opens a window of up to [`WINDOW_LINES`] lines that ends early at the
//! next such line. Inside a window the first line carrying a field label
//! supplies that field; when the opening line holds several EPICs (rolls
//! printed in columns) the j-th value on that line goes to the j-th EPIC.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

/// Lines in a window, counting the line with the EPIC numbers
pub const WINDOW_LINES: usize = 6;

static EPIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([A-Z0158]{3})[ /]?(\d{7})\b").expect("EPIC regex is valid"));

static RELATIVE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(father|husband|mother)(?:['’`]?s)?\s*name\s*[:\-.]?")
        .expect("relative label regex is valid")
});

static NAME_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bname\b\s*[:\-.]?").expect("name label regex is valid"));

static HOUSE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bhouse\s*(?:number|no\.?|num\.?)\s*[:\-.]?").expect("house label regex is valid")
});

static AGE_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bage\b\s*[:\-.]?").expect("age label regex is valid"));

static GENDER_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:gender|sex)\b\s*[:\-.]?").expect("gender label regex is valid"));

static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digits regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoterRecord {
    pub serial: usize,
    pub epic: String,
    pub name: Option<String>,
    pub relative_name: Option<String>,
    /// `father`, `husband` or `mother`
    pub relation: Option<String>,
    pub house_number: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Relative,
    House,
    Age,
    Gender,
}

/// One labelled value found on a line
#[derive(Debug, Clone)]
struct Labelled {
    field: Field,
    start: usize,
    /// Relation word for relative names
    relation: Option<String>,
    value: String,
}

/// Normalise EPIC tokens found on a line, in order
pub fn find_epics(line: &str) -> Vec<String> {
    EPIC_RE
        .captures_iter(line)
        .filter_map(|caps| {
            let letters = &caps[1];
            // A letter part made only of look-alike digits is a number, not an EPIC
            if !letters.chars().any(|c| c.is_ascii_alphabetic()) {
                return None;
            }
            let letters: String = letters
                .chars()
                .map(|c| match c {
                    '0' => 'O',
                    '1' => 'I',
                    '5' => 'S',
                    '8' => 'B',
                    other => other.to_ascii_uppercase(),
                })
                .collect();
            Some(format!("{}{}", letters, &caps[2]))
        })
        .collect()
}

/// Extract voter records from OCR text
pub fn extract(text: &str) -> Vec<VoterRecord> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let epics: Vec<Vec<String>> = lines.iter().map(|l| find_epics(l)).collect();

    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (i, tokens) in epics.iter().enumerate() {
        if tokens.is_empty() {
            continue;
        }
        let end = (i + 1..lines.len().min(i + WINDOW_LINES))
            .find(|&j| !epics[j].is_empty())
            .unwrap_or_else(|| lines.len().min(i + WINDOW_LINES));
        let window: Vec<Vec<Labelled>> = lines[i..end].iter().map(|l| labelled_values(l)).collect();

        for (j, epic) in tokens.iter().enumerate() {
            if !seen.insert(epic.clone()) {
                continue;
            }
            let pick = |field: Field| -> Option<&Labelled> {
                window
                    .iter()
                    .map(|line| line.iter().filter(|l| l.field == field).collect::<Vec<_>>())
                    .find(|matches| !matches.is_empty())
                    .and_then(|matches| matches.get(j).copied())
            };

            let relative = pick(Field::Relative);
            records.push(VoterRecord {
                serial: records.len() + 1,
                epic: epic.clone(),
                name: pick(Field::Name).and_then(|l| clean_text(&l.value)),
                relative_name: relative.and_then(|l| clean_text(&l.value)),
                relation: relative.and_then(|l| l.relation.clone()),
                house_number: pick(Field::House).and_then(|l| clean_house(&l.value)),
                age: pick(Field::Age).and_then(|l| parse_age(&l.value)),
                gender: pick(Field::Gender).and_then(|l| parse_gender(&l.value)),
            });
        }
    }
    records
}

/// Every labelled value on a line. A value runs from the end of its label
/// to the start of the next label.
fn labelled_values(line: &str) -> Vec<Labelled> {
    let mut labels: Vec<(Field, usize, usize, Option<String>)> = Vec::new();

    let relative_spans: Vec<(usize, usize)> = RELATIVE_LABEL_RE
        .captures_iter(line)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            labels.push((Field::Relative, m.start(), m.end(), Some(caps[1].to_lowercase())));
            Some((m.start(), m.end()))
        })
        .collect();

    for m in NAME_LABEL_RE.find_iter(line) {
        let inside_relative = relative_spans.iter().any(|&(s, e)| m.start() >= s && m.start() < e);
        if !inside_relative {
            labels.push((Field::Name, m.start(), m.end(), None));
        }
    }
    for (re, field) in [
        (&*HOUSE_LABEL_RE, Field::House),
        (&*AGE_LABEL_RE, Field::Age),
        (&*GENDER_LABEL_RE, Field::Gender),
    ] {
        for m in re.find_iter(line) {
            labels.push((field, m.start(), m.end(), None));
        }
    }
    labels.sort_by_key(|l| l.1);

    let mut out = Vec::with_capacity(labels.len());
    for (idx, (field, start, end, relation)) in labels.iter().enumerate() {
        let stop = labels.get(idx + 1).map(|l| l.1).unwrap_or(line.len()).max(*end);
        out.push(Labelled {
            field: *field,
            start: *start,
            relation: relation.clone(),
            value: line[*end..stop].to_string(),
        });
    }
    out.sort_by_key(|l| l.start);
    out
}

fn clean_text(raw: &str) -> Option<String> {
    let cleaned = EPIC_RE.replace_all(raw, "");
    let cleaned = cleaned
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | '|' | '.' | ','))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

fn clean_house(raw: &str) -> Option<String> {
    let first = raw
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | '|'))
        .split_whitespace()
        .next()?;
    let first = first.trim_end_matches([',', '.', '|']);
    (!first.is_empty()).then(|| first.to_string())
}

fn parse_age(raw: &str) -> Option<u32> {
    // The whole first run counts, so "1234" is not read as 123
    DIGITS_RE
        .find(raw)
        .filter(|m| m.as_str().len() <= 3)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|age| (1..=125).contains(age))
}

fn parse_gender(raw: &str) -> Option<String> {
    let word = raw
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | '|' | '.'))
        .split(|c: char| !c.is_alphabetic())
        .next()?
        .to_lowercase();
    let gender = match word.as_str() {
        "male" | "m" => "Male",
        "female" | "f" => "Female",
        "other" | "others" | "third" | "transgender" => "Other",
        _ => return None,
    };
    Some(gender.to_string())
}
