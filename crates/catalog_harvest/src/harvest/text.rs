//! Field recovery from the catalogue's free-text fragments.
//!
//! Each sub-field has its own small extractor returning an `Option`, so a
//! fragment missing one piece still yields every other piece.

use super::types::NOT_AVAILABLE;
use regex::Regex;
use std::sync::LazyLock;

/// Separator between a code and a name in list labels and headings.
const LABEL_SEPARATOR: &str = " - ";

/// Marks the fee index inside a course's administrative string.
const FEE_INDEX_MARKER: &str = "fi";

/// Number of leading characters (the weight glyph and a space) before the weight.
const ADMIN_PREFIX_CHARS: usize = 2;

const PREREQUISITE_TOKEN: &str = "Prerequisite";

static DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());
static TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{2}:\d{2}").unwrap());
static DAYS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((.*?)\)").unwrap());

/// Splits a `"<CODE> - <Name>"` label on the first separator.
///
/// Names may themselves contain `" - "`, so only the first occurrence splits.
pub fn split_label(label: &str) -> Option<(String, String)> {
    let (code, name) = label.trim().split_once(LABEL_SEPARATOR)?;
    Some((code.trim().to_string(), name.trim().to_string()))
}

/// "CMPUT 404" -> "CMPUT404"
pub fn normalize_course_code(code: &str) -> String {
    code.replace(' ', "")
}

/// "Winter Term 2025" -> "Winter2025"
pub fn normalize_term(label: &str) -> String {
    label.trim().replace(" Term ", "")
}

/// Administrative fields carved out of a string like `"★ 3 (fi 6) (EITHER, 3-0-3)"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminFields {
    pub weight: String,
    pub fee_index: Option<String>,
    pub schedule_pattern: Option<String>,
    pub lecture_hours: Option<String>,
    pub seminar_hours: Option<String>,
    pub lab_hours: Option<String>,
}

impl AdminFields {
    pub fn parse(text: &str) -> Self {
        let body = strip_admin_prefix(text);
        let hours = schedule_group(body).map(hour_parts).unwrap_or_default();
        let [lecture_hours, seminar_hours, lab_hours] = hours;

        Self {
            weight: weight(body),
            fee_index: fee_index(body),
            schedule_pattern: schedule_group(body).and_then(schedule_pattern),
            lecture_hours,
            seminar_hours,
            lab_hours,
        }
    }
}

/// Drops the fixed-width prefix, counting characters rather than bytes.
fn strip_admin_prefix(text: &str) -> &str {
    let text = text.trim_start();
    match text.char_indices().nth(ADMIN_PREFIX_CHARS) {
        Some((offset, _)) => &text[offset..],
        None => "",
    }
}

/// The leading numeric token of the body, e.g. "3" or "1.5"; empty otherwise.
fn weight(body: &str) -> String {
    let token = body
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    let numeric = token.starts_with(|c: char| c.is_ascii_digit())
        && token.chars().all(|c| c.is_ascii_digit() || c == '.');
    if numeric {
        token.to_string()
    } else {
        String::new()
    }
}

/// Text after the fee marker, if the marker exists.
fn after_fee_marker(body: &str) -> Option<&str> {
    body.find(FEE_INDEX_MARKER)
        .map(|idx| &body[idx + FEE_INDEX_MARKER.len()..])
}

fn fee_index(body: &str) -> Option<String> {
    let rest = after_fee_marker(body)?;
    let (index, _) = rest.split_once(')')?;
    non_empty(index)
}

/// Contents of the parenthesized schedule group, e.g. "EITHER, 3-0-3".
///
/// Searched after the fee marker when present, otherwise across the whole body.
fn schedule_group(body: &str) -> Option<&str> {
    let region = after_fee_marker(body).unwrap_or(body);
    let (_, group) = region.split_once('(')?;
    Some(group.split(')').next().unwrap_or(group))
}

fn schedule_pattern(group: &str) -> Option<String> {
    let pattern = group.split(',').next()?;
    non_empty(pattern)
}

/// Lecture, seminar and lab hours; absent trailing parts stay `None`.
fn hour_parts(group: &str) -> [Option<String>; 3] {
    let mut hours: [Option<String>; 3] = Default::default();
    let Some((_, triple)) = group.split_once(',') else {
        return hours;
    };
    for (slot, part) in hours.iter_mut().zip(triple.split('-')) {
        *slot = non_empty(part.trim_matches(|c: char| c.is_whitespace() || c == ')'));
    }
    hours
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Splits a description paragraph at the first "Prerequisite" token.
///
/// Returns the description and, when the token exists, everything after it.
pub fn split_description(paragraph: &str) -> (String, Option<String>) {
    let text = paragraph.trim();
    match text.split_once(PREREQUISITE_TOKEN) {
        Some((description, prerequisites)) => {
            (description.to_string(), Some(prerequisites.to_string()))
        }
        None => (text.to_string(), None),
    }
}

/// Meeting information recovered from a "Class times" cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTimes {
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    pub days: String,
}

impl ClassTimes {
    /// Parses e.g. `"2025-01-06 - 2025-04-09 (MWF) 10:00 - 10:50"`.
    ///
    /// Dates, times and days are matched independently; a pair only counts
    /// when exactly two matches exist.
    pub fn parse(text: &str) -> Self {
        let (start_date, end_date) = exact_pair(&DATE_REGEX, text);
        let (start_time, end_time) = exact_pair(&TIME_REGEX, text);
        let days = DAYS_REGEX
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        Self {
            start_date,
            end_date,
            start_time,
            end_time,
            days,
        }
    }
}

fn exact_pair(regex: &Regex, text: &str) -> (String, String) {
    let matches: Vec<&str> = regex.find_iter(text).map(|m| m.as_str()).collect();
    match matches.as_slice() {
        [start, end] => (start.to_string(), end.to_string()),
        _ => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
    }
}

/// Splits a Section cell into `(class_code, class_name)`.
///
/// The first non-blank line is the name ("LEC A1"), the last is the
/// parenthesized code ("(51234)").
pub fn split_section_cell(text: &str) -> Option<(String, String)> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let name = lines.first()?;
    let code = lines.last()?.trim_matches(|c: char| c == '(' || c == ')');
    Some((code.to_string(), name.to_string()))
}
