// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Text-level inspection and editing of iCalendar payloads.
//!
//! Payloads are opaque: nothing here validates them. Only the first
//! event, to-do, journal or free-busy component is looked at, and edits
//! leave every line they do not touch byte-identical.

use std::cmp::Ordering;

use jiff::Timestamp;
use jiff::civil::{Date, DateTime, Time};

use crate::error::CalDavError;
use crate::request::format_utc;
use crate::types::ComponentKind;

/// A logical (unfolded) content line and its byte span in the payload.
#[derive(Debug)]
struct Line {
    start: usize,
    end: usize,
    logical: String,
}

/// Splits a payload into logical lines, unfolding continuation lines.
fn split_lines(text: &str) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    let mut offset = 0;
    for physical in text.split_inclusive('\n') {
        let end = offset + physical.len();
        let content = physical.trim_end_matches(['\r', '\n']);
        match (content.strip_prefix([' ', '\t']), lines.last_mut()) {
            (Some(rest), Some(last)) => {
                last.logical.push_str(rest);
                last.end = end;
            }
            _ => lines.push(Line {
                start: offset,
                end,
                logical: content.to_string(),
            }),
        }
        offset = end;
    }
    lines
}

fn line_ending(text: &str) -> &'static str {
    match text.contains("\r\n") {
        true => "\r\n",
        false => "\n",
    }
}

/// A parsed content line `NAME;PARAMS:VALUE`; parameters are skipped.
#[derive(Debug, PartialEq, Eq)]
struct Property<'a> {
    name: String,
    value: &'a str,
}

fn parse_property(line: &str) -> Option<Property<'_>> {
    let mut in_quotes = false;
    let colon = line.char_indices().find_map(|(i, c)| match c {
        '"' => {
            in_quotes = !in_quotes;
            None
        }
        ':' if !in_quotes => Some(i),
        _ => None,
    })?;
    let head = line.get(..colon)?;
    let value = line.get(colon + 1..)?;
    let name = head.split_once(';').map_or(head, |(name, _)| name);
    Some(Property {
        name: name.trim().to_ascii_uppercase(),
        value,
    })
}

/// Line indexes of the first calendar component: its BEGIN, its END, and its kind.
fn main_component(lines: &[Line]) -> Option<(usize, usize, ComponentKind)> {
    let (begin, kind) = lines.iter().enumerate().find_map(|(i, line)| {
        let prop = parse_property(&line.logical)?;
        match prop.name.as_str() {
            "BEGIN" => ComponentKind::from_name(prop.value.trim()).map(|k| (i, k)),
            _ => None,
        }
    })?;

    let mut depth = 0usize;
    for (i, line) in lines.iter().enumerate().skip(begin + 1) {
        let Some(prop) = parse_property(&line.logical) else {
            continue;
        };
        match prop.name.as_str() {
            "BEGIN" => depth += 1,
            "END" if depth == 0 => return Some((begin, i, kind)),
            "END" => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Indexes of the properties directly inside the main component.
fn component_properties(lines: &[Line], begin: usize, end: usize) -> Vec<usize> {
    let mut depth = 0usize;
    let mut indexes = Vec::new();
    for (i, line) in lines.iter().enumerate().take(end).skip(begin + 1) {
        match parse_property(&line.logical).map(|p| p.name) {
            Some(name) if name == "BEGIN" => depth += 1,
            Some(name) if name == "END" => depth = depth.saturating_sub(1),
            Some(_) if depth == 0 => indexes.push(i),
            _ => {}
        }
    }
    indexes
}

/// Reassembles the payload with some lines replaced and some inserted.
///
/// `replace` maps a line index to its new content; `insert` adds new lines
/// before a line index.
fn rebuild(
    text: &str,
    lines: &[Line],
    replace: &[(usize, String)],
    insert: &[(usize, String)],
) -> String {
    let eol = line_ending(text);
    let mut out = String::with_capacity(text.len() + 64);
    for (i, line) in lines.iter().enumerate() {
        for (_, content) in insert.iter().filter(|(at, _)| *at == i) {
            out.push_str(content);
            out.push_str(eol);
        }
        let raw = text.get(line.start..line.end).unwrap_or_default();
        match replace.iter().find(|(at, _)| *at == i) {
            Some((_, content)) => {
                out.push_str(content);
                out.push_str(ending_of(raw));
            }
            None => out.push_str(raw),
        }
    }
    out
}

fn ending_of(raw: &str) -> &str {
    let content = raw.trim_end_matches(['\r', '\n']);
    raw.get(content.len()..).unwrap_or_default()
}

/// Component type of the payload's first event, to-do, journal or free-busy.
#[must_use]
pub fn component_kind(text: &str) -> Option<ComponentKind> {
    main_component(&split_lines(text)).map(|(_, _, kind)| kind)
}

/// Value of a property of the main component, unfolded.
#[must_use]
pub fn property_value(text: &str, name: &str) -> Option<String> {
    let lines = split_lines(text);
    let (begin, end, _) = main_component(&lines)?;
    component_properties(&lines, begin, end)
        .into_iter()
        .filter_map(|i| lines.get(i))
        .find_map(|line| {
            let prop = parse_property(&line.logical)?;
            prop.name
                .eq_ignore_ascii_case(name)
                .then(|| prop.value.to_string())
        })
}

/// UID of the main component.
#[must_use]
pub fn uid(text: &str) -> Option<String> {
    property_value(text, "UID")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Sets the UID of every component that has one.
///
/// When no component carries a UID, one is added to the main component.
///
/// # Errors
///
/// Returns [`CalDavError::CalendarData`] if the payload has no event,
/// to-do, journal or free-busy component.
pub fn set_uid(text: &str, uid: &str) -> Result<String, CalDavError> {
    let lines = split_lines(text);
    let (begin, _, _) = main_component(&lines)
        .ok_or_else(|| CalDavError::CalendarData("no calendar component found".to_string()))?;

    let replace: Vec<(usize, String)> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| parse_property(&line.logical).is_some_and(|p| p.name == "UID"))
        .map(|(i, _)| (i, format!("UID:{uid}")))
        .collect();

    let insert = match replace.is_empty() {
        true => vec![(begin + 1, format!("UID:{uid}"))],
        false => Vec::new(),
    };
    Ok(rebuild(text, &lines, &replace, &insert))
}

/// Parses a DATE or DATE-TIME value; a time zone, if any, is ignored.
#[must_use]
pub fn parse_date_time(value: &str) -> Option<DateTime> {
    let value = value.trim().trim_end_matches(['Z', 'z']);
    DateTime::strptime("%Y%m%dT%H%M%S", value)
        .ok()
        .or_else(|| {
            Date::strptime("%Y%m%d", value)
                .ok()
                .map(|d| d.to_datetime(Time::midnight()))
        })
}

/// Due date of the main component.
#[must_use]
pub fn due(text: &str) -> Option<DateTime> {
    property_value(text, "DUE").and_then(|v| parse_date_time(&v))
}

/// Start date of the main component.
#[must_use]
pub fn start(text: &str) -> Option<DateTime> {
    property_value(text, "DTSTART").and_then(|v| parse_date_time(&v))
}

/// Checks if a todo is pending (not completed).
///
/// A todo is pending if:
/// - It has no COMPLETED property, AND
/// - Its status is not COMPLETED or CANCELLED
#[must_use]
pub fn is_pending_todo(text: &str) -> bool {
    if component_kind(text) != Some(ComponentKind::Todo) {
        return false;
    }
    if property_value(text, "COMPLETED").is_some() {
        return false;
    }
    match property_value(text, "STATUS") {
        Some(status) => !matches!(
            status.trim().to_ascii_uppercase().as_str(),
            "COMPLETED" | "CANCELLED"
        ),
        None => true,
    }
}

/// Marks the to-do as completed at `at`.
///
/// STATUS becomes COMPLETED; a COMPLETED timestamp is added unless one is
/// already present. Recurrences are not touched.
///
/// # Errors
///
/// Returns [`CalDavError::CalendarData`] if the payload holds no to-do.
pub fn mark_completed(text: &str, at: Timestamp) -> Result<String, CalDavError> {
    let lines = split_lines(text);
    let (begin, end, kind) = main_component(&lines)
        .ok_or_else(|| CalDavError::CalendarData("no calendar component found".to_string()))?;
    if kind != ComponentKind::Todo {
        return Err(CalDavError::CalendarData(format!(
            "cannot complete a {kind} component"
        )));
    }

    let props = component_properties(&lines, begin, end);
    let find = |name: &str| {
        props.iter().copied().find(|&i| {
            lines
                .get(i)
                .and_then(|l| parse_property(&l.logical))
                .is_some_and(|p| p.name == name)
        })
    };

    let mut replace = Vec::new();
    let mut insert = Vec::new();
    match find("STATUS") {
        Some(i) => replace.push((i, "STATUS:COMPLETED".to_string())),
        None => insert.push((end, "STATUS:COMPLETED".to_string())),
    }
    if find("COMPLETED").is_none() {
        insert.push((end, format!("COMPLETED:{}", format_utc(at))));
    }
    Ok(rebuild(text, &lines, &replace, &insert))
}

/// Orders to-dos: due date ascending, then start date ascending for those
/// without a due date, then those with neither.
#[must_use]
pub fn compare_todos(a: &str, b: &str) -> Ordering {
    todo_sort_key(a).cmp(&todo_sort_key(b))
}

fn todo_sort_key(text: &str) -> (u8, Option<DateTime>) {
    match (due(text), start(text)) {
        (Some(due), _) => (0, Some(due)),
        (None, Some(start)) => (1, Some(start)),
        (None, None) => (2, None),
    }
}
