//! Text-level encoding of the activation flag.
//!
//! Neither JSON nor YAML can carry the flag, so the serialized document is
//! rewritten line by line after serialization: every span that sits between
//! inactive markers (see [`crate::activation`]) is commented out and bracketed
//! by sentinel comment lines. The same sentinels let [`decode`] bring the
//! markers back, and [`strip`] drop the spans to get a valid document.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::activation::{self, MarkerEdge};
use crate::models::DocumentFormat;

pub const COMMENT_PREFIX: &str = "# ";
pub const BLOCK_START: &str = "# inactiveStart";
pub const BLOCK_END: &str = "# inactiveEnd";
pub const INNER_START: &str = "# inactiveInnerStart";
pub const INNER_END: &str = "# inactiveInnerEnd";

// Member markers (`"__inactiveStart_0": true,` / `__inactiveStart_0: true`)
// and element markers (`"__inactiveStart_0",` / `- __inactiveStart_0`).
static MARKER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(\s*)(?:- (__inactive(?:Start|End)_\d+)|"?(__inactive(?:Start|End)_\d+)"?(?:\s*:\s*true)?,?)\s*$"#,
    )
    .unwrap()
});

// A sequence element whose first member is an inactive marker
// (`- __inactiveStart_0: true`, or `- - ...` for nested sequences).
static ELEMENT_MEMBER_MARKER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\s*)((?:- )+)"?(__inactiveStart_\d+)"?\s*:\s*true\s*$"#).unwrap()
});

static SENTINEL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)# inactive(Inner)?(Start|End)\s*$").unwrap());

static JSON_MEMBER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*"(?:[^"\\]|\\.)*"\s*:"#).unwrap());

/// Comment out the lines of one node when it is inactive under an active parent.
///
/// Lines of an inactive node whose parent is already inactive are left alone:
/// they are covered by the parent's prefix and are never commented twice.
pub fn wrap(lines: &[String], is_active: bool, is_parent_active: bool) -> Vec<String> {
    if is_active || !is_parent_active {
        return lines.to_vec();
    }
    lines.iter().map(|line| comment_line(line)).collect()
}

/// Replace marker lines with sentinels and comment out the spans they enclose.
pub fn encode(text: &str) -> String {
    let mut depth = 0usize;
    let mut output = Vec::new();

    for line in text.lines() {
        // The element's dash keeps a line of its own outside the span.
        if let Some((indent, dashes)) = element_member_marker(line) {
            let dash_line = format!("{}{}", indent, dashes.trim_end());
            output.extend(wrap(&[dash_line], depth == 0, true));
            let member_indent = format!("{}{}", indent, " ".repeat(dashes.len()));
            let sentinel = if depth == 0 { BLOCK_START } else { INNER_START };
            output.push(format!("{}{}", member_indent, sentinel));
            depth += 1;
            continue;
        }
        if let Some((indent, edge)) = marker_line(line) {
            match edge {
                MarkerEdge::Start => {
                    let sentinel = if depth == 0 { BLOCK_START } else { INNER_START };
                    output.push(format!("{}{}", indent, sentinel));
                    depth += 1;
                }
                MarkerEdge::End => {
                    depth = depth.saturating_sub(1);
                    let sentinel = if depth == 0 { BLOCK_END } else { INNER_END };
                    output.push(format!("{}{}", indent, sentinel));
                }
            }
            continue;
        }

        output.extend(wrap(&[line.to_string()], depth == 0, true));
    }

    rejoin(output, text)
}

/// Inverse of [`encode`]: uncomment the spans and restore their markers.
pub fn decode(text: &str, format: DocumentFormat) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut output = Vec::with_capacity(lines.len());
    let mut open: Vec<(SlotKind, usize)> = Vec::new();
    let mut next_index = 0usize;

    for (position, line) in lines.iter().enumerate() {
        if let Some((indent, edge)) = sentinel_line(line) {
            match edge {
                MarkerEdge::Start => {
                    let kind = slot_kind(&lines[position + 1..], format);
                    output.push(restored_marker(indent, kind, MarkerEdge::Start, next_index, format));
                    open.push((kind, next_index));
                    next_index += 1;
                }
                MarkerEdge::End => {
                    if let Some((kind, index)) = open.pop() {
                        output.push(restored_marker(indent, kind, MarkerEdge::End, index, format));
                    }
                }
            }
            continue;
        }

        if open.is_empty() {
            output.push(line.to_string());
        } else {
            output.push(uncomment_line(line));
        }
    }

    let decoded = rejoin(output, text);
    match format {
        DocumentFormat::Json => collapse_trailing_commas(&decoded),
        DocumentFormat::Yaml => decoded,
    }
}

/// Drop every sentinel-marked span, leaving only the active document.
///
/// A YAML key or sequence dash left without children reads as `null`, so it
/// is closed with `{}` or `[]` depending on what its dropped children were.
pub fn strip(text: &str, format: DocumentFormat) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut depth = 0usize;
    let mut output = Vec::new();
    let mut dropped: HashMap<usize, SlotKind> = HashMap::new();

    for (position, line) in lines.iter().enumerate() {
        match sentinel_line(line) {
            Some((_, MarkerEdge::Start)) => {
                if depth == 0 {
                    dropped
                        .entry(output.len())
                        .or_insert_with(|| slot_kind(&lines[position + 1..], format));
                }
                depth += 1;
            }
            Some((_, MarkerEdge::End)) => depth = depth.saturating_sub(1),
            None if depth == 0 => output.push(line.to_string()),
            None => {}
        }
    }

    match format {
        DocumentFormat::Json => collapse_trailing_commas(&rejoin(output, text)),
        DocumentFormat::Yaml => rejoin(close_empty_blocks(&output, &dropped), text),
    }
}

/// Remove a trailing comma when the next non-blank line closes an object or array.
pub fn collapse_trailing_commas(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut output = Vec::with_capacity(lines.len());

    for (position, line) in lines.iter().enumerate() {
        let trimmed = line.trim_end();
        let closes_next = lines[position + 1..]
            .iter()
            .map(|next| next.trim())
            .find(|next| !next.is_empty())
            .map(|next| next.starts_with('}') || next.starts_with(']'))
            .unwrap_or(false);

        if closes_next && trimmed.ends_with(',') {
            output.push(trimmed[..trimmed.len() - 1].to_string());
        } else {
            output.push(line.to_string());
        }
    }

    rejoin(output, text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Member,
    Element,
}

fn element_member_marker(line: &str) -> Option<(&str, &str)> {
    let captures = ELEMENT_MEMBER_MARKER_LINE.captures(line)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

fn marker_line(line: &str) -> Option<(&str, MarkerEdge)> {
    let captures = MARKER_LINE.captures(line)?;
    let indent = captures.get(1)?.as_str();
    let marker = captures.get(2).or_else(|| captures.get(3))?.as_str();
    activation::parse_marker(marker).map(|edge| (indent, edge))
}

fn sentinel_line(line: &str) -> Option<(&str, MarkerEdge)> {
    let captures = SENTINEL_LINE.captures(line)?;
    let indent = captures.get(1)?.as_str();
    let edge = match captures.get(3)?.as_str() {
        "Start" => MarkerEdge::Start,
        _ => MarkerEdge::End,
    };
    Some((indent, edge))
}

// The first content line of the span tells whether the node was an object
// member or an array element.
fn slot_kind(rest: &[&str], format: DocumentFormat) -> SlotKind {
    let content = rest
        .iter()
        .find(|line| sentinel_line(line).is_none())
        .map(|line| uncomment_line(line))
        .unwrap_or_default();
    let trimmed = content.trim_start();

    match format {
        DocumentFormat::Json if JSON_MEMBER_LINE.is_match(&content) => SlotKind::Member,
        DocumentFormat::Json => SlotKind::Element,
        DocumentFormat::Yaml if trimmed.starts_with("- ") || trimmed == "-" => SlotKind::Element,
        DocumentFormat::Yaml => SlotKind::Member,
    }
}

// `dropped` maps an output position to the kind of the first span removed
// right before it.
fn close_empty_blocks(lines: &[String], dropped: &HashMap<usize, SlotKind>) -> Vec<String> {
    let mut closed = Vec::with_capacity(lines.len());

    for (position, line) in lines.iter().enumerate() {
        let empty = dropped
            .get(&(position + 1))
            .filter(|_| block_opener(line).map_or(false, |opener| !has_children(opener, &lines[position + 1..])));
        match empty {
            Some(SlotKind::Member) => closed.push(format!("{} {{}}", line.trim_end())),
            Some(SlotKind::Element) => closed.push(format!("{} []", line.trim_end())),
            None => closed.push(line.clone()),
        }
    }

    closed
}

#[derive(Debug, Clone, Copy)]
struct BlockOpener {
    /// Column children must be indented past.
    column: usize,
    /// Whether a sequence may start at `column` itself, as under a mapping key.
    sequence_at_column: bool,
}

// `key:` or `- key:` with nothing after the colon, or a bare `-`.
fn block_opener(line: &str) -> Option<BlockOpener> {
    let (indent, mut rest) = split_indent(line.trim_end());
    let mut column = indent.len();
    while let Some(tail) = rest.strip_prefix("- ") {
        column += 2;
        rest = tail;
    }

    if rest == "-" {
        return Some(BlockOpener {
            column,
            sequence_at_column: false,
        });
    }
    if rest.ends_with(':') && !rest.starts_with('#') {
        return Some(BlockOpener {
            column,
            sequence_at_column: true,
        });
    }
    None
}

fn has_children(opener: BlockOpener, rest: &[String]) -> bool {
    rest.iter()
        .find(|line| !line.trim().is_empty())
        .map_or(false, |line| {
            let (indent, content) = split_indent(line);
            indent.len() > opener.column
                || (opener.sequence_at_column
                    && indent.len() == opener.column
                    && (content.starts_with("- ") || content == "-"))
        })
}

fn restored_marker(
    indent: &str,
    kind: SlotKind,
    edge: MarkerEdge,
    index: usize,
    format: DocumentFormat,
) -> String {
    let marker = activation::marker(edge, index);
    match (format, kind) {
        (DocumentFormat::Json, SlotKind::Member) => format!("{}\"{}\": true,", indent, marker),
        (DocumentFormat::Json, SlotKind::Element) => format!("{}\"{}\",", indent, marker),
        (DocumentFormat::Yaml, SlotKind::Member) => format!("{}{}: true", indent, marker),
        (DocumentFormat::Yaml, SlotKind::Element) => format!("{}- {}", indent, marker),
    }
}

fn split_indent(line: &str) -> (&str, &str) {
    let content = line.trim_start();
    line.split_at(line.len() - content.len())
}

fn comment_line(line: &str) -> String {
    let (indent, content) = split_indent(line);
    format!("{}{}{}", indent, COMMENT_PREFIX, content)
}

fn uncomment_line(line: &str) -> String {
    let (indent, content) = split_indent(line);
    match content.strip_prefix(COMMENT_PREFIX) {
        Some(rest) => format!("{}{}", indent, rest),
        None => match content.strip_prefix('#') {
            Some(rest) => format!("{}{}", indent, rest),
            None => line.to_string(),
        },
    }
}

fn rejoin(lines: Vec<String>, original: &str) -> String {
    let mut joined = lines.join("\n");
    if original.ends_with('\n') {
        joined.push('\n');
    }
    joined
}
