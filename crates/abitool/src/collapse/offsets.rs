use std::fmt::Display;
use std::sync::OnceLock;

use regex::Regex;

use super::cached_regex;
use crate::report;

fn abidiff_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(
        &RE,
        r"^( *)('.*') offset changed from .* to .* \(in bits\) (\(by .* bits\))$",
    )
}

fn stg_member_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(&RE, r"^( *)member ('.*') changed$")
}

fn stg_offset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(&RE, r"^( *)offset changed from (\d+) to (\d+)$")
}

/// A run of consecutive offset changes sharing indentation and delta.
/// Items stay in order of appearance: the summary names the first and last.
#[derive(Debug)]
enum Pending<'a, D> {
    Empty,
    Collecting {
        indent: &'a str,
        delta: D,
        items: Vec<&'a str>,
    },
}

impl<D> Default for Pending<'_, D> {
    fn default() -> Self {
        Pending::Empty
    }
}

impl<'a, D: PartialEq> Pending<'a, D> {
    /// Add an item, handing back the previous group when it cannot absorb it.
    fn push(&mut self, indent: &'a str, delta: D, item: &'a str) -> Option<Self> {
        if let Pending::Collecting {
            indent: cur_indent,
            delta: cur_delta,
            items,
        } = self
        {
            if *cur_indent == indent && *cur_delta == delta {
                items.push(item);
                return None;
            }
        }
        let prev = std::mem::replace(
            self,
            Pending::Collecting {
                indent,
                delta,
                items: vec![item],
            },
        );
        Some(prev)
    }

    fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

fn emit_abidiff(out: &mut String, group: Pending<'_, &str>) {
    let Pending::Collecting {
        indent,
        delta,
        items,
    } = group
    else {
        return;
    };
    match items.as_slice() {
        [] => {}
        [only] => out.push_str(&format!("{indent}{only} offset changed {delta}\n")),
        [first, .., last] => out.push_str(&format!(
            "{indent}{} ({first} .. {last}) offsets changed {delta}\n",
            items.len()
        )),
    }
}

fn emit_stgdiff<D: Display>(out: &mut String, group: Pending<'_, D>) {
    let Pending::Collecting {
        indent,
        delta,
        items,
    } = group
    else {
        return;
    };
    match items.as_slice() {
        [] => {}
        [only] => {
            out.push_str(&format!("{indent}member {only} changed\n"));
            out.push_str(&format!("{indent}  offset changed by {delta}\n"));
        }
        [first, .., last] => {
            out.push_str(&format!(
                "{indent}{} members ({first} .. {last}) changed\n",
                items.len()
            ));
            out.push_str(&format!("{indent}  offsets changed by {delta}\n"));
        }
    }
}

/// Replaces runs of abidiff "offset changed" lines with a one-line summary.
///
/// ```text
///   'int a' offset changed from 0 to 32 (in bits) (by +32 bits)
///   'int b' offset changed from 32 to 64 (in bits) (by +32 bits)
/// ```
///
/// becomes `  2 ('int a' .. 'int b') offsets changed (by +32 bits)`.
pub fn collapse_abidiff_offset_changes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending: Pending<'_, &str> = Pending::Empty;

    for line in report::lines(text) {
        let caps = abidiff_re().captures(line.content());
        let Some(caps) = caps else {
            emit_abidiff(&mut out, pending.take());
            out.push_str(line.raw());
            continue;
        };
        let indent = caps.get(1).map_or("", |m| m.as_str());
        let item = caps.get(2).map_or("", |m| m.as_str());
        let delta = caps.get(3).map_or("", |m| m.as_str());
        if let Some(prev) = pending.push(indent, delta, item) {
            emit_abidiff(&mut out, prev);
        }
    }

    emit_abidiff(&mut out, pending.take());
    out
}

/// Replaces runs of stgdiff member offset changes with a two-line summary.
///
/// Each change spans two lines, and the line after it is inspected too so a
/// member whose change carries further nested details is never swallowed:
///
/// ```text
/// member 'int a' changed
///   offset changed from 0 to 32
/// ```
pub fn collapse_stgdiff_offset_changes(text: &str) -> String {
    let lines = report::lines(text);
    let mut out = String::with_capacity(text.len());
    let mut pending: Pending<'_, i128> = Pending::Empty;
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        if let Some(next_ctx) = lines.get(index + 2) {
            let offset_line = lines[index + 1].content();
            if let Some((indent, item, delta)) =
                match_stg_offset_change(line.content(), offset_line, next_ctx.indent_len())
            {
                if let Some(prev) = pending.push(indent, delta, item) {
                    emit_stgdiff(&mut out, prev);
                }
                index += 2;
                continue;
            }
        }
        emit_stgdiff(&mut out, pending.take());
        out.push_str(line.raw());
        index += 1;
    }

    emit_stgdiff(&mut out, pending.take());
    out
}

fn match_stg_offset_change<'a>(
    member_line: &'a str,
    offset_line: &'a str,
    next_indent: usize,
) -> Option<(&'a str, &'a str, i128)> {
    let member = stg_member_re().captures(member_line)?;
    let offset = stg_offset_re().captures(offset_line)?;

    let indent = member.get(1)?.as_str();
    let item = member.get(2)?.as_str();
    let offset_indent = offset.get(1)?.as_str();
    if indent.len() + 2 != offset_indent.len() || indent.len() < next_indent {
        return None;
    }

    let before: i128 = offset.get(2)?.as_str().parse().ok()?;
    let after: i128 = offset.get(3)?.as_str().parse().ok()?;
    Some((indent, item, after - before))
}
