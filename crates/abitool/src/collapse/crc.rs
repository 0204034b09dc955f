use std::sync::OnceLock;

use regex::Regex;

use super::cached_regex;
use crate::report::{self, Line};

fn abidiff_change_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(&RE, r"^  \[C\] .*:$")
}

fn abidiff_crc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(&RE, r"^    CRC.*changed from [^ ]* to [^ ]*$")
}

fn stg_symbol_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(&RE, r"^symbol '[^']*' ")
}

fn stg_symbol_changed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(&RE, r"^symbol '[^']*' changed$")
}

fn stg_crc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(&RE, r"^  CRC changed from [^ ]* to [^ ]*$")
}

/// A symbol whose only change is its CRC. Both lines keep their terminators;
/// the blank line that closed the block is re-emitted on flush.
#[derive(Debug, Clone, Copy)]
struct CrcChange<'a> {
    decl: &'a str,
    crc: &'a str,
}

struct CrcCollector<'a> {
    limit: usize,
    summary_indent: &'static str,
    pending: Vec<CrcChange<'a>>,
    out: String,
}

impl<'a> CrcCollector<'a> {
    fn new(limit: usize, summary_indent: &'static str, capacity: usize) -> Self {
        Self {
            limit,
            summary_indent,
            pending: Vec::new(),
            out: String::with_capacity(capacity),
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        for change in self.pending.iter().take(self.limit) {
            self.out.push_str(change.decl);
            self.out.push_str(change.crc);
            self.out.push('\n');
        }
        let count = self.pending.len();
        if count > self.limit {
            self.out.push_str(&format!(
                "{}... {} omitted; {} symbols have only CRC changes\n\n",
                self.summary_indent,
                count - self.limit,
                count
            ));
        }
        self.pending.clear();
    }

    fn pass(&mut self, line: Line<'a>) {
        self.out.push_str(line.raw());
    }

    fn finish(mut self) -> String {
        self.flush();
        self.out
    }
}

/// Recognises a `(declaration, CRC, blank)` block starting at `index`.
fn crc_block<'a>(
    lines: &[Line<'a>],
    index: usize,
    decl_re: &Regex,
    crc_re: &Regex,
) -> Option<CrcChange<'a>> {
    let decl = lines.get(index)?;
    let crc = lines.get(index + 1)?;
    let blank = lines.get(index + 2)?;
    let matched = decl_re.is_match(decl.content())
        && crc_re.is_match(crc.content())
        && blank.content().is_empty();
    matched.then(|| CrcChange {
        decl: decl.raw(),
        crc: crc.raw(),
    })
}

/// Preserves some abidiff CRC-only changes and summarises the rest.
///
/// A CRC-only change is an indented block with a trailing blank line:
///
/// ```text
///   [C] 'function void* blah(type*)' at core.c:666:1 has some sub-type changes:
///     CRC value (modversions) changed from 0xf0f8820e to 0xe817181d
///
/// ```
///
/// Up to `limit` of them are emitted at the end of the enclosing diff
/// section; the rest are counted in a line like
/// `  ... 17 omitted; 27 symbols have only CRC changes`.
pub fn collapse_abidiff_crc_changes(text: &str, limit: usize) -> String {
    let lines = report::lines(text);
    let mut col = CrcCollector::new(limit, "  ", text.len());
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        if line.starts_section() {
            col.flush();
        }
        if let Some(change) = crc_block(&lines, index, abidiff_change_re(), abidiff_crc_re()) {
            col.pending.push(change);
            index += 3;
            continue;
        }
        col.pass(line);
        index += 1;
    }

    col.finish()
}

/// Preserves some stgdiff CRC-only changes and summarises the rest.
///
/// ```text
/// symbol 'ufshcd_bkops_ctrl' changed
///   CRC changed from 0x34dac87f to 0xc7d9df6f
///
/// ```
///
/// Symbol lines are top-level too, so they do not end a section.
pub fn collapse_stgdiff_crc_changes(text: &str, limit: usize) -> String {
    let lines = report::lines(text);
    let mut col = CrcCollector::new(limit, "", text.len());
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        if line.starts_section() && !stg_symbol_re().is_match(line.content()) {
            col.flush();
        } else if let Some(change) =
            crc_block(&lines, index, stg_symbol_changed_re(), stg_crc_re())
        {
            col.pending.push(change);
            index += 3;
            continue;
        }
        col.pass(line);
        index += 1;
    }

    col.finish()
}
