//! Line model shared by the collapsing passes.
//!
//! Reports are split on `\n` only and every line keeps its terminator, so
//! joining the lines back together reproduces the input byte for byte. The
//! final line may lack a terminator.

/// A single report line borrowed from the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    raw: &'a str,
}

impl<'a> Line<'a> {
    /// The line exactly as it appeared in the input, terminator included.
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// The line without its `\n` terminator. Patterns are matched against this.
    pub fn content(&self) -> &'a str {
        self.raw.strip_suffix('\n').unwrap_or(self.raw)
    }

    pub fn is_terminated(&self) -> bool {
        self.raw.ends_with('\n')
    }

    /// Number of leading spaces.
    pub fn indent_len(&self) -> usize {
        self.raw.len() - self.raw.trim_start_matches(' ').len()
    }

    /// True for lines that start a new report section: the first character is
    /// neither a space nor the line terminator.
    pub fn starts_section(&self) -> bool {
        !matches!(self.raw.as_bytes().first(), None | Some(b' ') | Some(b'\n'))
    }
}

pub fn lines(text: &str) -> Vec<Line<'_>> {
    text.split_inclusive('\n').map(|raw| Line { raw }).collect()
}
