//! Tool output (abidiff/stgdiff/abitidy stderr) is echoed into our logs when
//! a tool fails. It is untrusted text, so terminal escapes and control
//! characters are stripped first.

const MAX_LINE_CHARS: usize = 512;

enum Escape {
    Start,
    Csi,
    Osc,
    OscEsc,
    String,
    StringEsc,
}

pub fn sanitize_tool_line(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_LINE_CHARS));
    let mut escape: Option<Escape> = None;
    let mut chars = 0usize;

    for c in input.chars() {
        if let Some(state) = escape.take() {
            escape = match (state, c) {
                (Escape::Start, '[') => Some(Escape::Csi),
                (Escape::Start, ']') => Some(Escape::Osc),
                (Escape::Start, 'P' | 'X' | '^' | '_') => Some(Escape::String),
                (Escape::Start, _) => None,
                (Escape::Csi, c) if ('@'..='~').contains(&c) => None,
                (Escape::Csi, _) => Some(Escape::Csi),
                (Escape::Osc, '\x07') => None,
                (Escape::Osc, '\x1b') => Some(Escape::OscEsc),
                (Escape::Osc, _) => Some(Escape::Osc),
                (Escape::OscEsc, '\\') => None,
                (Escape::OscEsc, '\x1b') => Some(Escape::OscEsc),
                (Escape::OscEsc, _) => Some(Escape::Osc),
                (Escape::String, '\x1b') => Some(Escape::StringEsc),
                (Escape::String, _) => Some(Escape::String),
                (Escape::StringEsc, '\\') => None,
                (Escape::StringEsc, '\x1b') => Some(Escape::StringEsc),
                (Escape::StringEsc, _) => Some(Escape::String),
            };
            continue;
        }

        match c {
            '\x1b' => escape = Some(Escape::Start),
            '\t' => out.push(' '),
            c if c.is_control() || is_bidi_control(c) => continue,
            c => out.push(c),
        }
        chars += 1;
        if chars >= MAX_LINE_CHARS {
            out.push_str(" ...[truncated]");
            break;
        }
    }

    out
}

/// The last `max_lines` non-empty lines of `output`, sanitised.
pub fn output_tail(output: &str, max_lines: usize) -> Vec<String> {
    let mut tail: Vec<String> = output
        .lines()
        .rev()
        .map(sanitize_tool_line)
        .filter(|l| !l.trim().is_empty())
        .take(max_lines)
        .collect();
    tail.reverse();
    tail
}

fn is_bidi_control(c: char) -> bool {
    c == '\u{061C}'
        || c == '\u{200E}'
        || c == '\u{200F}'
        || ('\u{202A}'..='\u{202E}').contains(&c)
        || ('\u{2066}'..='\u{2069}').contains(&c)
}
