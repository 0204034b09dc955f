use std::sync::OnceLock;

use regex::Regex;

use super::cached_regex;
use crate::report::{self, Line};

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(&RE, r"^( *)([^ ]* impacted interfaces?):$")
}

/// Removes impacted interface details, leaving just the summary count.
///
/// ```text
///       2 impacted interfaces:
///         function void foo(bar*)
///         function void baz(bar*)
/// ```
///
/// becomes `      2 impacted interfaces`. A header with no detail lines under
/// it is left as it is.
pub fn collapse_impacted_interfaces(text: &str) -> String {
    let lines = report::lines(text);
    let mut out = String::with_capacity(text.len());
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        index += 1;

        let Some(caps) = line
            .is_terminated()
            .then(|| header_re().captures(line.content()))
            .flatten()
        else {
            out.push_str(line.raw());
            continue;
        };
        let indent = caps.get(1).map_or("", |m| m.as_str());
        let summary = caps.get(2).map_or("", |m| m.as_str());

        let details = lines[index..]
            .iter()
            .take_while(|l| is_detail_of(l, indent))
            .count();
        if details == 0 {
            out.push_str(line.raw());
            continue;
        }

        out.push_str(indent);
        out.push_str(summary);
        out.push('\n');
        index += details;
    }

    out
}

fn is_detail_of(line: &Line<'_>, indent: &str) -> bool {
    line.is_terminated()
        && line
            .content()
            .strip_prefix(indent)
            .is_some_and(|rest| rest.starts_with(' '))
}
