//! Short-report generation.
//!
//! Raw `abidiff` / `stgdiff` reports repeat the same motif many times over
//! (impacted interface lists, runs of offset changes, CRC-only symbol
//! changes). The passes in this module rewrite those motifs into compact
//! summaries. Every pass is a pure text transform: lines that do not match
//! a motif pass through untouched, so no input is ever rejected.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

pub mod crc;
pub mod impacted;
pub mod offsets;

pub use crc::{collapse_abidiff_crc_changes, collapse_stgdiff_crc_changes};
pub use impacted::collapse_impacted_interfaces;
pub use offsets::{collapse_abidiff_offset_changes, collapse_stgdiff_offset_changes};

/// Number of CRC-only changes kept verbatim per report section.
pub const DEFAULT_CRC_LIMIT: usize = 3;

/// One rewriting pass over a whole report.
pub trait Collapse {
    fn name(&self) -> &'static str;
    fn collapse(&self, text: &str) -> String;
}

pub struct ImpactedInterfaces;

impl Collapse for ImpactedInterfaces {
    fn name(&self) -> &'static str {
        "impacted-interfaces"
    }

    fn collapse(&self, text: &str) -> String {
        collapse_impacted_interfaces(text)
    }
}

pub struct AbidiffOffsets;

impl Collapse for AbidiffOffsets {
    fn name(&self) -> &'static str {
        "abidiff-offsets"
    }

    fn collapse(&self, text: &str) -> String {
        collapse_abidiff_offset_changes(text)
    }
}

pub struct StgdiffOffsets;

impl Collapse for StgdiffOffsets {
    fn name(&self) -> &'static str {
        "stgdiff-offsets"
    }

    fn collapse(&self, text: &str) -> String {
        collapse_stgdiff_offset_changes(text)
    }
}

pub struct AbidiffCrc {
    pub limit: usize,
}

impl Collapse for AbidiffCrc {
    fn name(&self) -> &'static str {
        "abidiff-crc"
    }

    fn collapse(&self, text: &str) -> String {
        collapse_abidiff_crc_changes(text, self.limit)
    }
}

pub struct StgdiffCrc {
    pub limit: usize,
}

impl Collapse for StgdiffCrc {
    fn name(&self) -> &'static str {
        "stgdiff-crc"
    }

    fn collapse(&self, text: &str) -> String {
        collapse_stgdiff_crc_changes(text, self.limit)
    }
}

/// Which tool produced a report; selects the pass pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportStyle {
    Abidiff,
    Stgdiff,
}

impl ReportStyle {
    pub fn passes(self, crc_limit: usize) -> Vec<Box<dyn Collapse>> {
        match self {
            ReportStyle::Abidiff => vec![
                Box::new(ImpactedInterfaces),
                Box::new(AbidiffOffsets),
                Box::new(AbidiffCrc { limit: crc_limit }),
            ],
            ReportStyle::Stgdiff => vec![
                Box::new(StgdiffOffsets),
                Box::new(StgdiffCrc { limit: crc_limit }),
            ],
        }
    }

    /// Run every pass of this style, in order, over a full report.
    pub fn short_report(self, text: &str, crc_limit: usize) -> String {
        let mut out = text.to_string();
        for pass in self.passes(crc_limit) {
            let before = out.len();
            out = pass.collapse(&out);
            tracing::debug!(
                pass = pass.name(),
                before_bytes = before,
                after_bytes = out.len(),
                "collapse pass done"
            );
        }
        out
    }
}

impl fmt::Display for ReportStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStyle::Abidiff => write!(f, "abidiff"),
            ReportStyle::Stgdiff => write!(f, "stgdiff"),
        }
    }
}

impl FromStr for ReportStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abidiff" | "libabigail" => Ok(ReportStyle::Abidiff),
            "stgdiff" | "stg" => Ok(ReportStyle::Stgdiff),
            other => Err(Error::msg(format!("unknown report style '{other}'"))),
        }
    }
}

/// Compile a pattern that is a string constant in this crate.
pub(crate) fn cached_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("built-in pattern must compile"))
}
