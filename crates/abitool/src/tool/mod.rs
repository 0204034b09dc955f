//! Drivers for the external ABI diff tools.
//!
//! A driver runs the diff tool, keeps its full report, decides from the exit
//! status whether the ABI changed, and optionally writes a short report
//! produced by the collapsing passes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::collapse::{DEFAULT_CRC_LIMIT, ReportStyle};
use crate::error::{Error, Result};
use crate::log_sanitize::output_tail;

pub mod libabigail;
pub mod runner;
pub mod stg;

pub use libabigail::Libabigail;
pub use runner::{Tool, ToolExit, ToolRunner};
pub use stg::Stg;

/// Inputs for one diff run.
#[derive(Debug, Clone)]
pub struct DiffRequest {
    pub old_dump: PathBuf,
    pub new_dump: PathBuf,
    /// Where the full report goes. For STG this is the basename of the
    /// per-format outputs (`<report>.plain`, `<report>.small`, ...).
    pub diff_report: PathBuf,
    pub short_report: Option<PathBuf>,
    pub symbol_list: Option<PathBuf>,
    pub full_report: bool,
    pub crc_limit: usize,
}

impl DiffRequest {
    pub fn new(old_dump: PathBuf, new_dump: PathBuf, diff_report: PathBuf) -> Self {
        Self {
            old_dump,
            new_dump,
            diff_report,
            short_report: None,
            symbol_list: None,
            full_report: false,
            crc_limit: DEFAULT_CRC_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffOutcome {
    pub tool: &'static str,
    pub abi_changed: bool,
    /// Every report file written by the run, full reports first.
    pub reports: Vec<PathBuf>,
}

/// Meaning of the bits in a diff tool's exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitFlags {
    /// Bits that mean the tool itself failed.
    pub error_mask: i32,
    /// Bit that reports an ABI change.
    pub change_bit: i32,
    /// Bit that marks the change as incompatible, 0 when the tool has none.
    pub incompatible_bit: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    Unchanged,
    Changed,
}

impl ExitFlags {
    pub const ABIDIFF_ERROR: i32 = 1 << 0;
    pub const ABIDIFF_USAGE_ERROR: i32 = 1 << 1;
    pub const ABIDIFF_ABI_CHANGE: i32 = 1 << 2;
    pub const ABIDIFF_ABI_INCOMPATIBLE_CHANGE: i32 = 1 << 3;

    pub const STG_ERROR: i32 = 1 << 0;
    pub const STG_ABI_CHANGE: i32 = 1 << 2;

    pub const LIBABIGAIL: ExitFlags = ExitFlags {
        error_mask: Self::ABIDIFF_ERROR | Self::ABIDIFF_USAGE_ERROR,
        change_bit: Self::ABIDIFF_ABI_CHANGE,
        incompatible_bit: Self::ABIDIFF_ABI_INCOMPATIBLE_CHANGE,
    };

    pub const STG: ExitFlags = ExitFlags {
        error_mask: Self::STG_ERROR,
        change_bit: Self::STG_ABI_CHANGE,
        incompatible_bit: 0,
    };

    /// Any non-zero exit without an error bit counts as an ABI change.
    pub fn classify(&self, tool: &str, exit: ToolExit) -> Result<DiffStatus> {
        match exit.code {
            Some(0) => Ok(DiffStatus::Unchanged),
            Some(code) if code & self.error_mask != 0 => Err(Error::msg(format!(
                "{tool} failed with exit code {code}"
            ))),
            Some(code) => {
                if code & self.incompatible_bit != 0 {
                    tracing::info!(tool, code, "incompatible ABI change");
                } else if code & self.change_bit == 0 {
                    tracing::debug!(tool, code, "non-zero exit without change bit");
                }
                Ok(DiffStatus::Changed)
            }
            None => Err(Error::msg(format!("{tool} was terminated by a signal"))),
        }
    }
}

/// Common interface of the diff tool drivers.
pub trait AbiTool {
    fn name(&self) -> &'static str;
    fn style(&self) -> ReportStyle;
    fn diff_abi(&self, req: &DiffRequest, runner: &ToolRunner) -> Result<DiffOutcome>;
}

/// Pick a driver by name: `libabigail` or `STG`.
pub fn get_abi_tool(name: &str) -> Result<Box<dyn AbiTool>> {
    tracing::info!("using {name} for abi analysis");
    match name {
        "libabigail" => Ok(Box::new(Libabigail)),
        n if n.eq_ignore_ascii_case("stg") => Ok(Box::new(Stg)),
        other => Err(Error::msg(format!("not a valid abi_tool: {other}"))),
    }
}

/// Echo the end of a tool's captured output after a hard failure.
pub(crate) fn log_report_tail(tool: &str, report: &Path) {
    let Ok(text) = fs::read_to_string(report) else {
        return;
    };
    for line in output_tail(&text, 20) {
        tracing::warn!("{tool}: {line}");
    }
}

/// Read `full`, collapse it in `style`, and write the result to `short`.
pub fn write_short_report(
    full: &Path,
    short: &Path,
    style: ReportStyle,
    crc_limit: usize,
) -> Result<()> {
    let text = fs::read_to_string(full)
        .map_err(|e| Error::msg(format!("failed to read {}: {e}", full.display())))?;
    let collapsed = style.short_report(&text, crc_limit);
    tracing::debug!(
        full = %full.display(),
        short = %short.display(),
        full_bytes = text.len(),
        short_bytes = collapsed.len(),
        "short report written"
    );
    fs::write(short, collapsed)
        .map_err(|e| Error::msg(format!("failed to write {}: {e}", short.display())))
}
