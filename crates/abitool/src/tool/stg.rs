use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::collapse::{ReportStyle, cached_regex};
use crate::error::{Error, Result};

use super::{
    AbiTool, DiffOutcome, DiffRequest, DiffStatus, ExitFlags, Tool, ToolRunner, log_report_tail,
    write_short_report,
};

/// Output formats requested from stgdiff, one file each.
pub const FORMATS: [&str; 4] = ["plain", "flat", "small", "viz"];

/// Lines of a `small` report that do not count as an ABI change:
/// declaration/definition flips, symbol renames and added/removed types.
fn ignorable_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(
        &RE,
        r"^(|type '.*' changed|  (was fully defined, is now only declared|was only declared, is now fully defined)|symbol changed from '.*' to '.*'|  type '.*' was (added|removed))$",
    )
}

/// `stgdiff` from STG. Writes one report per format next to
/// `<diff_report>`, and tool chatter to `<diff_report>.errors`.
pub struct Stg;

impl AbiTool for Stg {
    fn name(&self) -> &'static str {
        "STG"
    }

    fn style(&self) -> ReportStyle {
        ReportStyle::Stgdiff
    }

    fn diff_abi(&self, req: &DiffRequest, runner: &ToolRunner) -> Result<DiffOutcome> {
        let basename = &req.diff_report;

        // Filtered dumps live here until the diff is done.
        let scratch = match &req.symbol_list {
            Some(_) => Some(tempfile::tempdir().map_err(|e| {
                Error::msg(format!("failed to create scratch dir: {e}"))
            })?),
            None => None,
        };

        let mut dumps = [req.old_dump.clone(), req.new_dump.clone()];
        if let (Some(list), Some(dir)) = (&req.symbol_list, &scratch) {
            for (ix, dump) in dumps.iter_mut().enumerate() {
                let cooked = dir.path().join(format!("dump{ix}"));
                tracing::info!("filtering {} to {}", dump.display(), cooked.display());
                let mut cmd = runner.command(Tool::Abitidy);
                cmd.arg("-S")
                    .arg(list)
                    .arg("-i")
                    .arg(&*dump)
                    .arg("-o")
                    .arg(&cooked);
                runner.run(cmd)?;
                *dump = cooked;
            }
        }

        tracing::info!(
            "stgdiff {} {} at {}.*",
            dumps[0].display(),
            dumps[1].display(),
            basename.display()
        );
        let mut cmd = runner.command(Tool::Stgdiff);
        cmd.arg("--abi").arg(&dumps[0]).arg(&dumps[1]);
        let mut reports = Vec::new();
        for f in FORMATS {
            let out = with_suffix(basename, f);
            cmd.arg("--format").arg(f).arg("--output").arg(&out);
            reports.push(out);
        }

        let errors = with_suffix(basename, "errors");
        let exit = runner.run_to_file(cmd, &errors)?;
        let status = ExitFlags::STG
            .classify(Tool::Stgdiff.name(), exit)
            .inspect_err(|_| log_report_tail(Tool::Stgdiff.name(), &errors))?;
        reports.push(errors);

        let small = with_suffix(basename, "small");
        let mut abi_changed = status == DiffStatus::Changed;
        if abi_changed && !runner.dry_run && only_ignorable_changes(&small)? {
            tracing::info!("only ignorable changes in {}", small.display());
            abi_changed = false;
        }

        if let Some(short) = &req.short_report {
            if !runner.dry_run {
                write_short_report(&small, short, self.style(), req.crc_limit)?;
            }
            reports.push(short.clone());
        }

        Ok(DiffOutcome {
            tool: self.name(),
            abi_changed,
            reports,
        })
    }
}

/// `<base>.<suffix>`, keeping any dots already in `base`.
pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = base.as_os_str().to_owned();
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}

/// True when every line of the report is one stgdiff emits for changes that
/// are not real ABI breaks.
pub fn only_ignorable_changes(small: &Path) -> Result<bool> {
    let text = fs::read_to_string(small)
        .map_err(|e| Error::msg(format!("failed to read {}: {e}", small.display())))?;
    Ok(text.lines().all(|line| ignorable_re().is_match(line)))
}
