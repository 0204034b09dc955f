use crate::collapse::ReportStyle;
use crate::error::Result;

use super::{
    AbiTool, DiffOutcome, DiffRequest, DiffStatus, ExitFlags, Tool, ToolRunner, log_report_tail,
    write_short_report,
};

/// `abidiff` from libabigail. Stdout and stderr together form the report.
pub struct Libabigail;

impl AbiTool for Libabigail {
    fn name(&self) -> &'static str {
        "libabigail"
    }

    fn style(&self) -> ReportStyle {
        ReportStyle::Abidiff
    }

    fn diff_abi(&self, req: &DiffRequest, runner: &ToolRunner) -> Result<DiffOutcome> {
        tracing::info!(
            "libabigail diffing: {} and {} at {}",
            req.old_dump.display(),
            req.new_dump.display(),
            req.diff_report.display()
        );

        let mut cmd = runner.command(Tool::Abidiff);
        cmd.arg(&req.old_dump).arg(&req.new_dump);
        if !req.full_report {
            cmd.args(["--leaf-changes-only", "--impacted-interfaces"]);
        }
        if let Some(list) = &req.symbol_list {
            cmd.arg("--kmi-whitelist").arg(list);
        }

        let exit = runner.run_to_file(cmd, &req.diff_report)?;
        let status = ExitFlags::LIBABIGAIL
            .classify(Tool::Abidiff.name(), exit)
            .inspect_err(|_| log_report_tail(Tool::Abidiff.name(), &req.diff_report))?;

        let mut reports = vec![req.diff_report.clone()];
        if let Some(short) = &req.short_report {
            if !runner.dry_run {
                write_short_report(&req.diff_report, short, self.style(), req.crc_limit)?;
            }
            reports.push(short.clone());
        }

        Ok(DiffOutcome {
            tool: self.name(),
            abi_changed: status == DiffStatus::Changed,
            reports,
        })
    }
}
