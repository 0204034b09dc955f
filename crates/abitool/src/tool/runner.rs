use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::config::ToolPaths;
use crate::error::{Error, Result};
use crate::log_sanitize::output_tail;

const FAILURE_TAIL_LINES: usize = 20;

/// The external binaries this crate drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Abidiff,
    Stgdiff,
    Abidw,
    Abitidy,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::Abidiff => "abidiff",
            Tool::Stgdiff => "stgdiff",
            Tool::Abidw => "abidw",
            Tool::Abitidy => "abitidy",
        }
    }
}

/// Exit status of a tool run. `code` is `None` when the tool was killed by a
/// signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolExit {
    pub code: Option<i32>,
}

impl ToolExit {
    pub const SUCCESS: ToolExit = ToolExit { code: Some(0) };
}

#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    pub tools: ToolPaths,
    pub dry_run: bool,
}

impl ToolRunner {
    pub fn new(tools: ToolPaths, dry_run: bool) -> Self {
        Self { tools, dry_run }
    }

    pub fn command(&self, tool: Tool) -> Command {
        let program = match tool {
            Tool::Abidiff => &self.tools.abidiff,
            Tool::Stgdiff => &self.tools.stgdiff,
            Tool::Abidw => &self.tools.abidw,
            Tool::Abitidy => &self.tools.abitidy,
        };
        let mut cmd = Command::new(program);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run to completion; any non-zero exit is an error.
    pub fn run(&self, mut cmd: Command) -> Result<()> {
        let shown = describe(&cmd);
        if self.dry_run {
            tracing::info!("DRY-RUN: {shown}");
            return Ok(());
        }
        tracing::info!("running: {shown}");

        let out = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| spawn_error(&cmd, e))?;
        if out.status.success() {
            return Ok(());
        }

        let mut captured = String::from_utf8_lossy(&out.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&out.stderr));
        for line in output_tail(&captured, FAILURE_TAIL_LINES) {
            tracing::warn!("{}: {line}", program_name(&cmd));
        }
        Err(Error::msg(format!("command failed ({}): {shown}", out.status)))
    }

    /// Run with stdout and stderr both written to `report`, which is created
    /// or truncated. The caller interprets the exit status.
    pub fn run_to_file(&self, mut cmd: Command, report: &Path) -> Result<ToolExit> {
        let shown = describe(&cmd);
        if self.dry_run {
            tracing::info!("DRY-RUN: {shown} > {}", report.display());
            return Ok(ToolExit::SUCCESS);
        }
        tracing::info!("running: {shown} > {}", report.display());

        let out = File::create(report)
            .map_err(|e| Error::msg(format!("failed to create {}: {e}", report.display())))?;
        let err = out
            .try_clone()
            .map_err(|e| Error::msg(format!("failed to dup {}: {e}", report.display())))?;
        let status = cmd
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err))
            .status()
            .map_err(|e| spawn_error(&cmd, e))?;

        Ok(ToolExit {
            code: status.code(),
        })
    }
}

fn program_name(cmd: &Command) -> String {
    Path::new(cmd.get_program())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cmd.get_program().to_string_lossy().into_owned())
}

fn spawn_error(cmd: &Command, e: std::io::Error) -> Error {
    Error::msg(format!(
        "failed to run {}: {e}",
        cmd.get_program().to_string_lossy()
    ))
}

/// Shell-like rendering of a command for logs.
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}
