use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::tool::{Tool, ToolRunner};

#[derive(Debug, Clone)]
pub struct DumpRequest {
    /// Directory containing vmlinux and the *.ko files.
    pub linux_tree: PathBuf,
    pub dump_path: PathBuf,
    pub symbol_list: Option<PathBuf>,
    pub vmlinux: Option<PathBuf>,
}

/// Dump the ABI of a kernel tree with `abidw`, then tidy it with `abitidy`.
pub fn dump_kernel_abi(req: &DumpRequest, runner: &ToolRunner) -> Result<()> {
    let raw = tempfile::NamedTempFile::new()
        .map_err(|e| Error::msg(format!("failed to create temp file: {e}")))?;

    let mut abidw = runner.command(Tool::Abidw);
    abidw
        // drop sources of non-deterministic output
        .args(["--no-corpus-path", "--no-comp-dir-path"])
        .args(["--type-id-style", "hash"])
        .arg("--linux-tree")
        .arg(&req.linux_tree)
        .arg("--out-file")
        .arg(raw.path());
    if let Some(vmlinux) = &req.vmlinux {
        abidw.arg("--vmlinux").arg(vmlinux);
    }
    if let Some(list) = &req.symbol_list {
        abidw.arg("--kmi-whitelist").arg(list);
    }
    runner.run(abidw)?;

    let mut tidy = runner.command(Tool::Abitidy);
    tidy.args(["--all", "--no-report-untyped", "--input"])
        .arg(raw.path())
        .arg("--output")
        .arg(&req.dump_path);
    runner.run(tidy)?;

    tracing::info!("abi dump written to {}", req.dump_path.display());
    Ok(())
}
