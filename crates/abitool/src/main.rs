use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use abitool::collapse::ReportStyle;
use abitool::config::{self, Settings};
use abitool::dump::{DumpRequest, dump_kernel_abi};
use abitool::tool::{DiffRequest, ToolRunner, get_abi_tool};
use abitool::{Error, Result};

/// Exit code of `diff --fail-on-change` when the ABI changed.
const EXIT_ABI_CHANGED: i32 = 4;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Config file (TOML). Defaults to ./abitool.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter, EnvFilter syntax; RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Collapse a full diff report into a short report
    Collapse {
        /// Which tool produced the report
        #[arg(long, value_enum, default_value_t = ReportStyle::Abidiff)]
        style: ReportStyle,
        /// CRC-only changes kept per section (default from config)
        #[arg(long)]
        limit: Option<usize>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Full report (default: stdin)
        input: Option<PathBuf>,
    },
    /// Diff two ABI dumps with abidiff or stgdiff
    Diff(DiffArgs),
    /// Dump the ABI of a kernel tree with abidw + abitidy
    Dump {
        /// Directory containing vmlinux and the modules
        #[arg(long)]
        linux_tree: Option<PathBuf>,
        /// Where to write the tidied dump
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        vmlinux: Option<PathBuf>,
        /// Restrict the dump to the symbols in this list
        #[arg(long)]
        symbol_list: Option<PathBuf>,
        /// Print commands without running them
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the fully-resolved config (after extends/imports)
    Resolve,
}

#[derive(Debug, ClapArgs)]
struct DiffArgs {
    #[arg(long)]
    old: PathBuf,
    #[arg(long)]
    new: PathBuf,
    /// Full report path (basename of the per-format reports for STG)
    #[arg(long)]
    report: PathBuf,
    /// Also write a collapsed report here
    #[arg(long)]
    short_report: Option<PathBuf>,
    /// Only diff the symbols in this list
    #[arg(long)]
    symbol_list: Option<PathBuf>,
    /// Ask abidiff for the full (non leaf-only) report
    #[arg(long)]
    full_report: bool,
    /// libabigail or STG (default from config)
    #[arg(long)]
    abi_tool: Option<String>,
    /// CRC-only changes kept per section in the short report
    #[arg(long)]
    crc_limit: Option<usize>,
    /// Exit with status 4 when the ABI changed
    #[arg(long)]
    fail_on_change: bool,
    /// Print the outcome as JSON on stdout
    #[arg(long)]
    json: bool,
    /// Print commands without running them
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    abitool::logging::init(&args.log_level, args.log_json);

    let doc = config::load_or_default(args.config.as_deref())?;
    match args.cmd {
        Command::Collapse {
            style,
            limit,
            output,
            input,
        } => {
            let settings = doc.settings()?;
            cmd_collapse(
                style,
                limit.unwrap_or(settings.diff.crc_limit),
                input.as_deref(),
                output.as_deref(),
            )
        }
        Command::Diff(diff) => cmd_diff(&doc.settings()?, diff),
        Command::Dump {
            linux_tree,
            out,
            vmlinux,
            symbol_list,
            dry_run,
        } => {
            let settings = doc.settings()?;
            let linux_tree = linux_tree
                .or(settings.dump.linux_tree)
                .ok_or_else(|| Error::msg("--linux-tree is required (or [dump].linux_tree)"))?;
            let req = DumpRequest {
                linux_tree,
                dump_path: out,
                symbol_list: symbol_list.or(settings.dump.symbol_list),
                vmlinux: vmlinux.or(settings.dump.vmlinux),
            };
            dump_kernel_abi(&req, &ToolRunner::new(settings.tools, dry_run))
        }
        Command::Resolve => {
            // Best-effort pretty print of resolved config.
            let s = toml::to_string_pretty(&doc.value).unwrap_or_else(|_| format!("{:?}", doc.value));
            print!("{s}");
            Ok(())
        }
    }
}

fn cmd_collapse(
    style: ReportStyle,
    limit: usize,
    input: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let text = match input {
        Some(p) => std::fs::read_to_string(p)
            .map_err(|e| Error::msg(format!("failed to read {}: {e}", p.display())))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let short = style.short_report(&text, limit);
    match output {
        Some(p) => std::fs::write(p, short)
            .map_err(|e| Error::msg(format!("failed to write {}: {e}", p.display())))?,
        None => std::io::stdout().write_all(short.as_bytes())?,
    }
    Ok(())
}

fn cmd_diff(settings: &Settings, args: DiffArgs) -> Result<()> {
    let tool_name = args
        .abi_tool
        .unwrap_or_else(|| settings.diff.abi_tool.clone());
    let tool = get_abi_tool(&tool_name)?;

    let mut req = DiffRequest::new(args.old, args.new, args.report);
    req.short_report = args.short_report;
    req.symbol_list = args.symbol_list.or_else(|| settings.diff.symbol_list.clone());
    req.full_report = args.full_report || settings.diff.full_report;
    req.crc_limit = args.crc_limit.unwrap_or(settings.diff.crc_limit);

    let runner = ToolRunner::new(settings.tools.clone(), args.dry_run);
    let outcome = tool.diff_abi(&req, &runner)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.abi_changed {
        println!("ABI changed; see {}", req.diff_report.display());
    } else {
        println!("no ABI change");
    }

    if outcome.abi_changed && args.fail_on_change {
        std::process::exit(EXIT_ABI_CHANGED);
    }
    Ok(())
}
