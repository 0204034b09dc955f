#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use abitool::config::ToolPaths;
use abitool::tool::{DiffRequest, ToolRunner, get_abi_tool};

fn write_script(path: &Path, body: &str) -> PathBuf {
    fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    path.to_path_buf()
}

/// A fake abidiff that prints `report` and exits with `code`.
fn fake_abidiff(dir: &Path, report: &str, code: i32) -> ToolPaths {
    fs::write(dir.join("abidiff.out"), report).unwrap();
    let script = write_script(
        &dir.join("abidiff"),
        &format!(
            "echo \"$@\" > {dir}/abidiff.args\ncat {dir}/abidiff.out\nexit {code}\n",
            dir = dir.display()
        ),
    );
    ToolPaths {
        abidiff: script,
        ..ToolPaths::default()
    }
}

/// A fake stgdiff that writes `small` into every `--output` file.
fn fake_stg(dir: &Path, small: &str, code: i32) -> ToolPaths {
    fs::write(dir.join("small.txt"), small).unwrap();
    let stgdiff = write_script(
        &dir.join("stgdiff"),
        &format!(
            r#"echo "$@" > {dir}/stgdiff.args
while [ "$#" -gt 0 ]; do
  if [ "$1" = "--output" ]; then cat {dir}/small.txt > "$2"; shift; fi
  shift
done
echo "stgdiff: comparing" >&2
exit {code}
"#,
            dir = dir.display()
        ),
    );
    let abitidy = write_script(
        &dir.join("abitidy"),
        &format!(
            r#"echo "$@" >> {dir}/abitidy.args
while [ "$#" -gt 0 ]; do
  case "$1" in
    -i) src="$2"; shift ;;
    -o) dst="$2"; shift ;;
  esac
  shift
done
cp "$src" "$dst"
"#,
            dir = dir.display()
        ),
    );
    ToolPaths {
        stgdiff,
        abitidy,
        ..ToolPaths::default()
    }
}

fn request(dir: &Path) -> DiffRequest {
    fs::write(dir.join("old.xml"), "<abi-corpus/>\n").unwrap();
    fs::write(dir.join("new.xml"), "<abi-corpus/>\n").unwrap();
    DiffRequest::new(dir.join("old.xml"), dir.join("new.xml"), dir.join("abi.report"))
}

const ABIDIFF_REPORT: &str = "\
Leaf changes summary: 4 artifacts changed
Changed leaf types summary: 1 leaf type changed

'struct s at s.h:1:1' changed:
  type size changed from 64 to 128 (in bits)
  'int a' offset changed from 0 to 64 (in bits) (by +64 bits)
  'int b' offset changed from 32 to 96 (in bits) (by +64 bits)
  2 impacted interfaces:
    function void f(s*)
    function void g(s*)

";

#[test]
fn libabigail_change_writes_full_and_short_reports() {
    let dir = tempfile::tempdir().unwrap();
    let tools = fake_abidiff(dir.path(), ABIDIFF_REPORT, 4);
    let mut req = request(dir.path());
    req.short_report = Some(dir.path().join("abi.short"));
    req.symbol_list = Some(dir.path().join("symbols"));

    let tool = get_abi_tool("libabigail").unwrap();
    let outcome = tool.diff_abi(&req, &ToolRunner::new(tools, false)).unwrap();
    assert!(outcome.abi_changed);
    assert_eq!(
        outcome.reports,
        vec![dir.path().join("abi.report"), dir.path().join("abi.short")]
    );

    let full = fs::read_to_string(dir.path().join("abi.report")).unwrap();
    assert_eq!(full, ABIDIFF_REPORT);

    let short = fs::read_to_string(dir.path().join("abi.short")).unwrap();
    assert!(short.contains("  2 ('int a' .. 'int b') offsets changed (by +64 bits)\n"));
    assert!(short.contains("  2 impacted interfaces\n"));
    assert!(!short.contains("function void f(s*)"));

    let args = fs::read_to_string(dir.path().join("abidiff.args")).unwrap();
    assert!(args.contains("--leaf-changes-only --impacted-interfaces"), "{args}");
    assert!(args.contains("--kmi-whitelist"), "{args}");
}

#[test]
fn libabigail_full_report_skips_leaf_flags() {
    let dir = tempfile::tempdir().unwrap();
    let tools = fake_abidiff(dir.path(), "", 0);
    let mut req = request(dir.path());
    req.full_report = true;

    let outcome = get_abi_tool("libabigail")
        .unwrap()
        .diff_abi(&req, &ToolRunner::new(tools, false))
        .unwrap();
    assert!(!outcome.abi_changed);
    let args = fs::read_to_string(dir.path().join("abidiff.args")).unwrap();
    assert!(!args.contains("--leaf-changes-only"), "{args}");
}

#[test]
fn libabigail_usage_error_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let tools = fake_abidiff(dir.path(), "abidiff: unknown option\n", 2);
    let req = request(dir.path());

    let err = get_abi_tool("libabigail")
        .unwrap()
        .diff_abi(&req, &ToolRunner::new(tools, false))
        .unwrap_err();
    assert!(err.to_string().contains("exit code 2"), "{err}");
}

#[test]
fn stg_only_ignorable_changes_are_not_an_abi_change() {
    let dir = tempfile::tempdir().unwrap();
    let small = "type 'struct foo' changed\n  was fully defined, is now only declared\n\n";
    let tools = fake_stg(dir.path(), small, 4);
    let req = request(dir.path());

    let outcome = get_abi_tool("STG")
        .unwrap()
        .diff_abi(&req, &ToolRunner::new(tools, false))
        .unwrap();
    assert!(!outcome.abi_changed);
    for f in ["plain", "flat", "small", "viz"] {
        assert!(dir.path().join(format!("abi.report.{f}")).is_file(), "{f}");
    }
    let errors = fs::read_to_string(dir.path().join("abi.report.errors")).unwrap();
    assert_eq!(errors, "stgdiff: comparing\n");
}

#[test]
fn stg_filters_dumps_and_collapses_small_report() {
    let dir = tempfile::tempdir().unwrap();
    let mut small = String::new();
    for name in ["a", "b", "c", "d"] {
        small.push_str(&format!(
            "symbol '{name}' changed\n  CRC changed from 0x1 to 0x2\n\n"
        ));
    }
    let tools = fake_stg(dir.path(), &small, 4);
    let mut req = request(dir.path());
    req.symbol_list = Some(dir.path().join("symbols"));
    req.short_report = Some(dir.path().join("abi.short"));

    let outcome = get_abi_tool("STG")
        .unwrap()
        .diff_abi(&req, &ToolRunner::new(tools, false))
        .unwrap();
    assert!(outcome.abi_changed);

    let tidy_args = fs::read_to_string(dir.path().join("abitidy.args")).unwrap();
    assert_eq!(tidy_args.lines().count(), 2, "{tidy_args}");
    assert!(tidy_args.lines().all(|l| l.starts_with("-S ")), "{tidy_args}");

    let stg_args = fs::read_to_string(dir.path().join("stgdiff.args")).unwrap();
    assert!(stg_args.contains("dump0"), "{stg_args}");
    assert!(stg_args.contains("dump1"), "{stg_args}");
    assert!(!stg_args.contains("old.xml"), "{stg_args}");

    let short = fs::read_to_string(dir.path().join("abi.short")).unwrap();
    assert!(short.ends_with("... 1 omitted; 4 symbols have only CRC changes\n\n"));
    assert!(!short.contains("symbol 'd'"));
}

#[test]
fn stg_hard_error_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let tools = fake_stg(dir.path(), "", 1);
    let req = request(dir.path());

    assert!(
        get_abi_tool("STG")
            .unwrap()
            .diff_abi(&req, &ToolRunner::new(tools, false))
            .is_err()
    );
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let tools = fake_abidiff(dir.path(), ABIDIFF_REPORT, 4);
    let mut req = request(dir.path());
    req.short_report = Some(dir.path().join("abi.short"));

    let outcome = get_abi_tool("libabigail")
        .unwrap()
        .diff_abi(&req, &ToolRunner::new(tools, true))
        .unwrap();
    assert!(!outcome.abi_changed);
    assert!(!dir.path().join("abi.report").exists());
    assert!(!dir.path().join("abi.short").exists());
}
