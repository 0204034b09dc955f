use std::fs;
use std::path::PathBuf;

use abitool::config;

#[test]
fn extends_and_imports_merge_in_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("base.toml"),
        r#"
[diff]
abi_tool = "libabigail"
crc_limit = 10
full_report = true
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("tools.toml"),
        r#"
[tools]
stgdiff = "/opt/stg/bin/stgdiff"
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("abitool.toml"),
        r#"
extends = "base.toml"
imports = ["tools.toml"]

[diff]
abi_tool = "STG"
symbol_list = "android/abi_gki_aarch64"
"#,
    )
    .unwrap();

    let doc = config::load(&dir.path().join("abitool.toml")).unwrap();
    let settings = doc.settings().unwrap();
    assert_eq!(settings.diff.abi_tool, "STG");
    assert_eq!(settings.diff.crc_limit, 10);
    assert!(settings.diff.full_report);
    assert_eq!(
        settings.diff.symbol_list,
        Some(dir.path().join("android/abi_gki_aarch64"))
    );
    assert_eq!(settings.tools.stgdiff, PathBuf::from("/opt/stg/bin/stgdiff"));
    assert_eq!(settings.tools.abidiff, PathBuf::from("abidiff"));
    assert!(doc.value.get("extends").is_none());
    assert!(doc.value.get("imports").is_none());
}

#[test]
fn import_cycle_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.toml"), "extends = \"b.toml\"\n").unwrap();
    fs::write(dir.path().join("b.toml"), "extends = \"a.toml\"\n").unwrap();

    let err = config::load(&dir.path().join("a.toml")).unwrap_err();
    assert!(err.to_string().contains("cycle"), "{err}");
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(config::load_or_default(Some(&missing)).is_err());
}

#[test]
fn table_level_imports_are_inlined() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("shared")).unwrap();
    fs::write(
        dir.path().join("shared/tools.toml"),
        "stgdiff = \"/opt/stg/bin/stgdiff\"\nabitidy = \"/opt/stg/bin/abitidy\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("shared/dump.toml"),
        "symbol_list = \"abi_symbols\"\nlinux_tree = \"/src/linux\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("abitool.toml"),
        r#"
[tools]
imports = ["shared/tools.toml"]
abitidy = "/usr/local/bin/abitidy"

[dump]
imports = ["shared/dump.toml"]
vmlinux = "out/vmlinux"
"#,
    )
    .unwrap();

    let doc = config::load(&dir.path().join("abitool.toml")).unwrap();
    let tools = doc.value_path("tools").unwrap().as_table().unwrap();
    assert!(!tools.contains_key("imports"));

    let settings = doc.settings().unwrap();
    assert_eq!(settings.tools.stgdiff, PathBuf::from("/opt/stg/bin/stgdiff"));
    // The importing table's own keys win over the import.
    assert_eq!(settings.tools.abitidy, PathBuf::from("/usr/local/bin/abitidy"));
    assert_eq!(settings.tools.abidiff, PathBuf::from("abidiff"));

    assert_eq!(
        settings.dump.symbol_list,
        Some(dir.path().join("shared/abi_symbols"))
    );
    assert_eq!(settings.dump.linux_tree, Some(PathBuf::from("/src/linux")));
    assert_eq!(settings.dump.vmlinux, Some(dir.path().join("out/vmlinux")));
}
