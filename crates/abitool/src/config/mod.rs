use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use toml::Value;

use crate::collapse::DEFAULT_CRC_LIMIT;
use crate::error::{Error, Result};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "abitool.toml";

#[derive(Debug, Clone)]
pub struct ConfigDoc {
    pub path: PathBuf,
    pub value: Value,
}

impl ConfigDoc {
    pub fn empty() -> Self {
        Self {
            path: PathBuf::from("<defaults>"),
            value: Value::Table(Default::default()),
        }
    }

    pub fn value_path(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return Some(&self.value);
        }

        let mut cur = &self.value;
        for seg in path.split('.') {
            let tbl = cur.as_table()?;
            cur = tbl.get(seg)?;
        }
        Some(cur)
    }

    pub fn deserialize_path<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let Some(v) = self.value_path(path) else {
            return Ok(None);
        };
        let owned = v.clone();
        let parsed = owned.try_into().map_err(|e| {
            Error::msg(format!(
                "failed to deserialize config at '{}' in {}: {e}",
                path,
                self.path.display()
            ))
        })?;
        Ok(Some(parsed))
    }

    pub fn settings(&self) -> Result<Settings> {
        Ok(Settings {
            diff: self.deserialize_path("diff")?.unwrap_or_default(),
            dump: self.deserialize_path("dump")?.unwrap_or_default(),
            tools: self.deserialize_path("tools")?.unwrap_or_default(),
        })
    }
}

/// Typed view of a resolved config document.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub diff: DiffConfig,
    pub dump: DumpConfig,
    pub tools: ToolPaths,
}

fn default_abi_tool() -> String {
    "libabigail".into()
}

fn default_crc_limit() -> usize {
    DEFAULT_CRC_LIMIT
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    #[serde(default = "default_abi_tool")]
    pub abi_tool: String,
    #[serde(default = "default_crc_limit")]
    pub crc_limit: usize,
    pub full_report: bool,
    pub symbol_list: Option<PathBuf>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            abi_tool: default_abi_tool(),
            crc_limit: default_crc_limit(),
            full_report: false,
            symbol_list: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    pub linux_tree: Option<PathBuf>,
    pub vmlinux: Option<PathBuf>,
    pub symbol_list: Option<PathBuf>,
}

/// Executables used for the external tools. Bare names are resolved on PATH.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub abidiff: PathBuf,
    pub stgdiff: PathBuf,
    pub abidw: PathBuf,
    pub abitidy: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            abidiff: "abidiff".into(),
            stgdiff: "stgdiff".into(),
            abidw: "abidw".into(),
            abitidy: "abitidy".into(),
        }
    }
}

fn merge_values(base: &mut Value, child: Value) {
    match (base, child) {
        (Value::Table(base_tbl), Value::Table(child_tbl)) => {
            for (k, v) in child_tbl {
                match base_tbl.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (base_slot, child_val) => {
            *base_slot = child_val;
        }
    }
}

fn resolve_ref_path(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        p
    } else {
        from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
    }
}

const PATH_KEYS: [(&str, &[&str]); 2] = [
    ("diff", &["symbol_list"]),
    ("dump", &["linux_tree", "vmlinux", "symbol_list"]),
];

fn absolutize_section(from_file: &Path, section: &str, tbl: &mut toml::value::Table) {
    let Some((_, keys)) = PATH_KEYS.iter().find(|(name, _)| *name == section) else {
        return;
    };
    for key in *keys {
        if let Some(Value::String(s)) = tbl.get_mut(*key) {
            *s = resolve_ref_path(from_file, s).display().to_string();
        }
    }
}

/// Relative paths in path-valued settings are taken relative to the file
/// that sets them, so shared configs can live next to their symbol lists.
fn absolutize_paths(from_file: &Path, value: &mut Value) {
    let Some(root) = value.as_table_mut() else {
        return;
    };
    for (section, v) in root.iter_mut() {
        if let Some(tbl) = v.as_table_mut() {
            absolutize_section(from_file, section, tbl);
        }
    }
}

fn parse_imports(path: &Path, table: &toml::value::Table) -> Result<Vec<String>> {
    let Some(arr) = table.get("imports").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for v in arr {
        let Some(s) = v.as_str() else {
            return Err(Error::msg(format!(
                "invalid imports entry in {} (expected string)",
                path.display()
            )));
        };
        let s = s.trim();
        if !s.is_empty() {
            out.push(s.to_string());
        }
    }
    Ok(out)
}

/// Inline `imports` found in a table below the root. The imported file's
/// root keys land in this table; `section` names the top-level table they
/// belong to so its path-valued keys resolve against the imported file.
fn inline_imports_in_value(
    file_path: &Path,
    section: Option<&str>,
    value: &mut Value,
    stack: &mut HashSet<PathBuf>,
) -> Result<()> {
    let Value::Table(tbl) = value else {
        return Ok(());
    };

    let imports = parse_imports(file_path, tbl)?;
    tbl.remove("imports");
    if !imports.is_empty() {
        let mut acc = Value::Table(Default::default());
        for imp in imports {
            let imp_path = resolve_ref_path(file_path, &imp);
            let mut loaded = load_value_inner(&imp_path, stack)?;
            if let (Some(section), Some(loaded_tbl)) = (section, loaded.as_table_mut()) {
                absolutize_section(&imp_path, section, loaded_tbl);
            }
            merge_values(&mut acc, loaded);
        }
        merge_values(&mut acc, Value::Table(std::mem::take(tbl)));
        if let Value::Table(merged) = acc {
            *tbl = merged;
        }
    }

    for (_, v) in tbl.iter_mut() {
        inline_imports_in_value(file_path, None, v, stack)?;
    }
    Ok(())
}

fn load_value_inner(path: &Path, stack: &mut HashSet<PathBuf>) -> Result<Value> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !stack.insert(canonical.clone()) {
        return Err(Error::msg(format!(
            "config import cycle detected at {}",
            canonical.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read config {}: {e}", path.display())))?;
    let mut value: Value = toml::from_str(&data)
        .map_err(|e| Error::msg(format!("TOML parse error in {}: {e}", path.display())))?;

    let mut out = Value::Table(Default::default());
    if let Some(ext) = value.get("extends").and_then(Value::as_str) {
        let base_path = resolve_ref_path(path, ext);
        out = load_value_inner(&base_path, stack)?;
    }

    absolutize_paths(path, &mut value);

    if let Some(tbl) = value.as_table_mut() {
        tbl.remove("extends");
        let imports = parse_imports(path, tbl)?;
        tbl.remove("imports");
        for imp in imports {
            let loaded = load_value_inner(&resolve_ref_path(path, &imp), stack)?;
            merge_values(&mut out, loaded);
        }

        // Section-level imports.
        for (section, v) in tbl.iter_mut() {
            inline_imports_in_value(path, Some(section.as_str()), v, stack)?;
        }
    }

    merge_values(&mut out, value);

    stack.remove(&canonical);
    Ok(out)
}

/// Load a config file, following `extends` (single parent) and `imports` at
/// the root or inside any table. Later sources win: parent, then imports in
/// order, then the file itself.
pub fn load(path: &Path) -> Result<ConfigDoc> {
    let mut stack = HashSet::<PathBuf>::new();
    let value = load_value_inner(path, &mut stack)?;
    Ok(ConfigDoc {
        path: path.to_path_buf(),
        value,
    })
}

/// Load the explicit config, else `abitool.toml` if present, else defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<ConfigDoc> {
    if let Some(p) = explicit {
        return load(p);
    }
    let fallback = Path::new(DEFAULT_CONFIG_FILE);
    if fallback.is_file() {
        tracing::debug!(path = %fallback.display(), "using default config file");
        return load(fallback);
    }
    Ok(ConfigDoc::empty())
}
