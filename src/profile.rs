//! Shell profile snippet holding persisted exports.
//!
//! Login shells source `/etc/profile.d/*.sh`, so anything the provisioner
//! wants to outlive the run (the tool on `PATH`, the prompt switch) is
//! written there as `export` lines.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

const HEADER: &str = "# Managed by devbox. Do not edit.\n";

/// `export NAME="value"` with the value taken literally.
pub fn export_line(name: &str, value: &str) -> String {
    format!("export {}=\"{}\"", name, escape(value))
}

/// `export PATH="<dir>:$PATH"`.
pub fn path_line(dir: &Path) -> String {
    format!("export PATH=\"{}:$PATH\"", escape(&dir.to_string_lossy()))
}

/// Append a line to the profile unless it's already there.
///
/// Returns `true` if the line was written.
pub fn ensure_line(profile: &Path, line: &str) -> Result<bool> {
    let content = if profile.exists() {
        fs::read_to_string(profile)
            .with_context(|| format!("reading {}", profile.display()))?
    } else {
        String::new()
    };

    if content.lines().any(|l| l == line) {
        return Ok(false);
    }

    if let Some(parent) = profile.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(profile)
        .with_context(|| format!("opening {}", profile.display()))?;
    if content.is_empty() {
        file.write_all(HEADER.as_bytes())?;
    } else if !content.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{}", line)?;

    Ok(true)
}

/// Parse the `export NAME="value"` lines of a profile.
///
/// Values are returned unescaped; `$PATH` in a path line is kept verbatim.
pub fn read_exports(profile: &Path) -> Result<Vec<(String, String)>> {
    let content =
        fs::read_to_string(profile).with_context(|| format!("reading {}", profile.display()))?;

    Ok(content.lines().filter_map(parse_export).collect())
}

/// Look up one exported variable.
pub fn exported_value(profile: &Path, name: &str) -> Result<Option<String>> {
    Ok(read_exports(profile)?
        .into_iter()
        .rev()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value))
}

fn parse_export(line: &str) -> Option<(String, String)> {
    let rest = line.trim().strip_prefix("export ")?;
    let (name, value) = rest.split_once('=')?;
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .map(unescape)
        .unwrap_or_else(|| value.to_string());
    Some((name.trim().to_string(), value))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '`' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
