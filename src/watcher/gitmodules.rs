//! Parse and render `.gitmodules` definition blobs
//!
//! The parser is forgiving: lines it cannot make sense of are logged
//! and skipped, and sections missing `path` or `url` never become
//! submodules. The renderer is the opposite, producing one canonical
//! form so reconciliation can compare blobs by meaning, not bytes.

use std::collections::BTreeMap;

use tracing::warn;

/// One complete `[submodule "<name>"]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitmodulesEntry {
    pub name: String,
    pub path: String,
    pub url: String,
}

/// Parse `.gitmodules` content into the sections that carry both a
/// `path` and a `url`.
pub fn parse(content: &str) -> Vec<GitmodulesEntry> {
    let mut entries = Vec::new();
    let mut current: Option<(String, BTreeMap<String, String>)> = None;

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            flush(current.take(), &mut entries);
            match submodule_name(line) {
                Some(name) => current = Some((name, BTreeMap::new())),
                // Some other section type; skip its values.
                None => current = None,
            }
        } else if let Some((key, value)) = line.split_once('=') {
            match current.as_mut() {
                Some((_, values)) => {
                    values.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
                }
                None => warn!(line = %raw, "gitmodules: value outside a submodule section"),
            }
        } else {
            warn!(line = %raw, "gitmodules: unparsable line");
        }
    }
    flush(current.take(), &mut entries);
    entries
}

/// Submodule name out of a `[submodule "name"]` header
fn submodule_name(line: &str) -> Option<String> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    let quoted = inner.strip_prefix("submodule")?.trim();
    let name = quoted.strip_prefix('"')?.strip_suffix('"')?;
    Some(name.to_string())
}

fn flush(section: Option<(String, BTreeMap<String, String>)>, entries: &mut Vec<GitmodulesEntry>) {
    let Some((name, values)) = section else {
        return;
    };
    match (values.get("path"), values.get("url")) {
        (Some(path), Some(url)) => entries.push(GitmodulesEntry {
            name,
            path: path.clone(),
            url: url.clone(),
        }),
        _ => warn!(section = %name, "gitmodules: section is missing path or url"),
    }
}

/// Render a canonical `.gitmodules` blob: sections sorted by path, the
/// path doubling as the section name.
pub fn render<'a>(submodules: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut sorted: Vec<(&str, &str)> = submodules.into_iter().collect();
    sorted.sort_by_key(|(path, _)| *path);

    let mut out = String::new();
    for (path, url) in sorted {
        out.push_str(&format!(
            "[submodule \"{path}\"]\n\tpath = {path}\n\turl = {url}\n"
        ));
    }
    out
}
