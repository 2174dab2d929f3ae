//! Path arithmetic over `/`-separated virtual paths.

pub const SEP: char = '/';
pub const ROOT: &str = "/";

pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEP)
}

/// Resolves `path` against `cwd`.
///
/// Absolute paths pass through unchanged; relative paths become
/// `normalize(cwd + separator-if-needed + path)`.
pub fn resolve(cwd: &str, path: &str) -> String {
    if is_absolute(path) {
        return path.to_string();
    }
    normalize(&join(cwd, path))
}

/// Joins without normalizing, inserting a separator only when `base` lacks one.
pub fn join(base: &str, name: &str) -> String {
    let mut out = String::with_capacity(base.len() + name.len() + 1);
    out.push_str(base);
    if !base.is_empty() && !base.ends_with(SEP) {
        out.push(SEP);
    }
    out.push_str(name);
    out
}

/// Collapses repeated separators and `.`/`..` segments. `..` never climbs
/// above the root. The result has no trailing separator unless it is the root.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split(SEP) {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return ROOT.to_string();
    }
    let mut out = String::with_capacity(path.len());
    for p in parts {
        out.push(SEP);
        out.push_str(p);
    }
    out
}

/// Splits an absolute normalized path into `(parent, name)`. The root has no parent.
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches(SEP);
    let idx = trimmed.rfind(SEP)?;
    let name = &trimmed[idx + 1..];
    if name.is_empty() {
        return None;
    }
    let parent = if idx == 0 { ROOT } else { &trimmed[..idx] };
    Some((parent, name))
}

pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEP);
    match trimmed.rfind(SEP) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Path segments of `path`, skipping empty and `.` segments but keeping `..`.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEP).filter(|s| !s.is_empty() && *s != ".")
}
