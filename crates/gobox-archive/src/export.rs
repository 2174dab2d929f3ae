use std::io::{Cursor, Write};

use gobox_vfs::{path, Progress, Vfs};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;

/// Share of the progress range spent reading files; the rest is serialization.
const READ_SHARE: f64 = 0.8;

/// Packs the subtrees at `roots` into a ZIP archive.
///
/// With a single root, entry names are relative to it (a lone file keeps its
/// base name). With several roots, absolute paths become the entry names and
/// colliding names are the caller's problem.
pub async fn export_zip(
    fs: &Vfs,
    roots: &[String],
    progress: &Progress,
) -> Result<Vec<u8>, ArchiveError> {
    let roots: Vec<String> = roots
        .iter()
        .map(|r| path::normalize(&fs.resolve(r)))
        .collect();

    let mut total = 0usize;
    for root in &roots {
        fs.walk(root, |_, st, _| {
            if st.is_file() {
                total += 1;
            }
            true
        })?;
    }
    tracing::debug!(target: "gobox::archive", roots = roots.len(), files = total, "exporting archive");

    let single = roots.len() == 1;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut done = 0usize;

    for root in &roots {
        let mut entries: Vec<(String, u32, bool)> = Vec::new();
        fs.walk(root, |p, st, entering| {
            if entering && (st.is_directory() || st.is_file()) {
                entries.push((p.to_string(), st.mode & 0o7777, st.is_directory()));
            }
            true
        })?;

        for (p, perm, is_dir) in entries {
            let name = entry_name(root, &p, is_dir, single);
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(perm);
            if is_dir {
                if !name.is_empty() {
                    writer
                        .add_directory(name, options)
                        .map_err(ArchiveError::Encode)?;
                }
                continue;
            }

            let data = fs.read_file(&p)?;
            writer.start_file(name, options).map_err(ArchiveError::Encode)?;
            writer
                .write_all(&data)
                .map_err(|err| ArchiveError::Encode(err.into()))?;
            done += 1;
            progress.report(READ_SHARE * done as f64 / total as f64);
            tokio::task::yield_now().await;
        }
    }

    let bytes = writer.finish().map_err(ArchiveError::Encode)?.into_inner();
    progress.report(1.0);
    Ok(bytes)
}

fn entry_name(root: &str, p: &str, is_dir: bool, single: bool) -> String {
    if !single {
        return p.to_string();
    }
    let rel = p
        .strip_prefix(root)
        .unwrap_or(p)
        .trim_start_matches(path::SEP);
    if rel.is_empty() && !is_dir {
        return path::base_name(p).to_string();
    }
    rel.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_root_names_are_relative() {
        assert_eq!(entry_name("/proj", "/proj/a/b.go", false, true), "a/b.go");
        assert_eq!(entry_name("/proj", "/proj", true, true), "");
        assert_eq!(entry_name("/", "/etc/x", false, true), "etc/x");
        assert_eq!(entry_name("/proj/main.go", "/proj/main.go", false, true), "main.go");
    }

    #[test]
    fn multiple_roots_keep_absolute_names() {
        assert_eq!(entry_name("/a", "/a/f", false, false), "/a/f");
    }
}
