use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::try_join_all;
use gobox_contracts::{DEFAULT_DIR_MODE, S_IFDIR, S_IFMT};
use gobox_vfs::{path, Progress, Vfs};
use zip::ZipArchive;

use crate::error::ArchiveError;

/// Share of the progress range spent on decoding the central directory.
pub(crate) const DECODE_SHARE: f64 = 0.2;

/// Materializes every entry of a ZIP archive under `dest`.
///
/// Entries are started together and interleaved on the current task; the
/// call returns once all of them finished or the first one failed. Entries
/// already written stay in place on failure.
pub async fn import_zip(
    fs: &Vfs,
    bytes: &[u8],
    dest: &str,
    progress: &Progress,
) -> Result<(), ArchiveError> {
    let dest = path::normalize(&fs.resolve(dest));
    let archive = ZipArchive::new(Cursor::new(bytes)).map_err(ArchiveError::decode)?;
    let total = archive.len();
    tracing::debug!(target: "gobox::archive", dest = %dest, entries = total, "importing archive");
    progress.report(DECODE_SHARE);

    fs.mkdir_all(&dest, DEFAULT_DIR_MODE)?;

    let done = AtomicUsize::new(0);
    let entries = (0..total).map(|index| {
        let archive = archive.clone();
        let dest = dest.as_str();
        let done = &done;
        async move {
            tokio::task::yield_now().await;
            import_entry(fs, archive, index, dest)?;
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report(DECODE_SHARE + (1.0 - DECODE_SHARE) * n as f64 / total as f64);
            Ok::<(), ArchiveError>(())
        }
    });
    try_join_all(entries).await?;

    progress.report(1.0);
    Ok(())
}

fn import_entry(
    fs: &Vfs,
    mut archive: ZipArchive<Cursor<&[u8]>>,
    index: usize,
    dest: &str,
) -> Result<(), ArchiveError> {
    let mut entry = archive.by_index(index).map_err(ArchiveError::decode)?;
    let rel = sanitize_entry_name(entry.name())?;
    let mode = entry.unix_mode();
    let is_dir = match mode {
        Some(mode) => mode & S_IFMT == S_IFDIR,
        None => entry.is_dir(),
    };
    let target = if rel.is_empty() {
        dest.to_string()
    } else {
        path::join(dest, &rel)
    };

    if is_dir {
        let perm = mode.map_or(DEFAULT_DIR_MODE, |m| m & 0o7777);
        fs.mkdir_all(&target, perm)?;
        return Ok(());
    }
    if rel.is_empty() {
        return Err(ArchiveError::UnsafeName(entry.name().to_string()));
    }

    let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry.read_to_end(&mut data).map_err(|err| {
        ArchiveError::Decode(format!("{}: {err}", entry.name()))
    })?;
    drop(entry);

    if let Some((parent, _)) = path::split_parent(&target) {
        fs.mkdir_all(parent, DEFAULT_DIR_MODE)?;
    }
    fs.write_file(&target, &data)?;
    if let Some(mode) = mode {
        fs.chmod(&target, mode & 0o7777)?;
    }
    tracing::trace!(target: "gobox::archive", path = %target, len = data.len(), "imported file");
    Ok(())
}

/// Splits an entry name into safe relative segments: empty and `.` segments
/// are dropped, `..` is refused.
pub(crate) fn sanitize_entry_name(name: &str) -> Result<String, ArchiveError> {
    let mut out = String::with_capacity(name.len());
    for seg in name.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => return Err(ArchiveError::UnsafeName(name.to_string())),
            seg => {
                if !out.is_empty() {
                    out.push(path::SEP);
                }
                out.push_str(seg);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_are_sanitized() {
        assert_eq!(sanitize_entry_name("a/./b//c.txt").unwrap(), "a/b/c.txt");
        assert_eq!(sanitize_entry_name("/abs/x").unwrap(), "abs/x");
        assert_eq!(sanitize_entry_name("dir/").unwrap(), "dir");
        assert_eq!(sanitize_entry_name("./").unwrap(), "");
        assert!(matches!(
            sanitize_entry_name("a/../../etc/passwd"),
            Err(ArchiveError::UnsafeName(_))
        ));
    }
}
