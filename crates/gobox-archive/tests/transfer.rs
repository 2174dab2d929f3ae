use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use gobox_archive::{export_zip, import_zip, ArchiveError};
use gobox_vfs::{ErrorKind, Progress, Vfs, VfsConfig};

fn instance(id: &str) -> Vfs {
    Vfs::new(id, &VfsConfig::default())
}

/// (relative path, content) pairs below `root`; directories carry `None`.
fn snapshot(fs: &Vfs, root: &str) -> BTreeSet<(String, Option<Vec<u8>>)> {
    let mut out = BTreeSet::new();
    fs.walk(root, |p, st, entering| {
        if entering && p != root {
            let rel = p[root.len()..].trim_start_matches('/').to_string();
            let content = st.is_file().then(|| fs.read_file(p).expect("read").to_vec());
            out.insert((rel, content));
        }
        true
    })
    .expect("walk");
    out
}

fn recording_progress() -> (Progress, Arc<Mutex<Vec<f64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (Progress::new(move |p| sink.lock().unwrap().push(p)), seen)
}

fn populate(fs: &Vfs) {
    fs.mkdir_all("/proj/pkg/inner", 0o755).expect("mkdir nested");
    fs.mkdir("/proj/empty", 0o755).expect("mkdir empty");
    fs.write_file("/proj/main.go", b"package main\n").expect("write main");
    fs.write_file("/proj/pkg/lib.go", b"package pkg\n").expect("write lib");
    fs.write_file("/proj/pkg/inner/data.bin", &[0u8, 1, 2, 255])
        .expect("write data");
}

/// Stored, empty entries whose unix mode is set independently of the
/// trailing slash in their name.
fn raw_zip(entries: &[(&str, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();
    for (name, mode) in entries {
        let offset = out.len() as u32;
        let name_len = name.len() as u16;

        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&[0; 6]); // flags, method, time
        out.extend_from_slice(&33u16.to_le_bytes()); // 1980-01-01
        out.extend_from_slice(&[0; 12]); // crc, sizes
        out.extend_from_slice(&name_len.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());

        central.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        central.extend_from_slice(&((3u16 << 8) | 20).to_le_bytes()); // made by unix
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&[0; 6]);
        central.extend_from_slice(&33u16.to_le_bytes());
        central.extend_from_slice(&[0; 12]);
        central.extend_from_slice(&name_len.to_le_bytes());
        central.extend_from_slice(&[0; 8]); // extra, comment, disk, internal attr
        central.extend_from_slice(&(mode << 16).to_le_bytes());
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }
    let cd_offset = out.len() as u32;
    let count = entries.len() as u16;
    out.extend_from_slice(&central);
    out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&(central.len() as u32).to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

#[tokio::test]
async fn export_then_import_round_trips() {
    let src = instance("src");
    populate(&src);

    let (progress, seen) = recording_progress();
    let bytes = export_zip(&src, &["/proj".to_string()], &progress)
        .await
        .expect("export");
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.last().copied(), Some(1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress={seen:?}");
        assert!(seen.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    let dst = instance("dst");
    let (progress, seen) = recording_progress();
    import_zip(&dst, &bytes, "/restored", &progress)
        .await
        .expect("import");
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.first().copied(), Some(0.2));
        assert_eq!(seen.last().copied(), Some(1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress={seen:?}");
    }

    assert_eq!(snapshot(&src, "/proj"), snapshot(&dst, "/restored"));
    assert!(dst.stat("/restored/empty").expect("empty dir").is_directory());
}

#[tokio::test]
async fn importing_twice_overwrites_without_duplicates() {
    let src = instance("twice-src");
    populate(&src);
    let bytes = export_zip(&src, &["/proj".to_string()], &Progress::none())
        .await
        .expect("export");

    let dst = instance("twice-dst");
    import_zip(&dst, &bytes, "/p", &Progress::none())
        .await
        .expect("first import");
    dst.write_file("/p/main.go", b"changed").expect("modify");
    import_zip(&dst, &bytes, "/p", &Progress::none())
        .await
        .expect("second import");

    assert_eq!(&*dst.read_file("/p/main.go").expect("read"), b"package main\n");
    assert_eq!(
        dst.readdir("/p").expect("readdir"),
        vec!["empty", "main.go", "pkg"]
    );
}

#[tokio::test]
async fn single_file_export_uses_base_name() {
    let fs = instance("single");
    populate(&fs);
    let bytes = export_zip(&fs, &["/proj/pkg/lib.go".to_string()], &Progress::none())
        .await
        .expect("export");

    let dst = instance("single-dst");
    import_zip(&dst, &bytes, "/", &Progress::none())
        .await
        .expect("import");
    assert_eq!(dst.readdir("/").expect("readdir"), vec!["lib.go"]);
}

#[tokio::test]
async fn multiple_roots_keep_absolute_names() {
    let fs = instance("multi");
    populate(&fs);
    fs.write_file("/other.txt", b"x").expect("write");
    let roots = vec!["/proj/pkg".to_string(), "/other.txt".to_string()];
    let bytes = export_zip(&fs, &roots, &Progress::none())
        .await
        .expect("export");

    let dst = instance("multi-dst");
    import_zip(&dst, &bytes, "/out", &Progress::none())
        .await
        .expect("import");
    assert_eq!(&*dst.read_file("/out/proj/pkg/lib.go").expect("lib"), b"package pkg\n");
    assert_eq!(&*dst.read_file("/out/other.txt").expect("other"), b"x");
}

#[tokio::test]
async fn files_without_directory_entries_still_import() {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("deep/nested/file.txt", zip::write::SimpleFileOptions::default())
        .expect("start");
    writer.write_all(b"content").expect("write");
    let bytes = writer.finish().expect("finish").into_inner();

    let fs = instance("implicit");
    import_zip(&fs, &bytes, "/x", &Progress::none())
        .await
        .expect("import");
    assert!(fs.stat("/x/deep/nested").expect("parent").is_directory());
    assert_eq!(&*fs.read_file("/x/deep/nested/file.txt").expect("read"), b"content");
}

#[tokio::test]
async fn malformed_bytes_are_a_decode_failure() {
    let fs = instance("bad");
    let err = import_zip(&fs, b"definitely not a zip", "/", &Progress::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Decode(_)));
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
}

#[tokio::test]
async fn parent_segments_are_refused() {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("../escape.txt", zip::write::SimpleFileOptions::default())
        .expect("start");
    writer.write_all(b"nope").expect("write");
    let bytes = writer.finish().expect("finish").into_inner();

    let fs = instance("escape");
    let err = import_zip(&fs, &bytes, "/in", &Progress::none())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    assert!(!fs.exists("/escape.txt"));
}

#[tokio::test]
async fn missing_root_aborts_export() {
    let fs = instance("missing");
    let err = export_zip(&fs, &["/nope".to_string()], &Progress::none())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn unix_mode_decides_entry_kind_over_the_name() {
    let bytes = raw_zip(&[("d", 0o040750), ("e/", 0o100600)]);
    let fs = instance("mode-kind");
    import_zip(&fs, &bytes, "/x", &Progress::none())
        .await
        .expect("import");

    let d = fs.stat("/x/d").expect("stat d");
    assert!(d.is_directory());
    assert_eq!(d.mode & 0o7777, 0o750);

    let e = fs.stat("/x/e").expect("stat e");
    assert!(e.is_file());
    assert_eq!(e.size, 0);
    assert_eq!(e.mode & 0o7777, 0o600);
}
