use std::sync::{Arc, Mutex};

use gobox_contracts::{O_CREAT, O_RDONLY, O_TRUNC, O_WRONLY};
use gobox_vfs::{path, BackendKind, ErrorKind, FileRef, FsError, Registry, Vfs, VfsConfig};

fn instance(id: &str) -> Vfs {
    Registry::new(VfsConfig::default())
        .open(BackendKind::Memory, id)
        .expect("open memory instance")
}

#[test]
fn write_stat_readdir_rename_scenario() {
    let reg = Registry::new(VfsConfig::default());
    let fs = reg.open_str("memory", "t1").expect("open t1");

    fs.mkdir("/a", 0o755).expect("mkdir /a");
    fs.write_file("/a/b.txt", b"hi").expect("write");
    assert_eq!(fs.stat("/a/b.txt").expect("stat").size, 2);
    assert_eq!(fs.readdir("/a").expect("readdir"), vec!["b.txt".to_string()]);

    fs.rename("/a/b.txt", "/a/c.txt").expect("rename");
    let err = fs.stat("/a/b.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(fs.stat("/a/c.txt").expect("stat new").size, 2);
}

#[test]
fn relative_paths_resolve_against_shared_cwd() {
    let fs = instance("cwd");
    fs.mkdir_all("/src/pkg", 0o755).expect("mkdir_all");
    fs.chdir("/src").expect("chdir");
    assert_eq!(fs.getcwd(), "/src");

    fs.write_file("pkg/main.go", b"package main").expect("relative write");
    assert!(fs.exists("/src/pkg/main.go"));
    assert_eq!(fs.resolve("pkg/main.go"), "/src/pkg/main.go");
    assert_eq!(fs.resolve("../x"), "/x");
    assert_eq!(fs.resolve("/abs//kept/"), "/abs//kept/");

    // a second handle to the same instance observes the same cwd
    let other = fs.clone();
    other.chdir("pkg/").expect("chdir via clone");
    assert_eq!(fs.getcwd(), "/src/pkg");
    assert_eq!(&*fs.read_file("main.go").expect("read"), b"package main");

    for (cwd, p) in [("/", "a"), ("/src/pkg", "../b/./c"), ("/src", "..//..")] {
        assert_eq!(path::resolve(cwd, p), path::normalize(&path::join(cwd, p)));
    }
}

#[test]
fn chdir_never_stores_trailing_separator() {
    let fs = instance("cwd-trailing");
    fs.mkdir_all("/a/b", 0o755).expect("mkdir_all");
    fs.chdir("/a/b/").expect("chdir");
    assert_eq!(fs.getcwd(), "/a/b");
    fs.chdir("../..").expect("chdir up");
    assert_eq!(fs.getcwd(), "/");
    fs.write_file("/file", b"").expect("write");
    assert_eq!(fs.chdir("/file").unwrap_err().kind(), ErrorKind::NotADirectory);
}

#[test]
fn stat_is_normalized() {
    let fs = instance("stat");
    fs.write_file("/f", &vec![7u8; 10_000]).expect("write");
    fs.utimes("/f", 1_500, 2_500).expect("utimes");
    let st = fs.stat("/f").expect("stat");
    assert_eq!(st.blksize, 4096);
    assert_eq!(st.blocks, 3);
    assert_eq!(st.atime_ms, 1_500);
    assert_eq!(st.mtime_ms, 2_500);
    assert!(st.is_file());

    let json = serde_json::to_value(st).expect("serialize stat");
    assert_eq!(json["blksize"], 4096);
    assert_eq!(json["mtimeMs"], 2_500);

    let missing = fs.stat("/nope").unwrap_err();
    assert!(matches!(missing, FsError::NotFound(_)));
    assert_eq!(missing.errno(), 2);
    assert_eq!(missing.code(), "ENOENT");
}

#[test]
fn fstat_accepts_descriptor_or_rewritten_path() {
    let fs = instance("fstat");
    fs.write_file("/f", b"abc").expect("write");
    let fd = fs.open("/f", O_RDONLY, 0).expect("open");
    let by_fd = fs.fstat(fd).expect("fstat fd");
    let by_path = fs.fstat(FileRef::Path("/f".into())).expect("fstat path");
    assert_eq!(by_fd, by_path);
    assert_eq!(fs.fstat("/f").expect("fstat str").ino, by_fd.ino);

    let stdout = fs.fstat(1).expect("fstat stdout");
    assert_eq!(stdout.file_type(), gobox_vfs::FileType::CharDevice);
    assert_eq!(fs.fstat(99).unwrap_err().kind(), ErrorKind::BadDescriptor);
}

#[test]
fn standard_streams_flush_whole_lines_to_sink() {
    let fs = instance("stdio");
    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let seen = lines.clone();
    fs.set_output_sink(move |line| seen.lock().unwrap().push(line.to_string()));

    fs.write(1, b"hello ", None).expect("write partial");
    assert!(lines.lock().unwrap().is_empty());
    fs.write(2, b"world\nsecond\nthi", None).expect("write lines");
    assert_eq!(*lines.lock().unwrap(), vec!["hello world", "second"]);

    fs.flush_output();
    assert_eq!(lines.lock().unwrap().last().map(String::as_str), Some("thi"));

    let err = fs.write(1, b"x", Some(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
    let mut buf = [0u8; 4];
    assert_eq!(fs.read(0, &mut buf, None).expect("read stdin"), 0);
    assert!(fs.readdir("/").expect("root").is_empty());
}

#[test]
fn open_flags_drive_creation() {
    let fs = instance("flags");
    let fd = fs
        .open("/new.txt", O_WRONLY | O_CREAT | O_TRUNC, 0o600)
        .expect("create");
    fs.write(fd, b"payload", None).expect("write");
    fs.close(fd).expect("close");
    assert_eq!(fs.stat("/new.txt").expect("stat").mode & 0o777, 0o600);

    let err = fs.open("/new.txt", gobox_contracts::O_APPEND, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
    let err = fs.open("/dir/missing.txt", O_WRONLY | O_CREAT, 0o644).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn directories_links_and_symlinks() {
    let fs = instance("links");
    fs.mkdir_all("/a/b", 0o755).expect("mkdir_all");
    fs.mkdir_all("/a/b", 0o755).expect("mkdir_all is idempotent");
    assert_eq!(fs.mkdir("/a", 0o755).unwrap_err().kind(), ErrorKind::AlreadyExists);
    assert_eq!(fs.rmdir("/a").unwrap_err().kind(), ErrorKind::NotEmpty);
    assert_eq!(fs.unlink("/a/b").unwrap_err().kind(), ErrorKind::IsADirectory);

    fs.write_file("/a/b/f", b"data").expect("write");
    fs.link("/a/b/f", "/a/hard").expect("link");
    assert_eq!(fs.stat("/a/hard").expect("stat").nlink, 2);
    fs.unlink("/a/b/f").expect("unlink");
    assert_eq!(&*fs.read_file("/a/hard").expect("read"), b"data");

    fs.chdir("/a").expect("chdir");
    fs.symlink("hard", "/soft").expect("symlink");
    assert_eq!(fs.readlink("/soft").expect("readlink"), "/a/hard");
    assert!(fs.lstat("/soft").expect("lstat").is_symlink());
    assert_eq!(fs.stat("/soft").expect("stat").size, 4);

    fs.symlink("/nowhere", "/dangling").expect("dangling");
    assert_eq!(fs.stat("/dangling").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn metadata_updates_are_recorded() {
    let fs = instance("meta");
    fs.write_file("/f", b"abcdef").expect("write");
    fs.chmod("/f", 0o4755).expect("chmod");
    fs.chown("/f", 10, 20).expect("chown");
    fs.truncate("/f", 2).expect("truncate");
    let st = fs.stat("/f").expect("stat");
    assert_eq!(st.mode & 0o7777, 0o4755);
    assert_eq!((st.uid, st.gid), (10, 20));
    assert_eq!(st.size, 2);
    assert_eq!(&*fs.read_file("/f").expect("read"), b"ab");
}

#[test]
fn walk_and_remove_all() {
    let fs = instance("walk");
    fs.mkdir_all("/t/x/y", 0o755).expect("mkdir_all");
    fs.mkdir("/t/empty", 0o755).expect("mkdir");
    fs.write_file("/t/x/1", b"1").expect("write");
    fs.write_file("/t/x/y/2", b"2").expect("write");

    let mut events = Vec::new();
    let finished = fs
        .walk("/t", |p, st, entering| {
            events.push((p.to_string(), st.is_directory(), entering));
            true
        })
        .expect("walk");
    assert!(finished);
    assert_eq!(
        events,
        vec![
            ("/t".to_string(), true, true),
            ("/t/empty".to_string(), true, true),
            ("/t/empty".to_string(), true, false),
            ("/t/x".to_string(), true, true),
            ("/t/x/1".to_string(), false, true),
            ("/t/x/y".to_string(), true, true),
            ("/t/x/y/2".to_string(), false, true),
            ("/t/x/y".to_string(), true, false),
            ("/t/x".to_string(), true, false),
            ("/t".to_string(), true, false),
        ]
    );

    let mut files = 0;
    let finished = fs
        .walk("/t", |_, st, _| {
            if st.is_file() {
                files += 1;
            }
            files < 1
        })
        .expect("walk stops");
    assert!(!finished);
    assert_eq!(files, 1);

    fs.remove_all("/t").expect("remove_all");
    assert!(!fs.exists("/t"));
    fs.remove_all("/t").expect("missing path is fine");
}
