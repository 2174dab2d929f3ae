use std::sync::{Arc, Mutex};

use gobox_build::{BuildError, BuildRequest, Builder, Succeeded, Toolchain};
use gobox_sandbox::{Sandbox, SandboxConfig};
use gobox_vfs::{ErrorKind, Progress, Vfs, VfsConfig};

const TOOL_OK: &str = r#"(module (func (export "_start")))"#;

const TOOL_FAIL: &str = r#"
(module
  (import "gobox" "rt_exit" (func $exit (param i32)))
  (func (export "_start") (call $exit (i32.const 3))))
"#;

const TOOL_MARK: &str = r#"
(module
  (import "gobox" "fs_open" (func $open (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "marker")
  (func (export "_start")
    (drop (call $open (i32.const 0) (i32.const 6) (i32.const 577) (i32.const 420)))))
"#;

fn wat_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Driver that echoes its target argument and cwd, then writes `plan` to
/// `<scratch>/commands.json` and optionally an artifact to `<scratch>/a.out`.
fn driver_wat(plan: Option<&str>, write_artifact: bool) -> String {
    let mut body = String::new();
    let mut data = String::new();
    if let Some(plan) = plan {
        data.push_str(&format!("  (data (i32.const 4096) \"{}\")\n", wat_escape(plan)));
        body.push_str(&format!(
            "    (memory.copy (i32.add (i32.const 1024) (local.get $n)) (i32.const 0) (i32.const 14))
    (local.set $fd (call $open (i32.const 1024) (i32.add (local.get $n) (i32.const 14)) (i32.const 577) (i32.const 420)))
    (drop (call $write (local.get $fd) (i32.const 4096) (i32.const {}) (i64.const -1)))
    (drop (call $close (local.get $fd)))
",
            plan.len()
        ));
    }
    if write_artifact {
        body.push_str(
            "    (memory.copy (i32.add (i32.const 1024) (local.get $n)) (i32.const 32) (i32.const 6))
    (local.set $fd (call $open (i32.const 1024) (i32.add (local.get $n) (i32.const 6)) (i32.const 577) (i32.const 420)))
    (drop (call $write (local.get $fd) (i32.const 64) (i32.const 8) (i64.const -1)))
    (drop (call $close (local.get $fd)))
",
        );
    }
    format!(
        r#"
(module
  (import "gobox" "arg_read" (func $arg_read (param i32 i32 i32) (result i32)))
  (import "gobox" "proc_getcwd" (func $getcwd (param i32 i32) (result i32)))
  (import "gobox" "fs_open" (func $open (param i32 i32 i32 i32) (result i32)))
  (import "gobox" "fs_write" (func $write (param i32 i32 i32 i64) (result i32)))
  (import "gobox" "fs_close" (func $close (param i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "/commands.json")
  (data (i32.const 32) "/a.out")
  (data (i32.const 64) "artifact")
  (data (i32.const 80) "\n")
{data}  (func (export "_start") (local $n i32) (local $fd i32) (local $m i32)
    (local.set $m (call $arg_read (i32.const 1) (i32.const 2048) (i32.const 512)))
    (drop (call $write (i32.const 1) (i32.const 2048) (local.get $m) (i64.const -1)))
    (drop (call $write (i32.const 1) (i32.const 80) (i32.const 1) (i64.const -1)))
    (local.set $m (call $getcwd (i32.const 2048) (i32.const 512)))
    (drop (call $write (i32.const 1) (i32.const 2048) (local.get $m) (i64.const -1)))
    (drop (call $write (i32.const 1) (i32.const 80) (i32.const 1) (i64.const -1)))
    (local.set $n (call $arg_read (i32.const 2) (i32.const 1024) (i32.const 512)))
{body}  ))
"#
    )
}

struct Fixture {
    fs: Vfs,
    builder: Builder,
    lines: Arc<Mutex<Vec<String>>>,
}

fn fixture(id: &str, driver: &str) -> Fixture {
    let fs = Vfs::new(id, &VfsConfig::default());
    let toolchain = Toolchain::default();
    fs.mkdir_all("/usr/lib/go/bin", 0o755).expect("mkdir bin");
    fs.write_file(&toolchain.driver, driver.as_bytes()).expect("driver");
    fs.mkdir_all("/src", 0o755).expect("mkdir src");
    fs.write_file("/src/main.go", b"package main\n").expect("source");

    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    fs.set_output_sink(move |line| sink.lock().unwrap().push(line.to_string()));

    let sandbox = Sandbox::new(SandboxConfig::default()).expect("sandbox");
    let builder = Builder::new(fs.clone(), sandbox, toolchain);
    Fixture { fs, builder, lines }
}

fn install_tools(fs: &Vfs) {
    let dir = "/usr/lib/go/pkg/tool/js_wasm";
    fs.mkdir_all(dir, 0o755).expect("mkdir tools");
    fs.write_file(&format!("{dir}/ok"), TOOL_OK.as_bytes()).expect("ok");
    fs.write_file(&format!("{dir}/fail"), TOOL_FAIL.as_bytes()).expect("fail");
    fs.write_file(&format!("{dir}/mark"), TOOL_MARK.as_bytes()).expect("mark");
}

fn recording() -> (Progress, Arc<Mutex<Vec<f64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (Progress::new(move |v| sink.lock().unwrap().push(v)), seen)
}

#[tokio::test]
async fn empty_plan_moves_the_artifact() {
    let f = fixture("empty-plan", &driver_wat(Some("[]"), true));
    let (progress, seen) = recording();
    let req = BuildRequest::new("/src", "/out.wasm");

    let result = f.builder.build(&req, &progress).await;
    assert!(result.succeeded(), "{result:?}");
    assert_eq!(*seen.lock().unwrap(), vec![0.25, 1.0]);
    assert_eq!(&*f.fs.read_file("/out.wasm").unwrap(), b"artifact");
    assert!(!f.fs.exists("/usr/lib/go/pkg/tool/js_wasm"));

    let scratch = f.builder.scratch_dir(&req);
    assert!(f.fs.exists(&format!("{scratch}/commands.json")));
    assert!(!f.fs.exists(&format!("{scratch}/a.out")));
}

#[tokio::test]
async fn steps_run_in_order_inside_scratch() {
    let plan = r#"[["ok"],["mark","-v"],["ok","x"]]"#;
    let f = fixture("steps", &driver_wat(Some(plan), true));
    install_tools(&f.fs);
    let (progress, seen) = recording();
    let req = BuildRequest::new("/src/main.go", "/out.wasm").tag("netgo");

    f.builder.build(&req, &progress).await.expect("build");
    assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.5, 0.75, 1.0]);
    let scratch = f.builder.scratch_dir(&req);
    assert!(f.fs.exists(&format!("{scratch}/marker")));
    assert_eq!(&*f.fs.read_file("/out.wasm").unwrap(), b"artifact");
}

#[tokio::test]
async fn failing_step_stops_the_build() {
    let plan = r#"[["ok"],["fail"],["mark"]]"#;
    let f = fixture("fail-step", &driver_wat(Some(plan), true));
    install_tools(&f.fs);
    let req = BuildRequest::new("/src", "/out.wasm");

    let err = f.builder.build(&req, &Progress::none()).await.unwrap_err();
    match &err {
        BuildError::ToolFailure { tool, code } => {
            assert_eq!(tool, "fail");
            assert_eq!(*code, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::ToolFailure);
    let scratch = f.builder.scratch_dir(&req);
    assert!(!f.fs.exists(&format!("{scratch}/marker")));
    assert!(!f.fs.exists("/out.wasm"));
}

#[tokio::test]
async fn failing_driver_is_reported() {
    let f = fixture("fail-driver", TOOL_FAIL);
    let req = BuildRequest::new("/src", "/out.wasm");
    let err = f.builder.build(&req, &Progress::none()).await.unwrap_err();
    assert!(matches!(err, BuildError::ToolFailure { code: 3, .. }), "{err:?}");
    assert!(!f.fs.exists("/out.wasm"));
}

#[tokio::test]
async fn missing_and_malformed_plans() {
    let f = fixture("no-plan", &driver_wat(None, true));
    let req = BuildRequest::new("/src", "/out.wasm");
    let err = f.builder.build(&req, &Progress::none()).await.unwrap_err();
    assert!(matches!(err, BuildError::PlanMissing { .. }), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let f = fixture("bad-plan", &driver_wat(Some(r#"{"steps":1}"#), true));
    let err = f.builder.build(&req, &Progress::none()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    assert!(!f.fs.exists("/out.wasm"));
}

#[tokio::test]
async fn source_kind_selects_target_and_working_directory() {
    let f = fixture("source-kind", &driver_wat(Some("[]"), true));

    f.builder
        .build(&BuildRequest::new("/src/main.go", "/a.wasm"), &Progress::none())
        .await
        .expect("file build");
    f.builder
        .build(&BuildRequest::new("/src", "/b.wasm"), &Progress::none())
        .await
        .expect("dir build");
    assert_eq!(
        *f.lines.lock().unwrap(),
        vec!["main.go", "/src", ".", "/src"]
    );

    let err = f
        .builder
        .build(&BuildRequest::new("/missing", "/c.wasm"), &Progress::none())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn relative_output_resolves_against_the_callers_cwd() {
    let f = fixture("relative", &driver_wat(Some("[]"), true));
    f.fs.chdir("/src").expect("chdir");
    f.builder
        .build(&BuildRequest::new(".", "app.wasm"), &Progress::none())
        .await
        .expect("build");
    assert_eq!(&*f.fs.read_file("/src/app.wasm").unwrap(), b"artifact");
}

#[tokio::test]
async fn leftovers_of_an_earlier_build_are_not_reused() {
    let f = fixture("stale-scratch", &driver_wat(Some("[]"), false));
    let req = BuildRequest::new("/src", "/first.wasm");
    let scratch = f.builder.scratch_dir(&req);
    f.fs.mkdir_all(&scratch, 0o755).expect("mkdir scratch");
    f.fs.write_file(&format!("{scratch}/a.out"), b"stale").expect("stale artifact");

    // the driver writes a plan but no artifact this time
    let err = f.builder.build(&req, &Progress::none()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err:?}");
    assert!(!f.fs.exists("/first.wasm"));
    assert!(f.fs.exists(&format!("{scratch}/commands.json")));

    // a driver that writes nothing must not pick up the previous plan
    f.fs.write_file(&f.builder.toolchain().driver, TOOL_OK.as_bytes())
        .expect("swap driver");
    let req = BuildRequest::new("/src", "/second.wasm");
    let err = f.builder.build(&req, &Progress::none()).await.unwrap_err();
    assert!(matches!(err, BuildError::PlanMissing { .. }), "{err:?}");
    assert!(!f.fs.exists("/second.wasm"));
    assert!(!f.fs.exists(&format!("{scratch}/commands.json")));
}
