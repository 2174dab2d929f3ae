//! Shared, fixed protocol identifiers.
//!
//! These constants are the single source of truth for values that cross a
//! boundary: numeric flags and errno codes seen by guest programs, the
//! environment variables the sandbox injects, and the well-known paths the
//! build pipeline agrees on with the toolchain image.

// -------------------------
// Open flags (guest ABI)
// -------------------------

pub const O_RDONLY: i32 = 0;
pub const O_WRONLY: i32 = 1;
pub const O_RDWR: i32 = 2;
pub const O_CREAT: i32 = 64;
pub const O_EXCL: i32 = 128;
pub const O_NOCTTY: i32 = 256;
pub const O_TRUNC: i32 = 512;
pub const O_APPEND: i32 = 1024;
pub const O_NONBLOCK: i32 = 2048;
pub const O_DIRECT: i32 = 16384;
pub const O_DIRECTORY: i32 = 65536;
pub const O_NOFOLLOW: i32 = 131072;
pub const O_NOATIME: i32 = 262144;
pub const O_SYNC: i32 = 1052672;

// -------------------------
// Errno space (Linux numbering)
// -------------------------

pub const ENOENT: i32 = 2;
pub const EBADF: i32 = 9;
pub const EEXIST: i32 = 17;
pub const ENOTDIR: i32 = 20;
pub const EISDIR: i32 = 21;
pub const EINVAL: i32 = 22;
pub const ERANGE: i32 = 34;
pub const ENOSYS: i32 = 38;
pub const ENOTEMPTY: i32 = 39;
pub const ELOOP: i32 = 40;

// -------------------------
// Stat
// -------------------------

pub const STAT_BLKSIZE: u64 = 4096;
pub const STAT_RECORD_SIZE: usize = 96;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFCHR: u32 = 0o020000;

pub const DEFAULT_FILE_MODE: u32 = 0o644;
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Largest size a regular file may reach through writes or truncation.
pub const MAX_FILE_SIZE: u64 = 1 << 30;

// -------------------------
// Process identity sentinels
// -------------------------

pub const SENTINEL_UID: i32 = -1;
pub const SENTINEL_GID: i32 = -1;
pub const SENTINEL_PID: i32 = -1;

// -------------------------
// Sandbox
// -------------------------

/// Host import module every guest links against.
pub const GUEST_IMPORT_MODULE: &str = "gobox";
pub const GUEST_ENTRY_EXPORT: &str = "_start";
pub const GUEST_MEMORY_EXPORT: &str = "memory";

/// Environment variable holding the cancellation hook name a guest should bind.
pub const ENV_CANCEL_HOOK: &str = "GOBOX_CANCEL_HOOK";
pub const CANCEL_HOOK_PREFIX: &str = "__gobox_cancel_";

/// Exit code reported when a guest fails to instantiate or traps.
pub const FAULT_EXIT_CODE: i32 = -1;
/// Exit code reported when a guest is stopped through its cancellation hook.
pub const CANCELLED_EXIT_CODE: i32 = 130;

// -------------------------
// Build pipeline
// -------------------------

pub const DEFAULT_TOOLCHAIN_ROOT: &str = "/usr/lib/go";
pub const TOOLCHAIN_DRIVER_REL: &str = "bin/buildhelper";
pub const TOOLCHAIN_TOOLS_REL: &str = "pkg/tool/js_wasm";
pub const DEFAULT_SCRATCH_ROOT: &str = "/tmp/build";
pub const PLAN_FILE_NAME: &str = "commands.json";
pub const ARTIFACT_FILE_NAME: &str = "a.out";

pub const DEFAULT_TARGET_OS: &str = "js";
pub const DEFAULT_TARGET_ARCH: &str = "wasm";

pub const ENV_TOOLCHAIN_ROOT_GUEST: &str = "GOROOT";
pub const ENV_TARGET_OS_GUEST: &str = "GOOS";
pub const ENV_TARGET_ARCH_GUEST: &str = "GOARCH";

// -------------------------
// Progress
// -------------------------

/// Callers use this value to signal "not currently loading"; components never report it.
pub const PROGRESS_IDLE: f64 = -1.0;

// -------------------------
// Host configuration
// -------------------------

pub const ENV_LOG: &str = "GOBOX_LOG";
pub const ENV_READ_CACHE_THRESHOLD: &str = "GOBOX_READ_CACHE_THRESHOLD";
pub const ENV_TOOLCHAIN_ROOT: &str = "GOBOX_TOOLCHAIN_ROOT";
pub const ENV_SCRATCH_ROOT: &str = "GOBOX_SCRATCH_ROOT";
pub const ENV_CANCEL_POLL_MS: &str = "GOBOX_CANCEL_POLL_MS";

pub const DEFAULT_READ_CACHE_THRESHOLD: usize = 64 * 1024;
pub const DEFAULT_CANCEL_POLL_MS: u64 = 100;
