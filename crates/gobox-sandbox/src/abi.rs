//! Host functions exported to guests under the `gobox` import module.
//!
//! Pointers are offsets into the guest's exported memory. Failures the guest
//! can handle come back as negated errno values; bad memory accesses,
//! `rt_exit` and cancellation trap.

use anyhow::{anyhow, Result};
use gobox_contracts::{EINVAL, ENOENT, ERANGE, GUEST_IMPORT_MODULE, GUEST_MEMORY_EXPORT};
use gobox_vfs::FsError;
use wasmtime::{Caller, Extern, Linker, Memory};

use crate::context::RuntimeContext;
use crate::error::{Cancelled, GuestExit};

type Ctx<'a> = Caller<'a, RuntimeContext>;

pub(crate) fn link(linker: &mut Linker<RuntimeContext>) -> Result<()> {
    let m = GUEST_IMPORT_MODULE;

    linker.func_wrap(m, "args_count", args_count)?;
    linker.func_wrap(m, "arg_len", arg_len)?;
    linker.func_wrap(m, "arg_read", arg_read)?;
    linker.func_wrap(m, "env_len", env_len)?;
    linker.func_wrap(m, "env_read", env_read)?;

    linker.func_wrap(m, "fs_open", fs_open)?;
    linker.func_wrap(m, "fs_close", fs_close)?;
    linker.func_wrap(m, "fs_read", fs_read)?;
    linker.func_wrap(m, "fs_write", fs_write)?;
    linker.func_wrap(m, "fs_stat", fs_stat)?;
    linker.func_wrap(m, "fs_lstat", fs_lstat)?;
    linker.func_wrap(m, "fs_fstat", fs_fstat)?;
    linker.func_wrap(m, "fs_mkdir", fs_mkdir)?;
    linker.func_wrap(m, "fs_rmdir", fs_rmdir)?;
    linker.func_wrap(m, "fs_unlink", fs_unlink)?;
    linker.func_wrap(m, "fs_rename", fs_rename)?;
    linker.func_wrap(m, "fs_link", fs_link)?;
    linker.func_wrap(m, "fs_symlink", fs_symlink)?;
    linker.func_wrap(m, "fs_readdir", fs_readdir)?;

    linker.func_wrap(m, "proc_getuid", |c: Ctx<'_>| ident(&c, |p| p.getuid()))?;
    linker.func_wrap(m, "proc_getgid", |c: Ctx<'_>| ident(&c, |p| p.getgid()))?;
    linker.func_wrap(m, "proc_geteuid", |c: Ctx<'_>| ident(&c, |p| p.geteuid()))?;
    linker.func_wrap(m, "proc_getegid", |c: Ctx<'_>| ident(&c, |p| p.getegid()))?;
    linker.func_wrap(m, "proc_getpid", |c: Ctx<'_>| ident(&c, |p| p.pid()))?;
    linker.func_wrap(m, "proc_getppid", |c: Ctx<'_>| ident(&c, |p| p.ppid()))?;
    linker.func_wrap(m, "proc_getcwd", proc_getcwd)?;
    linker.func_wrap(m, "proc_chdir", proc_chdir)?;
    linker.func_wrap(m, "proc_umask", proc_umask)?;
    linker.func_wrap(m, "proc_getgroups", proc_getgroups)?;

    linker.func_wrap(m, "rt_register_hook", rt_register_hook)?;
    linker.func_wrap(m, "rt_exit", rt_exit)?;
    Ok(())
}

// -------------------------
// Helpers
// -------------------------

fn enter(caller: &Ctx<'_>) -> Result<()> {
    if caller.data().cancelled() {
        return Err(Cancelled.into());
    }
    Ok(())
}

fn memory(caller: &mut Ctx<'_>) -> Result<Memory> {
    match caller.get_export(GUEST_MEMORY_EXPORT) {
        Some(Extern::Memory(mem)) => Ok(mem),
        _ => Err(anyhow!("guest does not export `{GUEST_MEMORY_EXPORT}`")),
    }
}

fn read_guest(caller: &mut Ctx<'_>, ptr: i32, len: i32) -> Result<Vec<u8>> {
    let len = usize::try_from(len).map_err(|_| anyhow!("negative length {len}"))?;
    let mem = memory(caller)?;
    let mut buf = vec![0u8; len];
    mem.read(&*caller, ptr as u32 as usize, &mut buf)?;
    Ok(buf)
}

fn read_path(caller: &mut Ctx<'_>, ptr: i32, len: i32) -> Result<String> {
    let bytes = read_guest(caller, ptr, len)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_guest(caller: &mut Ctx<'_>, ptr: i32, data: &[u8]) -> Result<()> {
    let mem = memory(caller)?;
    mem.write(&mut *caller, ptr as u32 as usize, data)?;
    Ok(())
}

/// Copies as much of `data` as fits in `len` bytes at `ptr`.
fn copy_out(caller: &mut Ctx<'_>, data: &[u8], ptr: i32, len: i32) -> Result<i32> {
    let n = data.len().min(usize::try_from(len).unwrap_or(0));
    write_guest(caller, ptr, &data[..n])?;
    Ok(n as i32)
}

/// Copies all of `data` or reports `-ERANGE` when the buffer is too small.
fn copy_exact(caller: &mut Ctx<'_>, data: &[u8], ptr: i32, len: i32) -> Result<i32> {
    if data.len() > usize::try_from(len).unwrap_or(0) {
        return Ok(-ERANGE);
    }
    write_guest(caller, ptr, data)?;
    Ok(data.len() as i32)
}

fn errno(err: FsError) -> i32 {
    -err.errno()
}

fn status(res: gobox_vfs::Result<()>) -> i32 {
    match res {
        Ok(()) => 0,
        Err(err) => errno(err),
    }
}

fn ident(caller: &Ctx<'_>, f: impl FnOnce(&gobox_vfs::ProcessShim) -> i32) -> Result<i32> {
    enter(caller)?;
    Ok(f(&caller.data().process))
}

// -------------------------
// Arguments and environment
// -------------------------

fn args_count(caller: Ctx<'_>) -> Result<i32> {
    enter(&caller)?;
    Ok(caller.data().args.len() as i32)
}

fn arg(caller: &Ctx<'_>, index: i32) -> Option<String> {
    let index = usize::try_from(index).ok()?;
    caller.data().args.get(index).cloned()
}

fn arg_len(caller: Ctx<'_>, index: i32) -> Result<i32> {
    enter(&caller)?;
    Ok(arg(&caller, index).map_or(-EINVAL, |a| a.len() as i32))
}

fn arg_read(mut caller: Ctx<'_>, index: i32, ptr: i32, len: i32) -> Result<i32> {
    enter(&caller)?;
    let Some(value) = arg(&caller, index) else {
        return Ok(-EINVAL);
    };
    copy_out(&mut caller, value.as_bytes(), ptr, len)
}

fn env_value(caller: &mut Ctx<'_>, kptr: i32, klen: i32) -> Result<Option<String>> {
    let key = read_path(caller, kptr, klen)?;
    Ok(caller.data().env.get(&key).cloned())
}

fn env_len(mut caller: Ctx<'_>, kptr: i32, klen: i32) -> Result<i32> {
    enter(&caller)?;
    Ok(env_value(&mut caller, kptr, klen)?.map_or(-ENOENT, |v| v.len() as i32))
}

fn env_read(mut caller: Ctx<'_>, kptr: i32, klen: i32, ptr: i32, len: i32) -> Result<i32> {
    enter(&caller)?;
    let Some(value) = env_value(&mut caller, kptr, klen)? else {
        return Ok(-ENOENT);
    };
    copy_out(&mut caller, value.as_bytes(), ptr, len)
}

// -------------------------
// Filesystem
// -------------------------

fn fs_open(mut caller: Ctx<'_>, pptr: i32, plen: i32, flags: i32, mode: i32) -> Result<i32> {
    enter(&caller)?;
    let path = read_path(&mut caller, pptr, plen)?;
    Ok(match caller.data().fs.open(&path, flags, mode as u32) {
        Ok(fd) => fd,
        Err(err) => errno(err),
    })
}

fn fs_close(caller: Ctx<'_>, fd: i32) -> Result<i32> {
    enter(&caller)?;
    Ok(status(caller.data().fs.close(fd)))
}

fn position(pos: i64) -> Option<u64> {
    u64::try_from(pos).ok()
}

fn fs_read(mut caller: Ctx<'_>, fd: i32, ptr: i32, len: i32, pos: i64) -> Result<i32> {
    enter(&caller)?;
    let Ok(len) = usize::try_from(len) else {
        return Ok(-EINVAL);
    };
    let mut buf = vec![0u8; len];
    match caller.data().fs.read(fd, &mut buf, position(pos)) {
        Ok(n) => {
            write_guest(&mut caller, ptr, &buf[..n])?;
            Ok(n as i32)
        }
        Err(err) => Ok(errno(err)),
    }
}

fn fs_write(mut caller: Ctx<'_>, fd: i32, ptr: i32, len: i32, pos: i64) -> Result<i32> {
    enter(&caller)?;
    if len < 0 {
        return Ok(-EINVAL);
    }
    let data = read_guest(&mut caller, ptr, len)?;
    Ok(match caller.data().fs.write(fd, &data, position(pos)) {
        Ok(n) => n as i32,
        Err(err) => errno(err),
    })
}

fn put_stat(
    caller: &mut Ctx<'_>,
    stat: gobox_vfs::Result<gobox_vfs::Stat>,
    out: i32,
) -> Result<i32> {
    match stat {
        Ok(st) => {
            write_guest(caller, out, &st.to_record())?;
            Ok(0)
        }
        Err(err) => Ok(errno(err)),
    }
}

fn fs_stat(mut caller: Ctx<'_>, pptr: i32, plen: i32, out: i32) -> Result<i32> {
    enter(&caller)?;
    let path = read_path(&mut caller, pptr, plen)?;
    let stat = caller.data().fs.stat(&path);
    put_stat(&mut caller, stat, out)
}

fn fs_lstat(mut caller: Ctx<'_>, pptr: i32, plen: i32, out: i32) -> Result<i32> {
    enter(&caller)?;
    let path = read_path(&mut caller, pptr, plen)?;
    let stat = caller.data().fs.lstat(&path);
    put_stat(&mut caller, stat, out)
}

fn fs_fstat(mut caller: Ctx<'_>, fd: i32, out: i32) -> Result<i32> {
    enter(&caller)?;
    let stat = caller.data().fs.fstat(fd);
    put_stat(&mut caller, stat, out)
}

fn fs_mkdir(mut caller: Ctx<'_>, pptr: i32, plen: i32, mode: i32) -> Result<i32> {
    enter(&caller)?;
    let path = read_path(&mut caller, pptr, plen)?;
    Ok(status(caller.data().fs.mkdir(&path, mode as u32)))
}

fn fs_rmdir(mut caller: Ctx<'_>, pptr: i32, plen: i32) -> Result<i32> {
    enter(&caller)?;
    let path = read_path(&mut caller, pptr, plen)?;
    Ok(status(caller.data().fs.rmdir(&path)))
}

fn fs_unlink(mut caller: Ctx<'_>, pptr: i32, plen: i32) -> Result<i32> {
    enter(&caller)?;
    let path = read_path(&mut caller, pptr, plen)?;
    Ok(status(caller.data().fs.unlink(&path)))
}

fn two_paths(
    caller: &mut Ctx<'_>,
    aptr: i32,
    alen: i32,
    bptr: i32,
    blen: i32,
) -> Result<(String, String)> {
    Ok((
        read_path(caller, aptr, alen)?,
        read_path(caller, bptr, blen)?,
    ))
}

fn fs_rename(mut caller: Ctx<'_>, aptr: i32, alen: i32, bptr: i32, blen: i32) -> Result<i32> {
    enter(&caller)?;
    let (from, to) = two_paths(&mut caller, aptr, alen, bptr, blen)?;
    Ok(status(caller.data().fs.rename(&from, &to)))
}

fn fs_link(mut caller: Ctx<'_>, aptr: i32, alen: i32, bptr: i32, blen: i32) -> Result<i32> {
    enter(&caller)?;
    let (existing, new) = two_paths(&mut caller, aptr, alen, bptr, blen)?;
    Ok(status(caller.data().fs.link(&existing, &new)))
}

fn fs_symlink(mut caller: Ctx<'_>, aptr: i32, alen: i32, bptr: i32, blen: i32) -> Result<i32> {
    enter(&caller)?;
    let (target, link) = two_paths(&mut caller, aptr, alen, bptr, blen)?;
    Ok(status(caller.data().fs.symlink(&target, &link)))
}

fn fs_readdir(mut caller: Ctx<'_>, pptr: i32, plen: i32, ptr: i32, len: i32) -> Result<i32> {
    enter(&caller)?;
    let path = read_path(&mut caller, pptr, plen)?;
    let names = match caller.data().fs.readdir(&path) {
        Ok(names) => names,
        Err(err) => return Ok(errno(err)),
    };
    let mut packed = Vec::new();
    for name in names {
        packed.extend_from_slice(name.as_bytes());
        packed.push(0);
    }
    copy_exact(&mut caller, &packed, ptr, len)
}

// -------------------------
// Process
// -------------------------

fn proc_getcwd(mut caller: Ctx<'_>, ptr: i32, len: i32) -> Result<i32> {
    enter(&caller)?;
    let cwd = caller.data().process.cwd();
    copy_exact(&mut caller, cwd.as_bytes(), ptr, len)
}

fn proc_chdir(mut caller: Ctx<'_>, pptr: i32, plen: i32) -> Result<i32> {
    enter(&caller)?;
    let path = read_path(&mut caller, pptr, plen)?;
    Ok(status(caller.data().process.chdir(&path)))
}

fn proc_umask(caller: Ctx<'_>, mask: i32) -> Result<i32> {
    enter(&caller)?;
    Ok(match caller.data().process.umask(mask as u32) {
        Ok(old) => old as i32,
        Err(err) => errno(err),
    })
}

fn proc_getgroups(mut caller: Ctx<'_>, ptr: i32, len: i32) -> Result<i32> {
    enter(&caller)?;
    let groups = match caller.data().process.getgroups() {
        Ok(groups) => groups,
        Err(err) => return Ok(errno(err)),
    };
    let packed: Vec<u8> = groups.iter().flat_map(|g| g.to_le_bytes()).collect();
    let written = copy_exact(&mut caller, &packed, ptr, len)?;
    if written < 0 {
        return Ok(written);
    }
    Ok(groups.len() as i32)
}

// -------------------------
// Runtime services
// -------------------------

fn rt_register_hook(mut caller: Ctx<'_>, nptr: i32, nlen: i32) -> Result<i32> {
    enter(&caller)?;
    let name = read_path(&mut caller, nptr, nlen)?;
    if name.is_empty() {
        return Ok(-EINVAL);
    }
    let ctx = caller.data();
    tracing::debug!(target: "gobox::sandbox", hook = %name, "guest registered cancellation hook");
    ctx.hooks.bind(name, ctx.cancel_hook());
    Ok(0)
}

fn rt_exit(_caller: Ctx<'_>, code: i32) -> Result<()> {
    Err(GuestExit(code).into())
}
