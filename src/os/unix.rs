use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::ptr;

use libc::{
    c_void, mmap, msync, munmap, MAP_FAILED, MAP_SHARED, MS_ASYNC, MS_SYNC, PROT_READ, PROT_WRITE,
};

use super::Flush;

/// Maps the full range `[0, len)` of `file` read/write, shared with any
/// other mapping of the same file.
///
/// # Safety
///
/// `len` must not exceed the current length of `file`; mapping past the
/// end of the file is undefined by this wrapper (the kernel tolerates it,
/// but reads past the true end are unspecified).
pub(crate) unsafe fn map_file(file: &File, len: usize) -> io::Result<*mut u8> {
    let ptr = mmap(
        ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_SHARED,
        file.as_raw_fd(),
        0,
    );
    if ptr == MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(ptr as *mut u8)
    }
}

/// Unmaps a region previously returned by [`map_file`].
///
/// # Safety
///
/// `ptr` and `len` must be the exact pair returned by a prior `map_file`
/// call that has not already been unmapped.
pub(crate) unsafe fn unmap(ptr: *mut u8, len: usize) -> io::Result<()> {
    if munmap(ptr as *mut c_void, len) < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Requests that dirty pages in `[ptr, ptr+len)` be written back to the
/// backing file.
///
/// # Safety
///
/// `ptr` and `len` must describe a range within a live mapping.
pub(crate) unsafe fn flush(ptr: *mut u8, _file: &File, len: usize, mode: Flush) -> io::Result<()> {
    let flags = match mode {
        Flush::Sync => MS_SYNC,
        Flush::Async => MS_ASYNC,
    };
    if msync(ptr as *mut c_void, len, flags) < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
