use std::fs::File;
use std::io;
use std::os::windows::io::AsRawHandle;
use std::ptr;

use winapi::shared::minwindef::DWORD;
use winapi::um::fileapi::FlushFileBuffers;
use winapi::um::handleapi::CloseHandle;
use winapi::um::memoryapi::{
    CreateFileMappingW, FlushViewOfFile, MapViewOfFile, UnmapViewOfFile, FILE_MAP_READ,
    FILE_MAP_WRITE,
};
use winapi::um::winnt::PAGE_READWRITE;

use super::Flush;

/// Maps the full range `[0, len)` of `file` read/write, shared with any
/// other mapping of the same file.
///
/// # Safety
///
/// `len` must not exceed the current length of `file`.
pub(crate) unsafe fn map_file(file: &File, len: usize) -> io::Result<*mut u8> {
    let handle = CreateFileMappingW(
        file.as_raw_handle(),
        ptr::null_mut(),
        PAGE_READWRITE,
        (len >> 32) as DWORD,
        (len & 0xffff_ffff) as DWORD,
        ptr::null(),
    );
    if handle.is_null() {
        return Err(io::Error::last_os_error());
    }

    let view = MapViewOfFile(handle, FILE_MAP_READ | FILE_MAP_WRITE, 0, 0, len);
    CloseHandle(handle);

    if view.is_null() {
        Err(io::Error::last_os_error())
    } else {
        Ok(view as *mut u8)
    }
}

/// Unmaps a region previously returned by [`map_file`].
///
/// # Safety
///
/// `ptr` must be a view returned by a prior `map_file` call that has not
/// already been unmapped. `len` is unused on this platform.
pub(crate) unsafe fn unmap(ptr: *mut u8, _len: usize) -> io::Result<()> {
    if UnmapViewOfFile(ptr as _) == 0 {
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
/// `ptr` and `len` must describe a range within a live mapping of `file`.
pub(crate) unsafe fn flush(ptr: *mut u8, file: &File, len: usize, mode: Flush) -> io::Result<()> {
    if FlushViewOfFile(ptr as _, len) == 0 {
        return Err(io::Error::last_os_error());
    }
    if mode == Flush::Sync && FlushFileBuffers(file.as_raw_handle()) == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
