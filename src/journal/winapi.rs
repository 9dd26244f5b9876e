//! Windows API bindings for change journal access
//!
//! Safe wrappers around the Win32 calls the journal port needs: volume
//! handles, the USN journal IOCTLs, and file-id based path resolution.

use crate::error::{Result, UsnTraceError};
use crate::journal::structs::JournalState;
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::ptr;

// ============================================================================
// IOCTL Control Codes (from winioctl.h)
// ============================================================================

pub const FSCTL_QUERY_USN_JOURNAL: u32 = 0x000900F4;
pub const FSCTL_READ_USN_JOURNAL: u32 = 0x000900BB;

// CreateFile parameters
pub const GENERIC_READ: u32 = 0x80000000;
pub const FILE_SHARE_READ: u32 = 0x00000001;
pub const FILE_SHARE_WRITE: u32 = 0x00000002;
pub const FILE_SHARE_DELETE: u32 = 0x00000004;
pub const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x02000000;

pub const INVALID_HANDLE_VALUE: isize = -1;

// Win32 error codes the journal operations classify on
const ERROR_ACCESS_DENIED: i32 = 5;
const ERROR_INVALID_FUNCTION: i32 = 1;
const ERROR_NOT_SUPPORTED: i32 = 50;
const ERROR_HANDLE_EOF: i32 = 38;
const ERROR_JOURNAL_DELETE_IN_PROGRESS: i32 = 1178;
const ERROR_JOURNAL_NOT_ACTIVE: i32 = 1179;

// ============================================================================
// Safe Handle Wrapper
// ============================================================================

/// RAII wrapper for a Windows HANDLE
pub struct SafeHandle {
    handle: isize,
}

impl SafeHandle {
    pub fn new(handle: isize) -> Option<Self> {
        if handle == INVALID_HANDLE_VALUE || handle == 0 {
            None
        } else {
            Some(Self { handle })
        }
    }

    pub fn as_raw(&self) -> isize {
        self.handle
    }

    fn as_win32(&self) -> windows::Win32::Foundation::HANDLE {
        windows::Win32::Foundation::HANDLE(self.handle as *mut std::ffi::c_void)
    }
}

impl Drop for SafeHandle {
    fn drop(&mut self) {
        if self.handle != INVALID_HANDLE_VALUE && self.handle != 0 {
            unsafe {
                let _ = windows::Win32::Foundation::CloseHandle(self.as_win32());
            }
        }
    }
}

// ============================================================================
// Volume Operations
// ============================================================================

/// Open a volume handle for journal IOCTLs.
pub fn open_volume(drive_letter: char) -> Result<SafeHandle> {
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::HANDLE;
    use windows::Win32::Storage::FileSystem::{
        CreateFileW, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_MODE, OPEN_EXISTING,
    };

    let path = format!("\\\\.\\{}:", drive_letter);
    let wide_path: Vec<u16> = OsStr::new(&path)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    let handle = unsafe {
        CreateFileW(
            PCWSTR::from_raw(wide_path.as_ptr()),
            GENERIC_READ,
            FILE_SHARE_MODE(FILE_SHARE_READ | FILE_SHARE_WRITE),
            None,
            OPEN_EXISTING,
            FILE_FLAGS_AND_ATTRIBUTES(0),
            HANDLE::default(),
        )
    };

    match handle {
        Ok(h) => SafeHandle::new(h.0 as isize).ok_or_else(|| {
            UsnTraceError::VolumeOpen(path.clone(), std::io::Error::last_os_error())
        }),
        Err(e) => {
            let io = std::io::Error::from_raw_os_error(e.code().0 & 0xFFFF);
            if io.raw_os_error() == Some(ERROR_ACCESS_DENIED) {
                Err(UsnTraceError::AccessDenied(drive_letter.to_string()))
            } else {
                Err(UsnTraceError::VolumeOpen(path, io))
            }
        }
    }
}

// ============================================================================
// IOCTL Operations
// ============================================================================

/// Send a DeviceIoControl request, keeping the raw OS error for callers
/// that classify on the code.
fn ioctl(
    handle: &SafeHandle,
    control_code: u32,
    in_buffer: Option<&[u8]>,
    out_buffer: &mut [u8],
) -> std::io::Result<u32> {
    use windows::Win32::System::IO::DeviceIoControl;

    let mut bytes_returned: u32 = 0;

    let (in_ptr, in_size) = match in_buffer {
        Some(buf) => (buf.as_ptr() as *const std::ffi::c_void, buf.len() as u32),
        None => (ptr::null(), 0),
    };

    let result = unsafe {
        DeviceIoControl(
            handle.as_win32(),
            control_code,
            Some(in_ptr),
            in_size,
            Some(out_buffer.as_mut_ptr() as *mut std::ffi::c_void),
            out_buffer.len() as u32,
            Some(&mut bytes_returned),
            None,
        )
    };

    if result.is_ok() {
        Ok(bytes_returned)
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Query the change journal's current state.
pub fn query_usn_journal(handle: &SafeHandle, volume: char) -> Result<JournalState> {
    let mut buffer = [0u8; 0x38];

    match ioctl(handle, FSCTL_QUERY_USN_JOURNAL, None, &mut buffer) {
        Ok(_) => JournalState::from_bytes(&buffer).ok_or_else(|| {
            UsnTraceError::JournalQuery(volume.to_string(), "short journal state".to_string())
        }),
        Err(e) => match e.raw_os_error() {
            Some(ERROR_JOURNAL_NOT_ACTIVE) | Some(ERROR_JOURNAL_DELETE_IN_PROGRESS) => {
                Err(UsnTraceError::NoJournal(volume.to_string()))
            }
            Some(ERROR_ACCESS_DENIED) => Err(UsnTraceError::AccessDenied(volume.to_string())),
            Some(ERROR_INVALID_FUNCTION) | Some(ERROR_NOT_SUPPORTED) => {
                Err(UsnTraceError::Unsupported(format!("volume '{volume}'")))
            }
            _ => Err(UsnTraceError::JournalQuery(volume.to_string(), e.to_string())),
        },
    }
}

/// Input structure for FSCTL_READ_USN_JOURNAL (READ_USN_JOURNAL_DATA_V0)
#[repr(C, packed)]
struct ReadUsnJournalData {
    start_usn: i64,
    reason_mask: u32,
    return_only_on_close: u32,
    timeout: u64,
    bytes_to_wait_for: u64,
    usn_journal_id: u64,
}

/// Read one buffer of journal entries starting at `start_usn`.
///
/// Returns the next USN to continue from and the byte count written to
/// `buffer` (first 8 bytes of which are that next USN).
pub fn read_usn_journal(
    handle: &SafeHandle,
    journal_id: u64,
    start_usn: i64,
    reason_mask: u32,
    buffer: &mut [u8],
    volume: char,
) -> Result<(i64, usize)> {
    let input = ReadUsnJournalData {
        start_usn,
        reason_mask,
        return_only_on_close: 0,
        timeout: 0,
        bytes_to_wait_for: 0,
        usn_journal_id: journal_id,
    };

    let input_bytes = unsafe {
        std::slice::from_raw_parts(
            &input as *const ReadUsnJournalData as *const u8,
            std::mem::size_of::<ReadUsnJournalData>(),
        )
    };

    let bytes_returned = match ioctl(handle, FSCTL_READ_USN_JOURNAL, Some(input_bytes), buffer) {
        Ok(n) => n,
        Err(e) if e.raw_os_error() == Some(ERROR_HANDLE_EOF) => return Ok((start_usn, 0)),
        Err(e) => {
            return Err(UsnTraceError::JournalRead(volume.to_string(), e.to_string()));
        }
    };

    if bytes_returned < 8 {
        return Ok((start_usn, 0));
    }

    let next_usn = i64::from_le_bytes(buffer[0..8].try_into().unwrap_or([0; 8]));

    Ok((next_usn, bytes_returned as usize))
}

// ============================================================================
// Path Resolution
// ============================================================================

/// Resolve a file reference to its current full path via OpenFileById and
/// GetFinalPathNameByHandleW.
///
/// Any failure collapses to `PathResolve`: the object may be gone, the path
/// may exceed the buffer, or access may be denied. Callers treat all of
/// these as "path unknown".
pub fn resolve_file_reference(volume_handle: &SafeHandle, reference: u64) -> Result<String> {
    use windows::Win32::Storage::FileSystem::{
        FileIdType, GetFinalPathNameByHandleW, OpenFileById, FILE_FLAGS_AND_ATTRIBUTES,
        FILE_ID_DESCRIPTOR, FILE_ID_DESCRIPTOR_0, FILE_SHARE_MODE,
        GETFINALPATHNAMEBYHANDLE_FLAGS,
    };

    let descriptor = FILE_ID_DESCRIPTOR {
        dwSize: std::mem::size_of::<FILE_ID_DESCRIPTOR>() as u32,
        Type: FileIdType,
        Anonymous: FILE_ID_DESCRIPTOR_0 {
            FileId: reference as i64,
        },
    };

    // BACKUP_SEMANTICS is required to open directories by id
    let handle = unsafe {
        OpenFileById(
            volume_handle.as_win32(),
            &descriptor,
            0,
            FILE_SHARE_MODE(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE),
            None,
            FILE_FLAGS_AND_ATTRIBUTES(FILE_FLAG_BACKUP_SEMANTICS),
        )
    }
    .map_err(|_| UsnTraceError::PathResolve(reference))?;

    let handle =
        SafeHandle::new(handle.0 as isize).ok_or(UsnTraceError::PathResolve(reference))?;

    let mut name_buffer = [0u16; 1024];
    let len = unsafe {
        GetFinalPathNameByHandleW(
            handle.as_win32(),
            &mut name_buffer,
            GETFINALPATHNAMEBYHANDLE_FLAGS(0),
        )
    };

    if len == 0 || len as usize > name_buffer.len() {
        return Err(UsnTraceError::PathResolve(reference));
    }

    let path = String::from_utf16_lossy(&name_buffer[..len as usize]);
    Ok(path
        .strip_prefix("\\\\?\\")
        .map(str::to_string)
        .unwrap_or(path))
}
