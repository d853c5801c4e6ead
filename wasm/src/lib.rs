//! blurworker guest SDK
//!
//! Helpers for writing a module the relay can drive. The crate exports the
//! allocator pair the host uses to place buffers in linear memory, and the
//! [`entry_fn!`] macro generates the `start` entry point:
//!
//! ```ignore
//! use blurworker_guest::*;
//!
//! entry_fn!(|args: &str, payload: Vec<u8>| {
//!     let args = BlurArgs::parse(args);
//!     if args.sigma <= 0.0 {
//!         return Ok(None);
//!     }
//!     Ok(Some(payload))
//! });
//! ```
//!
//! The entry point owns both input buffers and frees them before returning.
//! Output is handed back as a length-prefixed record the host releases with
//! [`dealloc`].

pub use blurworker_shared::wasm::{encode_output, error_codes, RESULT_EMPTY};
pub use blurworker_shared::{BlurArgs, DEFAULT_EXTENSION};

use std::alloc::{alloc as raw_alloc, dealloc as raw_dealloc, Layout};
use std::ffi::{c_char, CStr};

/// Result type returned by entry point bodies
pub type EntryResult = Result<Option<Vec<u8>>, i32>;

/// Every block starts with its requested size, so freeing never depends on
/// the caller knowing it.
const BLOCK_HEADER: usize = std::mem::size_of::<u32>();

fn block_layout(size: u32) -> Option<Layout> {
    Layout::from_size_align(BLOCK_HEADER + size as usize, BLOCK_HEADER).ok()
}

/// Allocate memory for the WASM host
#[no_mangle]
pub extern "C" fn alloc(size: u32) -> *mut u8 {
    let Some(layout) = block_layout(size) else {
        return std::ptr::null_mut();
    };
    unsafe {
        let block = raw_alloc(layout);
        if block.is_null() {
            return block;
        }
        (block as *mut u32).write(size);
        block.add(BLOCK_HEADER)
    }
}

/// Deallocate memory for the WASM host.
///
/// `size` is accepted for the host ABI but the block's own header decides
/// how much is released.
#[no_mangle]
pub extern "C" fn dealloc(ptr: *mut u8, _size: u32) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        let block = ptr.sub(BLOCK_HEADER);
        if let Some(layout) = block_layout((block as *const u32).read()) {
            raw_dealloc(block, layout);
        }
    }
}

/// Take ownership of the host's argument buffer and free it.
///
/// # Safety
///
/// `ptr` must point to a NUL-terminated buffer returned by [`alloc`] and
/// must not be used again. Anything after the first NUL is ignored.
pub unsafe fn take_args(ptr: *mut u8) -> Result<String, i32> {
    let args = CStr::from_ptr(ptr as *const c_char)
        .to_str()
        .map(str::to_owned)
        .map_err(|_| error_codes::INVALID_ARGS);
    dealloc(ptr, 0);
    args
}

/// Take ownership of the host's payload buffer and free it.
///
/// # Safety
///
/// `ptr` must have been returned by [`alloc`] for at least `len` bytes and
/// must not be used again.
pub unsafe fn take_payload(ptr: *mut u8, len: u32) -> Vec<u8> {
    let payload = std::slice::from_raw_parts(ptr, len as usize).to_vec();
    dealloc(ptr, len);
    payload
}

/// Encode an entry point body's result as the return value for the host.
///
/// Error codes must be negative; others are reported as
/// [`error_codes::INVALID_ARGS`]. Output addresses must stay below 2 GiB to
/// read as positive.
pub fn finish(result: EntryResult) -> i32 {
    match result {
        Ok(None) => RESULT_EMPTY,
        Ok(Some(output)) => {
            let record = encode_output(&output);
            let ptr = alloc(record.len() as u32);
            if ptr.is_null() {
                return error_codes::ENCODE_FAILED;
            }
            unsafe { std::ptr::copy_nonoverlapping(record.as_ptr(), ptr, record.len()) };
            ptr as usize as i32
        }
        Err(code) if code < 0 => code,
        Err(_) => error_codes::INVALID_ARGS,
    }
}

/// Define the module's `start` entry point.
///
/// The body receives the argument string and the payload and returns an
/// [`EntryResult`]: `Ok(Some(bytes))` for output, `Ok(None)` for none,
/// `Err(code)` with a negative, module-defined code on failure.
#[macro_export]
macro_rules! entry_fn {
    ($body:expr) => {
        #[no_mangle]
        pub extern "C" fn start(args_ptr: *mut u8, payload_ptr: *mut u8, payload_len: u32) -> i32 {
            let body: fn(&str, Vec<u8>) -> $crate::EntryResult = $body;

            // The host allocated both buffers with `alloc` and no longer touches them
            let payload = unsafe { $crate::take_payload(payload_ptr, payload_len) };
            let args = match unsafe { $crate::take_args(args_ptr) } {
                Ok(args) => args,
                Err(code) => return code,
            };

            $crate::finish(body(&args, payload))
        }
    };
}

/// Log a message through the host (for debugging)
#[allow(dead_code)]
#[cfg(target_arch = "wasm32")]
pub fn log(msg: &str) {
    extern "C" {
        fn log(ptr: u32, len: u32);
    }

    unsafe {
        log(msg.as_ptr() as u32, msg.len() as u32);
    }
}

/// Milliseconds since the host instantiated the module
#[allow(dead_code)]
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    extern "C" {
        fn now_ms() -> f64;
    }

    unsafe { now_ms() }
}
