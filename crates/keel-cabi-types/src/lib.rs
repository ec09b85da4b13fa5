//! C ABI shared between the keel host and native stored-function modules.
//!
//! A native module is a `cdylib` exporting one function per stored function,
//! each with the [`KeelModuleFn`] signature. The host passes a
//! [`KeelCallCtxV1`] whose hooks are the only way back into the host: `emit`
//! appends result bytes to the call's port, `set_error` records a diagnostic
//! that the host reports when the entry point returns non-zero.
//!
//! The structs are plain `#[repr(C)]` data so that modules can be written in
//! any language with a C FFI.

#![no_std]

use core::ffi::{c_char, c_int, c_void};

/// Return value of a successful module function.
pub const KEEL_OK: c_int = 0;

/// Generic failure return value; any non-zero value is treated as failure.
pub const KEEL_FAIL: c_int = 1;

/// Call context handed to a native entry point, version 1.
///
/// All pointers are owned by the host and valid only for the duration of the
/// call. Hooks are nullable so that future hosts can withhold them.
#[repr(C)]
pub struct KeelCallCtxV1 {
	/// Opaque result port owned by the host. Pass it back to `emit`.
	pub port: *mut c_void,
	/// Appends `len` bytes starting at `data` to the result port.
	/// Returns [`KEEL_OK`] on success.
	pub emit: Option<unsafe extern "C" fn(port: *mut c_void, data: *const u8, len: usize) -> c_int>,
	/// Records a NUL-terminated diagnostic message for the current task.
	/// Read by the host when the entry point returns non-zero.
	pub set_error: Option<unsafe extern "C" fn(msg: *const c_char)>,
}

/// Entry point of a native stored function.
///
/// `args` and `args_end` delimit the serialized argument bytes. Returns
/// [`KEEL_OK`] on success; any other value is a failure, optionally
/// explained through `set_error`.
pub type KeelModuleFn =
	unsafe extern "C" fn(ctx: *mut KeelCallCtxV1, args: *const u8, args_end: *const u8) -> c_int;
