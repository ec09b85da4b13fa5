//! Minimal example native module using the shared keel-cabi-types crate.
//!
//! Load it under the package name `demo_cabi_module` and bind
//! `demo_cabi_module.keel_echo` or either failure entry point.

use core::ffi::c_int;

use keel_cabi_types::{KEEL_FAIL, KeelCallCtxV1};

/// Copies the argument bytes verbatim into the result port.
///
/// # Safety
/// Caller must provide a valid context whose pointers live for the duration
/// of this call; `args..args_end` must be a readable byte range.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn keel_echo(
	ctx: *mut KeelCallCtxV1,
	args: *const u8,
	args_end: *const u8,
) -> c_int {
	if ctx.is_null() {
		return KEEL_FAIL;
	}
	let ctx_ref = unsafe { &*ctx };
	let Some(emit) = ctx_ref.emit else {
		return KEEL_FAIL;
	};

	let len = unsafe { args_end.offset_from(args) };
	if len < 0 {
		return KEEL_FAIL;
	}
	unsafe { emit(ctx_ref.port, args, len as usize) }
}

/// Fails without recording a diagnostic; the host reports a generic error.
///
/// # Safety
/// `ctx` may be anything; it is not dereferenced.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn keel_fail_plain(
	_ctx: *mut KeelCallCtxV1,
	_args: *const u8,
	_args_end: *const u8,
) -> c_int {
	KEEL_FAIL
}

/// Records a diagnostic through the host hook, then fails.
///
/// # Safety
/// Caller must provide a valid context whose pointers live for the duration
/// of this call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn keel_fail_with_diag(
	ctx: *mut KeelCallCtxV1,
	_args: *const u8,
	_args_end: *const u8,
) -> c_int {
	if !ctx.is_null()
		&& let Some(set_error) = unsafe { &*ctx }.set_error
	{
		unsafe { set_error(c"demo module declined the call".as_ptr()) };
	}
	KEEL_FAIL
}
