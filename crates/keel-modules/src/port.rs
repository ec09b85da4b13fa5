//! Result ports for native calls.

use std::ffi::{c_int, c_void};

use keel_cabi_types::{KEEL_FAIL, KEEL_OK, KeelCallCtxV1, KeelModuleFn};

use crate::diag;

/// Byte sink a native entry point writes its results into.
///
/// The host wires the port into the call context together with the `emit`
/// hook; native code never sees the representation.
#[derive(Debug, Default)]
pub struct OutPort {
	data: Vec<u8>,
}

impl OutPort {
	/// Creates an empty port.
	pub fn new() -> Self {
		Self::default()
	}

	/// Bytes emitted by the callee so far.
	pub fn data(&self) -> &[u8] {
		&self.data
	}

	/// Discards emitted bytes.
	pub fn clear(&mut self) {
		self.data.clear();
	}

	/// Consumes the port, returning the emitted bytes.
	pub fn into_data(self) -> Vec<u8> {
		self.data
	}

	/// Runs `entry` over `args` with this port wired into the call context.
	///
	/// The context lives on this frame and is valid for the duration of the
	/// call; the port pointer is not touched host-side until the callee
	/// returns.
	pub(crate) fn invoke(&mut self, entry: KeelModuleFn, args: &[u8]) -> c_int {
		let mut ctx = KeelCallCtxV1 {
			port: std::ptr::from_mut(self).cast(),
			emit: Some(emit_cabi),
			set_error: Some(diag::set_error_cabi),
		};
		let range = args.as_ptr_range();
		unsafe { entry(&mut ctx, range.start, range.end) }
	}
}

/// ABI bridge installed as the `emit` hook.
unsafe extern "C" fn emit_cabi(port: *mut c_void, data: *const u8, len: usize) -> c_int {
	if port.is_null() {
		return KEEL_FAIL;
	}
	if len == 0 {
		return KEEL_OK;
	}
	if data.is_null() {
		return KEEL_FAIL;
	}
	let port = unsafe { &mut *port.cast::<OutPort>() };
	port.data
		.extend_from_slice(unsafe { std::slice::from_raw_parts(data, len) });
	KEEL_OK
}
