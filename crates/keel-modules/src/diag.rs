//! Task-local diagnostics for native calls.
//!
//! Native code reports failure detail through the `set_error` hook in its
//! call context; the host reads the slot back when an entry point returns
//! non-zero. The executor is single-threaded, so task-local and
//! thread-local coincide.

use std::cell::RefCell;
use std::ffi::{CStr, c_char};

thread_local! {
	static DIAG: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Records a diagnostic for the current task, replacing any previous one.
pub(crate) fn set(msg: impl Into<String>) {
	DIAG.with(|slot| *slot.borrow_mut() = Some(msg.into()));
}

/// Takes the pending diagnostic, leaving the slot empty.
pub(crate) fn take() -> Option<String> {
	DIAG.with(|slot| slot.borrow_mut().take())
}

/// Empties the slot so a stale diagnostic cannot leak into the next call.
pub(crate) fn clear() {
	DIAG.with(|slot| *slot.borrow_mut() = None);
}

/// ABI bridge installed as the `set_error` hook.
pub(crate) unsafe extern "C" fn set_error_cabi(msg: *const c_char) {
	if msg.is_null() {
		return;
	}
	if let Ok(msg) = unsafe { CStr::from_ptr(msg) }.to_str() {
		set(msg);
	}
}
