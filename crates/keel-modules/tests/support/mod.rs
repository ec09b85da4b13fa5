//! Shared test helpers.
//!
//! Fixture modules are compiled on demand with the in-toolchain `rustc`
//! into per-test temporary directories, so reload scenarios can produce two
//! generations of the same package. The fixture declares the call ABI
//! itself, the way a C module would.

#![allow(dead_code)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// One variant of the fixture module source.
pub struct Fixture {
	pub version: &'static str,
	pub with_f2: bool,
}

impl Fixture {
	pub fn v1() -> Self {
		Self { version: "v1", with_f2: true }
	}

	pub fn v2() -> Self {
		Self { version: "v2", with_f2: true }
	}

	/// A second generation that dropped `f2`, for rollback scenarios.
	pub fn v2_without_f2() -> Self {
		Self { version: "v2", with_f2: false }
	}

	fn source(&self) -> String {
		let mut src = TEMPLATE.replace("__VERSION__", self.version);
		if self.with_f2 {
			src.push_str(&F2_BLOCK.replace("__VERSION__", self.version));
		}
		src
	}
}

/// Platform object-file name for `package`.
pub fn library_file(package: &str) -> String {
	#[cfg(target_os = "macos")]
	let ext = "dylib";
	#[cfg(not(target_os = "macos"))]
	let ext = "so";
	format!("{package}.{ext}")
}

/// Compiles `fixture` into `dir` under the package's object-file name.
///
/// Recompiling the same package overwrites the previous object, which is
/// how tests model an updated module on disk.
pub fn compile_module(dir: &Path, package: &str, fixture: &Fixture) -> PathBuf {
	let scratch = dir.join("fixture-src");
	fs::create_dir_all(&scratch).expect("create fixture scratch dir");
	let src = scratch.join(format!("{}.rs", sanitize(package)));
	fs::write(&src, fixture.source()).expect("write fixture source");

	let out = dir.join(library_file(package));
	let rustc = env::var_os("RUSTC").unwrap_or_else(|| "rustc".into());
	let output = Command::new(rustc)
		.arg("--edition=2021")
		.arg("--crate-type=cdylib")
		.arg("--crate-name")
		.arg(format!("fix_{}", sanitize(package)))
		.arg("-o")
		.arg(&out)
		.arg(&src)
		.output()
		.expect("failed to run rustc for the fixture module");
	assert!(
		output.status.success(),
		"fixture module failed to compile:\n{}",
		String::from_utf8_lossy(&output.stderr)
	);
	out
}

/// Installs a fmt subscriber honouring `RUST_LOG`, once per process.
pub fn init_tracing() {
	use tracing_subscriber::EnvFilter;
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

fn sanitize(package: &str) -> String {
	package.replace(['.', '-'], "_")
}

const TEMPLATE: &str = r#"
use std::ffi::{c_char, c_int, c_void};

#[repr(C)]
pub struct CallCtx {
    pub port: *mut c_void,
    pub emit: Option<unsafe extern "C" fn(*mut c_void, *const u8, usize) -> c_int>,
    pub set_error: Option<unsafe extern "C" fn(*const c_char)>,
}

unsafe fn emit_str(ctx: *mut CallCtx, s: &str) -> c_int {
    let ctx = &*ctx;
    match ctx.emit {
        Some(emit) => emit(ctx.port, s.as_ptr(), s.len()),
        None => 1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn f1(ctx: *mut CallCtx, _args: *const u8, _args_end: *const u8) -> c_int {
    emit_str(ctx, "f1:__VERSION__")
}

#[no_mangle]
pub unsafe extern "C" fn fail_plain(
    _ctx: *mut CallCtx,
    _args: *const u8,
    _args_end: *const u8,
) -> c_int {
    1
}

#[no_mangle]
pub unsafe extern "C" fn fail_diag(
    ctx: *mut CallCtx,
    _args: *const u8,
    _args_end: *const u8,
) -> c_int {
    let ctx = &*ctx;
    if let Some(set_error) = ctx.set_error {
        set_error(b"fixture declined\0".as_ptr() as *const c_char);
    }
    1
}

/// Reads a host hook address from the argument bytes and calls it before
/// emitting, so tests can interleave cache operations with a live call.
#[no_mangle]
pub unsafe extern "C" fn reentrant(
    ctx: *mut CallCtx,
    args: *const u8,
    args_end: *const u8,
) -> c_int {
    let len = args_end.offset_from(args);
    if len >= std::mem::size_of::<usize>() as isize {
        let mut raw = [0u8; std::mem::size_of::<usize>()];
        std::ptr::copy_nonoverlapping(args, raw.as_mut_ptr(), raw.len());
        let addr = usize::from_ne_bytes(raw);
        if addr != 0 {
            let hook: extern "C" fn() = std::mem::transmute(addr);
            hook();
        }
    }
    emit_str(ctx, "reentrant:__VERSION__")
}
"#;

const F2_BLOCK: &str = r#"
#[no_mangle]
pub unsafe extern "C" fn f2(ctx: *mut CallCtx, _args: *const u8, _args_end: *const u8) -> c_int {
    emit_str(ctx, "f2:__VERSION__")
}
"#;
