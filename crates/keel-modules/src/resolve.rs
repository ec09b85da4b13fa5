//! Package path resolution.
//!
//! The cache itself only consumes [`ResolveModulePath`]; hosts embed
//! whatever lookup their deployment needs. [`DirResolver`] is the stock
//! implementation: a directory search path from the environment plus
//! configured directories, probed for the platform object-file names.

use std::env;
use std::path::PathBuf;

use crate::error::ModuleError;

/// Environment variable holding extra module search directories,
/// `env::split_paths` syntax.
pub const MODULE_PATH_ENV: &str = "KEEL_MODULE_PATH";

/// Maps a logical package name to the object file implementing it.
pub trait ResolveModulePath {
	/// Returns the absolute path of the object file for `package`.
	///
	/// Fails with [`ModuleError::NotFound`] when no candidate exists.
	fn resolve(&self, package: &str) -> Result<PathBuf, ModuleError>;
}

/// Filesystem resolver probing a list of directories.
///
/// Directories from [`MODULE_PATH_ENV`] are searched before the configured
/// ones; within a directory the bare name is probed before the
/// `lib`-prefixed one. The first existing candidate wins.
#[derive(Debug, Default, Clone)]
pub struct DirResolver {
	dirs: Vec<PathBuf>,
}

impl DirResolver {
	/// Creates a resolver over `dirs` (searched after the environment).
	pub fn new(dirs: Vec<PathBuf>) -> Self {
		Self { dirs }
	}

	fn search_dirs(&self) -> Vec<PathBuf> {
		let mut dirs = Vec::new();
		if let Some(path) = env::var_os(MODULE_PATH_ENV) {
			dirs.extend(env::split_paths(&path));
		}
		dirs.extend(self.dirs.iter().cloned());
		dirs
	}
}

impl ResolveModulePath for DirResolver {
	fn resolve(&self, package: &str) -> Result<PathBuf, ModuleError> {
		let ext = library_extension();
		let candidates = [format!("{package}.{ext}"), format!("lib{package}.{ext}")];

		for dir in self.search_dirs() {
			for candidate in &candidates {
				let path = dir.join(candidate);
				if path.is_file() {
					return path.canonicalize().map_err(|source| ModuleError::Io {
						op: "realpath",
						path,
						source,
					});
				}
			}
		}
		Err(ModuleError::NotFound(package.to_owned()))
	}
}

/// Platform shared-library extension.
pub(crate) fn library_extension() -> &'static str {
	#[cfg(target_os = "macos")]
	{
		"dylib"
	}
	#[cfg(target_os = "windows")]
	{
		"dll"
	}
	#[cfg(not(any(target_os = "macos", target_os = "windows")))]
	{
		"so"
	}
}
