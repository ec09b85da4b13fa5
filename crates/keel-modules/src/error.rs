use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by module-cache operations.
#[derive(Error, Debug)]
pub enum ModuleError {
	/// Dotted function name is empty or has an empty package/symbol half.
	#[error("bad function name {0:?}")]
	BadName(String),

	/// The path resolver found no object file for the package.
	#[error("module '{0}' not found in the search path")]
	NotFound(String),

	/// A filesystem operation failed.
	#[error("{op} failed for {}", .path.display())]
	Io {
		/// The operation that failed (`stat`, `copy`, ...).
		op: &'static str,
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The dynamic linker rejected the image.
	#[error("failed to load module '{package}'")]
	Load {
		package: String,
		#[source]
		source: libloading::Error,
	},

	/// The requested symbol is absent from the loaded image.
	#[error("symbol '{symbol}' not found in module '{package}'")]
	SymbolNotFound { package: String, symbol: String },

	/// Reload was requested for a package that is not cached.
	#[error("no such module '{0}'")]
	NoSuchModule(String),

	/// Native code returned non-zero.
	#[error("module function failed: {0}")]
	Native(String),
}
