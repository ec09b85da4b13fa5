//! Shared-object loading through a unique staging path.
//!
//! The dynamic linker caches images by path, so opening the same file twice
//! hands back the same handle. Every load therefore copies the object to a
//! fresh temporary path first, which forces a distinct image and lets two
//! generations of one package coexist during reload. The staging path is
//! removed as soon as the image is open; the handle keeps it mapped.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::ModuleError;
use crate::resolve::library_extension;

/// On-disk identity of a module source, captured at load time.
///
/// Equality is the staleness test for the freshness-checked cache: a
/// `touch(1)` on the file is enough to invalidate an entry, while device
/// and inode guard against the path being repointed at another file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceIdent {
	dev: u64,
	ino: u64,
	size: u64,
	mtime_sec: i64,
	mtime_nsec: i64,
}

impl SourceIdent {
	/// Captures the identity of the file at `path`.
	pub fn probe(path: &Path) -> Result<Self, ModuleError> {
		let meta = fs::metadata(path).map_err(|source| ModuleError::Io {
			op: "stat",
			path: path.to_path_buf(),
			source,
		})?;

		#[cfg(unix)]
		{
			use std::os::unix::fs::MetadataExt;
			Ok(Self {
				dev: meta.dev(),
				ino: meta.ino(),
				size: meta.size(),
				mtime_sec: meta.mtime(),
				mtime_nsec: meta.mtime_nsec(),
			})
		}
		#[cfg(not(unix))]
		{
			let mtime = meta
				.modified()
				.ok()
				.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
				.unwrap_or_default();
			Ok(Self {
				dev: 0,
				ino: 0,
				size: meta.len(),
				mtime_sec: mtime.as_secs() as i64,
				mtime_nsec: mtime.subsec_nanos() as i64,
			})
		}
	}

	pub(crate) fn size(&self) -> u64 {
		self.size
	}
}

/// Copies the object at `path` to a unique staging path and opens it.
///
/// Returns the open library together with the source identity captured
/// before the copy. The staged copy and its directory are removed before
/// returning; failures there are logged and otherwise ignored.
pub(crate) fn load_object(
	path: &Path,
	package: &str,
) -> Result<(libloading::Library, SourceIdent), ModuleError> {
	let ident = SourceIdent::probe(path)?;

	let staging = tempfile::Builder::new()
		.prefix("keel-mod-")
		.tempdir()
		.map_err(|source| ModuleError::Io {
			op: "mkdtemp",
			path: std::env::temp_dir(),
			source,
		})?;
	let staged = staging
		.path()
		.join(format!("{package}.{}", library_extension()));

	// fs::copy carries the source permission bits over, so the staged file
	// stays executable where the original was.
	let copied = fs::copy(path, &staged).map_err(|source| ModuleError::Io {
		op: "copy",
		path: path.to_path_buf(),
		source,
	})?;
	if copied != ident.size() {
		return Err(ModuleError::Io {
			op: "copy",
			path: path.to_path_buf(),
			source: std::io::Error::other(format!(
				"short copy: {copied} of {} bytes",
				ident.size()
			)),
		});
	}

	let lib = open_local_now(&staged).map_err(|source| ModuleError::Load {
		package: package.to_owned(),
		source,
	})?;
	debug!(package, source = %path.display(), "opened module image");

	if let Err(error) = fs::remove_file(&staged) {
		warn!(staged = %staged.display(), %error, "failed to unlink staged module");
	}
	if let Err(error) = staging.close() {
		warn!(%error, "failed to remove module staging directory");
	}

	Ok((lib, ident))
}

/// Opens `path` with immediate symbol resolution and local visibility.
fn open_local_now(path: &Path) -> Result<libloading::Library, libloading::Error> {
	#[cfg(unix)]
	{
		use libloading::os::unix::{Library, RTLD_LOCAL, RTLD_NOW};
		unsafe { Library::open(Some(path), RTLD_NOW | RTLD_LOCAL) }.map(Into::into)
	}
	#[cfg(not(unix))]
	{
		unsafe { libloading::Library::new(path) }
	}
}
