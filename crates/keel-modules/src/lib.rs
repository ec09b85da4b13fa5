//! Native-module cache and symbol resolution for keel stored functions.
//!
//! Stored functions can be implemented as exported symbols in shared
//! libraries on disk. This crate locates a library by logical package name,
//! loads it through a unique staging path, resolves entry points inside it,
//! and keeps loaded images alive exactly as long as something still uses
//! them: the owning cache, a resolved [`SymbolBinding`], or a call in
//! flight.
//!
//! # Caches
//!
//! Two cache generations coexist. The *legacy* generation backs deferred
//! by-name bindings: entries are stale-tolerant and replaced only by an
//! explicit [`ModuleHost::reload`], which atomically rebinds every live
//! binding to the new image (or rolls back if a symbol went missing). The
//! *modern* generation backs explicit [`ModuleHost::load`] handles: entries
//! are revalidated against the on-disk identity on every lookup and a
//! changed file replaces the entry, orphaning the old image.
//!
//! # Concurrency
//!
//! Everything runs on one cooperative executor thread. Native calls may
//! suspend, so the call path pins the providing module for the duration of
//! the invocation; a reload racing a suspended call retargets the binding
//! without unmapping the image under the callee.

mod binding;
mod diag;
mod error;
mod host;
mod loader;
mod module;
mod name;
mod port;
mod reload;
mod resolve;

pub use binding::SymbolBinding;
pub use error::ModuleError;
pub use host::ModuleHost;
pub use loader::SourceIdent;
pub use module::{Generation, Module};
pub use name::FuncName;
pub use port::OutPort;
pub use resolve::{DirResolver, MODULE_PATH_ENV, ResolveModulePath};
