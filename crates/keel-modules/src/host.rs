//! The module host: both cache generations and the public operations.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::binding::SymbolBinding;
use crate::diag;
use crate::error::ModuleError;
use crate::loader::{self, SourceIdent};
use crate::module::{Generation, Module};
use crate::port::OutPort;
use crate::resolve::ResolveModulePath;

/// The native-module cache, one instance per task executor.
///
/// Two keyed maps coexist because the two binding generations want opposite
/// staleness policies. Deferred by-name bindings go through the legacy map,
/// whose entries survive on-disk modification and even deletion; whoever
/// wants fresh code there calls [`reload`](Self::reload) explicitly. Handles
/// from [`load`](Self::load) go through the modern map, which revalidates
/// the on-disk identity on every lookup and replaces changed entries
/// automatically, orphaning the previous image.
///
/// The host is single-threaded (`!Send`, `!Sync`) and built for a
/// cooperative executor: an operation may suspend only inside loader I/O,
/// the injected path resolver, or a native invocation. None of the map or
/// binding-list manipulations span those points, which is what makes the
/// interleavings safe without locks.
pub struct ModuleHost {
	legacy: RefCell<HashMap<String, Rc<Module>>>,
	modern: RefCell<HashMap<String, Rc<Module>>>,
	resolver: Box<dyn ResolveModulePath>,
}

impl ModuleHost {
	/// Creates a host with empty caches.
	pub fn new(resolver: Box<dyn ResolveModulePath>) -> Self {
		Self {
			legacy: RefCell::new(HashMap::new()),
			modern: RefCell::new(HashMap::new()),
			resolver,
		}
	}

	fn cache(&self, generation: Generation) -> &RefCell<HashMap<String, Rc<Module>>> {
		match generation {
			Generation::Legacy => &self.legacy,
			Generation::Modern => &self.modern,
		}
	}

	/// Looks `package` up in the given cache generation.
	pub fn cached(&self, generation: Generation, package: &str) -> Option<Rc<Module>> {
		self.cache(generation).borrow().get(package).cloned()
	}

	/// Number of modules in the given cache generation.
	pub fn cached_modules(&self, generation: Generation) -> usize {
		self.cache(generation).borrow().len()
	}

	fn cache_insert(&self, generation: Generation, module: &Rc<Module>) {
		let previous = self
			.cache(generation)
			.borrow_mut()
			.insert(module.package().to_owned(), module.clone());
		debug_assert!(previous.is_none(), "insert over a live cache entry");
		module.set_cached(generation);
	}

	/// Replaces the entry for `module.package()`; the key must be present.
	///
	/// The maps are only touched between suspension points, so a missing
	/// key here means the cache was mutated out from under us; the refcount
	/// bookkeeping is torn and no consistent state is reachable.
	pub(crate) fn cache_update(&self, generation: Generation, module: &Rc<Module>) {
		let mut map = self.cache(generation).borrow_mut();
		match map.get_mut(module.package()) {
			Some(entry) => *entry = module.clone(),
			None => panic!("module cache lost the entry for '{}'", module.package()),
		}
		drop(map);
		module.set_cached(generation);
	}

	pub(crate) fn load_fresh(&self, path: &Path, package: &str) -> Result<Rc<Module>, ModuleError> {
		let (lib, ident) = loader::load_object(path, package)?;
		Ok(Module::new(package, lib, ident))
	}

	pub(crate) fn resolve_path(&self, package: &str) -> Result<std::path::PathBuf, ModuleError> {
		self.resolver.resolve(package)
	}

	/// Resolves a binding's entry point, loading its module if needed.
	///
	/// A deferred binding goes through the legacy cache: a miss resolves
	/// the package path and loads the object, a hit reuses the cached copy
	/// even if the file changed on disk since. An anchored binding resolves
	/// against its own module only. Already-resolved bindings are left
	/// alone.
	pub fn bind(&self, binding: &Rc<SymbolBinding>) -> Result<(), ModuleError> {
		if binding.is_resolved() {
			return Ok(());
		}

		let name = binding.func_name();
		let module = match binding.anchor() {
			Some(module) => module.clone(),
			None => self.legacy_module(name.package())?,
		};
		let addr = module.entry(name.symbol())?;
		SymbolBinding::bind_to(binding, module, addr);
		Ok(())
	}

	/// Finds or loads the legacy-cache module for `package`.
	fn legacy_module(&self, package: &str) -> Result<Rc<Module>, ModuleError> {
		if let Some(cached) = self.cached(Generation::Legacy, package) {
			return Ok(cached);
		}
		let path = self.resolve_path(package)?;
		let module = self.load_fresh(&path, package)?;
		self.cache_insert(Generation::Legacy, &module);
		info!(package, "module loaded into legacy cache");
		Ok(module)
	}

	/// Releases a binding's resolved entry point. No-op when unresolved.
	///
	/// Dropping the last `Rc` of a binding does the same implicitly.
	pub fn unbind(&self, binding: &SymbolBinding) {
		binding.unbind();
	}

	/// Invokes a binding with `args`, collecting result bytes into `out`.
	///
	/// Deferred bindings resolve on first call; that resolution can fail
	/// the call with anything [`bind`](Self::bind) can fail with. The
	/// providing module is pinned for the duration of the invocation:
	/// native code may suspend, and a reload of the same package while the
	/// frame is live retargets the binding but must not unmap the image
	/// under the callee. On a non-zero return the port is cleared and the
	/// callee's diagnostic, if any, becomes the error message.
	pub fn call(
		&self,
		binding: &Rc<SymbolBinding>,
		args: &[u8],
		out: &mut OutPort,
	) -> Result<(), ModuleError> {
		if !binding.is_resolved() {
			self.bind(binding)?;
		}
		let (pinned, addr) = binding
			.target()
			.expect("binding resolved above");

		diag::clear();
		let rc = out.invoke(addr, args);
		drop(pinned);

		if rc != 0 {
			out.clear();
			let msg = diag::take().unwrap_or_else(|| "unknown error".to_owned());
			debug!(name = binding.name(), rc, "module function failed");
			return Err(ModuleError::Native(msg));
		}
		Ok(())
	}

	/// Loads `package` through the freshness-checked cache.
	///
	/// The returned reference is the caller's to release, by dropping it or
	/// through [`unload`](Self::unload). A cached copy is revalidated
	/// against the current on-disk identity; on mismatch a fresh image
	/// replaces the cache entry and the previous module is orphaned.
	/// Bindings anchored to the orphan keep working off the old image until
	/// their holders let go; they are deliberately not migrated.
	pub fn load(&self, package: &str) -> Result<Rc<Module>, ModuleError> {
		let path = self.resolve_path(package)?;

		let Some(cached) = self.cached(Generation::Modern, package) else {
			let module = self.load_fresh(&path, package)?;
			self.cache_insert(Generation::Modern, &module);
			info!(package, "module loaded into modern cache");
			return Ok(module);
		};

		if SourceIdent::probe(&path)? == cached.ident() {
			return Ok(cached);
		}

		let module = self.load_fresh(&path, package)?;
		self.cache_update(Generation::Modern, &module);
		cached.set_orphan();
		info!(package, "module changed on disk, cache entry replaced");
		Ok(module)
	}

	/// Releases a reference obtained from [`load`](Self::load).
	pub fn unload(&self, module: Rc<Module>) {
		drop(module);
	}

	/// Drops the cache's reference to `package`, orphaning the module.
	///
	/// Returns false when the package is not cached in `generation`. The
	/// module is destroyed once the last binding or caller releases it.
	pub fn evict(&self, generation: Generation, package: &str) -> bool {
		match self.cache(generation).borrow_mut().remove(package) {
			Some(module) => {
				module.set_orphan();
				debug!(package, "module evicted from cache");
				true
			}
			None => false,
		}
	}

	/// Drains both caches.
	///
	/// Every module must be referenced only by its cache at this point; a
	/// binding or caller still holding one is a bookkeeping bug upstream.
	/// The held image stays mapped regardless until that reference goes
	/// away, so nothing is unmapped under a live caller.
	pub fn shutdown(&self) {
		for generation in [Generation::Legacy, Generation::Modern] {
			let drained: Vec<_> = self.cache(generation).borrow_mut().drain().collect();
			for (package, module) in drained {
				module.set_orphan();
				let external = Rc::strong_count(&module) - 1;
				if external > 0 {
					warn!(package = %package, refs = external, "module still referenced at shutdown");
				}
				debug_assert_eq!(
					external, 0,
					"module '{package}' still referenced at shutdown"
				);
			}
		}
	}
}

impl Drop for ModuleHost {
	fn drop(&mut self) {
		self.shutdown();
	}
}

impl std::fmt::Debug for ModuleHost {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModuleHost")
			.field("legacy", &self.cached_modules(Generation::Legacy))
			.field("modern", &self.cached_modules(Generation::Modern))
			.finish_non_exhaustive()
	}
}
