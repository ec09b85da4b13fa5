//! Explicit reload of legacy-cache modules.

use std::rc::Rc;

use tracing::{error, info};

use crate::binding::SymbolBinding;
use crate::error::ModuleError;
use crate::host::ModuleHost;
use crate::module::{Generation, Module};

impl ModuleHost {
	/// Replaces the cached legacy module for `package` with a freshly
	/// loaded image, migrating every attached binding onto it.
	///
	/// The migration is one logical transaction: between the binding
	/// snapshot and the cache update nothing suspends, so concurrent
	/// callers observe either the full pre-state or the full post-state.
	/// A caller already inside a native function keeps running on the old
	/// image through its call pin; the old module is orphaned here and
	/// destroyed once that pin drops.
	///
	/// If any symbol is missing from the new image, every already-migrated
	/// binding is moved back, the old module stays cached, the fresh image
	/// is discarded, and the error is returned.
	pub fn reload(&self, package: &str) -> Result<(), ModuleError> {
		// The clone out of the map doubles as the migration pin.
		let old = self
			.cached(Generation::Legacy, package)
			.ok_or_else(|| ModuleError::NoSuchModule(package.to_owned()))?;

		let path = self.resolve_path(package)?;
		let fresh = self.load_fresh(&path, package)?;

		let bindings = old.bindings_snapshot();
		for (done, binding) in bindings.iter().enumerate() {
			let symbol = binding.func_name().symbol();
			match fresh.entry(symbol) {
				Ok(addr) => SymbolBinding::retarget(binding, &fresh, addr),
				Err(err) => {
					error!(package, symbol, "reload: symbol missing from new image");
					rollback(&old, &fresh, &bindings[..done]);
					return Err(err);
				}
			}
		}

		self.cache_update(Generation::Legacy, &fresh);
		old.set_orphan();
		info!(package, bindings = bindings.len(), "module reloaded");
		Ok(())
		// `old` drops here: the cache reference went away with the update,
		// the pin with this frame. The image survives only while a caller
		// is still inside it.
	}
}

/// Moves the already-migrated `bindings` back onto `old`, newest first.
fn rollback(old: &Rc<Module>, fresh: &Rc<Module>, bindings: &[Rc<SymbolBinding>]) {
	for binding in bindings.iter().rev() {
		let symbol = binding.func_name().symbol();
		// Every one of these symbols resolved in `old` moments ago.
		// Failing now means the image changed under us and no consistent
		// state is reachable.
		let addr = match old.entry(symbol) {
			Ok(addr) => addr,
			Err(_) => panic!(
				"cannot restore binding '{}' during reload rollback",
				binding.name()
			),
		};
		SymbolBinding::retarget(binding, old, addr);
	}
	debug_assert_eq!(fresh.binding_count(), 0, "fresh image retains bindings");
}
