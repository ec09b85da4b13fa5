//! Symbol bindings: named handles to module entry points.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use keel_cabi_types::KeelModuleFn;

use crate::error::ModuleError;
use crate::module::Module;
use crate::name::FuncName;

/// Resolution state of a binding.
enum BindState {
	/// Not resolved and not linked anywhere.
	Unresolved,
	/// Resolved and linked into the module's binding list at `slot`.
	Bound {
		module: Rc<Module>,
		addr: KeelModuleFn,
		slot: usize,
	},
}

/// A named handle to one exported entry point.
///
/// Bindings come in two flavors matching the two cache generations. A
/// *deferred* binding carries only its dotted name; the module is found (or
/// loaded) through the legacy cache on first use. An *anchored* binding is
/// created against a module the caller already loaded and keeps that
/// reference for its whole life; resolution never goes back to a cache.
///
/// Owners hold bindings through `Rc`; dropping the last reference detaches
/// the binding from its module.
pub struct SymbolBinding {
	name: String,
	/// Caller-supplied module for anchored bindings.
	anchor: Option<Rc<Module>>,
	state: RefCell<BindState>,
}

impl SymbolBinding {
	/// Creates a deferred binding, resolved through the legacy cache on
	/// first use.
	pub fn deferred(name: &str) -> Result<Rc<Self>, ModuleError> {
		FuncName::split(name)?;
		Ok(Rc::new(Self {
			name: name.to_owned(),
			anchor: None,
			state: RefCell::new(BindState::Unresolved),
		}))
	}

	/// Creates a binding anchored to an explicitly loaded module.
	///
	/// The reference becomes the binding's own; the entry point itself is
	/// still resolved lazily.
	pub fn anchored(name: &str, module: Rc<Module>) -> Result<Rc<Self>, ModuleError> {
		FuncName::split(name)?;
		Ok(Rc::new(Self {
			name: name.to_owned(),
			anchor: Some(module),
			state: RefCell::new(BindState::Unresolved),
		}))
	}

	/// Full dotted name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The parsed name; the split was validated at construction.
	pub(crate) fn func_name(&self) -> FuncName<'_> {
		FuncName::split(&self.name).expect("name validated at construction")
	}

	/// The module the binding was anchored to, if any.
	pub(crate) fn anchor(&self) -> Option<&Rc<Module>> {
		self.anchor.as_ref()
	}

	/// True once the entry point has been resolved.
	pub fn is_resolved(&self) -> bool {
		matches!(&*self.state.borrow(), BindState::Bound { .. })
	}

	/// Module currently providing the symbol, if resolved.
	pub fn module(&self) -> Option<Rc<Module>> {
		match &*self.state.borrow() {
			BindState::Unresolved => None,
			BindState::Bound { module, .. } => Some(module.clone()),
		}
	}

	/// Snapshot of the resolved target: the providing module and address.
	pub(crate) fn target(&self) -> Option<(Rc<Module>, KeelModuleFn)> {
		match &*self.state.borrow() {
			BindState::Unresolved => None,
			BindState::Bound { module, addr, .. } => Some((module.clone(), *addr)),
		}
	}

	/// Links `this` into `module`'s list with a resolved address.
	pub(crate) fn bind_to(this: &Rc<Self>, module: Rc<Module>, addr: KeelModuleFn) {
		debug_assert!(!this.is_resolved(), "rebind of a resolved binding");
		let slot = module.attach(this);
		*this.state.borrow_mut() = BindState::Bound { module, addr, slot };
	}

	/// Unlinks the binding and releases its module reference.
	///
	/// Unlink first, release second: dropping the reference may destroy
	/// the module.
	pub(crate) fn unbind(&self) {
		let state = self.state.replace(BindState::Unresolved);
		if let BindState::Bound { module, slot, .. } = state {
			module.detach(slot);
			drop(module);
		}
	}

	/// Moves a resolved binding from its current module onto `next`.
	///
	/// The reference transfer is ordered attach-then-release so the old
	/// module cannot be destroyed mid-move.
	pub(crate) fn retarget(this: &Rc<Self>, next: &Rc<Module>, addr: KeelModuleFn) {
		let state = this.state.replace(BindState::Unresolved);
		let BindState::Bound { module: old, slot, .. } = state else {
			unreachable!("retarget of an unresolved binding");
		};
		old.detach(slot);
		let slot = next.attach(this);
		*this.state.borrow_mut() = BindState::Bound {
			module: next.clone(),
			addr,
			slot,
		};
		drop(old);
	}
}

impl Drop for SymbolBinding {
	fn drop(&mut self) {
		self.unbind();
	}
}

impl fmt::Debug for SymbolBinding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SymbolBinding")
			.field("name", &self.name)
			.field("anchored", &self.anchor.is_some())
			.field("resolved", &self.is_resolved())
			.finish()
	}
}
