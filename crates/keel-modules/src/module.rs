//! Loaded module objects.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use keel_cabi_types::KeelModuleFn;

use crate::binding::SymbolBinding;
use crate::error::ModuleError;
use crate::loader::SourceIdent;

/// Cache generation a module can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
	/// Stale-tolerant cache behind by-name bindings; entries survive
	/// on-disk changes and are replaced only by explicit reload.
	Legacy,
	/// Freshness-checked cache behind explicit load/unload handles;
	/// entries are validated against on-disk identity on every lookup.
	Modern,
}

/// One loaded shared-library image.
///
/// Lives behind `Rc`: the owning cache holds one reference, every resolved
/// binding holds one, and the call path pins one for the duration of an
/// invocation. Dropping the last reference closes the linker handle.
///
/// A module is *cached* while one of the generation maps points at it and
/// *orphan* once evicted or replaced; an orphan stays alive until the last
/// binding or caller lets go.
pub struct Module {
	package: String,
	ident: SourceIdent,
	lib: libloading::Library,
	bindings: RefCell<BindingSlots>,
	cache: Cell<Option<Generation>>,
}

impl Module {
	pub(crate) fn new(package: &str, lib: libloading::Library, ident: SourceIdent) -> Rc<Self> {
		Rc::new(Self {
			package: package.to_owned(),
			ident,
			lib,
			bindings: RefCell::new(BindingSlots::default()),
			cache: Cell::new(None),
		})
	}

	/// Logical name the module was loaded under.
	pub fn package(&self) -> &str {
		&self.package
	}

	/// On-disk identity of the source file at load time.
	pub fn ident(&self) -> SourceIdent {
		self.ident
	}

	/// True once the module has been detached from its cache.
	pub fn is_orphan(&self) -> bool {
		self.cache.get().is_none()
	}

	/// The cache generation currently holding the module, if any.
	pub fn generation(&self) -> Option<Generation> {
		self.cache.get()
	}

	pub(crate) fn set_cached(&self, generation: Generation) {
		self.cache.set(Some(generation));
	}

	pub(crate) fn set_orphan(&self) {
		self.cache.set(None);
	}

	/// Resolves `symbol` to an entry-point address within this image.
	///
	/// The returned pointer is valid for as long as the image stays mapped;
	/// callers keep a module reference alive across any use of it.
	pub(crate) fn entry(&self, symbol: &str) -> Result<KeelModuleFn, ModuleError> {
		match unsafe { self.lib.get::<KeelModuleFn>(symbol.as_bytes()) } {
			Ok(sym) => Ok(*sym),
			Err(_) => Err(ModuleError::SymbolNotFound {
				package: self.package.clone(),
				symbol: symbol.to_owned(),
			}),
		}
	}

	pub(crate) fn attach(&self, binding: &Rc<SymbolBinding>) -> usize {
		self.bindings.borrow_mut().insert(Rc::downgrade(binding))
	}

	pub(crate) fn detach(&self, slot: usize) {
		self.bindings.borrow_mut().remove(slot);
	}

	/// Snapshot of the bindings currently attached to this module.
	pub(crate) fn bindings_snapshot(&self) -> Vec<Rc<SymbolBinding>> {
		self.bindings.borrow().iter().collect()
	}

	/// Number of attached bindings.
	pub fn binding_count(&self) -> usize {
		self.bindings.borrow().len()
	}
}

impl fmt::Debug for Module {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Module")
			.field("package", &self.package)
			.field("cache", &self.cache.get())
			.field("bindings", &self.binding_count())
			.finish_non_exhaustive()
	}
}

/// Slot list of the bindings attached to a module.
///
/// Stable indices give O(1) attach/detach while keeping full enumeration
/// for reload. Entries are weak: the binding→module edge is the only
/// strong one, so a dropped binding can never keep its module alive.
#[derive(Default)]
struct BindingSlots {
	slots: Vec<Option<Weak<SymbolBinding>>>,
	free: Vec<usize>,
	len: usize,
}

impl BindingSlots {
	fn insert(&mut self, binding: Weak<SymbolBinding>) -> usize {
		self.len += 1;
		match self.free.pop() {
			Some(slot) => {
				self.slots[slot] = Some(binding);
				slot
			}
			None => {
				self.slots.push(Some(binding));
				self.slots.len() - 1
			}
		}
	}

	fn remove(&mut self, slot: usize) {
		debug_assert!(self.slots[slot].is_some(), "detach of an empty slot");
		self.slots[slot] = None;
		self.free.push(slot);
		self.len -= 1;
	}

	fn iter(&self) -> impl Iterator<Item = Rc<SymbolBinding>> + '_ {
		self.slots.iter().flatten().filter_map(Weak::upgrade)
	}

	fn len(&self) -> usize {
		self.len
	}
}
