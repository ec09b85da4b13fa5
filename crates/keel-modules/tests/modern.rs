//! Modern-cache behavior: explicit load handles, freshness validation,
//! anchored bindings, and orphan semantics.

mod support;

use std::path::Path;
use std::rc::Rc;

use keel_modules::{DirResolver, Generation, ModuleError, ModuleHost, OutPort, SymbolBinding};
use support::Fixture;

fn host_over(dir: &Path) -> ModuleHost {
	support::init_tracing();
	ModuleHost::new(Box::new(DirResolver::new(vec![dir.to_path_buf()])))
}

#[test]
fn load_returns_the_cached_copy_while_unchanged() {
	let dir = tempfile::tempdir().unwrap();
	support::compile_module(dir.path(), "fixmod", &Fixture::v1());
	let host = host_over(dir.path());

	let m1 = host.load("fixmod").unwrap();
	// cache + caller
	assert_eq!(Rc::strong_count(&m1), 2);
	assert_eq!(m1.generation(), Some(Generation::Modern));

	let m2 = host.load("fixmod").unwrap();
	assert!(Rc::ptr_eq(&m1, &m2));
	assert_eq!(Rc::strong_count(&m1), 3);
}

#[test]
fn load_then_unload_restores_the_refcount() {
	let dir = tempfile::tempdir().unwrap();
	support::compile_module(dir.path(), "fixmod", &Fixture::v1());
	let host = host_over(dir.path());

	let m1 = host.load("fixmod").unwrap();
	let m2 = host.load("fixmod").unwrap();
	assert_eq!(Rc::strong_count(&m1), 3);
	host.unload(m2);
	assert_eq!(Rc::strong_count(&m1), 2);
}

#[test]
fn changed_file_replaces_the_cache_entry() {
	let dir = tempfile::tempdir().unwrap();
	support::compile_module(dir.path(), "fixmod", &Fixture::v1());
	let host = host_over(dir.path());

	let m1 = host.load("fixmod").unwrap();
	let w1 = Rc::downgrade(&m1);
	let ident1 = m1.ident();

	support::compile_module(dir.path(), "fixmod", &Fixture::v2());

	let m2 = host.load("fixmod").unwrap();
	assert!(!Rc::ptr_eq(&m1, &m2));
	assert_ne!(m2.ident(), ident1);
	assert!(m1.is_orphan());
	assert_eq!(m2.generation(), Some(Generation::Modern));
	assert_eq!(host.cached_modules(Generation::Modern), 1);
	assert!(Rc::ptr_eq(
		&host.cached(Generation::Modern, "fixmod").unwrap(),
		&m2
	));

	// caller only; the cache reference moved to the replacement
	assert_eq!(Rc::strong_count(&m1), 1);
	host.unload(m1);
	assert!(w1.upgrade().is_none());
}

#[test]
fn anchored_binding_resolves_against_its_module() {
	let dir = tempfile::tempdir().unwrap();
	support::compile_module(dir.path(), "fixmod", &Fixture::v1());
	let host = host_over(dir.path());

	let module = host.load("fixmod").unwrap();
	let binding = SymbolBinding::anchored("fixmod.f1", module.clone()).unwrap();
	host.bind(&binding).unwrap();

	// cache + caller + anchor + resolved binding
	assert_eq!(Rc::strong_count(&module), 4);
	assert!(Rc::ptr_eq(&binding.module().unwrap(), &module));

	let mut out = OutPort::new();
	host.call(&binding, b"", &mut out).unwrap();
	assert_eq!(out.data(), b"f1:v1");

	host.unbind(&binding);
	// the anchor stays until the binding itself goes away
	assert_eq!(Rc::strong_count(&module), 3);
	drop(binding);
	assert_eq!(Rc::strong_count(&module), 2);
}

#[test]
fn anchored_binding_with_missing_symbol_fails() {
	let dir = tempfile::tempdir().unwrap();
	support::compile_module(dir.path(), "fixmod", &Fixture::v1());
	let host = host_over(dir.path());

	let module = host.load("fixmod").unwrap();
	let binding = SymbolBinding::anchored("fixmod.no_such_symbol", module.clone()).unwrap();
	let err = host.bind(&binding).unwrap_err();
	assert!(matches!(err, ModuleError::SymbolNotFound { .. }));
	assert!(!binding.is_resolved());
	// anchor + cache + caller
	assert_eq!(Rc::strong_count(&module), 3);
}

#[test]
fn orphan_bindings_are_not_migrated() {
	let dir = tempfile::tempdir().unwrap();
	support::compile_module(dir.path(), "fixmod", &Fixture::v1());
	let host = host_over(dir.path());

	let m1 = host.load("fixmod").unwrap();
	let binding = SymbolBinding::anchored("fixmod.f1", m1.clone()).unwrap();
	host.bind(&binding).unwrap();

	support::compile_module(dir.path(), "fixmod", &Fixture::v2());
	let m2 = host.load("fixmod").unwrap();
	assert!(m1.is_orphan());

	// The binding keeps serving off the orphaned image.
	let mut out = OutPort::new();
	host.call(&binding, b"", &mut out).unwrap();
	assert_eq!(out.data(), b"f1:v1");
	assert!(Rc::ptr_eq(&binding.module().unwrap(), &m1));

	// A binding anchored to the replacement sees the new code.
	let fresh = SymbolBinding::anchored("fixmod.f1", m2.clone()).unwrap();
	let mut out = OutPort::new();
	host.call(&fresh, b"", &mut out).unwrap();
	assert_eq!(out.data(), b"f1:v2");

	let w1 = Rc::downgrade(&m1);
	drop(binding);
	host.unload(m1);
	assert!(w1.upgrade().is_none());
}

#[test]
fn legacy_and_modern_caches_are_independent() {
	let dir = tempfile::tempdir().unwrap();
	support::compile_module(dir.path(), "fixmod", &Fixture::v1());
	let host = host_over(dir.path());

	let deferred = SymbolBinding::deferred("fixmod.f1").unwrap();
	host.bind(&deferred).unwrap();
	let loaded = host.load("fixmod").unwrap();

	assert_eq!(host.cached_modules(Generation::Legacy), 1);
	assert_eq!(host.cached_modules(Generation::Modern), 1);
	// Two distinct images of the same file.
	assert!(!Rc::ptr_eq(
		&host.cached(Generation::Legacy, "fixmod").unwrap(),
		&loaded
	));
}
