//! Dotted stored-function names.

use crate::error::ModuleError;

/// A dotted function name split into its package and symbol halves.
///
/// The split is on the last dot: `"mod.submod.func"` names the symbol
/// `func` inside the package `mod.submod`. A name without a dot is its own
/// package. Both halves are borrowed subslices of the input; parsing does
/// not allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncName<'a> {
	package: &'a str,
	symbol: &'a str,
}

impl<'a> FuncName<'a> {
	/// Splits `name` on its last dot.
	///
	/// Fails with [`ModuleError::BadName`] when the name, its package, or
	/// its symbol half is empty.
	pub fn split(name: &'a str) -> Result<Self, ModuleError> {
		let (package, symbol) = match name.rfind('.') {
			Some(dot) => (&name[..dot], &name[dot + 1..]),
			None => (name, name),
		};
		if package.is_empty() || symbol.is_empty() {
			return Err(ModuleError::BadName(name.to_owned()));
		}
		Ok(Self { package, symbol })
	}

	/// Package half, e.g. `"mod.submod"` for `"mod.submod.func"`.
	pub fn package(&self) -> &'a str {
		self.package
	}

	/// Symbol half, e.g. `"func"` for `"mod.submod.func"`.
	pub fn symbol(&self) -> &'a str {
		self.symbol
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_on_last_dot() {
		let name = FuncName::split("mod.submod.func").unwrap();
		assert_eq!(name.package(), "mod.submod");
		assert_eq!(name.symbol(), "func");
	}

	#[test]
	fn dotless_name_is_its_own_package() {
		let name = FuncName::split("func").unwrap();
		assert_eq!(name.package(), "func");
		assert_eq!(name.symbol(), "func");
	}

	#[test]
	fn rejects_empty_halves() {
		assert!(matches!(
			FuncName::split(""),
			Err(ModuleError::BadName(_))
		));
		assert!(matches!(
			FuncName::split("pkg."),
			Err(ModuleError::BadName(_))
		));
		assert!(matches!(
			FuncName::split(".func"),
			Err(ModuleError::BadName(_))
		));
		assert!(matches!(
			FuncName::split("."),
			Err(ModuleError::BadName(_))
		));
	}

	#[test]
	fn borrows_from_input() {
		let input = String::from("a.b");
		let name = FuncName::split(&input).unwrap();
		assert!(std::ptr::eq(name.package().as_ptr(), input.as_ptr()));
	}
}
