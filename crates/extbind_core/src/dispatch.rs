//! Member dispatch for plain Rust values.
//!
//! Any `'static` value can call members of its registered target type:
//!
//! ```
//! use extbind_core::{args, bind, Extended, ExtensionSource, TargetType, TypeRegistry};
//!
//! struct Bag(Vec<u32>);
//!
//! let target = TypeRegistry::global()
//!     .register(TargetType::builder::<Bag>("Bag").build().unwrap())
//!     .unwrap();
//! let source = ExtensionSource::builder("BagExtensions")
//!     .member("total", |bag: &mut Bag, _args| Ok(bag.0.iter().sum::<u32>()))
//!     .build()
//!     .unwrap();
//! bind((source, target)).unwrap();
//!
//! let mut bag = Bag(vec![1, 2, 3]);
//! let total = bag.call_member("total", args![]).unwrap();
//! assert_eq!(total.downcast::<u32>().unwrap(), 6);
//!
//! // Lookup uses the value's own type: deref a smart pointer first.
//! let mut boxed = Box::new(Bag(vec![4]));
//! assert!(boxed.call_member("total", args![]).is_err());
//! let total = (*boxed).call_member("total", args![]).unwrap();
//! assert_eq!(total.downcast::<u32>().unwrap(), 4);
//! ```
//!
//! The target is resolved from `TypeId::of::<Self>()`, so `Box<Bag>`,
//! `Rc<RefCell<Bag>>` and other wrappers are looked up as their own types
//! and report [`CallError::UnregisteredType`] unless registered themselves.

use crate::registry::TypeRegistry;
use crate::value::{Args, CallError, Value};
use std::any::Any;

/// Calls shared members through a [`TypeRegistry`].
pub trait Extended: Any {
    /// Calls `name` through the process-wide registry.
    fn call_member(&mut self, name: &str, args: Args) -> Result<Value, CallError>;

    fn call_member_in(
        &mut self,
        registry: &TypeRegistry,
        name: &str,
        args: Args,
    ) -> Result<Value, CallError>;

    /// Returns whether `name` is observable through the process-wide registry.
    fn has_member(&self, name: &str) -> bool;

    fn has_member_in(&self, registry: &TypeRegistry, name: &str) -> bool;
}

impl<T: Any> Extended for T {
    fn call_member(&mut self, name: &str, args: Args) -> Result<Value, CallError> {
        self.call_member_in(TypeRegistry::global(), name, args)
    }

    fn call_member_in(
        &mut self,
        registry: &TypeRegistry,
        name: &str,
        args: Args,
    ) -> Result<Value, CallError> {
        let target = registry.require::<T>()?;
        target.invoke(self, name, args)
    }

    fn has_member(&self, name: &str) -> bool {
        self.has_member_in(TypeRegistry::global(), name)
    }

    fn has_member_in(&self, registry: &TypeRegistry, name: &str) -> bool {
        registry
            .target::<T>()
            .is_some_and(|target| target.has_member(name))
    }
}

#[cfg(test)]
mod tests {
    use super::Extended;
    use crate::args;
    use crate::registry::TypeRegistry;
    use crate::target::TargetType;
    use crate::value::CallError;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Meter {
        reading: u64,
    }

    fn registry_with_meter() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry
            .register(
                TargetType::builder::<Meter>("Meter")
                    .native("read", |meter: &mut Meter, _args| Ok(meter.reading))
                    .build()
                    .expect("valid meter"),
            )
            .expect("meter should register");
        registry
    }

    #[test]
    fn dispatches_through_explicit_registry() {
        let registry = registry_with_meter();
        let mut meter = Meter { reading: 12 };

        assert!(meter.has_member_in(&registry, "read"));
        let reading = meter
            .call_member_in(&registry, "read", args![])
            .expect("read call")
            .downcast::<u64>()
            .expect("u64 result");
        assert_eq!(reading, 12);
    }

    #[test]
    fn unregistered_type_is_reported() {
        let registry = registry_with_meter();
        let mut value = 1_i8;
        assert!(!value.has_member_in(&registry, "read"));

        let err = value
            .call_member_in(&registry, "read", args![])
            .expect_err("unregistered type");
        assert!(matches!(err, CallError::UnregisteredType { .. }));
    }

    #[test]
    fn wrappers_resolve_as_their_own_type() {
        let registry = registry_with_meter();
        let mut boxed = Box::new(Meter { reading: 30 });

        assert!(!boxed.has_member_in(&registry, "read"));
        let err = boxed
            .call_member_in(&registry, "read", args![])
            .expect_err("box is not registered");
        assert!(matches!(err, CallError::UnregisteredType { .. }));

        let reading = (*boxed)
            .call_member_in(&registry, "read", args![])
            .expect("read through deref")
            .downcast::<u64>()
            .expect("u64 result");
        assert_eq!(reading, 30);

        let shared = Rc::new(RefCell::new(Meter { reading: 5 }));
        let reading = (*shared.borrow_mut())
            .call_member_in(&registry, "read", args![])
            .expect("read through RefMut")
            .downcast::<u64>()
            .expect("u64 result");
        assert_eq!(reading, 5);
    }

    #[test]
    fn missing_member_is_reported() {
        let registry = registry_with_meter();
        let mut meter = Meter { reading: 0 };
        let err = meter
            .call_member_in(&registry, "reset", args![])
            .expect_err("missing member");
        assert!(matches!(err, CallError::MemberNotFound { .. }));
    }
}
