//! In-process target type registry.

use crate::target::TargetType;
use crate::value::CallError;
use log::info;
use once_cell::sync::Lazy;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{PoisonError, RwLock};

static GLOBAL_REGISTRY: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateType {
        name: String,
        rust_type: &'static str,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateType { name, rust_type } => {
                write!(f, "target type already registered: {name} ({rust_type})")
            }
        }
    }
}

impl Error for RegistryError {}

/// Maps Rust types to the target descriptor their values dispatch through.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    targets: RwLock<HashMap<TypeId, TargetType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by [`crate::Extended::call_member`].
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL_REGISTRY
    }

    /// Registers one target descriptor and returns a handle to it.
    pub fn register(&self, target: TargetType) -> Result<TargetType, RegistryError> {
        let mut targets = self
            .targets
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = targets.get(&target.type_id()) {
            return Err(RegistryError::DuplicateType {
                name: existing.name().to_string(),
                rust_type: existing.rust_type(),
            });
        }

        info!(
            "event=target_register module=registry status=ok target={} rust_type={}",
            target.name(),
            target.rust_type()
        );
        targets.insert(target.type_id(), target.clone());
        Ok(target)
    }

    pub fn get(&self, type_id: TypeId) -> Option<TargetType> {
        self.targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()
    }

    pub fn target<T: Any>(&self) -> Option<TargetType> {
        self.get(TypeId::of::<T>())
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.target::<T>().is_some()
    }

    pub fn len(&self) -> usize {
        self.targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns sorted target names.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|target| target.name().to_string())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn require<T: Any>(&self) -> Result<TargetType, CallError> {
        self.target::<T>()
            .ok_or(CallError::UnregisteredType {
                type_name: type_name::<T>(),
            })
    }
}
