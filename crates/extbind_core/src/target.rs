//! Target type descriptors and their shared member tables.
//!
//! # Responsibility
//! - Own the member table every instance of one Rust type dispatches through.
//! - Answer whether a member name is already observable on the type.
//!
//! # Invariants
//! - Native members and static members are fixed when the descriptor is built.
//! - Shared members are only ever added, never replaced or removed.
//! - Check-then-install for one name happens under the table's write lock.

use crate::source::{is_valid_member_name, typed_member};
use crate::value::{static_fn, Args, CallError, MemberFn, StaticFn, Value};
use serde::Serialize;
use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

/// Where a shared member came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberOrigin {
    Native,
    Extension { source: String },
}

/// One entry of a shared member table.
#[derive(Clone)]
pub struct Member {
    origin: MemberOrigin,
    func: MemberFn,
}

impl Member {
    pub fn native(func: MemberFn) -> Self {
        Self {
            origin: MemberOrigin::Native,
            func,
        }
    }

    pub fn extension(source: impl Into<String>, func: MemberFn) -> Self {
        Self {
            origin: MemberOrigin::Extension {
                source: source.into(),
            },
            func,
        }
    }

    pub fn origin(&self) -> &MemberOrigin {
        &self.origin
    }

    pub fn call(&self, receiver: &mut dyn Any, args: Args) -> Result<Value, CallError> {
        (self.func)(receiver, args)
    }
}

impl Debug for Member {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Turns a child receiver into the receiver its parent's members expect.
type Upcast = Arc<dyn Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync>;

fn upcast_fn<F>(f: F) -> Upcast
where
    F: Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct ParentLink {
    target: TargetType,
    upcast: Upcast,
}

/// Descriptor of one target type. Clones share the same member table.
#[derive(Clone)]
pub struct TargetType {
    inner: Arc<TargetInner>,
}

struct TargetInner {
    name: String,
    type_id: TypeId,
    rust_type: &'static str,
    parent: Option<ParentLink>,
    statics: BTreeMap<String, StaticFn>,
    table: RwLock<BTreeMap<String, Member>>,
}

impl TargetType {
    pub fn builder<T: Any>(name: impl Into<String>) -> TargetTypeBuilder<T> {
        TargetTypeBuilder {
            name: name.into(),
            parent: None,
            natives: Vec::new(),
            statics: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn type_id(&self) -> TypeId {
        self.inner.type_id
    }

    /// Rust type name of the instances, for diagnostics.
    pub fn rust_type(&self) -> &'static str {
        self.inner.rust_type
    }

    pub fn parent(&self) -> Option<&TargetType> {
        self.inner.parent.as_ref().map(|link| &link.target)
    }

    pub fn is_instance(&self, value: &dyn Any) -> bool {
        (*value).type_id() == self.inner.type_id
    }

    /// Returns whether `name` is a static member of this type or an ancestor.
    pub fn has_static(&self, name: &str) -> bool {
        self.inner.statics.contains_key(name)
            || self.parent().is_some_and(|parent| parent.has_static(name))
    }

    /// Returns whether `name` is observable: static, own shared or inherited.
    pub fn has_member(&self, name: &str) -> bool {
        self.has_static(name) || self.lookup(name).is_some()
    }

    /// Resolves a shared member along the parent chain.
    pub fn lookup(&self, name: &str) -> Option<Member> {
        let own = self
            .inner
            .table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();
        match own {
            Some(member) => Some(member),
            None => self.parent()?.lookup(name),
        }
    }

    pub fn member_origin(&self, name: &str) -> Option<MemberOrigin> {
        self.lookup(name).map(|member| member.origin)
    }

    /// Names in this type's own shared table, sorted.
    pub fn member_names(&self) -> Vec<String> {
        self.inner
            .table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Installs `member` unless `name` is already observable.
    ///
    /// Returns `true` when the member was installed.
    pub fn install_if_absent(&self, name: &str, member: Member) -> bool {
        let mut table = self
            .inner
            .table
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if table.contains_key(name) || self.has_static(name) {
            return false;
        }
        if let Some(parent) = self.parent() {
            if parent.lookup(name).is_some() {
                return false;
            }
        }
        table.insert(name.to_string(), member);
        true
    }

    /// Calls member `name` on `receiver`, which must be an instance of this type.
    pub fn invoke(
        &self,
        receiver: &mut dyn Any,
        name: &str,
        args: Args,
    ) -> Result<Value, CallError> {
        if !self.is_instance(receiver) {
            return Err(CallError::ReceiverMismatch {
                member: name.to_string(),
                expected: self.inner.rust_type,
            });
        }
        self.call_along_chain(&self.inner.name, receiver, name, args)
    }

    fn call_along_chain(
        &self,
        called_on: &str,
        receiver: &mut dyn Any,
        name: &str,
        args: Args,
    ) -> Result<Value, CallError> {
        // The table lock is released here; members may bind or dispatch again.
        let own = self
            .inner
            .table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();
        if let Some(member) = own {
            return member.call(receiver, args);
        }

        match &self.inner.parent {
            Some(link) => {
                let receiver =
                    (link.upcast)(receiver).ok_or_else(|| CallError::ReceiverMismatch {
                        member: name.to_string(),
                        expected: link.target.rust_type(),
                    })?;
                link.target.call_along_chain(called_on, receiver, name, args)
            }
            None => Err(CallError::MemberNotFound {
                target: called_on.to_string(),
                member: name.to_string(),
            }),
        }
    }

    pub fn call_static(&self, name: &str, args: Args) -> Result<Value, CallError> {
        match self.inner.statics.get(name) {
            Some(func) => func(args),
            None => match self.parent() {
                Some(parent) => parent.call_static(name, args),
                None => Err(CallError::StaticNotFound {
                    target: self.inner.name.clone(),
                    member: name.to_string(),
                }),
            },
        }
    }
}

impl Debug for TargetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetType")
            .field("name", &self.inner.name)
            .field("rust_type", &self.inner.rust_type)
            .field("parent", &self.parent().map(TargetType::name))
            .field("statics", &self.inner.statics.keys().collect::<Vec<_>>())
            .field("members", &self.member_names())
            .finish()
    }
}

struct PendingParent {
    link: ParentLink,
    expects: TypeId,
    expects_name: &'static str,
}

/// Builder declaring the native surface of a target type.
pub struct TargetTypeBuilder<T> {
    name: String,
    parent: Option<PendingParent>,
    natives: Vec<(String, MemberFn)>,
    statics: Vec<(String, StaticFn)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any> TargetTypeBuilder<T> {
    /// Declares a native shared member.
    pub fn native<R, F>(self, name: impl Into<String>, f: F) -> Self
    where
        R: Any,
        F: Fn(&mut T, Args) -> Result<R, CallError> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = typed_member(name.clone(), f);
        self.native_raw(name, member)
    }

    pub fn native_raw(mut self, name: impl Into<String>, member: MemberFn) -> Self {
        self.natives.push((name.into(), member));
        self
    }

    /// Declares a static member, callable without an instance.
    pub fn static_member<R, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        R: Any,
        F: Fn(Args) -> Result<R, CallError> + Send + Sync + 'static,
    {
        self.statics
            .push((name.into(), static_fn(move |args| f(args).map(Value::new))));
        self
    }

    /// Inherits every shared and static member of `parent`.
    ///
    /// `parent` must describe `T` as well; inherited members receive the
    /// same receiver. Use [`Self::extends_via`] for a parent of another type.
    pub fn extends(self, parent: &TargetType) -> Self {
        self.link_parent::<T>(parent, upcast_fn(|receiver| Some(receiver)))
    }

    /// Inherits from a parent describing `P`, reached through `view`.
    ///
    /// Inherited members are called on the `P` that `view` returns.
    pub fn extends_via<P, F>(self, parent: &TargetType, view: F) -> Self
    where
        P: Any,
        F: Fn(&mut T) -> &mut P + Send + Sync + 'static,
    {
        let upcast = upcast_fn(move |receiver| {
            receiver
                .downcast_mut::<T>()
                .map(|child| view(child) as &mut dyn Any)
        });
        self.link_parent::<P>(parent, upcast)
    }

    fn link_parent<P: Any>(mut self, parent: &TargetType, upcast: Upcast) -> Self {
        self.parent = Some(PendingParent {
            link: ParentLink {
                target: parent.clone(),
                upcast,
            },
            expects: TypeId::of::<P>(),
            expects_name: type_name::<P>(),
        });
        self
    }

    pub fn build(self) -> Result<TargetType, TargetDefinitionError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TargetDefinitionError::EmptyTypeName);
        }

        let parent = match self.parent {
            Some(pending) if pending.link.target.type_id() != pending.expects => {
                return Err(TargetDefinitionError::ParentTypeMismatch {
                    parent: pending.link.target.name().to_string(),
                    expected: pending.expects_name,
                    found: pending.link.target.rust_type(),
                });
            }
            other => other.map(|pending| pending.link),
        };

        let mut seen = BTreeSet::<String>::new();
        let declared = self
            .natives
            .iter()
            .map(|(member, _)| member)
            .chain(self.statics.iter().map(|(member, _)| member));
        for member in declared {
            if !is_valid_member_name(member) {
                return Err(TargetDefinitionError::InvalidMemberName(member.clone()));
            }
            if !seen.insert(member.clone()) {
                return Err(TargetDefinitionError::DuplicateMember(member.clone()));
            }
        }

        let table = self
            .natives
            .into_iter()
            .map(|(member, func)| (member, Member::native(func)))
            .collect();

        Ok(TargetType {
            inner: Arc::new(TargetInner {
                name: name.to_string(),
                type_id: TypeId::of::<T>(),
                rust_type: type_name::<T>(),
                parent,
                statics: self.statics.into_iter().collect(),
                table: RwLock::new(table),
            }),
        })
    }
}

/// Target type definition errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetDefinitionError {
    EmptyTypeName,
    InvalidMemberName(String),
    DuplicateMember(String),
    /// The parent describes a different Rust type than the child passes it.
    ParentTypeMismatch {
        parent: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl Display for TargetDefinitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTypeName => write!(f, "target type name must not be empty"),
            Self::InvalidMemberName(value) => write!(f, "target member name is invalid: {value}"),
            Self::DuplicateMember(value) => write!(f, "target member declared twice: {value}"),
            Self::ParentTypeMismatch {
                parent,
                expected,
                found,
            } => write!(
                f,
                "parent target {parent} describes {found}, expected {expected}"
            ),
        }
    }
}

impl Error for TargetDefinitionError {}
