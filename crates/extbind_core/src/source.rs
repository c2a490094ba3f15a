//! Extension source declaration and validation.
//!
//! An extension source is a named, ordered list of `(member name, function)`
//! entries. Each function receives the target instance as its first
//! parameter followed by the call-site arguments.

use crate::value::{member_fn, Args, CallError, MemberFn, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::{type_name, Any};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

static MEMBER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid member name regex"));

/// Returns whether `name` can be used as a member name.
pub fn is_valid_member_name(name: &str) -> bool {
    MEMBER_NAME_RE.is_match(name)
}

/// Immutable extension source handle. Clones share the same members.
#[derive(Clone)]
pub struct ExtensionSource {
    inner: Arc<SourceInner>,
}

struct SourceInner {
    name: String,
    members: Vec<(String, MemberFn)>,
}

impl ExtensionSource {
    pub fn builder(name: impl Into<String>) -> ExtensionSourceBuilder {
        ExtensionSourceBuilder {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Own member names in declaration order.
    pub fn member_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.members.iter().map(|(name, _)| name.as_str())
    }

    pub fn member(&self, name: &str) -> Option<MemberFn> {
        self.inner
            .members
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, member)| Arc::clone(member))
    }

    pub fn len(&self) -> usize {
        self.inner.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.members.is_empty()
    }

    /// Calls a member directly with an explicit receiver.
    pub fn call(&self, name: &str, receiver: &mut dyn Any, args: Args) -> Result<Value, CallError> {
        let member = self.member(name).ok_or_else(|| CallError::MemberNotFound {
            target: self.inner.name.clone(),
            member: name.to_string(),
        })?;
        member(receiver, args)
    }
}

impl Debug for ExtensionSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionSource")
            .field("name", &self.inner.name)
            .field("members", &self.member_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder collecting members before validation.
pub struct ExtensionSourceBuilder {
    name: String,
    members: Vec<(String, MemberFn)>,
}

impl ExtensionSourceBuilder {
    /// Adds a member whose receiver must be a `T`.
    pub fn member<T, R, F>(self, name: impl Into<String>, f: F) -> Self
    where
        T: Any,
        R: Any,
        F: Fn(&mut T, Args) -> Result<R, CallError> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = typed_member(name.clone(), f);
        self.raw_member(name, member)
    }

    /// Adds a receiver-agnostic member.
    pub fn raw_member(mut self, name: impl Into<String>, member: MemberFn) -> Self {
        self.members.push((name.into(), member));
        self
    }

    pub fn build(self) -> Result<ExtensionSource, SourceDefinitionError> {
        if self.name.trim().is_empty() {
            return Err(SourceDefinitionError::EmptySourceName);
        }

        let mut seen = BTreeSet::<&str>::new();
        for (name, _) in &self.members {
            if name.is_empty() {
                return Err(SourceDefinitionError::EmptyMemberName);
            }
            if !is_valid_member_name(name) {
                return Err(SourceDefinitionError::InvalidMemberName(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(SourceDefinitionError::DuplicateMember(name.clone()));
            }
        }

        Ok(ExtensionSource {
            inner: Arc::new(SourceInner {
                name: self.name.trim().to_string(),
                members: self.members,
            }),
        })
    }
}

/// Wraps a typed receiver function into a type-erased [`MemberFn`].
pub(crate) fn typed_member<T, R, F>(name: String, f: F) -> MemberFn
where
    T: Any,
    R: Any,
    F: Fn(&mut T, Args) -> Result<R, CallError> + Send + Sync + 'static,
{
    member_fn(move |receiver, args| {
        let receiver = receiver
            .downcast_mut::<T>()
            .ok_or_else(|| CallError::ReceiverMismatch {
                member: name.clone(),
                expected: type_name::<T>(),
            })?;
        f(receiver, args).map(Value::new)
    })
}

/// Extension source definition errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDefinitionError {
    EmptySourceName,
    EmptyMemberName,
    InvalidMemberName(String),
    DuplicateMember(String),
}

impl Display for SourceDefinitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySourceName => write!(f, "extension source name must not be empty"),
            Self::EmptyMemberName => write!(f, "extension member name must not be empty"),
            Self::InvalidMemberName(value) => {
                write!(f, "extension member name is invalid: {value}")
            }
            Self::DuplicateMember(value) => {
                write!(f, "extension member declared twice: {value}")
            }
        }
    }
}

impl Error for SourceDefinitionError {}
