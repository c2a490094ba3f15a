//! Dynamically typed values crossing the forwarding boundary.
//!
//! # Responsibility
//! - Carry call-site arguments into extension members without reflection.
//! - Carry member results back to the caller.
//!
//! # Invariants
//! - Argument order at the call site is preserved.
//! - An argument can be taken out of the bag at most once.

use std::any::{type_name, Any};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Type-erased member implementation: `(receiver, args) -> result`.
pub type MemberFn = Arc<dyn Fn(&mut dyn Any, Args) -> Result<Value, CallError> + Send + Sync>;

/// Type-erased static member implementation: `(args) -> result`.
pub type StaticFn = Arc<dyn Fn(Args) -> Result<Value, CallError> + Send + Sync>;

/// Erases a receiver function into a [`MemberFn`].
pub fn member_fn<F>(f: F) -> MemberFn
where
    F: Fn(&mut dyn Any, Args) -> Result<Value, CallError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Erases a receiver-less function into a [`StaticFn`].
pub fn static_fn<F>(f: F) -> StaticFn
where
    F: Fn(Args) -> Result<Value, CallError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Builds an [`Args`] bag from a list of expressions.
///
/// ```
/// use extbind_core::args;
///
/// let args = args![1_i32, "two".to_string()];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Args::new()$(.with($value))+
    };
}

/// Ordered call-site arguments.
#[derive(Default)]
pub struct Args {
    slots: Vec<Option<Box<dyn Any>>>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one argument and returns the bag.
    pub fn with<T: Any>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    pub fn push<T: Any>(&mut self, value: T) {
        self.slots.push(Some(Box::new(value)));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrows argument `index` as `T`.
    pub fn get<T: Any>(&self, index: usize) -> Result<&T, CallError> {
        let slot = self
            .slots
            .get(index)
            .and_then(Option::as_ref)
            .ok_or(CallError::MissingArgument { index })?;
        slot.downcast_ref::<T>().ok_or(CallError::ArgumentType {
            index,
            expected: type_name::<T>(),
        })
    }

    /// Moves argument `index` out of the bag as `T`.
    ///
    /// On a type mismatch the argument stays in place.
    pub fn take<T: Any>(&mut self, index: usize) -> Result<T, CallError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(CallError::MissingArgument { index })?;
        let boxed = slot.take().ok_or(CallError::MissingArgument { index })?;
        match boxed.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(original) => {
                *slot = Some(original);
                Err(CallError::ArgumentType {
                    index,
                    expected: type_name::<T>(),
                })
            }
        }
    }
}

impl Debug for Args {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args").field("len", &self.len()).finish()
    }
}

/// Result of one member call.
pub struct Value {
    inner: Box<dyn Any>,
}

impl Value {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            inner: Box::new(value),
        }
    }

    /// The value returned by members with no meaningful result.
    pub fn unit() -> Self {
        Self::new(())
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn is_unit(&self) -> bool {
        self.is::<()>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast<T: Any>(self) -> Result<T, CallError> {
        self.inner
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| CallError::ResultType {
                expected: type_name::<T>(),
            })
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Value")
            .field("unit", &self.is_unit())
            .finish_non_exhaustive()
    }
}

/// Member invocation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    UnregisteredType { type_name: &'static str },
    MemberNotFound { target: String, member: String },
    StaticNotFound { target: String, member: String },
    ReceiverMismatch { member: String, expected: &'static str },
    MissingArgument { index: usize },
    ArgumentType { index: usize, expected: &'static str },
    ResultType { expected: &'static str },
    Failed(String),
}

impl Display for CallError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnregisteredType { type_name } => {
                write!(f, "type is not registered as an extension target: {type_name}")
            }
            Self::MemberNotFound { target, member } => {
                write!(f, "member `{member}` not found on `{target}`")
            }
            Self::StaticNotFound { target, member } => {
                write!(f, "static member `{member}` not found on `{target}`")
            }
            Self::ReceiverMismatch { member, expected } => {
                write!(f, "member `{member}` expects a receiver of type {expected}")
            }
            Self::MissingArgument { index } => write!(f, "missing argument at index {index}"),
            Self::ArgumentType { index, expected } => {
                write!(f, "argument at index {index} is not a {expected}")
            }
            Self::ResultType { expected } => write!(f, "member result is not a {expected}"),
            Self::Failed(message) => write!(f, "member call failed: {message}"),
        }
    }
}

impl Error for CallError {}
