//! Runtime extension members for Rust types.
//!
//! Extension sources declare named functions taking the receiver first;
//! `bind` installs them on a target type's shared member table so every
//! value of that type can call them as members.

pub mod binder;
pub mod builtins;
pub mod dispatch;
pub mod logging;
pub mod registry;
pub mod source;
pub mod target;
pub mod value;

pub use binder::{
    bind, BindPair, BindReport, BindRequest, InvalidUsageError, InvalidUsageReason, PairReport,
};
pub use dispatch::Extended;
pub use logging::{default_log_level, init_logging, logging_status, LogDestination, LoggingConfig};
pub use registry::{RegistryError, TypeRegistry};
pub use source::{ExtensionSource, ExtensionSourceBuilder, SourceDefinitionError};
pub use target::{Member, MemberOrigin, TargetDefinitionError, TargetType, TargetTypeBuilder};
pub use value::{member_fn, static_fn, Args, CallError, MemberFn, StaticFn, Value};

