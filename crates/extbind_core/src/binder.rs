//! Binds extension sources onto target types.
//!
//! # Responsibility
//! - Normalize the single-pair and batch call shapes into one pair list.
//! - Install a forwarding member on the target for every source member whose
//!   name is not already observable there.
//!
//! # Invariants
//! - Validation happens before any installation; a rejected request leaves
//!   every target untouched.
//! - First writer wins: an observable name is never replaced, whether it is
//!   native or came from an earlier bind.
//! - Pairs are processed in request order without deduplication.

use crate::source::ExtensionSource;
use crate::target::{Member, TargetType};
use crate::value::member_fn;
use log::{debug, info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One (extension source, target type) pair.
pub type BindPair = (ExtensionSource, TargetType);

/// Every argument shape `bind` can be called with.
///
/// Only [`BindRequest::Pair`] and [`BindRequest::Pairs`] are valid; the other
/// shapes exist so misuse is reported as [`InvalidUsageError`].
#[derive(Debug, Clone)]
pub enum BindRequest {
    Empty,
    SourceOnly(ExtensionSource),
    TargetOnly(TargetType),
    Pair(ExtensionSource, TargetType),
    Pairs(Vec<BindPair>),
}

impl BindRequest {
    /// Normalizes the request into the ordered pair list.
    pub fn into_pairs(self) -> Result<Vec<BindPair>, InvalidUsageError> {
        match self {
            Self::Pair(source, target) => Ok(vec![(source, target)]),
            Self::Pairs(pairs) => Ok(pairs),
            Self::Empty => Err(InvalidUsageError::new(InvalidUsageReason::MissingArguments)),
            Self::SourceOnly(_) => Err(InvalidUsageError::new(InvalidUsageReason::MissingTarget)),
            Self::TargetOnly(_) => Err(InvalidUsageError::new(
                InvalidUsageReason::UnsupportedArgument,
            )),
        }
    }
}

impl From<()> for BindRequest {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl From<ExtensionSource> for BindRequest {
    fn from(source: ExtensionSource) -> Self {
        Self::SourceOnly(source)
    }
}

impl From<TargetType> for BindRequest {
    fn from(target: TargetType) -> Self {
        Self::TargetOnly(target)
    }
}

impl From<BindPair> for BindRequest {
    fn from((source, target): BindPair) -> Self {
        Self::Pair(source, target)
    }
}

impl From<(&ExtensionSource, &TargetType)> for BindRequest {
    fn from((source, target): (&ExtensionSource, &TargetType)) -> Self {
        Self::Pair(source.clone(), target.clone())
    }
}

impl From<Vec<BindPair>> for BindRequest {
    fn from(pairs: Vec<BindPair>) -> Self {
        Self::Pairs(pairs)
    }
}

impl From<&[BindPair]> for BindRequest {
    fn from(pairs: &[BindPair]) -> Self {
        Self::Pairs(pairs.to_vec())
    }
}

impl<const N: usize> From<[BindPair; N]> for BindRequest {
    fn from(pairs: [BindPair; N]) -> Self {
        Self::Pairs(pairs.into())
    }
}

/// Why a bind request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidUsageReason {
    MissingArguments,
    MissingTarget,
    UnsupportedArgument,
}

impl InvalidUsageReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingArguments => "missing_arguments",
            Self::MissingTarget => "missing_target",
            Self::UnsupportedArgument => "unsupported_argument",
        }
    }
}

/// The only error `bind` produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidUsageError {
    reason: InvalidUsageReason,
}

impl InvalidUsageError {
    pub fn new(reason: InvalidUsageReason) -> Self {
        Self { reason }
    }

    pub fn reason(&self) -> InvalidUsageReason {
        self.reason
    }
}

impl Display for InvalidUsageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.reason {
            InvalidUsageReason::MissingArguments => {
                write!(f, "Invalid use of extensions: no arguments given")
            }
            InvalidUsageReason::MissingTarget => {
                write!(f, "Invalid use of extensions: extension source given without a target type")
            }
            InvalidUsageReason::UnsupportedArgument => write!(
                f,
                "Invalid use of extensions: expected a (source, target) pair or a list of pairs"
            ),
        }
    }
}

impl Error for InvalidUsageError {}

/// Outcome of one (source, target) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairReport {
    pub source: String,
    pub target: String,
    /// Names installed by this pair, in source declaration order.
    pub installed: Vec<String>,
    /// Names left untouched because they were already observable.
    pub skipped: Vec<String>,
}

/// Outcome of one `bind` call, one entry per pair in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BindReport {
    pub pairs: Vec<PairReport>,
}

impl BindReport {
    pub fn installed_count(&self) -> usize {
        self.pairs.iter().map(|pair| pair.installed.len()).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.pairs.iter().map(|pair| pair.skipped.len()).sum()
    }

    /// Returns whether nothing was installed.
    pub fn is_noop(&self) -> bool {
        self.installed_count() == 0
    }
}

/// Binds extension members onto target types.
///
/// Accepts a single `(source, target)` pair or a list of pairs. For every own
/// member `m` of each source, installs on the target a member that calls
/// `source.m(receiver, args)`, unless `m` is already observable on the target.
///
/// # Errors
/// - [`InvalidUsageError`] when called with no arguments, with a source but no
///   target, or with anything else that is not a pair or a list of pairs.
///   Nothing is installed in that case.
pub fn bind(request: impl Into<BindRequest>) -> Result<BindReport, InvalidUsageError> {
    let pairs = match request.into().into_pairs() {
        Ok(pairs) => pairs,
        Err(err) => {
            warn!(
                "event=bind_rejected module=binder status=error reason={}",
                err.reason().as_str()
            );
            return Err(err);
        }
    };

    debug!(
        "event=bind_start module=binder status=ok pairs={}",
        pairs.len()
    );

    let report = BindReport {
        pairs: pairs
            .iter()
            .map(|(source, target)| bind_pair(source, target))
            .collect(),
    };

    info!(
        "event=bind_done module=binder status=ok pairs={} installed={} skipped={}",
        report.pairs.len(),
        report.installed_count(),
        report.skipped_count()
    );
    Ok(report)
}

fn bind_pair(source: &ExtensionSource, target: &TargetType) -> PairReport {
    let mut report = PairReport {
        source: source.name().to_string(),
        target: target.name().to_string(),
        installed: Vec::new(),
        skipped: Vec::new(),
    };

    for name in source.member_names() {
        if target.install_if_absent(name, forwarding_member(source, name)) {
            debug!(
                "event=member_install module=binder status=ok source={} target={} member={}",
                report.source, report.target, name
            );
            report.installed.push(name.to_string());
        } else {
            debug!(
                "event=member_skip module=binder status=skip source={} target={} member={}",
                report.source, report.target, name
            );
            report.skipped.push(name.to_string());
        }
    }

    report
}

/// Builds the member that forwards `receiver.name(args)` to
/// `source.name(receiver, args)`.
fn forwarding_member(source: &ExtensionSource, name: &str) -> Member {
    let forward_to = source.clone();
    let member_name = name.to_string();
    Member::extension(
        source.name(),
        member_fn(move |receiver, args| forward_to.call(&member_name, receiver, args)),
    )
}
