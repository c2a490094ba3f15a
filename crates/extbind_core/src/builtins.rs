//! Target descriptors for std containers.
//!
//! Each descriptor exposes a small native surface so extensions binding a
//! name the container already has are skipped, the same way user-declared
//! natives are.

use crate::target::{TargetDefinitionError, TargetType};
use std::any::Any;
use std::collections::BTreeSet;

/// `Vec<T>` with native `len`, `is_empty`, `push`, `pop` and static `new`.
pub fn vec_target<T: Any>() -> Result<TargetType, TargetDefinitionError> {
    TargetType::builder::<Vec<T>>("Vec")
        .native("len", |vec: &mut Vec<T>, _args| Ok(vec.len()))
        .native("is_empty", |vec: &mut Vec<T>, _args| Ok(vec.is_empty()))
        .native("push", |vec: &mut Vec<T>, mut args| {
            vec.push(args.take::<T>(0)?);
            Ok(())
        })
        .native("pop", |vec: &mut Vec<T>, _args| Ok(vec.pop()))
        .static_member("new", |_args| Ok(Vec::<T>::new()))
        .build()
}

/// `BTreeSet<T>` with native `len`, `is_empty`, `contains`, `insert` and static `new`.
pub fn btree_set_target<T: Any + Ord>() -> Result<TargetType, TargetDefinitionError> {
    TargetType::builder::<BTreeSet<T>>("BTreeSet")
        .native("len", |set: &mut BTreeSet<T>, _args| Ok(set.len()))
        .native("is_empty", |set: &mut BTreeSet<T>, _args| Ok(set.is_empty()))
        .native("contains", |set: &mut BTreeSet<T>, args| {
            Ok(set.contains(args.get::<T>(0)?))
        })
        .native("insert", |set: &mut BTreeSet<T>, mut args| {
            Ok(set.insert(args.take::<T>(0)?))
        })
        .static_member("new", |_args| Ok(BTreeSet::<T>::new()))
        .build()
}

/// `String` with native `len`, `is_empty`, `push_str` and static `new`.
pub fn string_target() -> Result<TargetType, TargetDefinitionError> {
    TargetType::builder::<String>("String")
        .native("len", |text: &mut String, _args| Ok(text.len()))
        .native("is_empty", |text: &mut String, _args| Ok(text.is_empty()))
        .native("push_str", |text: &mut String, args| {
            text.push_str(args.get::<String>(0)?);
            Ok(())
        })
        .static_member("new", |_args| Ok(String::new()))
        .build()
}
