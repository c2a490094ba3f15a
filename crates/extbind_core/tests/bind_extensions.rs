use extbind_core::builtins::{btree_set_target, vec_target};
use extbind_core::{
    args, bind, Args, BindPair, CallError, Extended, ExtensionSource, InvalidUsageReason,
    MemberOrigin, TargetType, TypeRegistry,
};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Barrier;

type Visitor = Box<dyn FnMut(&i32)>;

fn array_extensions() -> ExtensionSource {
    ExtensionSource::builder("ArrayExtensions")
        .member("clear", |arr: &mut Vec<i32>, _args| {
            arr.clear();
            Ok("extension")
        })
        .member("scale", |arr: &mut Vec<i32>, args| {
            let factor = *args.get::<i32>(0)?;
            let offset = *args.get::<i32>(1)?;
            arr.iter_mut().for_each(|value| *value = *value * factor + offset);
            Ok(())
        })
        .build()
        .expect("valid array extensions")
}

fn set_extensions() -> ExtensionSource {
    ExtensionSource::builder("SetExtensions")
        .member("pipe", |set: &mut BTreeSet<i32>, mut args| {
            let mut action = args.take::<Visitor>(0)?;
            for item in set.iter() {
                action(item);
            }
            Ok(())
        })
        .build()
        .expect("valid set extensions")
}

fn fresh_registry() -> (TypeRegistry, TargetType, TargetType) {
    let registry = TypeRegistry::new();
    let array = registry
        .register(vec_target::<i32>().expect("vec target"))
        .expect("vec registers");
    let set = registry
        .register(btree_set_target::<i32>().expect("set target"))
        .expect("set registers");
    (registry, array, set)
}

#[test]
fn single_pair_installs_clear_on_every_array() {
    let (registry, array, _) = fresh_registry();
    let mut created_before_bind: Vec<i32> = vec![1, 2, 3];

    bind((array_extensions(), array)).expect("bind should succeed");

    let mut created_after_bind: Vec<i32> = vec![4, 5];
    assert!(created_before_bind.has_member_in(&registry, "clear"));
    created_before_bind
        .call_member_in(&registry, "clear", args![])
        .expect("clear call");
    created_after_bind
        .call_member_in(&registry, "clear", args![])
        .expect("clear call");

    assert!(created_before_bind.is_empty());
    assert!(created_after_bind.is_empty());
}

#[test]
fn forwarding_passes_call_site_arguments_in_order() {
    let (registry, array, _) = fresh_registry();
    bind((array_extensions(), array)).expect("bind should succeed");

    let mut values: Vec<i32> = vec![1, 2, 3];
    values
        .call_member_in(&registry, "scale", args![10_i32, 1_i32])
        .expect("scale call");
    assert_eq!(values, [11, 21, 31]);

    let err = values
        .call_member_in(&registry, "scale", args![10_i32])
        .expect_err("missing second argument");
    assert_eq!(err, CallError::MissingArgument { index: 1 });
}

#[test]
fn batch_binds_array_and_set() {
    let (registry, array, set) = fresh_registry();

    bind(vec![(array_extensions(), array), (set_extensions(), set)])
        .expect("batch bind should succeed");

    let mut arr: Vec<i32> = vec![1, 2, 3];
    arr.call_member_in(&registry, "clear", args![])
        .expect("clear call");
    assert!(arr.is_empty());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let visitor: Visitor = Box::new(move |item: &i32| sink.borrow_mut().push(*item));

    let mut numbers: BTreeSet<i32> = [1, 2, 3].into_iter().collect();
    numbers
        .call_member_in(&registry, "pipe", args![visitor])
        .expect("pipe call");
    assert_eq!(*seen.borrow(), [1, 2, 3]);
}

#[test]
fn invalid_shapes_fail_and_install_nothing() {
    let (registry, array, _) = fresh_registry();

    let err = bind(array_extensions()).expect_err("missing target must fail");
    assert_eq!(err.reason(), InvalidUsageReason::MissingTarget);
    assert!(err.to_string().contains("Invalid use of extensions"));

    let err = bind(()).expect_err("no arguments must fail");
    assert_eq!(err.reason(), InvalidUsageReason::MissingArguments);

    let err = bind(array.clone()).expect_err("target alone must fail");
    assert_eq!(err.reason(), InvalidUsageReason::UnsupportedArgument);

    let values: Vec<i32> = vec![1];
    assert!(!values.has_member_in(&registry, "clear"));
    assert!(array.member_names().iter().all(|name| name != "clear"));
}

#[test]
fn native_member_is_never_replaced() {
    let array = TargetType::builder::<Vec<i32>>("Array")
        .native("clear", |arr: &mut Vec<i32>, _args| {
            arr.truncate(0);
            Ok("native")
        })
        .build()
        .expect("array with native clear");

    let report = bind((array_extensions(), array.clone())).expect("bind should succeed");
    assert_eq!(report.pairs[0].skipped, ["clear"]);
    assert_eq!(report.pairs[0].installed, ["scale"]);

    let mut values: Vec<i32> = vec![1, 2, 3];
    let outcome = array
        .invoke(&mut values, "clear", Args::new())
        .expect("clear call")
        .downcast::<&str>()
        .expect("str result");
    assert_eq!(outcome, "native");
    assert!(values.is_empty());
    assert_eq!(array.member_origin("clear"), Some(MemberOrigin::Native));
}

#[test]
fn static_member_blocks_installation() {
    let array = TargetType::builder::<Vec<i32>>("Array")
        .static_member("clear", |_args| Ok(()))
        .build()
        .expect("array with static clear");

    let report = bind((array_extensions(), array.clone())).expect("bind should succeed");
    assert_eq!(report.pairs[0].skipped, ["clear"]);
    assert!(array.lookup("clear").is_none());
}

#[test]
fn inherited_member_blocks_installation_on_child() {
    let base = TargetType::builder::<Vec<i32>>("Collection")
        .native("clear", |arr: &mut Vec<i32>, _args| {
            arr.clear();
            Ok("base")
        })
        .build()
        .expect("base collection");
    let array = TargetType::builder::<Vec<i32>>("Array")
        .extends(&base)
        .build()
        .expect("array extends collection");

    let report = bind((array_extensions(), array.clone())).expect("bind should succeed");
    assert_eq!(report.pairs[0].skipped, ["clear"]);

    let mut values: Vec<i32> = vec![9];
    let outcome = array
        .invoke(&mut values, "clear", Args::new())
        .expect("inherited clear")
        .downcast::<&str>()
        .expect("str result");
    assert_eq!(outcome, "base");
}

struct Shape {
    sides: u32,
}

struct Tile {
    shape: Shape,
    colour: &'static str,
}

#[test]
fn parent_member_reached_through_view_blocks_and_answers() {
    let shape = TargetType::builder::<Shape>("Shape")
        .native("describe", |shape: &mut Shape, _args| {
            Ok(format!("{} sides", shape.sides))
        })
        .build()
        .expect("shape target");
    let tile = TargetType::builder::<Tile>("Tile")
        .extends_via(&shape, |tile: &mut Tile| &mut tile.shape)
        .build()
        .expect("tile extends shape");
    let tile_extensions = ExtensionSource::builder("TileExtensions")
        .member("describe", |tile: &mut Tile, _args| Ok(tile.colour.to_string()))
        .member("paint", |tile: &mut Tile, mut args| {
            tile.colour = args.take::<&'static str>(0)?;
            Ok(())
        })
        .build()
        .expect("tile extensions");

    let report = bind((tile_extensions, tile.clone())).expect("bind should succeed");
    assert_eq!(report.pairs[0].installed, ["paint"]);
    assert_eq!(report.pairs[0].skipped, ["describe"]);
    assert!(tile.has_member("describe"));

    let mut value = Tile {
        shape: Shape { sides: 6 },
        colour: "red",
    };
    tile.invoke(&mut value, "paint", args!["blue"]).expect("installed paint");
    let described = tile
        .invoke(&mut value, "describe", Args::new())
        .expect("inherited describe")
        .downcast::<String>()
        .expect("string result");
    assert_eq!(described, "6 sides");
    assert_eq!(value.colour, "blue");
}

#[test]
fn rebinding_same_pair_is_a_noop() {
    let (registry, array, _) = fresh_registry();
    let source = array_extensions();

    let first = bind((&source, &array)).expect("first bind");
    assert_eq!(first.installed_count(), 2);

    let second = bind((&source, &array)).expect("second bind");
    assert!(second.is_noop());
    assert_eq!(second.skipped_count(), 2);

    let mut values: Vec<i32> = vec![2];
    values
        .call_member_in(&registry, "scale", args![3_i32, 0_i32])
        .expect("scale call");
    assert_eq!(values, [6]);
}

#[test]
fn batch_matches_sequential_binds() {
    let (_, batch_array, batch_set) = fresh_registry();
    let (_, seq_array, seq_set) = fresh_registry();

    let batch: Vec<BindPair> = vec![
        (array_extensions(), batch_array.clone()),
        (set_extensions(), batch_set.clone()),
    ];
    let batch_report = bind(batch).expect("batch bind");

    let first = bind((array_extensions(), seq_array.clone())).expect("first bind");
    let second = bind((set_extensions(), seq_set.clone())).expect("second bind");

    assert_eq!(batch_array.member_names(), seq_array.member_names());
    assert_eq!(batch_set.member_names(), seq_set.member_names());
    assert_eq!(batch_report.pairs, [first.pairs[0].clone(), second.pairs[0].clone()]);
}

#[test]
fn concurrent_binders_install_a_name_once() {
    let array = vec_target::<i32>().expect("vec target");
    let sources: Vec<ExtensionSource> = (0..8_i32)
        .map(|index| {
            ExtensionSource::builder(format!("Racer{index}"))
                .member("winner", move |_: &mut Vec<i32>, _args| Ok(index))
                .build()
                .expect("valid racer")
        })
        .collect();
    let barrier = Barrier::new(sources.len());

    let installed: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                let array = array.clone();
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    bind((source, &array)).expect("bind").installed_count()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("binder thread"))
            .sum()
    });

    assert_eq!(installed, 1);
    let Some(MemberOrigin::Extension { source }) = array.member_origin("winner") else {
        panic!("winner should be installed by an extension");
    };

    let mut values: Vec<i32> = vec![];
    let winner = array
        .invoke(&mut values, "winner", Args::new())
        .expect("winner call")
        .downcast::<i32>()
        .expect("i32 result");
    assert_eq!(source, format!("Racer{winner}"));
}
