//! End-to-end protocol tests: slot codec, arrays, object handles, and
//! the bind/invoke surface, all through a fake guest's linear memory.

mod harness;

use harness::FakeGuest;
use tether::{
    ElementSpec, FunctionSpec, HostObject, HostValue, InteropContext, InteropError, ParamSpec,
    TableBuilder, ValueTag, write_utf16z, FIRST_ARG_SLOT, RETURN_SLOT, SLOT_SIZE, TAG_OFFSET,
};

const SLOT: u32 = 0x200;
const PARAMS: u32 = 0x400;
const NAME_A: u32 = 0x100;
const NAME_B: u32 = 0x140;
const SPEC: u32 = 0x180;

fn ctx() -> InteropContext {
    FakeGuest::new().context()
}

fn round_trip(ctx: &mut InteropContext, spec: &ParamSpec, value: HostValue) {
    ctx.encode_slot(SLOT, spec, &value).unwrap();
    assert_eq!(ctx.decode_slot(SLOT, spec).unwrap(), value);
}

#[test]
fn scalar_round_trips_bit_for_bit() {
    let mut ctx = ctx();
    round_trip(&mut ctx, &ParamSpec::of(ValueTag::Bool), HostValue::Bool(true));
    round_trip(&mut ctx, &ParamSpec::of(ValueTag::Bool), HostValue::Bool(false));

    for value in [0.0, 255.0] {
        round_trip(&mut ctx, &ParamSpec::of(ValueTag::U8), HostValue::Number(value));
    }
    for value in [-128.0, -1.0, 0.0, 127.0] {
        round_trip(&mut ctx, &ParamSpec::of(ValueTag::I8), HostValue::Number(value));
    }
    for value in [0.0, 65535.0] {
        round_trip(&mut ctx, &ParamSpec::of(ValueTag::U16), HostValue::Number(value));
    }
    for value in [-32768.0, -1.0, 0.0, 32767.0] {
        round_trip(&mut ctx, &ParamSpec::of(ValueTag::I16), HostValue::Number(value));
    }
    for value in [0.0, u32::MAX as f64] {
        round_trip(&mut ctx, &ParamSpec::of(ValueTag::U32), HostValue::Number(value));
    }
    for value in [i32::MIN as f64, -1.0, 0.0, i32::MAX as f64] {
        round_trip(&mut ctx, &ParamSpec::of(ValueTag::I32), HostValue::Number(value));
    }
    for bits in [0, 1, u64::MAX, i64::MIN as u64, 0x8765_4321_0FED_CBA9] {
        round_trip(&mut ctx, &ParamSpec::of(ValueTag::U64), HostValue::BigInt(bits));
        round_trip(&mut ctx, &ParamSpec::of(ValueTag::I64), HostValue::BigInt(bits));
    }
    for value in [0.0, -0.5, f32::MAX as f64, f32::MIN as f64] {
        round_trip(&mut ctx, &ParamSpec::of(ValueTag::F32), HostValue::Number(value));
    }
    for value in [0.0, -1.0, f64::MAX, f64::MIN_POSITIVE] {
        round_trip(&mut ctx, &ParamSpec::of(ValueTag::F64), HostValue::Number(value));
    }
    round_trip(&mut ctx, &ParamSpec::of(ValueTag::Ptr), HostValue::Number(0xBEEF as f64));
}

#[test]
fn string_round_trips() {
    let mut ctx = ctx();
    for s in ["", "spawn1", "héllo wörld ⚡", "line\nbreak"] {
        round_trip(
            &mut ctx,
            &ParamSpec::of(ValueTag::Str),
            HostValue::String(s.to_string()),
        );
    }
}

#[test]
fn nullability_collapses_to_the_configured_absent_state() {
    let mut ctx = ctx();
    let nullable = ParamSpec::nullable_of(ValueTag::F64);
    ctx.encode_slot(SLOT, &nullable, &HostValue::Null).unwrap();
    assert_eq!(
        ctx.memory().view().u8(SLOT + TAG_OFFSET),
        ValueTag::Void as u8
    );
    assert_eq!(ctx.decode_slot(SLOT, &nullable).unwrap(), HostValue::Null);

    let as_undefined = ParamSpec::undefined_of(ValueTag::F64);
    ctx.encode_slot(SLOT, &as_undefined, &HostValue::Undefined).unwrap();
    assert_eq!(
        ctx.decode_slot(SLOT, &as_undefined).unwrap(),
        HostValue::Undefined
    );
}

#[test]
fn null_against_non_nullable_is_an_encode_error() {
    let mut ctx = ctx();
    let err = ctx
        .encode_slot(SLOT, &ParamSpec::of(ValueTag::I32), &HostValue::Null)
        .unwrap_err();
    assert!(matches!(err, InteropError::Encode(_)));
}

#[test]
fn every_tag_mismatch_is_fatal() {
    let mut ctx = ctx();
    let all: Vec<ValueTag> = (0..16).map(|raw| ValueTag::from_u8(raw).unwrap()).collect();
    for &actual in &all {
        for &expected in &all {
            if actual == expected {
                continue;
            }
            // The one documented coercion: an address read as an integer.
            if actual == ValueTag::Ptr && expected == ValueTag::I32 {
                continue;
            }
            let view = ctx.memory().view();
            view.set_u64(SLOT, 0);
            view.set_u8(SLOT + TAG_OFFSET, actual as u8);
            let spec = if expected == ValueTag::Arr {
                ParamSpec::array_of(ElementSpec::of(ValueTag::I32))
            } else {
                ParamSpec::of(expected)
            };
            let err = ctx.decode_slot(SLOT, &spec).unwrap_err();
            assert!(
                matches!(err, InteropError::TagMismatch { .. }),
                "{actual:?} against {expected:?} did not fail with a tag mismatch"
            );
        }
    }
}

#[test]
fn pointer_decodes_as_i32() {
    let mut ctx = ctx();
    let view = ctx.memory().view();
    view.set_u32(SLOT, 0x1234);
    view.set_u8(SLOT + TAG_OFFSET, ValueTag::Ptr as u8);
    assert_eq!(
        ctx.decode_slot(SLOT, &ParamSpec::of(ValueTag::I32)).unwrap(),
        HostValue::Number(0x1234 as f64)
    );
}

#[test]
fn object_handles_are_reused_until_released() {
    let mut ctx = ctx();
    let spec = ParamSpec::of(ValueTag::Obj);
    let object = HostObject::new();

    ctx.encode_slot(SLOT, &spec, &HostValue::Object(object.clone())).unwrap();
    let first = ctx.memory().view().u32(SLOT);
    ctx.encode_slot(SLOT, &spec, &HostValue::Object(object.clone())).unwrap();
    assert_eq!(ctx.memory().view().u32(SLOT), first);
    assert_eq!(ctx.objects().len(), 1);

    let decoded = ctx.decode_slot(SLOT, &spec).unwrap();
    assert_eq!(decoded, HostValue::Object(object.clone()));

    ctx.release_object_reference(first as i32);
    ctx.release_object_reference(first as i32); // idempotent
    assert_eq!(ctx.objects().len(), 0);

    ctx.encode_slot(SLOT, &spec, &HostValue::Object(object)).unwrap();
    let second = ctx.memory().view().u32(SLOT);
    assert_ne!(first, second);
}

#[test]
fn dangling_handle_is_a_protocol_error() {
    let mut ctx = ctx();
    let view = ctx.memory().view();
    view.set_u32(SLOT, 777);
    view.set_u8(SLOT + TAG_OFFSET, ValueTag::Obj as u8);
    let err = ctx.decode_slot(SLOT, &ParamSpec::of(ValueTag::Obj)).unwrap_err();
    assert!(matches!(err, InteropError::DanglingHandle(777)));
}

#[test]
fn primitive_array_round_trips() {
    let mut ctx = ctx();
    let spec = ParamSpec::array_of(ElementSpec::of(ValueTag::I32));
    for len in [0usize, 1, 150] {
        let items: Vec<HostValue> =
            (0..len).map(|i| HostValue::Number(i as f64 - 3.0)).collect();
        round_trip(&mut ctx, &spec, HostValue::Array(items));
    }

    let spec = ParamSpec::array_of(ElementSpec::of(ValueTag::F64));
    round_trip(
        &mut ctx,
        &spec,
        HostValue::Array(vec![
            HostValue::Number(0.25),
            HostValue::Number(-1.0),
            HostValue::Number(f64::MAX),
        ]),
    );
}

#[test]
fn empty_array_crosses_with_sentinel_base() {
    let mut ctx = ctx();
    let spec = ParamSpec::array_of(ElementSpec::of(ValueTag::I32));
    ctx.encode_slot(SLOT, &spec, &HostValue::Array(vec![])).unwrap();
    let view = ctx.memory().view();
    assert_eq!(view.u32(SLOT), 0);
    assert_eq!(view.u32(SLOT + 4), 0);
    assert_eq!(ctx.decode_slot(SLOT, &spec).unwrap(), HostValue::Array(vec![]));
}

#[test]
fn nullable_primitive_array_keeps_gaps() {
    let mut ctx = ctx();
    let spec = ParamSpec::array_of(ElementSpec::nullable_of(ValueTag::I32));
    round_trip(
        &mut ctx,
        &spec,
        HostValue::Array(vec![
            HostValue::Number(1.0),
            HostValue::Null,
            HostValue::Number(3.0),
        ]),
    );
}

#[test]
fn string_array_round_trips() {
    let mut ctx = ctx();
    let spec = ParamSpec::array_of(ElementSpec::of(ValueTag::Str));
    round_trip(
        &mut ctx,
        &spec,
        HostValue::Array(vec![
            HostValue::String("a".into()),
            HostValue::String("bc".into()),
            HostValue::String(String::new()),
        ]),
    );
}

#[test]
fn nullable_string_array_continues_past_leading_gap() {
    let mut ctx = ctx();
    let spec = ParamSpec::array_of(ElementSpec::nullable_of(ValueTag::Str));
    round_trip(
        &mut ctx,
        &spec,
        HostValue::Array(vec![
            HostValue::Null,
            HostValue::String("x".into()),
            HostValue::Null,
            HostValue::String("yz".into()),
        ]),
    );
}

#[test]
fn oversized_array_header_is_rejected_before_reservation() {
    let mut ctx = ctx();
    let view = ctx.memory().view();
    view.set_u32(SLOT, 0x100);
    view.set_u32(SLOT + 4, u32::MAX);
    view.set_u8(SLOT + TAG_OFFSET, ValueTag::Arr as u8);
    view.set_u8(SLOT + TAG_OFFSET + 1, ValueTag::I32 as u8);

    let spec = ParamSpec::array_of(ElementSpec::of(ValueTag::I32));
    let err = ctx.decode_slot(SLOT, &spec).unwrap_err();
    assert!(matches!(err, InteropError::ArrayBounds { .. }));

    // Same header shape against the packed string layout.
    view.set_u8(SLOT + TAG_OFFSET + 1, ValueTag::Str as u8);
    let spec = ParamSpec::array_of(ElementSpec::nullable_of(ValueTag::Str));
    let err = ctx.decode_slot(SLOT, &spec).unwrap_err();
    assert!(matches!(err, InteropError::ArrayBounds { .. }));
}

#[test]
fn encoding_a_large_string_grows_memory_safely() {
    let mut ctx = ctx();
    let big: String = "x".repeat(3 * 65536);
    let generation = ctx.memory().generation();
    round_trip(&mut ctx, &ParamSpec::of(ValueTag::Str), HostValue::String(big));
    assert!(ctx.memory().generation() > generation);
}

fn bind_add(ctx: &mut InteropContext) -> i32 {
    ctx.register_module(
        "game",
        TableBuilder::new()
            .func("add", |args| match (args.first(), args.get(1)) {
                (Some(HostValue::Number(a)), Some(HostValue::Number(b))) => {
                    Ok(HostValue::Number(a + b))
                }
                _ => Err("add: expected two numbers".into()),
            })
            .build(),
    );
    let view = ctx.memory().view();
    write_utf16z(&view, NAME_A, "game");
    write_utf16z(&view, NAME_B, "add");
    let spec = FunctionSpec::new(
        ParamSpec::of(ValueTag::F64),
        &[ParamSpec::of(ValueTag::F64), ParamSpec::of(ValueTag::F64)],
    )
    .unwrap();
    spec.write(&view, SPEC);
    ctx.bind_import(NAME_A, NAME_B, SPEC)
}

#[test]
fn bind_once_invoke_by_index() {
    let mut guest_ctx = ctx();
    let index = bind_add(&mut guest_ctx);
    assert_eq!(index, 0);

    let spec = ParamSpec::of(ValueTag::F64);
    guest_ctx.encode_slot(PARAMS + FIRST_ARG_SLOT, &spec, &HostValue::Number(2.0)).unwrap();
    guest_ctx
        .encode_slot(PARAMS + FIRST_ARG_SLOT + SLOT_SIZE, &spec, &HostValue::Number(40.0))
        .unwrap();
    assert_eq!(guest_ctx.invoke_import(index, PARAMS), 1);
    assert_eq!(
        guest_ctx.decode_slot(PARAMS + RETURN_SLOT, &spec).unwrap(),
        HostValue::Number(42.0)
    );
}

#[test]
fn binding_twice_yields_independent_indices() {
    let mut guest_ctx = ctx();
    let first = bind_add(&mut guest_ctx);
    let second = guest_ctx.bind_import(NAME_A, NAME_B, SPEC);
    assert_eq!((first, second), (0, 1));

    let spec = ParamSpec::of(ValueTag::F64);
    for index in [first, second] {
        guest_ctx.encode_slot(PARAMS + FIRST_ARG_SLOT, &spec, &HostValue::Number(1.0)).unwrap();
        guest_ctx
            .encode_slot(PARAMS + FIRST_ARG_SLOT + SLOT_SIZE, &spec, &HostValue::Number(5.0))
            .unwrap();
        assert_eq!(guest_ctx.invoke_import(index, PARAMS), 1);
        assert_eq!(
            guest_ctx.decode_slot(PARAMS + RETURN_SLOT, &spec).unwrap(),
            HostValue::Number(6.0)
        );
    }
}

#[test]
fn unresolved_imports_bind_negative() {
    let mut guest_ctx = ctx();
    bind_add(&mut guest_ctx);
    let view = guest_ctx.memory().view();
    write_utf16z(&view, NAME_B, "sub");
    assert!(guest_ctx.bind_import(NAME_A, NAME_B, SPEC) < 0);
    write_utf16z(&view, NAME_A, "sim");
    assert!(guest_ctx.bind_import(NAME_A, NAME_B, SPEC) < 0);

    let err = guest_ctx
        .bind(
            "game",
            "add.deeper",
            FunctionSpec::new(ParamSpec::of(ValueTag::Void), &[]).unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, InteropError::Resolution { .. }));
}

#[test]
fn host_exceptions_surface_through_the_exception_slot() {
    let mut guest_ctx = ctx();
    guest_ctx.register_module(
        "game",
        TableBuilder::new()
            .func("explode", |_args| Err("boom".into()))
            .build(),
    );
    let index = guest_ctx
        .bind(
            "game",
            "explode",
            FunctionSpec::new(ParamSpec::of(ValueTag::Void), &[]).unwrap(),
        )
        .unwrap();

    assert_eq!(guest_ctx.invoke_import(index as i32, PARAMS), 0);
    let exception = guest_ctx
        .decode_slot(PARAMS + SLOT_SIZE, &ParamSpec::of(ValueTag::Str))
        .unwrap();
    let HostValue::String(message) = exception else {
        panic!("exception slot did not hold a string");
    };
    assert!(message.contains("boom"));
    assert!(message.contains("game::explode"));
}

#[test]
fn argument_decode_failure_reads_as_a_throw() {
    let mut guest_ctx = ctx();
    guest_ctx.register_module(
        "game",
        TableBuilder::new()
            .func("take_obj", |_args| Ok(HostValue::Undefined))
            .build(),
    );
    let index = guest_ctx
        .bind(
            "game",
            "take_obj",
            FunctionSpec::new(ParamSpec::of(ValueTag::Void), &[ParamSpec::of(ValueTag::Obj)])
                .unwrap(),
        )
        .unwrap();

    // Guest writes a float where an object handle was declared.
    guest_ctx
        .encode_slot(PARAMS + FIRST_ARG_SLOT, &ParamSpec::of(ValueTag::F64), &HostValue::Number(1.5))
        .unwrap();
    assert_eq!(guest_ctx.invoke_import(index as i32, PARAMS), 0);
    let HostValue::String(message) = guest_ctx
        .decode_slot(PARAMS + SLOT_SIZE, &ParamSpec::of(ValueTag::Str))
        .unwrap()
    else {
        panic!("exception slot did not hold a string");
    };
    assert!(message.contains("game::take_obj"));
    assert!(message.contains("argument 0"));
}

#[test]
fn bad_return_value_reads_as_a_throw() {
    let mut guest_ctx = ctx();
    guest_ctx.register_module(
        "game",
        TableBuilder::new()
            .func("lies", |_args| Ok(HostValue::Null))
            .build(),
    );
    let index = guest_ctx
        .bind(
            "game",
            "lies",
            FunctionSpec::new(ParamSpec::of(ValueTag::F64), &[]).unwrap(),
        )
        .unwrap();
    assert_eq!(guest_ctx.invoke_import(index as i32, PARAMS), 0);
    let HostValue::String(message) = guest_ctx
        .decode_slot(PARAMS + SLOT_SIZE, &ParamSpec::of(ValueTag::Str))
        .unwrap()
    else {
        panic!("exception slot did not hold a string");
    };
    assert!(message.contains("return value"));
}

#[test]
fn invoking_an_unbound_index_fails_cleanly() {
    let mut guest_ctx = ctx();
    assert_eq!(guest_ctx.invoke_import(5, PARAMS), 0);
    assert_eq!(guest_ctx.invoke_import(-1, PARAMS), 0);
    let HostValue::String(message) = guest_ctx
        .decode_slot(PARAMS + SLOT_SIZE, &ParamSpec::of(ValueTag::Str))
        .unwrap()
    else {
        panic!("exception slot did not hold a string");
    };
    assert!(message.contains("no import bound"));
}

#[test]
fn interned_names_are_stable() {
    let mut guest_ctx = ctx();
    let view = guest_ctx.memory().view();
    write_utf16z(&view, NAME_A, "harvest");
    write_utf16z(&view, NAME_B, "upgrade");

    let harvest = guest_ctx.intern_name(NAME_A);
    let upgrade = guest_ctx.intern_name(NAME_B);
    assert_ne!(harvest, upgrade);
    assert_eq!(guest_ctx.intern_name(NAME_A), harvest);
    assert_eq!(guest_ctx.names().resolve(harvest as u32), Some("harvest"));
}
