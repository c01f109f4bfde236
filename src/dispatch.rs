//! Per-call dispatch through a bound import.
//!
//! The caller supplies a parameter buffer of 16-byte slots laid out as
//! `[returnSlot][exceptionSlot][arg0]...[argN-1]`. Success writes the
//! return slot and reports 1; any failure stringifies into the exception
//! slot and reports 0. This pair is the sole error-signaling channel
//! across the boundary.

use std::rc::Rc;

use crate::codec::Codec;
use crate::context::InteropContext;
use crate::error::InteropError;
use crate::host::HostValue;
use crate::registry::BoundImport;
use crate::slot::{FunctionSpec, ParamSpec, ValueTag, SLOT_SIZE, TAG_OFFSET};

/// Offset of the return slot within the parameter buffer.
pub const RETURN_SLOT: u32 = 0;

/// Offset of the exception slot within the parameter buffer.
pub const EXCEPTION_SLOT: u32 = SLOT_SIZE;

/// Offset of the first argument slot within the parameter buffer.
pub const FIRST_ARG_SLOT: u32 = 2 * SLOT_SIZE;

pub(crate) fn invoke(ctx: &mut InteropContext, index: i32, params_ptr: u32) -> i32 {
    let Some(bound) = lookup(ctx, index) else {
        log::error!("invoke of unbound import index {index}");
        return fail(ctx, params_ptr, format!("no import bound at index {index}"));
    };

    let args = match decode_args(ctx, &bound.spec, params_ptr, &bound.full_name) {
        Ok(args) => args,
        Err(message) => return fail(ctx, params_ptr, message),
    };

    let outcome = match (bound.callable)(&args) {
        Ok(ret) => encode_return(ctx, &bound.spec.returns, params_ptr, &ret)
            .map_err(|e| format!("{}: return value: {e}", bound.full_name)),
        Err(message) => Err(format!(
            "{}: {}",
            bound.full_name,
            InteropError::HostFunction(message)
        )),
    };
    match outcome {
        Ok(()) => 1,
        Err(message) => fail(ctx, params_ptr, message),
    }
}

/// Cheap per-call handle to the cached call site; no per-invoke clone of
/// the name or signature.
fn lookup(ctx: &InteropContext, index: i32) -> Option<Rc<BoundImport>> {
    ctx.bound.get(usize::try_from(index).ok()?).cloned()
}

/// Decode every argument slot before calling the host function; a decode
/// failure aborts the call and reads as if the function itself threw.
fn decode_args(
    ctx: &mut InteropContext,
    spec: &FunctionSpec,
    params_ptr: u32,
    full_name: &str,
) -> Result<Vec<HostValue>, String> {
    let mut codec = Codec {
        memory: &ctx.memory,
        objects: &mut ctx.objects,
        malloc: &mut ctx.malloc,
    };
    let mut args = Vec::with_capacity(spec.params.len());
    for (i, param) in spec.params.iter().enumerate() {
        let slot = params_ptr + FIRST_ARG_SLOT + i as u32 * SLOT_SIZE;
        let value = codec
            .decode(slot, param)
            .map_err(|e| format!("{full_name}: argument {i}: {e}"))?;
        args.push(value);
    }
    Ok(args)
}

fn encode_return(
    ctx: &mut InteropContext,
    returns: &ParamSpec,
    params_ptr: u32,
    value: &HostValue,
) -> Result<(), InteropError> {
    let mut codec = Codec {
        memory: &ctx.memory,
        objects: &mut ctx.objects,
        malloc: &mut ctx.malloc,
    };
    codec.encode(params_ptr + RETURN_SLOT, returns, value)
}

/// Place `message` in the exception slot and report failure.
///
/// If even the message cannot be encoded (allocator failure), the slot
/// is left Void; the guest then surfaces its generic "import threw"
/// error.
fn fail(ctx: &mut InteropContext, params_ptr: u32, message: String) -> i32 {
    log::error!("import call failed: {message}");
    let slot = params_ptr + EXCEPTION_SLOT;
    let encoded = {
        let mut codec = Codec {
            memory: &ctx.memory,
            objects: &mut ctx.objects,
            malloc: &mut ctx.malloc,
        };
        codec.encode(slot, &ParamSpec::of(ValueTag::Str), &HostValue::String(message))
    };
    if encoded.is_err() {
        let view = ctx.memory.view();
        view.set_u64(slot, 0);
        view.set_u8(slot + TAG_OFFSET, ValueTag::Void as u8);
    }
    0
}
