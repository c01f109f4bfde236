//! Tagged-slot encode/decode between guest memory and host values.
//!
//! Decoding reads the tag byte first and checks it against the statically
//! expected type; a mismatch is a protocol error, never a silent
//! coercion. The two deliberate exceptions: a Void slot collapses to the
//! host's null/undefined when the parameter is nullable, and a Ptr slot
//! may be read as I32 (an address reinterpreted as a plain integer).

use crate::error::InteropError;
use crate::host::HostValue;
use crate::marshal;
use crate::memory::GuestMemory;
use crate::object::ObjectTracker;
use crate::slot::{ParamSpec, ValueTag, TAG_OFFSET};

/// Guest-exported allocator used to place encoded strings and arrays in
/// linear memory. Allocation may grow the memory, invalidating views
/// created before the call.
pub type GuestMalloc = Box<dyn FnMut(u32) -> Result<u32, String>>;

/// Borrowed marshalling state for one encode/decode operation.
///
/// Views are taken fresh after every allocation; nothing here holds a
/// view across a call into the guest allocator.
pub(crate) struct Codec<'a> {
    pub memory: &'a GuestMemory,
    pub objects: &'a mut ObjectTracker,
    pub malloc: &'a mut GuestMalloc,
}

impl Codec<'_> {
    pub fn alloc(&mut self, size: u32) -> Result<u32, InteropError> {
        (self.malloc)(size).map_err(InteropError::Alloc)
    }

    /// Decode the slot at `slot` against `spec`.
    pub fn decode(&mut self, slot: u32, spec: &ParamSpec) -> Result<HostValue, InteropError> {
        let view = self.memory.view();
        let raw = view.u8(slot + TAG_OFFSET);
        let tag = ValueTag::from_u8(raw).ok_or(InteropError::UnknownTag(raw))?;

        if tag == ValueTag::Void {
            if spec.ty == ValueTag::Void {
                return Ok(HostValue::Undefined);
            }
            if spec.nullable {
                return Ok(if spec.null_as_undefined {
                    HostValue::Undefined
                } else {
                    HostValue::Null
                });
            }
            return Err(InteropError::TagMismatch {
                expected: spec.ty,
                actual: tag,
            });
        }
        if tag == ValueTag::Ptr && spec.ty == ValueTag::I32 {
            return Ok(HostValue::Number(view.i32(slot) as f64));
        }
        if tag != spec.ty {
            return Err(InteropError::TagMismatch {
                expected: spec.ty,
                actual: tag,
            });
        }

        match tag {
            ValueTag::Void => Ok(HostValue::Undefined),
            ValueTag::Bool => Ok(HostValue::Bool(view.u8(slot) != 0)),
            ValueTag::U8 => Ok(HostValue::Number(view.u8(slot) as f64)),
            ValueTag::I8 => Ok(HostValue::Number(view.i8(slot) as f64)),
            ValueTag::U16 => Ok(HostValue::Number(view.u16(slot) as f64)),
            ValueTag::I16 => Ok(HostValue::Number(view.i16(slot) as f64)),
            ValueTag::U32 => Ok(HostValue::Number(view.u32(slot) as f64)),
            ValueTag::I32 => Ok(HostValue::Number(view.i32(slot) as f64)),
            ValueTag::U64 | ValueTag::I64 => Ok(HostValue::BigInt(view.u64(slot))),
            ValueTag::F32 => Ok(HostValue::Number(view.f32(slot) as f64)),
            ValueTag::F64 => Ok(HostValue::Number(view.f64(slot))),
            ValueTag::Ptr => Ok(HostValue::Number(view.u32(slot) as f64)),
            ValueTag::Str => marshal::read_utf16z(&view, view.u32(slot)).map(HostValue::String),
            ValueTag::Obj => self.objects.resolve(view.u32(slot)).map(HostValue::Object),
            ValueTag::Arr => marshal::decode_array(self, slot, spec),
        }
    }

    /// Encode `value` into the slot at `slot` per `spec`.
    ///
    /// A null/undefined value against a nullable or Void-typed spec
    /// writes a Void slot and stops; against anything else it is an
    /// encode error.
    pub fn encode(
        &mut self,
        slot: u32,
        spec: &ParamSpec,
        value: &HostValue,
    ) -> Result<(), InteropError> {
        if value.is_absent() {
            if spec.nullable || spec.ty == ValueTag::Void {
                let view = self.memory.view();
                view.set_u64(slot, 0);
                view.set_u8(slot + TAG_OFFSET, ValueTag::Void as u8);
                return Ok(());
            }
            return Err(InteropError::Encode(format!(
                "null value for non-nullable {:?}",
                spec.ty
            )));
        }

        match (spec.ty, value) {
            (ValueTag::Void, _) => {
                // Caller declared no interest in the value; discard it.
                let view = self.memory.view();
                view.set_u64(slot, 0);
                view.set_u8(slot + TAG_OFFSET, ValueTag::Void as u8);
            }
            (ValueTag::Bool, HostValue::Bool(b)) => {
                let view = self.memory.view();
                view.set_u8(slot, *b as u8);
                view.set_u8(slot + TAG_OFFSET, ValueTag::Bool as u8);
            }
            (ValueTag::Str, HostValue::String(s)) => {
                let ptr = marshal::encode_string(self, s)?;
                let view = self.memory.view();
                view.set_u32(slot, ptr);
                view.set_u8(slot + TAG_OFFSET, ValueTag::Str as u8);
            }
            (ValueTag::Obj, HostValue::Object(object)) => {
                let handle = self.objects.track_or_reuse(object);
                let view = self.memory.view();
                view.set_u32(slot, handle);
                view.set_u8(slot + TAG_OFFSET, ValueTag::Obj as u8);
            }
            (ValueTag::Arr, HostValue::Array(items)) => {
                marshal::encode_array(self, slot, spec, items)?;
            }
            (ValueTag::U64 | ValueTag::I64, _) => {
                let bits = match value {
                    HostValue::BigInt(b) => *b,
                    HostValue::Number(n) => *n as i64 as u64,
                    other => return Err(mismatch(spec.ty, other)),
                };
                let view = self.memory.view();
                view.set_u64(slot, bits);
                view.set_u8(slot + TAG_OFFSET, spec.ty as u8);
            }
            (tag, _) if tag.is_numeric() => {
                let n = match value {
                    HostValue::Number(n) => *n,
                    HostValue::BigInt(b) => *b as i64 as f64,
                    other => return Err(mismatch(tag, other)),
                };
                let view = self.memory.view();
                match tag {
                    ValueTag::U8 => view.set_u8(slot, n as i64 as u8),
                    ValueTag::I8 => view.set_i8(slot, n as i64 as i8),
                    ValueTag::U16 => view.set_u16(slot, n as i64 as u16),
                    ValueTag::I16 => view.set_i16(slot, n as i64 as i16),
                    ValueTag::U32 => view.set_u32(slot, n as i64 as u32),
                    ValueTag::I32 => view.set_i32(slot, n as i64 as i32),
                    ValueTag::Ptr => view.set_u32(slot, n as i64 as u32),
                    ValueTag::F32 => view.set_f32(slot, n as f32),
                    ValueTag::F64 => view.set_f64(slot, n),
                    _ => unreachable!("is_numeric covers exactly these tags"),
                }
                view.set_u8(slot + TAG_OFFSET, tag as u8);
            }
            (tag, other) => return Err(mismatch(tag, other)),
        }
        Ok(())
    }
}

fn mismatch(expected: ValueTag, value: &HostValue) -> InteropError {
    InteropError::Encode(format!(
        "cannot encode {} as {expected:?}",
        value.kind()
    ))
}
