//! Variable-length marshalling: UTF-16 strings and arrays.
//!
//! Strings cross as zero-terminated UTF-16 code units. Primitive arrays
//! cross as a contiguous run of full 16-byte slots; all-string arrays
//! take a packed path with a single buffer allocation. Decoders stop at
//! the declared element count, never at a terminator alone.

use crate::codec::Codec;
use crate::error::InteropError;
use crate::host::HostValue;
use crate::memory::MemoryView;
use crate::slot::{ElementSpec, ParamSpec, ValueTag, ELEMENT_TAG_OFFSET, SLOT_SIZE, TAG_OFFSET};

/// Read a zero-terminated UTF-16 string from guest memory.
pub fn read_utf16z(view: &MemoryView, ptr: u32) -> Result<String, InteropError> {
    let mut units = Vec::new();
    let mut offset = ptr;
    loop {
        let unit = view.u16(offset);
        if unit == 0 {
            break;
        }
        units.push(unit);
        offset += 2;
    }
    String::from_utf16(&units).map_err(|_| InteropError::InvalidString(ptr))
}

/// Write `s` as zero-terminated UTF-16 code units at `ptr`; returns the
/// offset just past the terminator.
pub fn write_utf16z(view: &MemoryView, ptr: u32, s: &str) -> u32 {
    let mut offset = ptr;
    for unit in s.encode_utf16() {
        view.set_u16(offset, unit);
        offset += 2;
    }
    view.set_u16(offset, 0);
    offset + 2
}

fn utf16_units(s: &str) -> u32 {
    s.encode_utf16().count() as u32
}

/// Allocate guest memory for `s` and write it zero-terminated; returns
/// the allocation's offset.
pub(crate) fn encode_string(codec: &mut Codec<'_>, s: &str) -> Result<u32, InteropError> {
    let ptr = codec.alloc((utf16_units(s) + 1) * 2)?;
    let view = codec.memory.view();
    write_utf16z(&view, ptr, s);
    Ok(ptr)
}

/// Encode `items` into the array slot at `slot`.
///
/// Empty arrays cross as (base 0, count 0); the base of a zero-length
/// array is a sentinel and is never dereferenced.
pub(crate) fn encode_array(
    codec: &mut Codec<'_>,
    slot: u32,
    spec: &ParamSpec,
    items: &[HostValue],
) -> Result<(), InteropError> {
    let element = spec
        .element
        .ok_or_else(|| InteropError::Signature("array type without an element type".into()))?;
    let count = items.len() as u32;
    let base = if count == 0 {
        0
    } else if element.ty == ValueTag::Str {
        encode_string_array(codec, &element, items)?
    } else {
        encode_slot_array(codec, &element, items)?
    };
    let view = codec.memory.view();
    view.set_u32(slot, base);
    view.set_u32(slot + 4, count);
    view.set_u8(slot + TAG_OFFSET, ValueTag::Arr as u8);
    view.set_u8(slot + ELEMENT_TAG_OFFSET, element.ty as u8);
    Ok(())
}

fn encode_slot_array(
    codec: &mut Codec<'_>,
    element: &ElementSpec,
    items: &[HostValue],
) -> Result<u32, InteropError> {
    let base = codec.alloc(items.len() as u32 * SLOT_SIZE)?;
    let param = element.as_param();
    for (i, item) in items.iter().enumerate() {
        codec.encode(base + i as u32 * SLOT_SIZE, &param, item)?;
    }
    Ok(base)
}

/// Packed path for all-string arrays: one buffer, sized up front.
///
/// Layout per element: an optional one-code-unit presence flag (only
/// when the element type is nullable), then for present elements the
/// code units and a zero terminator. Absent elements are the presence
/// flag alone.
fn encode_string_array(
    codec: &mut Codec<'_>,
    element: &ElementSpec,
    items: &[HostValue],
) -> Result<u32, InteropError> {
    let mut units: u32 = 0;
    for item in items {
        match item {
            HostValue::String(s) => units += utf16_units(s) + 1 + element.nullable as u32,
            v if v.is_absent() && element.nullable => units += 1,
            v if v.is_absent() => {
                return Err(InteropError::Encode(
                    "null element in non-nullable string array".into(),
                ))
            }
            v => {
                return Err(InteropError::Encode(format!(
                    "cannot encode {} as Str element",
                    v.kind()
                )))
            }
        }
    }
    let base = codec.alloc(units * 2)?;
    let view = codec.memory.view();
    let mut offset = base;
    for item in items {
        match item {
            HostValue::String(s) => {
                if element.nullable {
                    view.set_u16(offset, 1);
                    offset += 2;
                }
                offset = write_utf16z(&view, offset, s);
            }
            _ => {
                view.set_u16(offset, 0);
                offset += 2;
            }
        }
    }
    Ok(base)
}

/// Decode the array slot at `slot`. The wire element tag must agree with
/// the declared element type.
pub(crate) fn decode_array(
    codec: &mut Codec<'_>,
    slot: u32,
    spec: &ParamSpec,
) -> Result<HostValue, InteropError> {
    let element = spec
        .element
        .ok_or_else(|| InteropError::Signature("array parameter without an element type".into()))?;
    let view = codec.memory.view();
    let raw_elem = view.u8(slot + ELEMENT_TAG_OFFSET);
    let wire_elem = ValueTag::from_u8(raw_elem).ok_or(InteropError::UnknownTag(raw_elem))?;
    if wire_elem != element.ty {
        return Err(InteropError::TagMismatch {
            expected: element.ty,
            actual: wire_elem,
        });
    }
    let base = view.u32(slot);
    let count = view.u32(slot + 4);
    if count == 0 {
        return Ok(HostValue::Array(Vec::new()));
    }
    // Both layouts need at least this many bytes per element: a full
    // slot, or one code unit (presence flag or terminator) for packed
    // strings. Checked before any reservation sized by the header.
    let per_element = if element.ty == ValueTag::Str {
        2
    } else {
        SLOT_SIZE as u64
    };
    let end = base as u64 + count as u64 * per_element;
    if end > codec.memory.len() as u64 {
        return Err(InteropError::ArrayBounds { base, count });
    }
    if element.ty == ValueTag::Str {
        decode_string_array(&view, base, count, &element)
    } else {
        let param = element.as_param();
        let mut items = Vec::with_capacity(count as usize);
        for i in 0..count {
            items.push(codec.decode(base + i * SLOT_SIZE, &param)?);
        }
        Ok(HostValue::Array(items))
    }
}

fn decode_string_array(
    view: &MemoryView,
    base: u32,
    count: u32,
    element: &ElementSpec,
) -> Result<HostValue, InteropError> {
    let mut items = Vec::with_capacity(count as usize);
    let mut offset = base;
    for _ in 0..count {
        if element.nullable {
            let present = view.u16(offset);
            offset += 2;
            if present == 0 {
                // Absent elements carry no body or terminator; keep
                // walking the remaining elements.
                items.push(HostValue::Null);
                continue;
            }
        }
        let mut units = Vec::new();
        loop {
            let unit = view.u16(offset);
            offset += 2;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        items.push(HostValue::String(
            String::from_utf16(&units).map_err(|_| InteropError::InvalidString(base))?,
        ));
    }
    Ok(HostValue::Array(items))
}
