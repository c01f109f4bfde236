//! Wire layout shared with the guest: value tags, slots, and signatures.
//!
//! Both sides are compiled against this exact layout; there is no version
//! negotiation. A slot is 16 bytes with the tag byte at offset 12, so
//! 8-byte scalar payloads sit aligned in bytes 0..8. Array slots carry a
//! second tag byte for their element type at offset 13.

use smallvec::SmallVec;

use crate::error::InteropError;
use crate::memory::MemoryView;

/// Size in bytes of one value slot.
pub const SLOT_SIZE: u32 = 16;

/// Byte offset of the tag within a slot.
pub const TAG_OFFSET: u32 = 12;

/// Byte offset of the element tag within an array slot.
pub const ELEMENT_TAG_OFFSET: u32 = 13;

/// Maximum number of parameters a bound import may declare.
///
/// A deliberate ceiling; calls needing more must be restructured on
/// either side.
pub const MAX_PARAMS: usize = 8;

/// Size in bytes of a signature's wire form: return entry plus
/// [`MAX_PARAMS`] parameter entries, 4 bytes each.
pub const FUNCTION_SPEC_WIRE_SIZE: u32 = 4 * (MAX_PARAMS as u32 + 1);

/// Type tag of a value crossing the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueTag {
    Void = 0,
    Bool = 1,
    U8 = 2,
    I8 = 3,
    U16 = 4,
    I16 = 5,
    U32 = 6,
    I32 = 7,
    U64 = 8,
    I64 = 9,
    F32 = 10,
    F64 = 11,
    Ptr = 12,
    Str = 13,
    Obj = 14,
    Arr = 15,
}

impl ValueTag {
    pub fn from_u8(raw: u8) -> Option<ValueTag> {
        Some(match raw {
            0 => ValueTag::Void,
            1 => ValueTag::Bool,
            2 => ValueTag::U8,
            3 => ValueTag::I8,
            4 => ValueTag::U16,
            5 => ValueTag::I16,
            6 => ValueTag::U32,
            7 => ValueTag::I32,
            8 => ValueTag::U64,
            9 => ValueTag::I64,
            10 => ValueTag::F32,
            11 => ValueTag::F64,
            12 => ValueTag::Ptr,
            13 => ValueTag::Str,
            14 => ValueTag::Obj,
            15 => ValueTag::Arr,
            _ => return None,
        })
    }

    /// Tags whose payload is a plain number reinterpreted per width.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueTag::U8
                | ValueTag::I8
                | ValueTag::U16
                | ValueTag::I16
                | ValueTag::U32
                | ValueTag::I32
                | ValueTag::F32
                | ValueTag::F64
                | ValueTag::Ptr
        )
    }
}

/// Element type of an array parameter. No further nesting: arrays of
/// arrays are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpec {
    pub ty: ValueTag,
    pub nullable: bool,
}

impl ElementSpec {
    pub fn of(ty: ValueTag) -> Self {
        ElementSpec { ty, nullable: false }
    }

    pub fn nullable_of(ty: ValueTag) -> Self {
        ElementSpec { ty, nullable: true }
    }

    pub(crate) fn as_param(&self) -> ParamSpec {
        ParamSpec {
            ty: self.ty,
            nullable: self.nullable,
            null_as_undefined: false,
            element: None,
        }
    }
}

/// Static per-parameter descriptor, produced once per bound import.
///
/// `null_as_undefined` selects which of the two host "no value" states a
/// Void slot decodes to; some host environments distinguish them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub ty: ValueTag,
    pub nullable: bool,
    pub null_as_undefined: bool,
    pub element: Option<ElementSpec>,
}

const FLAG_NULLABLE: u8 = 1;
const FLAG_NULL_AS_UNDEFINED: u8 = 2;

impl ParamSpec {
    pub fn of(ty: ValueTag) -> Self {
        ParamSpec {
            ty,
            nullable: false,
            null_as_undefined: false,
            element: None,
        }
    }

    pub fn nullable_of(ty: ValueTag) -> Self {
        ParamSpec {
            nullable: true,
            ..ParamSpec::of(ty)
        }
    }

    pub fn undefined_of(ty: ValueTag) -> Self {
        ParamSpec {
            nullable: true,
            null_as_undefined: true,
            ..ParamSpec::of(ty)
        }
    }

    pub fn array_of(element: ElementSpec) -> Self {
        ParamSpec {
            element: Some(element),
            ..ParamSpec::of(ValueTag::Arr)
        }
    }

    /// Parse the 4-byte wire form: type, flags, element type, element flags.
    pub fn read(view: &MemoryView, offset: u32) -> Result<ParamSpec, InteropError> {
        let raw_ty = view.u8(offset);
        let ty = ValueTag::from_u8(raw_ty).ok_or(InteropError::UnknownTag(raw_ty))?;
        let flags = view.u8(offset + 1);
        let element = if ty == ValueTag::Arr {
            let raw_elem = view.u8(offset + 2);
            let elem_ty = ValueTag::from_u8(raw_elem).ok_or(InteropError::UnknownTag(raw_elem))?;
            match elem_ty {
                ValueTag::Void => {
                    return Err(InteropError::Signature(
                        "array type without an element type".into(),
                    ))
                }
                ValueTag::Arr => {
                    return Err(InteropError::Signature(
                        "arrays of arrays are not supported".into(),
                    ))
                }
                _ => {}
            }
            Some(ElementSpec {
                ty: elem_ty,
                nullable: view.u8(offset + 3) & FLAG_NULLABLE != 0,
            })
        } else {
            None
        };
        Ok(ParamSpec {
            ty,
            nullable: flags & FLAG_NULLABLE != 0,
            null_as_undefined: flags & FLAG_NULL_AS_UNDEFINED != 0,
            element,
        })
    }

    /// Write the 4-byte wire form.
    pub fn write(&self, view: &MemoryView, offset: u32) {
        view.set_u8(offset, self.ty as u8);
        let mut flags = 0u8;
        if self.nullable {
            flags |= FLAG_NULLABLE;
        }
        if self.null_as_undefined {
            flags |= FLAG_NULL_AS_UNDEFINED;
        }
        view.set_u8(offset + 1, flags);
        let (elem_ty, elem_flags) = match self.element {
            Some(e) => (e.ty as u8, e.nullable as u8),
            None => (0, 0),
        };
        view.set_u8(offset + 2, elem_ty);
        view.set_u8(offset + 3, elem_flags);
    }
}

/// Return and parameter descriptors of one bound import.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub returns: ParamSpec,
    pub params: SmallVec<[ParamSpec; MAX_PARAMS]>,
}

impl FunctionSpec {
    /// Build a signature, rejecting more than [`MAX_PARAMS`] parameters
    /// and Void-typed parameters (Void is the wire terminator).
    pub fn new(returns: ParamSpec, params: &[ParamSpec]) -> Result<Self, InteropError> {
        if params.len() > MAX_PARAMS {
            return Err(InteropError::Signature(format!(
                "{} parameters exceeds the maximum of {MAX_PARAMS}",
                params.len()
            )));
        }
        if let Some(i) = params.iter().position(|p| p.ty == ValueTag::Void) {
            return Err(InteropError::Signature(format!(
                "parameter {i} has void type"
            )));
        }
        Ok(FunctionSpec {
            returns,
            params: SmallVec::from_slice(params),
        })
    }

    /// Parse the wire form written by the guest at bind time: the return
    /// entry, then parameter entries until a Void-typed entry or the
    /// arity ceiling.
    pub fn read(view: &MemoryView, ptr: u32) -> Result<FunctionSpec, InteropError> {
        let returns = ParamSpec::read(view, ptr)?;
        let mut params: SmallVec<[ParamSpec; MAX_PARAMS]> = SmallVec::new();
        for i in 0..MAX_PARAMS {
            let offset = ptr + 4 * (i as u32 + 1);
            if view.u8(offset) == ValueTag::Void as u8 {
                break;
            }
            params.push(ParamSpec::read(view, offset)?);
        }
        Ok(FunctionSpec { returns, params })
    }

    /// Write the wire form, including the Void terminator when fewer than
    /// [`MAX_PARAMS`] parameters are present.
    pub fn write(&self, view: &MemoryView, ptr: u32) {
        self.returns.write(view, ptr);
        for (i, param) in self.params.iter().enumerate() {
            param.write(view, ptr + 4 * (i as u32 + 1));
        }
        if self.params.len() < MAX_PARAMS {
            let end = ptr + 4 * (self.params.len() as u32 + 1);
            view.set_u32(end, 0);
        }
    }
}
