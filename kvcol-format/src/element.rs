use bitcode::{Decode, Encode};

/// Physical type of the elements stored in a column's pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub enum ElementKind {
    /// One byte per boolean; bit packing is left to the caller.
    Bit,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// 32-bit offsets into a child column.
    Index32,
    Index64,
}

impl ElementKind {
    /// Bytes per element on an unsealed page.
    pub const fn size(self) -> usize {
        match self {
            ElementKind::Bit | ElementKind::U8 | ElementKind::I8 => 1,
            ElementKind::U16 | ElementKind::I16 => 2,
            ElementKind::U32 | ElementKind::I32 | ElementKind::F32 | ElementKind::Index32 => 4,
            ElementKind::U64 | ElementKind::I64 | ElementKind::F64 | ElementKind::Index64 => 8,
        }
    }
}
