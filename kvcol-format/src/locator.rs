use bitcode::{Decode, Encode};

/// Where a sealed page (or a page list) lives.
///
/// `position` is the write-assigned sequence number the object-store key is
/// derived from; it is not a byte offset. `bytes_on_storage` is the sealed
/// size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Encode, Decode)]
pub struct PageLocator {
    pub position: u64,
    pub bytes_on_storage: u32,
}

impl PageLocator {
    pub const fn new(position: u64, bytes_on_storage: u32) -> Self {
        Self {
            position,
            bytes_on_storage,
        }
    }
}
