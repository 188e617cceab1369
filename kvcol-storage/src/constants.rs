/// Longest object class name accepted by the store, in bytes.
pub const OBJECT_CLASS_NAME_MAX_LEN: usize = 64;

// Error codes reported by the in-memory store, mirroring the negative
// return codes of the remote store API.

/// The addressed key does not exist.
pub const ERR_NONEXIST: i32 = -1005;

/// The stored value does not fit into the supplied buffer.
pub const ERR_REC2BIG: i32 = -1011;

/// Generic I/O failure.
pub const ERR_IO: i32 = -2001;
