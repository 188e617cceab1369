use kvcol_format::{ColumnId, ElementKind};

/// A column as seen by a sink or source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColumnHandle {
    pub id: ColumnId,
    pub kind: ElementKind,
}
