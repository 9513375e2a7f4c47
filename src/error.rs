use thiserror::Error;

use crate::buffer::BufferHandle;
use crate::group::GroupId;
use crate::mesh::MeshAssetId;
use crate::object::ObjectKey;

/// Errors surfaced by the registration and asset APIs.
///
/// Nothing on the rebuild path returns these: anomalies found while rebuilding are
/// repaired on the spot and only logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdfError {
    #[error("object {0:?} does not exist")]
    UnknownObject(ObjectKey),
    #[error("object {object:?} is already registered in group {owner:?}")]
    OwnedByOtherGroup { object: ObjectKey, owner: GroupId },
    #[error("mesh asset {id:?} expects {expected} samples for a {size}^3 grid, got {actual}")]
    SampleCountMismatch {
        id: MeshAssetId,
        size: u32,
        expected: usize,
        actual: usize,
    },
    #[error("mesh asset {id:?} has {uvs} packed uvs for {samples} samples")]
    UvCountMismatch {
        id: MeshAssetId,
        samples: usize,
        uvs: usize,
    },
    #[error("mesh asset {0:?} has inverted or empty bounds")]
    DegenerateBounds(MeshAssetId),
    #[error("mesh asset {id:?} needs at least 2 samples per axis, got {size}")]
    GridTooSmall { id: MeshAssetId, size: u32 },
}

/// Errors reported by a [`crate::buffer::GpuBackend`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("buffer {0:?} was released or never created")]
    InvalidHandle(BufferHandle),
    #[error("write of {len} bytes exceeds buffer {handle:?} capacity of {capacity} bytes")]
    Overflow {
        handle: BufferHandle,
        len: usize,
        capacity: usize,
    },
}

pub type BufferResult<T> = Result<T, BufferError>;
