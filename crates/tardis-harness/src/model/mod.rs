//! Model-based testing infrastructure.
//!
//! A naive reference archive plus the operation vocabulary shared by the
//! model-based proptests and the fuzz targets.

mod archive;
mod operation;

pub use archive::{ModelArchive, ObservableState};
pub use operation::{
    CallerId, IdTarget, KeyLength, Operation, OperationResult, SmallMessage, after_ts,
    caller_address, release_at,
};
