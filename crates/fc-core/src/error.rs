//! Error taxonomy for the flow engine.
//!
//! Only graph-integrity failures surface as `Err`. Requests that race
//! initialization or ask for a menu that does not exist are absorbed by the
//! caller and never constructed as errors.

use crate::id::Guid;
use crate::model::Port;
use thiserror::Error;

/// Fatal graph-integrity failures. Any of these implies an earlier bug in
/// graph mutation; the engine does not attempt partial recovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("element '{0}' not found in the flow")]
    NotFound(Guid),

    #[error("element '{0}' is not reachable from the root")]
    Unreachable(Guid),

    #[error("element '{guid}' has no branch slot {index} (it declares {slots})")]
    SlotOutOfRange { guid: Guid, index: usize, slots: usize },

    #[error("port {port:?} of element '{guid}' is already connected")]
    PortOccupied { guid: Guid, port: Port },

    #[error("element '{child}' already has structural parent '{parent}'")]
    DuplicateParent { child: Guid, parent: Guid },

    #[error("structural edges form a cycle through '{0}'")]
    StructuralCycle(Guid),

    #[error("element '{0}' already exists")]
    DuplicateGuid(Guid),

    #[error("reference from '{from}' to unknown element '{to}'")]
    DanglingReference { from: Guid, to: Guid },

    #[error("the root must hold exactly one start element")]
    InvalidRoot,

    #[error("edit rejected on '{guid}': {reason}")]
    InvalidEdit { guid: Guid, reason: &'static str },

    #[error("failed to read flow document: {0}")]
    Document(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
