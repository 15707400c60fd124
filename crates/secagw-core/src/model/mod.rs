//! Gateway data model

pub mod binding;
pub mod operation;
pub mod payload;
pub mod reference;
pub mod view;
pub mod workspace;

pub use binding::{BindingStatus, ResourceBinding, ResourceKind};
pub use operation::{OperationPhase, OperationRecord};
pub use payload::*;
pub use reference::{ResourceRef, name_in_collection};
pub use view::{ResourceMetadata, ResourceStatus, ResourceView};
pub use workspace::{
    Workspace, WorkspaceCredential, WorkspaceSpec, WorkspaceState, WorkspaceStatus,
};
