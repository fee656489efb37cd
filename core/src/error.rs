//! Bake, unbake and pipeline errors

use skinbake_codec::CodecError;

/// Failure of a bake or unbake pass.
///
/// Raised before any attribute of the mesh is committed, so a failed pass
/// leaves the mesh as it was.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BakeError {
    /// Bone count is neither the bind-pose count nor collapsible to the static fallback
    #[error("bone/bindpose count mismatch: {bones} bones, {bind_poses} bind poses")]
    BoneCountMismatch { bones: usize, bind_poses: usize },

    /// A vertex influence references a bone past the end of the skin matrix set
    #[error("vertex {vertex} references bone {bone}, but only {bone_count} skin matrices exist")]
    BoneIndexOutOfRange {
        vertex: usize,
        bone: u32,
        bone_count: usize,
    },

    /// A per-vertex array does not have one entry per vertex
    #[error("{what} has {actual} entries, expected {expected}")]
    VertexCountMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Matrix inversion or transform produced NaN/Inf
    #[error("non-finite {what} at vertex {vertex}")]
    NonFinite { what: &'static str, vertex: usize },

    /// Unbake called without a matching bake on this processor
    #[error("unbake requires a preceding bake on the same processor")]
    MissingReference,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl BakeError {
    /// Skeleton or mesh shape does not fit together
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::BoneCountMismatch { .. }
                | Self::BoneIndexOutOfRange { .. }
                | Self::VertexCountMismatch { .. }
        )
    }

    /// Degenerate skin transform
    pub fn is_numerical(&self) -> bool {
        matches!(self, Self::NonFinite { .. })
    }
}

/// Failure while building or running an edit pipeline
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("no processor registered for stage '{tag}'")]
    UnregisteredStage { tag: &'static str },

    #[error(transparent)]
    Bake(#[from] BakeError),

    #[error("stage '{stage}' failed: {message}")]
    Stage { stage: &'static str, message: String },
}

impl PipelineError {
    /// Convenience for stage implementations
    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            message: message.into(),
        }
    }
}
