//! Skinbake Core - skinned mesh bake/unbake and edit pipeline
//!
//! Edits on a skinned, blend-shaped mesh are easiest to author in the space
//! the mesh is displayed in. This crate moves a mesh into that flattened base
//! space, lets edit stages work on it directly, then maps the result back so
//! it can be skinned again.
//!
//! # Architecture
//!
//! - [`SkinMatrixSet`] - Per-bone `world_to_base * bone * bind_pose` matrices
//! - [`BlendShapeAccumulator`] - Weighted blend-shape delta sum, backed by a shared [`TickCache`]
//! - [`MeshBakeProcessor`] - Bake into base space, unbake back with change detection
//! - [`EditableMesh`] - Owned mesh implementing [`MeshBuffers`], with codec round trips
//! - [`Pipeline`] - Bake, run registered [`EditStage`]s, unbake
//! - [`BakeConfig`] - TOML configuration for parallelism and cache expiry

pub mod bake;
pub mod blend_shape;
pub mod cache;
pub mod config;
pub mod editable;
pub mod error;
pub mod fixtures;
pub mod mesh;
pub mod parallel;
pub mod pipeline;
pub mod skin;

pub use bake::{AttributeSnapshot, MeshBakeProcessor, ReferenceSnapshot, UnbakeStats};
pub use blend_shape::{
    AccumulatedDelta, BlendShapeAccumulator, BlendShapeKey, SharedBlendShapeCache, shared_cache,
};
pub use cache::TickCache;
pub use config::{BakeConfig, BlendShapeCacheConfig, ConfigError, ProcessingConfig};
pub use editable::{EditableMesh, MeshSkin};
pub use error::{BakeError, PipelineError};
pub use mesh::{
    BlendShape, BlendShapeDeltas, BlendShapeFrame, BoneInfluences, BoneWeight, MeshBuffers,
    SkinBindings, VertexStreams,
};
pub use parallel::ParallelPolicy;
pub use pipeline::{
    AnyStage, EditContext, EditStage, Pipeline, ProcessResult, StageId, StageProcessor,
    StageRegistry,
};
pub use skin::{Assumptions, SkinMatrixSet, SkinPose};

// Vertex codec, re-exported for packed mesh I/O
pub use skinbake_codec as codec;
