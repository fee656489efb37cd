//! Edit pipeline
//!
//! A [`Pipeline`] bakes a working copy of a mesh into base space, hands it to
//! an ordered list of edit stages, then unbakes the result. Stages are plain
//! data types tagged with [`EditStage::TAG`]; the [`StageRegistry`] maps each
//! tag to a factory producing the [`StageProcessor`] that runs it.
//!
//! ```ignore
//! let mut registry = StageRegistry::new();
//! registry.register::<Inflate, _, _>(|| InflateProcessor);
//! let mut pipeline = registry.create_pipeline(vec![Box::new(Inflate { amount: 0.1 })])?;
//! let deformed = pipeline.process(&mesh, &pose)?.into_mesh();
//! ```

mod context;

#[cfg(test)]
mod tests;

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use hashbrown::HashMap;
use smallvec::SmallVec;

pub use context::EditContext;

use crate::bake::{MeshBakeProcessor, UnbakeStats};
use crate::config::BakeConfig;
use crate::editable::EditableMesh;
use crate::error::{BakeError, PipelineError};
use crate::mesh::{BlendShapeDeltas, BlendShapeFrame};
use crate::skin::{Assumptions, SkinPose};

// ============================================================================
// Stages
// ============================================================================

/// Data describing one edit applied to a baked mesh
pub trait EditStage: Any + Send + Sync {
    /// Stable tag the registry resolves processors by
    const TAG: &'static str;
}

/// Object-safe view of an [`EditStage`]
pub trait AnyStage: Any + Send + Sync {
    fn tag(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

impl<S: EditStage> AnyStage for S {
    fn tag(&self) -> &'static str {
        S::TAG
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Runs stages of type `S` against the baked mesh.
///
/// Implemented for every `FnMut(&S, &mut EditContext) -> Result<(), PipelineError>`.
pub trait StageProcessor<S: EditStage>: Send {
    fn process(&mut self, stage: &S, ctx: &mut EditContext<'_>) -> Result<(), PipelineError>;
}

impl<S, F> StageProcessor<S> for F
where
    S: EditStage,
    F: FnMut(&S, &mut EditContext<'_>) -> Result<(), PipelineError> + Send,
{
    fn process(&mut self, stage: &S, ctx: &mut EditContext<'_>) -> Result<(), PipelineError> {
        self(stage, ctx)
    }
}

trait ErasedProcessor: Send {
    fn process(&mut self, stage: &dyn AnyStage, ctx: &mut EditContext<'_>) -> Result<(), PipelineError>;
}

struct TypedProcessor<S, P> {
    processor: P,
    _stage: PhantomData<fn(&S)>,
}

impl<S: EditStage, P: StageProcessor<S>> ErasedProcessor for TypedProcessor<S, P> {
    fn process(&mut self, stage: &dyn AnyStage, ctx: &mut EditContext<'_>) -> Result<(), PipelineError> {
        let stage = stage
            .as_any()
            .downcast_ref::<S>()
            .ok_or_else(|| PipelineError::stage(S::TAG, "stage type does not match the type registered for its tag"))?;
        self.processor.process(stage, ctx)
    }
}

/// Identifies one stage instance within its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(u64);

impl StageId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Registry
// ============================================================================

type ProcessorFactory = Box<dyn Fn() -> Box<dyn ErasedProcessor> + Send + Sync>;

/// Maps stage tags to processor factories
#[derive(Default)]
pub struct StageRegistry {
    factories: HashMap<&'static str, ProcessorFactory>,
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.factories.keys().collect();
        tags.sort_unstable();
        f.debug_struct("StageRegistry").field("tags", &tags).finish()
    }
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the processor factory for stages of type `S`.
    ///
    /// A later registration for the same tag replaces the earlier one.
    pub fn register<S, P, F>(&mut self, factory: F) -> &mut Self
    where
        S: EditStage,
        P: StageProcessor<S> + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        let create: ProcessorFactory = Box::new(move || -> Box<dyn ErasedProcessor> {
            Box::new(TypedProcessor::<S, P> {
                processor: factory(),
                _stage: PhantomData,
            })
        });
        let replaced = self.factories.insert(S::TAG, create).is_some();
        if replaced {
            tracing::warn!(tag = S::TAG, "stage processor registered twice, keeping the latest");
        }
        self
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Build a pipeline running `stages` in order with a default processor.
    pub fn create_pipeline(&self, stages: Vec<Box<dyn AnyStage>>) -> Result<Pipeline, PipelineError> {
        self.create_pipeline_with(stages, MeshBakeProcessor::new(&BakeConfig::default()))
    }

    /// Build a pipeline around an existing processor.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnregisteredStage`] for the first stage whose tag has
    /// no factory.
    pub fn create_pipeline_with(
        &self,
        stages: Vec<Box<dyn AnyStage>>,
        processor: MeshBakeProcessor,
    ) -> Result<Pipeline, PipelineError> {
        let entries = stages
            .into_iter()
            .zip(0u64..)
            .map(|(stage, id)| {
                let tag = stage.tag();
                let factory = self
                    .factories
                    .get(tag)
                    .ok_or(PipelineError::UnregisteredStage { tag })?;
                Ok(PipelineEntry {
                    id: StageId(id),
                    stage,
                    processor: factory(),
                })
            })
            .collect::<Result<_, PipelineError>>()?;

        Ok(Pipeline { entries, processor })
    }
}

// ============================================================================
// Pipeline
// ============================================================================

struct PipelineEntry {
    id: StageId,
    stage: Box<dyn AnyStage>,
    processor: Box<dyn ErasedProcessor>,
}

/// Ordered edit stages sharing one bake processor
pub struct Pipeline {
    entries: SmallVec<[PipelineEntry; 4]>,
    processor: MeshBakeProcessor,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages().collect::<Vec<_>>())
            .field("processor", &self.processor)
            .finish()
    }
}

impl Pipeline {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stage ids and tags in run order
    pub fn stages(&self) -> impl Iterator<Item = (StageId, &'static str)> + '_ {
        self.entries.iter().map(|entry| (entry.id, entry.stage.tag()))
    }

    /// The stage instance behind `id`, if it is an `S`
    pub fn stage<S: EditStage>(&self, id: StageId) -> Option<&S> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .and_then(|entry| entry.stage.as_any().downcast_ref::<S>())
    }

    pub fn processor(&self) -> &MeshBakeProcessor {
        &self.processor
    }

    /// Bake a copy of `source`, run every stage on it and unbake the result.
    ///
    /// When no stage overrode the bones, the unbake reuses the bake's skin
    /// matrices.
    pub fn process(&mut self, source: &EditableMesh, pose: &SkinPose<'_>) -> Result<ProcessResult, PipelineError> {
        let mut mesh = EditableMesh::default();
        let stats = self.process_into(source, pose, &mut mesh)?;
        Ok(ProcessResult { mesh, stats })
    }

    /// Same as [`Pipeline::process`], writing the deformed mesh into `target`.
    ///
    /// `target` keeps its allocations between calls. Its contents are
    /// unspecified when an error is returned.
    pub fn process_into(
        &mut self,
        source: &EditableMesh,
        pose: &SkinPose<'_>,
        target: &mut EditableMesh,
    ) -> Result<UnbakeStats, PipelineError> {
        source.validate()?;
        target.copy_from(source);
        self.processor.bake(target, pose)?;

        let bone_override = {
            let mut ctx = EditContext::new(target, pose);
            for entry in &mut self.entries {
                let tag = entry.stage.tag();
                tracing::trace!(stage = tag, id = %entry.id, "running edit stage");
                entry.processor.process(entry.stage.as_ref(), &mut ctx)?;
            }
            ctx.into_bone_override()
        };

        let stats = match &bone_override {
            Some(bones) => {
                let moved = SkinPose {
                    bones: Some(bones.as_slice()),
                    ..*pose
                };
                self.processor.unbake(target, &moved, Assumptions::default())?
            }
            None => self.processor.unbake(
                target,
                pose,
                Assumptions {
                    bone_matrices_unchanged: true,
                },
            )?,
        };

        tracing::debug!(
            stages = self.entries.len(),
            rederived = stats.rederived_vertices,
            bones_changed = bone_override.is_some(),
            "pipeline processed mesh"
        );
        Ok(stats)
    }
}

// ============================================================================
// Result
// ============================================================================

/// Deformed mesh produced by [`Pipeline::process`]
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    mesh: EditableMesh,
    stats: UnbakeStats,
}

impl ProcessResult {
    pub fn mesh(&self) -> &EditableMesh {
        &self.mesh
    }

    pub fn stats(&self) -> &UnbakeStats {
        &self.stats
    }

    pub fn into_mesh(self) -> EditableMesh {
        self.mesh
    }

    /// Express the deformation as a blend-shape frame relative to `source`.
    ///
    /// Normal and tangent deltas are produced only when both meshes carry
    /// the attribute.
    pub fn into_blend_shape_frame(self, source: &EditableMesh, weight: f32) -> Result<BlendShapeFrame, BakeError> {
        let vertex_count = source.positions.len();
        if self.mesh.positions.len() != vertex_count {
            return Err(BakeError::VertexCountMismatch {
                what: "processed mesh",
                expected: vertex_count,
                actual: self.mesh.positions.len(),
            });
        }

        let positions = self
            .mesh
            .positions
            .iter()
            .zip(&source.positions)
            .map(|(deformed, base)| *deformed - *base)
            .collect();
        let normals = match (&self.mesh.normals, &source.normals) {
            (Some(deformed), Some(base)) => Some(deformed.iter().zip(base).map(|(d, b)| *d - *b).collect()),
            _ => None,
        };
        let tangents = match (&self.mesh.tangents, &source.tangents) {
            (Some(deformed), Some(base)) => Some(
                deformed
                    .iter()
                    .zip(base)
                    .map(|(d, b)| (*d - *b).truncate())
                    .collect(),
            ),
            _ => None,
        };

        Ok(BlendShapeFrame {
            weight,
            deltas: BlendShapeDeltas {
                positions,
                normals,
                tangents,
            },
        })
    }
}
