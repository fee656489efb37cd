//! Bake/unbake vertex processor
//!
//! [`MeshBakeProcessor::bake`] moves positions, normals and tangents from the
//! mesh's rest space into the flattened base space by applying blend-shape
//! deltas and the weighted skin transform. [`MeshBakeProcessor::unbake`]
//! reverses it, restoring every attribute the edit stages left untouched
//! straight from the snapshot taken during bake.
//!
//! A processor keeps its skin matrices, accumulated deltas and scratch
//! buffers between calls so a stable vertex count never reallocates. Bake and
//! unbake are paired: each unbake consumes the snapshot of the preceding bake.

mod kernel;
mod reference;


use glam::{Vec3, Vec4};

pub use reference::{AttributeSnapshot, ReferenceSnapshot};

use crate::blend_shape::{AccumulatedDelta, BlendShapeAccumulator, SharedBlendShapeCache, shared_cache};
use crate::config::BakeConfig;
use crate::error::BakeError;
use crate::mesh::{BoneInfluences, MeshBuffers, VertexStreams};
use crate::parallel::ParallelPolicy;
use crate::skin::{Assumptions, SkinMatrixSet, SkinPose};
use kernel::{KernelInputs, VertexState};

/// Per-attribute outcome of an unbake pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnbakeStats {
    pub vertex_count: usize,
    /// Vertices that went through the inverse skin transform
    pub rederived_vertices: usize,
    pub changed_positions: usize,
    pub changed_normals: usize,
    pub changed_tangents: usize,
}

/// Bakes meshes into base space and unbakes them back.
///
/// Only position, normal and tangent are touched; UVs, colors, bind poses and
/// bone weights are left to the caller.
#[derive(Debug)]
pub struct MeshBakeProcessor {
    policy: ParallelPolicy,
    skin: SkinMatrixSet,
    blend_shapes: BlendShapeAccumulator,
    cache: SharedBlendShapeCache,
    /// Snapshot buffers, kept across passes; meaningful only while `has_reference`
    reference: ReferenceSnapshot,
    has_reference: bool,
    scratch: Vec<VertexState>,
}

impl Default for MeshBakeProcessor {
    fn default() -> Self {
        Self::new(&BakeConfig::default())
    }
}

impl MeshBakeProcessor {
    pub fn new(config: &BakeConfig) -> Self {
        Self::with_cache(config, shared_cache(&config.blend_shape_cache))
    }

    /// Processor drawing blend-shape frames from a cache shared with others
    /// working on the same source mesh.
    pub fn with_cache(config: &BakeConfig, cache: SharedBlendShapeCache) -> Self {
        let policy = config.processing.policy();
        Self {
            policy,
            skin: SkinMatrixSet::new(),
            blend_shapes: BlendShapeAccumulator::new(policy),
            cache,
            reference: ReferenceSnapshot::default(),
            has_reference: false,
            scratch: Vec::new(),
        }
    }

    pub fn cache(&self) -> &SharedBlendShapeCache {
        &self.cache
    }

    pub fn skin_matrices(&self) -> &SkinMatrixSet {
        &self.skin
    }

    pub fn accumulated_delta(&self) -> &AccumulatedDelta {
        self.blend_shapes.delta()
    }

    pub fn reference(&self) -> Option<&ReferenceSnapshot> {
        self.has_reference.then_some(&self.reference)
    }

    /// Deform `mesh` into base space and record the snapshot for the next unbake.
    pub fn bake<M: MeshBuffers + ?Sized>(
        &mut self,
        mesh: &mut M,
        pose: &SkinPose<'_>,
    ) -> Result<(), BakeError> {
        let result = self.bake_inner(mesh, pose);
        self.tick();
        result
    }

    /// Reverse the preceding bake.
    ///
    /// # Errors
    ///
    /// [`BakeError::MissingReference`] without a preceding bake, a
    /// configuration error when the mesh or skeleton no longer fits, and
    /// [`BakeError::NonFinite`] when a changed vertex's skin matrix cannot be
    /// inverted. The mesh is untouched on error.
    pub fn unbake<M: MeshBuffers + ?Sized>(
        &mut self,
        mesh: &mut M,
        pose: &SkinPose<'_>,
        assumptions: Assumptions,
    ) -> Result<UnbakeStats, BakeError> {
        let result = self.unbake_inner(mesh, pose, assumptions);
        self.tick();
        result
    }

    fn bake_inner<M: MeshBuffers + ?Sized>(
        &mut self,
        mesh: &mut M,
        pose: &SkinPose<'_>,
    ) -> Result<(), BakeError> {
        let vertex_count = mesh.vertex_count();
        self.has_reference = false;
        self.skin.resolve(mesh.bind_poses(), pose)?;
        self.blend_shapes
            .update(&*mesh, pose.blend_shape_weights, &self.cache)?;

        let (mut streams, bindings) = mesh.buffers_mut();
        check_streams(&streams, bindings.influences, vertex_count)?;
        check_bone_indices(bindings.influences, &self.skin)?;

        self.reference.unbaked.refill(&streams);
        let inputs = KernelInputs {
            positions: &*streams.positions,
            normals: streams.normals.as_deref(),
            tangents: streams.tangents.as_deref(),
            influences: bindings.influences,
            matrices: self.skin.matrices(),
            delta: self.blend_shapes.delta(),
        };

        self.scratch.clear();
        self.scratch.resize(vertex_count, VertexState::default());
        self.policy
            .try_for_each_indexed(&mut self.scratch, |i, out| {
                *out = inputs.bake_vertex(i)?;
                Ok::<(), BakeError>(())
            })?;

        commit(&mut streams, &self.scratch);
        self.reference.baked.refill(&streams);
        self.has_reference = true;

        tracing::debug!(
            vertex_count,
            skin_matrices = self.skin.len(),
            "baked mesh to base space"
        );
        Ok(())
    }

    fn unbake_inner<M: MeshBuffers + ?Sized>(
        &mut self,
        mesh: &mut M,
        pose: &SkinPose<'_>,
        assumptions: Assumptions,
    ) -> Result<UnbakeStats, BakeError> {
        if !std::mem::take(&mut self.has_reference) {
            return Err(BakeError::MissingReference);
        }
        let reference = &self.reference;
        let vertex_count = mesh.vertex_count();
        if reference.baked.vertex_count() != vertex_count {
            return Err(BakeError::VertexCountMismatch {
                what: "mesh since bake",
                expected: reference.baked.vertex_count(),
                actual: vertex_count,
            });
        }

        self.skin.resolve_with(mesh.bind_poses(), pose, assumptions)?;
        self.blend_shapes
            .update(&*mesh, pose.blend_shape_weights, &self.cache)?;

        let (mut streams, bindings) = mesh.buffers_mut();
        check_streams(&streams, bindings.influences, vertex_count)?;
        check_bone_indices(bindings.influences, &self.skin)?;

        let inputs = KernelInputs {
            positions: &*streams.positions,
            normals: streams.normals.as_deref(),
            tangents: streams.tangents.as_deref(),
            influences: bindings.influences,
            matrices: self.skin.matrices(),
            delta: self.blend_shapes.delta(),
        };

        self.scratch.clear();
        self.scratch.resize(vertex_count, VertexState::default());
        self.policy
            .try_for_each_indexed(&mut self.scratch, |i, out| {
                *out = inputs.unbake_vertex(reference, i)?;
                Ok::<(), BakeError>(())
            })?;

        let stats = unbake_stats(&streams, reference, &self.scratch);
        commit(&mut streams, &self.scratch);

        tracing::debug!(
            vertex_count,
            rederived = stats.rederived_vertices,
            positions = stats.changed_positions,
            normals = stats.changed_normals,
            tangents = stats.changed_tangents,
            "unbaked mesh from base space"
        );
        Ok(stats)
    }

    fn tick(&self) {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        cache.tick();
    }
}

fn check_streams(
    streams: &VertexStreams<'_>,
    influences: &BoneInfluences,
    vertex_count: usize,
) -> Result<(), BakeError> {
    let check = |what: &'static str, actual: usize| {
        if actual == vertex_count {
            Ok(())
        } else {
            Err(BakeError::VertexCountMismatch {
                what,
                expected: vertex_count,
                actual,
            })
        }
    };
    check("positions", streams.positions.len())?;
    if let Some(normals) = streams.normals.as_deref() {
        check("normals", normals.len())?;
    }
    if let Some(tangents) = streams.tangents.as_deref() {
        check("tangents", tangents.len())?;
    }
    if let Some(count) = influences.vertex_count() {
        check("bone influences", count)?;
    }
    Ok(())
}

/// Every positively weighted bone must have a skin matrix, unless a single
/// matrix applies to the whole mesh.
fn check_bone_indices(influences: &BoneInfluences, skin: &SkinMatrixSet) -> Result<(), BakeError> {
    if skin.is_static() {
        return Ok(());
    }
    match influences.max_bone_index() {
        Some((vertex, bone)) if bone as usize >= skin.len() => Err(BakeError::BoneIndexOutOfRange {
            vertex,
            bone,
            bone_count: skin.len(),
        }),
        _ => Ok(()),
    }
}

fn commit(streams: &mut VertexStreams<'_>, results: &[VertexState]) {
    for (position, state) in streams.positions.iter_mut().zip(results) {
        *position = state.position;
    }
    if let Some(normals) = streams.normals.as_deref_mut() {
        for (normal, state) in normals.iter_mut().zip(results) {
            *normal = state.normal;
        }
    }
    if let Some(tangents) = streams.tangents.as_deref_mut() {
        for (tangent, state) in tangents.iter_mut().zip(results) {
            *tangent = state.tangent;
        }
    }
}

fn unbake_stats(
    streams: &VertexStreams<'_>,
    reference: &ReferenceSnapshot,
    results: &[VertexState],
) -> UnbakeStats {
    fn changed<T: Copy>(current: Option<&[T]>, baked: Option<&[T]>, same: fn(T, T) -> bool) -> usize {
        match (current, baked) {
            (Some(current), Some(baked)) => current
                .iter()
                .zip(baked)
                .filter(|&(&a, &b)| !same(a, b))
                .count(),
            (Some(current), None) => current.len(),
            (None, _) => 0,
        }
    }

    UnbakeStats {
        vertex_count: results.len(),
        rederived_vertices: results.iter().filter(|state| state.rederived).count(),
        changed_positions: changed::<Vec3>(
            Some(&*streams.positions),
            Some(&reference.baked.positions),
            reference::same_bits3,
        ),
        changed_normals: changed::<Vec3>(
            streams.normals.as_deref(),
            reference.baked.normals.as_deref(),
            reference::same_bits3,
        ),
        changed_tangents: changed::<Vec4>(
            streams.tangents.as_deref(),
            reference.baked.tangents.as_deref(),
            reference::same_bits4,
        ),
    }
}
