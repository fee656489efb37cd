//! Mesh buffer access
//!
//! [`MeshBuffers`] is what the bake processor consumes: vertex attribute
//! arrays, per-vertex bone influences, bind poses and blend-shape frame
//! deltas. [`crate::EditableMesh`] is the in-memory implementation.

use glam::{Mat4, Vec3, Vec4};

use crate::error::BakeError;

// ============================================================================
// Bone Influences
// ============================================================================

/// One (bone, weight) pair of a vertex
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoneWeight {
    pub bone: u32,
    pub weight: f32,
}

impl BoneWeight {
    pub const fn new(bone: u32, weight: f32) -> Self {
        Self { bone, weight }
    }
}

/// Variable-length bone influence lists for every vertex (CSR layout)
///
/// An empty table (no offsets) marks an unskinned mesh; every vertex then
/// uses the first skin matrix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoneInfluences {
    /// `offsets[v]..offsets[v + 1]` indexes `weights` for vertex `v`
    offsets: Vec<u32>,
    weights: Vec<BoneWeight>,
}

impl BoneInfluences {
    /// Table for a mesh with no skinning data
    pub fn unskinned() -> Self {
        Self::default()
    }

    /// Build from one influence list per vertex
    pub fn from_per_vertex<L: AsRef<[BoneWeight]>>(lists: &[L]) -> Self {
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        let mut weights = Vec::new();
        offsets.push(0);
        for list in lists {
            weights.extend_from_slice(list.as_ref());
            offsets.push(weights.len() as u32);
        }
        Self { offsets, weights }
    }

    /// Build from a bones-per-vertex count array plus the flattened weights
    pub fn from_flat(bones_per_vertex: &[u8], weights: Vec<BoneWeight>) -> Result<Self, BakeError> {
        let total: usize = bones_per_vertex.iter().map(|&n| n as usize).sum();
        if total != weights.len() {
            return Err(BakeError::VertexCountMismatch {
                what: "flattened bone weights",
                expected: total,
                actual: weights.len(),
            });
        }

        let mut offsets = Vec::with_capacity(bones_per_vertex.len() + 1);
        let mut running = 0u32;
        offsets.push(running);
        for &count in bones_per_vertex {
            running += count as u32;
            offsets.push(running);
        }
        Ok(Self { offsets, weights })
    }

    pub fn is_unskinned(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Number of vertices described, `None` for an unskinned table
    pub fn vertex_count(&self) -> Option<usize> {
        (!self.is_unskinned()).then(|| self.offsets.len() - 1)
    }

    /// Influences of `vertex`; empty for unskinned tables and out-of-range vertices
    #[inline]
    pub fn for_vertex(&self, vertex: usize) -> &[BoneWeight] {
        match (self.offsets.get(vertex), self.offsets.get(vertex + 1)) {
            (Some(&start), Some(&end)) => &self.weights[start as usize..end as usize],
            _ => &[],
        }
    }

    /// Highest bone index with a positive weight, with the vertex that uses it
    pub fn max_bone_index(&self) -> Option<(usize, u32)> {
        let vertex_count = self.vertex_count()?;
        (0..vertex_count)
            .flat_map(|v| {
                self.for_vertex(v)
                    .iter()
                    .filter(|w| w.weight > 0.0)
                    .map(move |w| (v, w.bone))
            })
            .max_by_key(|&(_, bone)| bone)
    }
}

// ============================================================================
// Blend Shapes
// ============================================================================

/// Per-vertex deltas of one blend-shape frame, relative to the unskinned base mesh
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlendShapeDeltas {
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    /// Tangent direction deltas (xyz only)
    pub tangents: Option<Vec<Vec3>>,
}

impl BlendShapeDeltas {
    pub fn zeroed(vertex_count: usize) -> Self {
        Self {
            positions: vec![Vec3::ZERO; vertex_count],
            normals: None,
            tangents: None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// One frame of a blend-shape channel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlendShapeFrame {
    /// Channel weight (0..=100) at which this frame is fully applied
    pub weight: f32,
    pub deltas: BlendShapeDeltas,
}

/// A named blend-shape channel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlendShape {
    pub name: String,
    pub frames: Vec<BlendShapeFrame>,
}

// ============================================================================
// Buffer Access
// ============================================================================

/// Mutable vertex attribute arrays of a mesh
#[derive(Debug)]
pub struct VertexStreams<'a> {
    pub positions: &'a mut [Vec3],
    pub normals: Option<&'a mut [Vec3]>,
    pub tangents: Option<&'a mut [Vec4]>,
}

/// Read-only skinning data borrowed alongside [`VertexStreams`]
#[derive(Debug, Clone, Copy)]
pub struct SkinBindings<'a> {
    pub influences: &'a BoneInfluences,
    pub bind_poses: &'a [Mat4],
}

/// Mesh data consumed by [`crate::MeshBakeProcessor`]
///
/// Bind poses and influences are read but never written by bake or unbake.
pub trait MeshBuffers {
    fn vertex_count(&self) -> usize;

    /// Bind-pose matrices, one per bone; empty for a rigid mesh
    fn bind_poses(&self) -> &[Mat4];

    /// Attribute arrays together with the skinning data they are deformed by
    fn buffers_mut(&mut self) -> (VertexStreams<'_>, SkinBindings<'_>);

    fn blend_shape_count(&self) -> usize;

    fn blend_shape_frame_count(&self, channel: usize) -> usize;

    /// Extract the deltas of one frame. Called only on cache misses.
    fn blend_shape_frame_deltas(&self, channel: usize, frame: usize) -> Option<BlendShapeDeltas>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_vertex_influences() {
        let influences = BoneInfluences::from_per_vertex(&[
            vec![BoneWeight::new(0, 1.0)],
            vec![],
            vec![BoneWeight::new(1, 0.25), BoneWeight::new(3, 0.75)],
        ]);
        assert_eq!(influences.vertex_count(), Some(3));
        assert!(influences.for_vertex(1).is_empty());
        assert_eq!(influences.for_vertex(2)[1], BoneWeight::new(3, 0.75));
        assert_eq!(influences.max_bone_index(), Some((2, 3)));
    }

    #[test]
    fn test_flat_influences_must_cover_weights() {
        let weights = vec![BoneWeight::new(0, 0.5), BoneWeight::new(1, 0.5)];
        let influences = BoneInfluences::from_flat(&[1, 0, 1], weights.clone()).unwrap();
        assert_eq!(influences.for_vertex(2), &[BoneWeight::new(1, 0.5)]);

        assert!(matches!(
            BoneInfluences::from_flat(&[1, 2], weights),
            Err(BakeError::VertexCountMismatch {
                expected: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_weights_ignored_for_max_bone() {
        let influences = BoneInfluences::from_per_vertex(&[[
            BoneWeight::new(9, 0.0),
            BoneWeight::new(2, 1.0),
        ]]);
        assert_eq!(influences.max_bone_index(), Some((0, 2)));
    }

    #[test]
    fn test_unskinned_table() {
        let influences = BoneInfluences::unskinned();
        assert!(influences.is_unskinned());
        assert_eq!(influences.vertex_count(), None);
        assert!(influences.for_vertex(0).is_empty());
        assert_eq!(influences.max_bone_index(), None);
    }
}
