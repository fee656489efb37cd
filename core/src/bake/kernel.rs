//! Per-vertex bake and unbake transforms

use glam::{Mat4, Vec3, Vec4};

use super::reference::{ReferenceSnapshot, same_bits3, same_bits4};
use crate::blend_shape::AccumulatedDelta;
use crate::error::BakeError;
use crate::mesh::BoneInfluences;

/// Deformed attributes of one vertex
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct VertexState {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec4,
    /// Unbake only: the vertex went through the inverse transform
    pub rederived: bool,
}

/// Read-only inputs shared by every vertex of a pass
pub(crate) struct KernelInputs<'a> {
    pub positions: &'a [Vec3],
    pub normals: Option<&'a [Vec3]>,
    pub tangents: Option<&'a [Vec4]>,
    pub influences: &'a BoneInfluences,
    pub matrices: &'a [Mat4],
    pub delta: &'a AccumulatedDelta,
}

impl KernelInputs<'_> {
    /// Weighted sum of the vertex's skin matrices.
    ///
    /// A single-matrix set or a vertex without positive weights uses the first
    /// matrix. Bone indices are validated before the pass starts.
    #[inline]
    pub fn skin_matrix(&self, vertex: usize) -> Mat4 {
        if self.matrices.len() == 1 {
            return self.matrices[0];
        }

        let mut sum = Mat4::ZERO;
        let mut weighted = false;
        for influence in self.influences.for_vertex(vertex) {
            if influence.weight > 0.0 {
                sum += self.matrices[influence.bone as usize] * influence.weight;
                weighted = true;
            }
        }
        if weighted { sum } else { self.matrices[0] }
    }

    /// `skin * (p + dp)`, `normalize(R * (n + dn))`, `normalize(R * (t + dt))`
    pub fn bake_vertex(&self, vertex: usize) -> Result<VertexState, BakeError> {
        let skin = self.skin_matrix(vertex);

        let position = skin.transform_point3(self.positions[vertex] + self.delta.positions[vertex]);
        finite3(position, "baked position", vertex)?;

        let normal = match self.normals {
            Some(normals) => shading_direction(&skin, normals[vertex] + self.delta.normals[vertex], "baked normal", vertex)?,
            None => Vec3::ZERO,
        };

        let tangent = match self.tangents {
            Some(tangents) => {
                let t = tangents[vertex];
                let xyz = shading_direction(&skin, t.truncate() + self.delta.tangents[vertex], "baked tangent", vertex)?;
                xyz.extend(t.w)
            }
            None => Vec4::ZERO,
        };

        Ok(VertexState {
            position,
            normal,
            tangent,
            rederived: false,
        })
    }

    /// Reverse [`Self::bake_vertex`] for one vertex.
    ///
    /// Attributes bit-identical to `reference.baked` are restored from
    /// `reference.unbaked`. The skin matrix is inverted only when at least one
    /// attribute changed.
    pub fn unbake_vertex(
        &self,
        reference: &ReferenceSnapshot,
        vertex: usize,
    ) -> Result<VertexState, BakeError> {
        let position = self.positions[vertex];
        let position_changed = !same_bits3(position, reference.baked.positions[vertex]);

        let normal = self.normals.map(|normals| normals[vertex]);
        let normal_changed = match (normal, reference.baked.normals.as_deref()) {
            (Some(current), Some(baked)) => !same_bits3(current, baked[vertex]),
            (Some(_), None) => true,
            (None, _) => false,
        };

        let tangent = self.tangents.map(|tangents| tangents[vertex]);
        let tangent_changed = match (tangent, reference.baked.tangents.as_deref()) {
            (Some(current), Some(baked)) => !same_bits4(current, baked[vertex]),
            (Some(_), None) => true,
            (None, _) => false,
        };

        let mut state = VertexState {
            position: reference.unbaked.positions[vertex],
            normal: match (normal_changed, reference.unbaked.normals.as_deref()) {
                (false, Some(unbaked)) => unbaked[vertex],
                _ => Vec3::ZERO,
            },
            tangent: match (tangent_changed, reference.unbaked.tangents.as_deref()) {
                (false, Some(unbaked)) => unbaked[vertex],
                _ => Vec4::ZERO,
            },
            rederived: false,
        };

        if !(position_changed || normal_changed || tangent_changed) {
            return Ok(state);
        }

        let inverse = self.skin_matrix(vertex).inverse();
        if !inverse.is_finite() {
            return Err(BakeError::NonFinite {
                what: "skin matrix inverse",
                vertex,
            });
        }
        state.rederived = true;

        if position_changed {
            state.position = inverse.transform_point3(position) - self.delta.positions[vertex];
            finite3(state.position, "unbaked position", vertex)?;
        }
        if let (true, Some(current)) = (normal_changed, normal) {
            let unskinned = inverse.transform_vector3(current) - self.delta.normals[vertex];
            finite3(unskinned, "unbaked normal", vertex)?;
            state.normal = unskinned.normalize_or_zero();
        }
        if let (true, Some(current)) = (tangent_changed, tangent) {
            let unskinned = inverse.transform_vector3(current.truncate()) - self.delta.tangents[vertex];
            finite3(unskinned, "unbaked tangent", vertex)?;
            state.tangent = unskinned.normalize_or_zero().extend(current.w);
        }
        Ok(state)
    }
}

/// Rotate/scale a direction by the linear part of `skin` and renormalize
#[inline]
fn shading_direction(skin: &Mat4, direction: Vec3, what: &'static str, vertex: usize) -> Result<Vec3, BakeError> {
    let transformed = skin.transform_vector3(direction);
    finite3(transformed, what, vertex)?;
    Ok(transformed.normalize_or_zero())
}

#[inline]
fn finite3(value: Vec3, what: &'static str, vertex: usize) -> Result<(), BakeError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(BakeError::NonFinite { what, vertex })
    }
}
