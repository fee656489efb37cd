//! Pre- and post-bake attribute snapshots

use glam::{Vec3, Vec4};

use crate::mesh::VertexStreams;

/// Copy of the three deformable attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSnapshot {
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub tangents: Option<Vec<Vec4>>,
}

impl AttributeSnapshot {
    /// Overwrite with the current contents of `streams`, keeping allocations
    pub(crate) fn refill(&mut self, streams: &VertexStreams<'_>) {
        refill(&mut self.positions, &*streams.positions);
        refill_optional(&mut self.normals, streams.normals.as_deref());
        refill_optional(&mut self.tangents, streams.tangents.as_deref());
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// What a bake saw before and after deforming the mesh.
///
/// Unbake compares the mesh against `baked` bit for bit; attributes that match
/// are restored straight from `unbaked` instead of going through an inverse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSnapshot {
    pub unbaked: AttributeSnapshot,
    pub baked: AttributeSnapshot,
}

fn refill<T: Copy>(dst: &mut Vec<T>, src: &[T]) {
    dst.clear();
    dst.extend_from_slice(src);
}

fn refill_optional<T: Copy>(dst: &mut Option<Vec<T>>, src: Option<&[T]>) {
    match src {
        Some(src) => refill(dst.get_or_insert_with(Vec::new), src),
        None => *dst = None,
    }
}

#[inline]
pub(crate) fn same_bits3(a: Vec3, b: Vec3) -> bool {
    a.x.to_bits() == b.x.to_bits() && a.y.to_bits() == b.y.to_bits() && a.z.to_bits() == b.z.to_bits()
}

#[inline]
pub(crate) fn same_bits4(a: Vec4, b: Vec4) -> bool {
    same_bits3(a.truncate(), b.truncate()) && a.w.to_bits() == b.w.to_bits()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_comparison_is_exact() {
        assert!(same_bits3(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 2.0, 3.0)));
        assert!(!same_bits3(Vec3::ZERO, Vec3::new(-0.0, 0.0, 0.0)));
        assert!(!same_bits3(Vec3::X, Vec3::new(1.0 + f32::EPSILON, 0.0, 0.0)));
        assert!(same_bits3(Vec3::splat(f32::NAN), Vec3::splat(f32::NAN)));
        assert!(!same_bits4(Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(1.0, 0.0, 0.0, -1.0)));
    }

    #[test]
    fn test_refill_keeps_allocation() {
        let mut positions = vec![Vec3::ONE; 8];
        let mut normals = vec![Vec3::Z; 8];
        let streams = VertexStreams {
            positions: positions.as_mut_slice(),
            normals: Some(normals.as_mut_slice()),
            tangents: None,
        };

        let mut snapshot = AttributeSnapshot {
            positions: Vec::with_capacity(64),
            normals: Some(Vec::with_capacity(64)),
            tangents: Some(vec![Vec4::ONE; 2]),
        };
        let positions_ptr = snapshot.positions.as_ptr();
        snapshot.refill(&streams);

        assert_eq!(snapshot.positions, vec![Vec3::ONE; 8]);
        assert_eq!(snapshot.positions.as_ptr(), positions_ptr);
        assert_eq!(snapshot.positions.capacity(), 64);
        assert_eq!(snapshot.normals.as_ref().map(Vec::capacity), Some(64));
        assert_eq!(snapshot.normals, Some(vec![Vec3::Z; 8]));
        assert_eq!(snapshot.tangents, None);
    }
}
