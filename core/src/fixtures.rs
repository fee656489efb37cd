//! Procedural skinned meshes and poses
//!
//! Used by tests and the `skinbake` CLI. The tube runs along +Y with one bone
//! per evenly spaced joint; each vertex is weighted between the two nearest
//! joints.

use std::f32::consts::TAU;

use glam::{Mat4, Vec3, Vec4};

use crate::editable::{EditableMesh, MeshSkin};
use crate::mesh::{BlendShapeDeltas, BlendShapeFrame, BoneInfluences, BoneWeight};

/// Shape of a procedural tube
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TubeSpec {
    /// Vertex rings along the tube (at least 2)
    pub rings: usize,
    /// Vertices per ring (at least 3)
    pub segments: usize,
    /// Bones in the chain (at least 1)
    pub bones: usize,
    pub length: f32,
    pub radius: f32,
}

impl Default for TubeSpec {
    fn default() -> Self {
        Self {
            rings: 8,
            segments: 8,
            bones: 3,
            length: 2.0,
            radius: 0.25,
        }
    }
}

impl TubeSpec {
    pub fn vertex_count(&self) -> usize {
        self.rings.max(2) * self.segments.max(3)
    }

    /// Height of joint `bone` along the tube
    pub fn joint_height(&self, bone: usize) -> f32 {
        if self.bones <= 1 {
            0.0
        } else {
            self.length * bone as f32 / (self.bones - 1) as f32
        }
    }

    /// Rest-pose world transform of every bone
    pub fn rest_transforms(&self) -> Vec<Mat4> {
        (0..self.bones.max(1))
            .map(|bone| Mat4::from_translation(Vec3::new(0.0, self.joint_height(bone), 0.0)))
            .collect()
    }
}

/// Skinned tube with normals, tangents and smooth two-bone weights
pub fn skinned_tube(spec: &TubeSpec) -> EditableMesh {
    let rings = spec.rings.max(2);
    let segments = spec.segments.max(3);
    let bones = spec.bones.max(1);

    let mut positions = Vec::with_capacity(spec.vertex_count());
    let mut normals = Vec::with_capacity(spec.vertex_count());
    let mut tangents = Vec::with_capacity(spec.vertex_count());
    let mut influences = Vec::with_capacity(spec.vertex_count());

    for ring in 0..rings {
        let y = spec.length * ring as f32 / (rings - 1) as f32;
        let weights = joint_weights(spec, y, bones);
        for segment in 0..segments {
            let angle = TAU * segment as f32 / segments as f32;
            let (sin, cos) = angle.sin_cos();
            positions.push(Vec3::new(spec.radius * cos, y, spec.radius * sin));
            normals.push(Vec3::new(cos, 0.0, sin));
            tangents.push(Vec4::new(-sin, 0.0, cos, 1.0));
            influences.push(weights.clone());
        }
    }

    let bind_poses = spec.rest_transforms().iter().map(Mat4::inverse).collect();

    EditableMesh::from_positions(positions)
        .with_normals(normals)
        .with_tangents(tangents)
        .with_skin(MeshSkin {
            influences: BoneInfluences::from_per_vertex(&influences),
            bind_poses,
            blend_shapes: Vec::new(),
        })
}

fn joint_weights(spec: &TubeSpec, y: f32, bones: usize) -> Vec<BoneWeight> {
    if bones == 1 {
        return vec![BoneWeight::new(0, 1.0)];
    }
    let t = (y / spec.length * (bones - 1) as f32).clamp(0.0, (bones - 1) as f32);
    let lower = (t.floor() as usize).min(bones - 2);
    let blend = t - lower as f32;
    vec![
        BoneWeight::new(lower as u32, 1.0 - blend),
        BoneWeight::new(lower as u32 + 1, blend),
    ]
}

/// Add a radial "bulge" channel with two frames; the last frame pushes every
/// vertex `amount` along its normal.
///
/// Returns the channel index.
pub fn add_bulge_blend_shape(mesh: &mut EditableMesh, name: &str, amount: f32) -> usize {
    let radial: Vec<Vec3> = match &mesh.normals {
        Some(normals) => normals.clone(),
        None => mesh
            .positions
            .iter()
            .map(|p| Vec3::new(p.x, 0.0, p.z).normalize_or_zero())
            .collect(),
    };

    let frame = |scale: f32, weight: f32| BlendShapeFrame {
        weight,
        deltas: BlendShapeDeltas {
            positions: radial.iter().map(|n| *n * amount * scale).collect(),
            normals: None,
            tangents: None,
        },
    };
    mesh.add_blend_shape_frame(name, frame(0.5, 50.0));
    mesh.add_blend_shape_frame(name, frame(1.0, 100.0))
}

/// Bone transforms matching the bind poses; skinning is then the identity
pub fn rest_pose(spec: &TubeSpec) -> Vec<Option<Mat4>> {
    spec.rest_transforms().into_iter().map(Some).collect()
}

/// Chain pose bending every joint by `angle` radians about +Z
pub fn bent_pose(spec: &TubeSpec, angle: f32) -> Vec<Option<Mat4>> {
    let bones = spec.bones.max(1);
    let mut world = Mat4::from_rotation_z(angle);
    let mut pose = Vec::with_capacity(bones);
    pose.push(Some(world));
    for bone in 1..bones {
        let segment = spec.joint_height(bone) - spec.joint_height(bone - 1);
        world = world * Mat4::from_translation(Vec3::new(0.0, segment, 0.0)) * Mat4::from_rotation_z(angle);
        pose.push(Some(world));
    }
    pose
}
