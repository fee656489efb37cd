//! In-memory editable mesh

use glam::{Mat4, Vec3, Vec4};
use skinbake_codec::{CodecError, PackedVertexData, VertexAttribute};

use crate::error::BakeError;
use crate::mesh::{
    BlendShape, BlendShapeDeltas, BlendShapeFrame, BoneInfluences, MeshBuffers, SkinBindings,
    VertexStreams,
};

/// Skinning data that does not live in packed vertex streams
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshSkin {
    pub influences: BoneInfluences,
    pub bind_poses: Vec<Mat4>,
    pub blend_shapes: Vec<BlendShape>,
}

/// Decoded mesh whose position, normal and tangent arrays can be edited freely.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditableMesh {
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub tangents: Option<Vec<Vec4>>,
    pub influences: BoneInfluences,
    pub bind_poses: Vec<Mat4>,
    pub blend_shapes: Vec<BlendShape>,
}

impl EditableMesh {
    /// Rigid mesh with positions only
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        Self {
            positions,
            ..Self::default()
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_tangents(mut self, tangents: Vec<Vec4>) -> Self {
        self.tangents = Some(tangents);
        self
    }

    pub fn with_skin(mut self, skin: MeshSkin) -> Self {
        self.influences = skin.influences;
        self.bind_poses = skin.bind_poses;
        self.blend_shapes = skin.blend_shapes;
        self
    }

    /// Decode position, normal and tangent streams from packed data.
    ///
    /// Normals and tangents are read only when the layout carries them.
    pub fn from_packed(data: &PackedVertexData, skin: MeshSkin) -> Result<Self, CodecError> {
        let positions = data.read_positions()?;
        let normals = data
            .has_attribute(VertexAttribute::Normal)
            .then(|| data.read_normals())
            .transpose()?;
        let tangents = data
            .has_attribute(VertexAttribute::Tangent)
            .then(|| data.read_tangents())
            .transpose()?;

        Ok(Self {
            positions,
            normals,
            tangents,
            ..Self::default()
        }
        .with_skin(skin))
    }

    /// Overwrite every field with `source`, keeping this mesh's allocations
    pub fn copy_from(&mut self, source: &EditableMesh) {
        self.positions.clone_from(&source.positions);
        self.normals.clone_from(&source.normals);
        self.tangents.clone_from(&source.tangents);
        self.influences.clone_from(&source.influences);
        self.bind_poses.clone_from(&source.bind_poses);
        self.blend_shapes.clone_from(&source.blend_shapes);
    }

    /// Re-encode position, normal and tangent into `data`.
    ///
    /// Other attributes are left as they are. Normals and tangents are written
    /// only when both the mesh and the layout carry them.
    pub fn write_back(&self, data: &mut PackedVertexData) -> Result<(), CodecError> {
        data.write_positions(&self.positions)?;
        if let Some(normals) = &self.normals {
            if data.has_attribute(VertexAttribute::Normal) {
                data.write_normals(normals)?;
            }
        }
        if let Some(tangents) = &self.tangents {
            if data.has_attribute(VertexAttribute::Tangent) {
                data.write_tangents(tangents)?;
            }
        }
        Ok(())
    }

    /// Check that every per-vertex array has one entry per vertex.
    pub fn validate(&self) -> Result<(), BakeError> {
        let expected = self.positions.len();
        let check = |what: &'static str, actual: usize| {
            if actual == expected {
                Ok(())
            } else {
                Err(BakeError::VertexCountMismatch {
                    what,
                    expected,
                    actual,
                })
            }
        };

        if let Some(normals) = &self.normals {
            check("normals", normals.len())?;
        }
        if let Some(tangents) = &self.tangents {
            check("tangents", tangents.len())?;
        }
        if let Some(count) = self.influences.vertex_count() {
            check("bone influences", count)?;
        }
        for shape in &self.blend_shapes {
            for frame in &shape.frames {
                check("blend shape position deltas", frame.deltas.positions.len())?;
                if let Some(normals) = &frame.deltas.normals {
                    check("blend shape normal deltas", normals.len())?;
                }
                if let Some(tangents) = &frame.deltas.tangents {
                    check("blend shape tangent deltas", tangents.len())?;
                }
            }
        }
        Ok(())
    }

    pub fn blend_shape_index(&self, name: &str) -> Option<usize> {
        self.blend_shapes.iter().position(|shape| shape.name == name)
    }

    /// Append a frame to the channel called `name`, creating the channel if needed.
    ///
    /// Returns the channel index.
    pub fn add_blend_shape_frame(&mut self, name: &str, frame: BlendShapeFrame) -> usize {
        match self.blend_shape_index(name) {
            Some(index) => {
                self.blend_shapes[index].frames.push(frame);
                index
            }
            None => {
                self.blend_shapes.push(BlendShape {
                    name: name.to_string(),
                    frames: vec![frame],
                });
                self.blend_shapes.len() - 1
            }
        }
    }
}

impl MeshBuffers for EditableMesh {
    fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    fn bind_poses(&self) -> &[Mat4] {
        &self.bind_poses
    }

    fn buffers_mut(&mut self) -> (VertexStreams<'_>, SkinBindings<'_>) {
        (
            VertexStreams {
                positions: &mut self.positions,
                normals: self.normals.as_deref_mut(),
                tangents: self.tangents.as_deref_mut(),
            },
            SkinBindings {
                influences: &self.influences,
                bind_poses: &self.bind_poses,
            },
        )
    }

    fn blend_shape_count(&self) -> usize {
        self.blend_shapes.len()
    }

    fn blend_shape_frame_count(&self, channel: usize) -> usize {
        self.blend_shapes
            .get(channel)
            .map_or(0, |shape| shape.frames.len())
    }

    fn blend_shape_frame_deltas(&self, channel: usize, frame: usize) -> Option<BlendShapeDeltas> {
        self.blend_shapes
            .get(channel)?
            .frames
            .get(frame)
            .map(|frame| frame.deltas.clone())
    }
}
