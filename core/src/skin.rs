//! Skin matrix resolution
//!
//! Each skin matrix is `world_to_base * bone_world * bind_pose`, mapping
//! rest-space vertices into the flattened base space.

use glam::Mat4;

use crate::error::BakeError;

/// Pose of a renderer for one bake/unbake cycle
#[derive(Debug, Clone, Copy)]
pub struct SkinPose<'a> {
    /// Renderer's own local-to-world transform
    pub renderer_transform: Mat4,
    /// Transform from world space into the flattened base space
    pub world_to_base: Mat4,
    /// Bone local-to-world transforms. `None` entries count as identity;
    /// `None` for the whole slice means the renderer has no skeleton.
    pub bones: Option<&'a [Option<Mat4>]>,
    /// Channel weights on the 0..=100 scale; `None` means no blend shapes are driven
    pub blend_shape_weights: Option<&'a [f32]>,
}

impl Default for SkinPose<'_> {
    fn default() -> Self {
        Self::rigid(Mat4::IDENTITY)
    }
}

impl<'a> SkinPose<'a> {
    /// Pose of a renderer without a skeleton
    pub fn rigid(renderer_transform: Mat4) -> Self {
        Self {
            renderer_transform,
            world_to_base: Mat4::IDENTITY,
            bones: None,
            blend_shape_weights: None,
        }
    }

    pub fn with_bones(mut self, bones: &'a [Option<Mat4>]) -> Self {
        self.bones = Some(bones);
        self
    }

    pub fn with_world_to_base(mut self, world_to_base: Mat4) -> Self {
        self.world_to_base = world_to_base;
        self
    }

    pub fn with_blend_shape_weights(mut self, weights: &'a [f32]) -> Self {
        self.blend_shape_weights = Some(weights);
        self
    }
}

/// Caller promises for an unbake pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Assumptions {
    /// Bones have not moved since the matching bake; reuse its skin matrices
    pub bone_matrices_unchanged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PoseShape {
    bones: Option<usize>,
    bind_poses: usize,
}

/// One combined matrix per bone, or a single matrix for a static mesh
#[derive(Debug, Clone, Default)]
pub struct SkinMatrixSet {
    matrices: Vec<Mat4>,
    shape: Option<PoseShape>,
}

impl SkinMatrixSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// A single matrix applies to every vertex regardless of its influences
    pub fn is_static(&self) -> bool {
        self.matrices.len() == 1
    }

    /// Recompute from `bind_poses` and the pose's bones.
    ///
    /// # Errors
    ///
    /// [`BakeError::BoneCountMismatch`] when bones are supplied, their count
    /// differs from the bind-pose count and the bind-pose count is not 1.
    pub fn resolve(&mut self, bind_poses: &[Mat4], pose: &SkinPose<'_>) -> Result<(), BakeError> {
        static IDENTITY_BIND: [Mat4; 1] = [Mat4::IDENTITY];
        let bind_poses: &[Mat4] = if bind_poses.is_empty() {
            &IDENTITY_BIND
        } else {
            bind_poses
        };
        let rigid = pose.world_to_base * pose.renderer_transform;

        self.matrices.clear();
        match pose.bones {
            Some(bones) if bones.len() != bind_poses.len() => {
                if bind_poses.len() != 1 {
                    self.shape = None;
                    return Err(BakeError::BoneCountMismatch {
                        bones: bones.len(),
                        bind_poses: bind_poses.len(),
                    });
                }
                tracing::warn!(
                    bones = bones.len(),
                    "static mesh on a skinned renderer, collapsing to the renderer transform"
                );
                self.matrices.push(rigid);
            }
            Some(bones) => {
                self.matrices
                    .extend(bones.iter().zip(bind_poses).map(|(bone, bind)| match bone {
                        Some(bone) => pose.world_to_base * *bone * *bind,
                        None => Mat4::IDENTITY,
                    }));
            }
            None => {
                self.matrices.resize(bind_poses.len(), rigid);
            }
        }

        self.shape = Some(PoseShape {
            bones: pose.bones.map(<[_]>::len),
            bind_poses: bind_poses.len(),
        });
        Ok(())
    }

    /// Resolve unless `assumptions` says the previous result is still valid.
    ///
    /// The hint is honoured only when the previous resolution saw the same
    /// bone and bind-pose counts; otherwise the set is recomputed and a
    /// warning is logged. Returns whether the matrices were recomputed.
    pub fn resolve_with(
        &mut self,
        bind_poses: &[Mat4],
        pose: &SkinPose<'_>,
        assumptions: Assumptions,
    ) -> Result<bool, BakeError> {
        if assumptions.bone_matrices_unchanged {
            let current = PoseShape {
                bones: pose.bones.map(<[_]>::len),
                bind_poses: bind_poses.len().max(1),
            };
            if self.shape == Some(current) {
                return Ok(false);
            }
            tracing::warn!(
                ?current,
                previous = ?self.shape,
                "bone matrices assumed unchanged, but the skeleton shape differs; recomputing"
            );
        }
        self.resolve(bind_poses, pose)?;
        Ok(true)
    }
}
