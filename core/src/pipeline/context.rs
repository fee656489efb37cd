//! State handed to edit stages

use std::any::{Any, TypeId};

use glam::Mat4;
use hashbrown::HashMap;

use crate::editable::EditableMesh;
use crate::skin::SkinPose;

/// The baked mesh plus what stages may read or change besides it
pub struct EditContext<'a> {
    mesh: &'a mut EditableMesh,
    world_to_base: Mat4,
    bones: Option<&'a [Option<Mat4>]>,
    bone_override: Option<Vec<Option<Mat4>>>,
    data: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl<'a> EditContext<'a> {
    pub fn new(mesh: &'a mut EditableMesh, pose: &SkinPose<'a>) -> Self {
        Self {
            mesh,
            world_to_base: pose.world_to_base,
            bones: pose.bones,
            bone_override: None,
            data: HashMap::new(),
        }
    }

    /// Mesh in base space
    pub fn mesh(&self) -> &EditableMesh {
        &*self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut EditableMesh {
        &mut *self.mesh
    }

    pub fn world_to_base(&self) -> Mat4 {
        self.world_to_base
    }

    /// Current bone transforms, including any override set by an earlier stage
    pub fn bones(&self) -> Option<&[Option<Mat4>]> {
        self.bone_override.as_deref().or(self.bones)
    }

    /// Replace the bone transforms the mesh is unbaked with.
    pub fn set_bones(&mut self, bones: Vec<Option<Mat4>>) {
        self.bone_override = Some(bones);
    }

    pub fn bones_changed(&self) -> bool {
        self.bone_override.is_some()
    }

    /// Store a value for later stages, returning the previous value of that type.
    pub fn insert_data<T: Any + Send>(&mut self, value: T) -> Option<T> {
        self.data
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn data<T: Any + Send>(&self) -> Option<&T> {
        self.data.get(&TypeId::of::<T>())?.downcast_ref::<T>()
    }

    pub fn data_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.data.get_mut(&TypeId::of::<T>())?.downcast_mut::<T>()
    }

    pub fn take_data<T: Any + Send>(&mut self) -> Option<T> {
        self.data
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    pub(crate) fn into_bone_override(self) -> Option<Vec<Option<Mat4>>> {
        self.bone_override
    }
}
