use glam::{Mat4, Quat, Vec3};

use super::*;
use crate::fixtures::{TubeSpec, rest_pose, skinned_tube};

// =============================================================
// Test Stages
// =============================================================

struct Inflate {
    amount: f32,
}

impl EditStage for Inflate {
    const TAG: &'static str = "inflate";
}

struct InflateProcessor;

impl StageProcessor<Inflate> for InflateProcessor {
    fn process(&mut self, stage: &Inflate, ctx: &mut EditContext<'_>) -> Result<(), PipelineError> {
        let mesh = ctx.mesh_mut();
        let normals = mesh
            .normals
            .clone()
            .ok_or_else(|| PipelineError::stage(Inflate::TAG, "mesh has no normals"))?;
        for (position, normal) in mesh.positions.iter_mut().zip(&normals) {
            *position += *normal * stage.amount;
        }
        Ok(())
    }
}

/// Nudges one vertex and moves every bone
struct Repose {
    vertex: usize,
    nudge: Vec3,
    bone_offset: Vec3,
}

impl EditStage for Repose {
    const TAG: &'static str = "repose";
}

struct Mark(&'static str);

impl EditStage for Mark {
    const TAG: &'static str = "mark";
}

/// Different type sharing `Inflate`'s tag
struct Impostor;

impl EditStage for Impostor {
    const TAG: &'static str = "inflate";
}

fn registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    registry
        .register::<Inflate, _, _>(|| InflateProcessor)
        .register::<Repose, _, _>(|| {
            |stage: &Repose, ctx: &mut EditContext<'_>| -> Result<(), PipelineError> {
                let bones: Vec<_> = ctx
                    .bones()
                    .unwrap_or_default()
                    .iter()
                    .map(|bone| Some(Mat4::from_translation(stage.bone_offset) * bone.unwrap_or(Mat4::IDENTITY)))
                    .collect();
                ctx.set_bones(bones);
                ctx.mesh_mut().positions[stage.vertex] += stage.nudge;
                Ok(())
            }
        })
        .register::<Mark, _, _>(|| {
            |stage: &Mark, ctx: &mut EditContext<'_>| -> Result<(), PipelineError> {
                let mut marks = ctx.take_data::<Vec<&'static str>>().unwrap_or_default();
                marks.push(stage.0);
                ctx.insert_data(marks);
                Ok(())
            }
        });
    registry
}

fn assert_close(a: &[Vec3], b: &[Vec3], tolerance: f32) {
    assert_eq!(a.len(), b.len());
    for (i, (a, b)) in a.iter().zip(b).enumerate() {
        assert!((*a - *b).abs().max_element() <= tolerance, "vertex {i}: {a} vs {b}");
    }
}

// =============================================================
// Registry
// =============================================================

#[test]
fn test_unregistered_stage_is_rejected() {
    struct Unknown;
    impl EditStage for Unknown {
        const TAG: &'static str = "unknown";
    }

    let err = registry()
        .create_pipeline(vec![Box::new(Inflate { amount: 0.1 }), Box::new(Unknown)])
        .unwrap_err();
    assert_eq!(err, PipelineError::UnregisteredStage { tag: "unknown" });
}

#[test]
fn test_stage_ids_follow_run_order() {
    let pipeline = registry()
        .create_pipeline(vec![
            Box::new(Mark("a")),
            Box::new(Inflate { amount: 0.5 }),
            Box::new(Mark("b")),
        ])
        .unwrap();

    let stages: Vec<_> = pipeline.stages().collect();
    assert_eq!(stages.len(), 3);
    assert_eq!(stages[1].1, "inflate");
    assert!(stages[0].0 < stages[1].0 && stages[1].0 < stages[2].0);

    let inflate = pipeline.stage::<Inflate>(stages[1].0).unwrap();
    assert_eq!(inflate.amount, 0.5);
    assert!(pipeline.stage::<Mark>(stages[1].0).is_none());
}

#[test]
fn test_mismatched_stage_type_fails_at_run_time() {
    let mut pipeline = registry().create_pipeline(vec![Box::new(Impostor)]).unwrap();
    let mesh = skinned_tube(&TubeSpec::default());
    let err = pipeline.process(&mesh, &SkinPose::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Stage { stage: "inflate", .. }));
}

// =============================================================
// Processing
// =============================================================

#[test]
fn test_empty_pipeline_returns_source() {
    let spec = TubeSpec::default();
    let mesh = skinned_tube(&spec);
    let bones = rest_pose(&spec);
    let pose = SkinPose::rigid(Mat4::IDENTITY).with_bones(&bones);

    let mut pipeline = registry().create_pipeline(Vec::new()).unwrap();
    let result = pipeline.process(&mesh, &pose).unwrap();
    assert_eq!(result.stats().rederived_vertices, 0);
    assert_eq!(result.into_mesh(), mesh);
}

#[test]
fn test_base_space_edit_maps_back_to_rest_space() {
    let spec = TubeSpec::default();
    let mesh = skinned_tube(&spec);
    let bones = rest_pose(&spec);
    let pose = SkinPose::rigid(Mat4::IDENTITY)
        .with_bones(&bones)
        .with_world_to_base(Mat4::from_rotation_translation(
            Quat::from_rotation_x(0.7),
            Vec3::new(1.0, -2.0, 0.5),
        ));

    let mut pipeline = registry()
        .create_pipeline(vec![Box::new(Inflate { amount: 0.05 })])
        .unwrap();
    let result = pipeline.process(&mesh, &pose).unwrap();
    assert_eq!(result.stats().changed_positions, spec.vertex_count());
    assert_eq!(result.stats().changed_normals, 0);

    let normals = mesh.normals.as_deref().unwrap();
    let expected: Vec<Vec3> = mesh
        .positions
        .iter()
        .zip(normals)
        .map(|(p, n)| *p + *n * 0.05)
        .collect();
    assert_close(&result.mesh().positions, &expected, 1e-5);
    assert_eq!(result.mesh().normals, mesh.normals);
}

#[test]
fn test_bone_override_drives_unbake() {
    let spec = TubeSpec::default();
    let mesh = skinned_tube(&spec);
    let bones = rest_pose(&spec);
    let pose = SkinPose::rigid(Mat4::IDENTITY).with_bones(&bones);

    let mut pipeline = registry()
        .create_pipeline(vec![Box::new(Repose {
            vertex: 0,
            nudge: Vec3::new(0.1, 0.0, 0.0),
            bone_offset: Vec3::Z,
        })])
        .unwrap();
    let result = pipeline.process(&mesh, &pose).unwrap();
    assert_eq!(result.stats().rederived_vertices, 1);

    // Only the edited vertex sees the moved skeleton
    let deformed = &result.mesh().positions;
    assert_close(
        &deformed[..1],
        &[mesh.positions[0] + Vec3::new(0.1, 0.0, -1.0)],
        1e-5,
    );
    assert_eq!(&deformed[1..], &mesh.positions[1..]);
}

#[test]
fn test_stages_share_context_data() {
    let mut registry = registry();
    registry.register::<Inflate, _, _>(|| {
        |_: &Inflate, ctx: &mut EditContext<'_>| -> Result<(), PipelineError> {
            let marks = ctx.data::<Vec<&'static str>>().cloned().unwrap_or_default();
            if marks == ["first", "second"] {
                Ok(())
            } else {
                Err(PipelineError::stage(Inflate::TAG, format!("unexpected marks {marks:?}")))
            }
        }
    });
    let mut pipeline = registry
        .create_pipeline(vec![
            Box::new(Mark("first")),
            Box::new(Mark("second")),
            Box::new(Inflate { amount: 0.0 }),
        ])
        .unwrap();

    let mesh = skinned_tube(&TubeSpec::default());
    pipeline.process(&mesh, &SkinPose::default()).unwrap();
    // Data does not outlive a run
    pipeline.process(&mesh, &SkinPose::default()).unwrap();
}

#[test]
fn test_stage_failure_propagates() {
    let mut pipeline = registry()
        .create_pipeline(vec![Box::new(Inflate { amount: 1.0 })])
        .unwrap();
    let mesh = EditableMesh::from_positions(vec![Vec3::ZERO; 4]);
    let err = pipeline.process(&mesh, &SkinPose::default()).unwrap_err();
    assert_eq!(err, PipelineError::stage("inflate", "mesh has no normals"));
}

#[test]
fn test_invalid_source_is_rejected_before_baking() {
    let mut pipeline = registry().create_pipeline(Vec::new()).unwrap();
    let mesh = EditableMesh::from_positions(vec![Vec3::ZERO; 4]).with_normals(vec![Vec3::Y; 3]);
    assert!(matches!(
        pipeline.process(&mesh, &SkinPose::default()),
        Err(PipelineError::Bake(BakeError::VertexCountMismatch { what: "normals", .. }))
    ));
    assert_eq!(pipeline.processor().cache().lock().unwrap().now(), 0);
}

// =============================================================
// Results
// =============================================================

#[test]
fn test_result_converts_to_blend_shape_frame() {
    let spec = TubeSpec::default();
    let mesh = skinned_tube(&spec);
    let mut pipeline = registry()
        .create_pipeline(vec![Box::new(Inflate { amount: 0.2 })])
        .unwrap();
    let result = pipeline.process(&mesh, &SkinPose::default()).unwrap();

    let frame = result.into_blend_shape_frame(&mesh, 100.0).unwrap();
    assert_eq!(frame.weight, 100.0);
    let expected: Vec<Vec3> = mesh.normals.as_deref().unwrap().iter().map(|n| *n * 0.2).collect();
    assert_close(&frame.deltas.positions, &expected, 1e-5);
    // Normals were untouched, so their deltas are exactly zero
    assert!(frame.deltas.normals.unwrap().iter().all(|d| *d == Vec3::ZERO));
    assert!(frame.deltas.tangents.is_some());
}

#[test]
fn test_blend_shape_frame_requires_matching_source() {
    let mesh = skinned_tube(&TubeSpec::default());
    let mut pipeline = registry().create_pipeline(Vec::new()).unwrap();
    let result = pipeline.process(&mesh, &SkinPose::default()).unwrap();

    let other = EditableMesh::from_positions(vec![Vec3::ZERO; 3]);
    assert!(matches!(
        result.into_blend_shape_frame(&other, 100.0),
        Err(BakeError::VertexCountMismatch { what: "processed mesh", expected: 3, .. })
    ));
}
