//! Integration tests for the edit pipeline
//!
//! Registers a base-space edit stage, runs full process cycles and turns the
//! result into a blend shape that reproduces the edit when baked again.

use glam::{Mat4, Vec3};
use skinbake_core::fixtures::{TubeSpec, add_bulge_blend_shape, bent_pose, skinned_tube};
use skinbake_core::{
    Assumptions, BakeConfig, EditContext, EditStage, EditableMesh, MeshBakeProcessor,
    PipelineError, SkinPose, StageProcessor, StageRegistry, shared_cache,
};

/// Push every vertex along its base-space normal
struct Inflate {
    amount: f32,
}

impl EditStage for Inflate {
    const TAG: &'static str = "inflate";
}

struct InflateProcessor;

impl StageProcessor<Inflate> for InflateProcessor {
    fn process(&mut self, stage: &Inflate, ctx: &mut EditContext<'_>) -> Result<(), PipelineError> {
        if stage.amount == 0.0 {
            return Ok(());
        }
        let mesh = ctx.mesh_mut();
        let Some(normals) = mesh.normals.clone() else {
            return Err(PipelineError::stage(Inflate::TAG, "mesh has no normals"));
        };
        for (position, normal) in mesh.positions.iter_mut().zip(&normals) {
            *position += *normal * stage.amount;
        }
        Ok(())
    }
}

fn registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    registry.register::<Inflate, _, _>(|| InflateProcessor);
    registry
}

/// A processed edit stored as a blend shape reproduces the edit on the next bake
#[test]
fn test_edit_becomes_blend_shape() {
    let spec = TubeSpec {
        rings: 12,
        bones: 4,
        ..TubeSpec::default()
    };
    let source = skinned_tube(&spec);
    let bones = bent_pose(&spec, 0.3);
    let pose = SkinPose::rigid(Mat4::IDENTITY).with_bones(&bones);

    let mut pipeline = registry()
        .create_pipeline(vec![Box::new(Inflate { amount: 0.05 })])
        .expect("inflate is registered");
    let frame = pipeline
        .process(&source, &pose)
        .expect("process")
        .into_blend_shape_frame(&source, 100.0)
        .expect("same vertex count");

    // Bake the source alone and with the new shape at full weight
    let mut baked = source.clone();
    MeshBakeProcessor::default().bake(&mut baked, &pose).unwrap();

    let mut shaped = source.clone();
    let channel = shaped.add_blend_shape_frame("inflate", frame);
    let mut weights = vec![0.0; channel + 1];
    weights[channel] = 100.0;
    MeshBakeProcessor::default()
        .bake(&mut shaped, &pose.with_blend_shape_weights(&weights))
        .unwrap();

    let normals = baked.normals.as_deref().unwrap();
    for (vertex, (shaped, baked)) in shaped.positions.iter().zip(&baked.positions).enumerate() {
        let expected = *baked + normals[vertex] * 0.05;
        assert!(
            (*shaped - expected).abs().max_element() < 1e-4,
            "vertex {vertex}: {shaped} vs {expected}"
        );
    }
}

/// Pipelines over the same source mesh can share one blend-shape cache
#[test]
fn test_pipelines_share_blend_shape_cache() {
    let spec = TubeSpec::default();
    let mut source = skinned_tube(&spec);
    add_bulge_blend_shape(&mut source, "bulge", 0.1);
    let bones = bent_pose(&spec, 0.2);
    let weights = [80.0];
    let pose = SkinPose::rigid(Mat4::IDENTITY)
        .with_bones(&bones)
        .with_blend_shape_weights(&weights);

    let config = BakeConfig::default();
    let cache = shared_cache(&config.blend_shape_cache);
    let registry = registry();
    let mut first = registry
        .create_pipeline_with(
            vec![Box::new(Inflate { amount: 0.01 })],
            MeshBakeProcessor::with_cache(&config, cache.clone()),
        )
        .unwrap();
    let mut second = registry
        .create_pipeline_with(
            vec![Box::new(Inflate { amount: -0.01 })],
            MeshBakeProcessor::with_cache(&config, cache.clone()),
        )
        .unwrap();

    first.process(&source, &pose).unwrap();
    second.process(&source, &pose).unwrap();

    let cache = cache.lock().unwrap();
    assert_eq!(cache.len(), 1, "both pipelines read the same frame");
    assert_eq!(cache.now(), 4, "each process ticks twice");
}

/// Processors on separate threads accumulate against one cache
#[test]
fn test_concurrent_processors_share_blend_shape_cache() {
    const ROUNDS: usize = 20;

    let spec = TubeSpec::default();
    let mut source = skinned_tube(&spec);
    add_bulge_blend_shape(&mut source, "bulge", 0.1);
    let bones = bent_pose(&spec, 0.3);

    let config = BakeConfig::default();
    let cache = shared_cache(&config.blend_shape_cache);

    let runs: Vec<Vec<Vec<Vec3>>> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..2)
            .map(|_| {
                let mut processor = MeshBakeProcessor::with_cache(&config, cache.clone());
                let (source, bones) = (&source, &bones);
                scope.spawn(move || {
                    let mut baked = Vec::with_capacity(ROUNDS);
                    for round in 0..ROUNDS {
                        // A new weight every round forces a cache lookup
                        let weights = [20.0 + round as f32 * 4.0];
                        let pose = SkinPose::rigid(Mat4::IDENTITY)
                            .with_bones(bones)
                            .with_blend_shape_weights(&weights);
                        let mut mesh = source.clone();
                        processor.bake(&mut mesh, &pose).unwrap();
                        baked.push(mesh.positions.clone());
                        processor
                            .unbake(&mut mesh, &pose, Assumptions::default())
                            .unwrap();
                        assert_eq!(&mesh, source, "round {round}");
                    }
                    baked
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect()
    });

    assert_eq!(runs[0], runs[1], "both threads saw identical deltas");
    let cache = cache.lock().unwrap();
    assert_eq!(cache.len(), 1, "one entry for the bulge's last frame");
    assert_eq!(cache.now(), (2 * 2 * ROUNDS) as u64);
}

/// One hundred cycles on one pipeline stay stable
#[test]
fn test_repeated_processing_is_stable() {
    let spec = TubeSpec::default();
    let mut source = skinned_tube(&spec);
    add_bulge_blend_shape(&mut source, "bulge", 0.1);
    let bones = bent_pose(&spec, 0.5);
    let weights = [50.0];
    let pose = SkinPose::rigid(Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)))
        .with_bones(&bones)
        .with_blend_shape_weights(&weights);

    let mut pipeline = registry()
        .create_pipeline(vec![Box::new(Inflate { amount: 0.0 })])
        .unwrap();
    let mut mesh = EditableMesh::default();
    let mut positions = None;
    for cycle in 0..100 {
        let stats = pipeline.process_into(&source, &pose, &mut mesh).unwrap();
        assert_eq!(stats.rederived_vertices, 0, "cycle {cycle}");
        assert_eq!(mesh, source, "cycle {cycle}");
        // The target's buffers are reused after the first cycle
        assert_eq!(*positions.get_or_insert(mesh.positions.as_ptr()), mesh.positions.as_ptr());
    }
    assert_eq!(pipeline.processor().cache().lock().unwrap().now(), 200);
}

#[test]
fn test_edit_stage_errors_surface_unmodified() {
    let mut mesh = skinned_tube(&TubeSpec::default());
    mesh.normals = None;

    let mut pipeline = registry()
        .create_pipeline(vec![Box::new(Inflate { amount: 0.1 })])
        .unwrap();
    let err = pipeline.process(&mesh, &SkinPose::default()).unwrap_err();
    assert_eq!(err.to_string(), "stage 'inflate' failed: mesh has no normals");
}
