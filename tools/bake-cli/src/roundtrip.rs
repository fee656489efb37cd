//! Roundtrip command - bake, edit and unbake a procedural skinned tube
//!
//! Reports three measurements:
//! - Unedited cycles must restore the source exactly
//! - Direction-only edits go through the inverse skin transform everywhere
//! - A base-space inflation, stored as a blend shape, must reproduce itself
//!   when baked again

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, ensure};
use clap::Args;
use glam::{Mat4, Vec3};
use skinbake_core::fixtures::{TubeSpec, add_bulge_blend_shape, bent_pose, skinned_tube};
use skinbake_core::{
    Assumptions, BakeConfig, EditContext, EditStage, EditableMesh, MeshBakeProcessor,
    PipelineError, SkinPose, StageProcessor, StageRegistry,
};

/// Round-trip tolerance through the inverse skin transform
const INVERSE_TOLERANCE: f32 = 1e-3;

/// Arguments for the roundtrip command
#[derive(Args)]
pub struct RoundtripArgs {
    /// Vertex rings along the tube
    #[arg(long, default_value_t = 32)]
    pub rings: usize,

    /// Vertices per ring
    #[arg(long, default_value_t = 16)]
    pub segments: usize,

    /// Bones in the chain
    #[arg(long, default_value_t = 4)]
    pub bones: usize,

    /// Bend per joint, in degrees
    #[arg(long, default_value_t = 20.0)]
    pub bend: f32,

    /// Distance the edit stage pushes vertices along their base-space normal
    #[arg(long, default_value_t = 0.02)]
    pub inflate: f32,

    /// Weight of the bulge blend shape (0-100)
    #[arg(long, default_value_t = 50.0)]
    pub blend_weight: f32,

    /// Unedited cycles to run
    #[arg(long, default_value_t = 100)]
    pub cycles: usize,

    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Push every vertex along its normal
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

/// Execute the roundtrip command
pub fn execute(args: RoundtripArgs) -> Result<()> {
    let config = crate::config::load(args.config.as_deref())?;
    ensure!(args.rings >= 2, "--rings must be at least 2");
    ensure!(args.segments >= 3, "--segments must be at least 3");
    ensure!(args.bones >= 1, "--bones must be at least 1");

    let spec = TubeSpec {
        rings: args.rings,
        segments: args.segments,
        bones: args.bones,
        ..TubeSpec::default()
    };
    let mut source = skinned_tube(&spec);
    add_bulge_blend_shape(&mut source, "bulge", 0.1);
    let bones = bent_pose(&spec, args.bend.to_radians());
    let weights = [args.blend_weight];
    let pose = SkinPose::rigid(Mat4::IDENTITY)
        .with_bones(&bones)
        .with_blend_shape_weights(&weights);

    println!(
        "Tube: {} vertices, {} bones, bend {:.1} deg, bulge weight {:.1}",
        spec.vertex_count(),
        spec.bones,
        args.bend,
        args.blend_weight
    );

    unedited_cycles(&source, &pose, &config, args.cycles)?;
    inverse_round_trip(&source, &pose, &config)?;
    inflation_as_blend_shape(&source, &pose, &config, args.inflate)?;

    println!("All checks passed");
    Ok(())
}

fn unedited_cycles(source: &EditableMesh, pose: &SkinPose<'_>, config: &BakeConfig, cycles: usize) -> Result<()> {
    let mut processor = MeshBakeProcessor::new(config);
    let mut mesh = source.clone();
    let start = Instant::now();
    for cycle in 0..cycles {
        processor
            .bake(&mut mesh, pose)
            .with_context(|| format!("bake failed in cycle {cycle}"))?;
        processor
            .unbake(
                &mut mesh,
                pose,
                Assumptions {
                    bone_matrices_unchanged: true,
                },
            )
            .with_context(|| format!("unbake failed in cycle {cycle}"))?;
    }
    let elapsed = start.elapsed();

    ensure!(mesh == *source, "unedited cycles drifted from the source mesh");
    println!(
        "  Unedited: {cycles} cycles exact ({:.3} ms per cycle)",
        elapsed.as_secs_f64() * 1000.0 / cycles.max(1) as f64
    );
    Ok(())
}

fn inverse_round_trip(source: &EditableMesh, pose: &SkinPose<'_>, config: &BakeConfig) -> Result<()> {
    let mut processor = MeshBakeProcessor::new(config);
    let mut mesh = source.clone();
    processor.bake(&mut mesh, pose).context("bake failed")?;

    // Same directions, different bits
    if let Some(normals) = mesh.normals.as_mut() {
        normals.iter_mut().for_each(|n| *n *= 2.0);
    }
    if let Some(tangents) = mesh.tangents.as_mut() {
        tangents
            .iter_mut()
            .for_each(|t| *t = (t.truncate() * 2.0).extend(t.w));
    }
    let stats = processor
        .unbake(&mut mesh, pose, Assumptions::default())
        .context("unbake failed")?;

    let normal_error = max_error(
        mesh.normals.as_deref().unwrap_or_default(),
        source.normals.as_deref().unwrap_or_default(),
    );
    let tangent_error = match (&mesh.tangents, &source.tangents) {
        (Some(a), Some(b)) => a
            .iter()
            .zip(b)
            .map(|(a, b)| (*a - *b).abs().max_element())
            .fold(0.0, f32::max),
        _ => 0.0,
    };
    println!(
        "  Inverse: {} vertices re-derived, max normal error {normal_error:.2e}, max tangent error {tangent_error:.2e}",
        stats.rederived_vertices
    );
    ensure!(
        normal_error <= INVERSE_TOLERANCE && tangent_error <= INVERSE_TOLERANCE,
        "inverse round trip exceeded {INVERSE_TOLERANCE}"
    );
    Ok(())
}

fn inflation_as_blend_shape(source: &EditableMesh, pose: &SkinPose<'_>, config: &BakeConfig, amount: f32) -> Result<()> {
    let mut registry = StageRegistry::new();
    registry.register::<Inflate, _, _>(|| InflateProcessor);
    let mut pipeline = registry.create_pipeline_with(vec![Box::new(Inflate { amount })], MeshBakeProcessor::new(config))?;

    let result = pipeline.process(source, pose).context("pipeline failed")?;
    let rederived = result.stats().rederived_vertices;
    let frame = result.into_blend_shape_frame(source, 100.0)?;

    let mut baked = source.clone();
    MeshBakeProcessor::new(config).bake(&mut baked, pose)?;

    let mut shaped = source.clone();
    let channel = shaped.add_blend_shape_frame("inflate", frame);
    let mut weights: Vec<f32> = pose.blend_shape_weights.unwrap_or_default().to_vec();
    weights.resize(channel + 1, 0.0);
    weights[channel] = 100.0;
    MeshBakeProcessor::new(config).bake(&mut shaped, &pose.with_blend_shape_weights(&weights))?;

    let expected: Vec<Vec3> = match &baked.normals {
        Some(normals) => baked
            .positions
            .iter()
            .zip(normals)
            .map(|(p, n)| *p + *n * amount)
            .collect(),
        None => baked.positions.clone(),
    };
    let error = max_error(&shaped.positions, &expected);
    println!("  Inflate: {rederived} vertices re-derived, blend shape replay error {error:.2e}");
    ensure!(error <= INVERSE_TOLERANCE, "blend shape replay exceeded {INVERSE_TOLERANCE}");
    Ok(())
}

fn max_error(a: &[Vec3], b: &[Vec3]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(a, b)| (*a - *b).abs().max_element())
        .fold(0.0, f32::max)
}
