//! Blend-shape delta accumulation
//!
//! The accumulator sums `weight / 100 * delta` over every channel with a
//! positive weight, using only the channel's last frame. The sum is reused
//! untouched while the weight vector stays the same, so a bake and its
//! matching unbake see bit-identical deltas.

use std::sync::{Arc, Mutex, PoisonError};

use glam::Vec3;

use crate::cache::TickCache;
use crate::config::BlendShapeCacheConfig;
use crate::error::BakeError;
use crate::mesh::{BlendShapeDeltas, MeshBuffers};
use crate::parallel::ParallelPolicy;

/// Cache key: channel index and frame index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendShapeKey {
    pub channel: usize,
    pub frame: usize,
}

/// Frame deltas shared between processors working on the same source mesh
pub type SharedBlendShapeCache = Arc<Mutex<TickCache<BlendShapeKey, Arc<BlendShapeDeltas>>>>;

/// Create an empty shared cache with the configured expiry
pub fn shared_cache(config: &BlendShapeCacheConfig) -> SharedBlendShapeCache {
    Arc::new(Mutex::new(TickCache::new(
        config.lifetime_ticks,
        config.sweep_interval_ticks,
    )))
}

/// Summed deltas for every vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatedDelta {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
}

impl AccumulatedDelta {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        [&self.positions, &self.normals, &self.tangents]
            .iter()
            .all(|deltas| deltas.iter().all(|d| *d == Vec3::ZERO))
    }

    /// Resize to `vertex_count` and zero every entry
    fn reset(&mut self, vertex_count: usize) {
        for deltas in [&mut self.positions, &mut self.normals, &mut self.tangents] {
            deltas.clear();
            deltas.resize(vertex_count, Vec3::ZERO);
        }
    }
}

/// Weighted blend-shape sum with change detection
#[derive(Debug, Default)]
pub struct BlendShapeAccumulator {
    delta: AccumulatedDelta,
    previous_weights: Option<Vec<f32>>,
    policy: ParallelPolicy,
}

impl BlendShapeAccumulator {
    pub fn new(policy: ParallelPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn delta(&self) -> &AccumulatedDelta {
        &self.delta
    }

    /// Forget the stored weights so the next update recomputes
    pub fn reset(&mut self) {
        self.previous_weights = None;
    }

    /// Bring the accumulated delta up to date with `weights`.
    ///
    /// Channels past the end of `weights` (or all channels when `weights` is
    /// `None`) count as weight 0. Returns whether the sum was recomputed.
    pub fn update<M: MeshBuffers + ?Sized>(
        &mut self,
        mesh: &M,
        weights: Option<&[f32]>,
        cache: &SharedBlendShapeCache,
    ) -> Result<bool, BakeError> {
        let vertex_count = mesh.vertex_count();
        let channel_count = mesh.blend_shape_count();
        let weight_of = |channel: usize| {
            weights
                .and_then(|w| w.get(channel).copied())
                .unwrap_or(0.0)
        };

        let unchanged = self.delta.len() == vertex_count
            && self.previous_weights.as_ref().is_some_and(|previous| {
                previous.len() == channel_count
                    && previous
                        .iter()
                        .enumerate()
                        .all(|(channel, &w)| w == weight_of(channel))
            });
        if unchanged {
            return Ok(false);
        }

        let current: Vec<f32> = (0..channel_count).map(weight_of).collect();
        // Stored weights are only committed once the sum is complete
        self.previous_weights = None;
        self.delta.reset(vertex_count);

        let mut active = 0usize;
        for (channel, &weight) in current.iter().enumerate() {
            if weight <= 0.0 {
                continue;
            }
            let frame_count = mesh.blend_shape_frame_count(channel);
            let Some(frame) = frame_count.checked_sub(1) else {
                continue;
            };
            let key = BlendShapeKey { channel, frame };
            let Some(deltas) = fetch_deltas(mesh, key, cache)? else {
                continue;
            };
            self.accumulate(&deltas, weight / 100.0);
            active += 1;
        }

        tracing::debug!(channels = channel_count, active, vertex_count, "blend shape deltas recomputed");
        self.previous_weights = Some(current);
        Ok(true)
    }

    fn accumulate(&mut self, deltas: &BlendShapeDeltas, scale: f32) {
        let policy = self.policy;
        let add = |target: &mut [Vec3], source: &[Vec3]| {
            policy.for_each_indexed(target, |i, acc| *acc += source[i] * scale);
        };

        add(&mut self.delta.positions, &deltas.positions);
        if let Some(normals) = &deltas.normals {
            add(&mut self.delta.normals, normals);
        }
        if let Some(tangents) = &deltas.tangents {
            add(&mut self.delta.tangents, tangents);
        }
    }
}

/// Look up a frame in the shared cache, extracting from the mesh on a miss.
///
/// The lock is released while the mesh extracts the frame.
fn fetch_deltas<M: MeshBuffers + ?Sized>(
    mesh: &M,
    key: BlendShapeKey,
    cache: &SharedBlendShapeCache,
) -> Result<Option<Arc<BlendShapeDeltas>>, BakeError> {
    let vertex_count = mesh.vertex_count();
    {
        let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.get(&key) {
            Some(deltas) if deltas.vertex_count() == vertex_count => {
                tracing::trace!(?key, "blend shape cache hit");
                return Ok(Some(deltas));
            }
            Some(stale) => {
                tracing::warn!(
                    ?key,
                    cached = stale.vertex_count(),
                    vertex_count,
                    "cached blend shape has a different vertex count, re-extracting"
                );
                guard.remove(&key);
            }
            None => {}
        }
    }

    let Some(extracted) = mesh.blend_shape_frame_deltas(key.channel, key.frame) else {
        return Ok(None);
    };
    check_len("blend shape position deltas", vertex_count, extracted.positions.len())?;
    if let Some(normals) = &extracted.normals {
        check_len("blend shape normal deltas", vertex_count, normals.len())?;
    }
    if let Some(tangents) = &extracted.tangents {
        check_len("blend shape tangent deltas", vertex_count, tangents.len())?;
    }

    let extracted = Arc::new(extracted);
    let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(Some(guard.get_or_insert_with(key, || extracted)))
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), BakeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(BakeError::VertexCountMismatch {
            what,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editable::EditableMesh;
    use crate::mesh::BlendShapeFrame;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts frame extractions to observe cache behaviour
    struct CountingMesh {
        inner: EditableMesh,
        extractions: AtomicUsize,
    }

    impl MeshBuffers for CountingMesh {
        fn vertex_count(&self) -> usize {
            self.inner.vertex_count()
        }
        fn bind_poses(&self) -> &[glam::Mat4] {
            self.inner.bind_poses()
        }
        fn buffers_mut(&mut self) -> (crate::mesh::VertexStreams<'_>, crate::mesh::SkinBindings<'_>) {
            self.inner.buffers_mut()
        }
        fn blend_shape_count(&self) -> usize {
            self.inner.blend_shape_count()
        }
        fn blend_shape_frame_count(&self, channel: usize) -> usize {
            self.inner.blend_shape_frame_count(channel)
        }
        fn blend_shape_frame_deltas(&self, channel: usize, frame: usize) -> Option<BlendShapeDeltas> {
            self.extractions.fetch_add(1, Ordering::Relaxed);
            self.inner.blend_shape_frame_deltas(channel, frame)
        }
    }

    fn frame(weight: f32, position: Vec3, normal: Option<Vec3>) -> BlendShapeFrame {
        BlendShapeFrame {
            weight,
            deltas: BlendShapeDeltas {
                positions: vec![position; 3],
                normals: normal.map(|n| vec![n; 3]),
                tangents: None,
            },
        }
    }

    fn mesh_with_shapes() -> CountingMesh {
        let mut inner = EditableMesh::from_positions(vec![Vec3::ZERO; 3]);
        inner.add_blend_shape_frame("a", frame(50.0, Vec3::splat(100.0), None));
        // Only the last frame of a channel is ever used
        inner.add_blend_shape_frame("a", frame(100.0, Vec3::X, Some(Vec3::Y)));
        inner.add_blend_shape_frame("b", frame(100.0, Vec3::Z, None));
        CountingMesh {
            inner,
            extractions: AtomicUsize::new(0),
        }
    }

    fn cache() -> SharedBlendShapeCache {
        shared_cache(&BlendShapeCacheConfig::default())
    }

    #[test]
    fn test_weighted_sum_uses_last_frame() {
        let mesh = mesh_with_shapes();
        let cache = cache();
        let mut acc = BlendShapeAccumulator::default();

        assert!(acc.update(&mesh, Some(&[50.0, 25.0]), &cache).unwrap());
        let delta = acc.delta();
        assert_eq!(delta.positions[0], Vec3::new(0.5, 0.0, 0.25));
        assert_eq!(delta.normals[2], Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(delta.tangents[1], Vec3::ZERO);
    }

    #[test]
    fn test_zero_weights_give_zero_delta() {
        let mesh = mesh_with_shapes();
        let cache = cache();
        let mut acc = BlendShapeAccumulator::default();

        // Prime the cache with non-zero deltas first
        acc.update(&mesh, Some(&[100.0, 100.0]), &cache).unwrap();
        assert!(!acc.delta().is_zero());

        assert!(acc.update(&mesh, Some(&[0.0, 0.0]), &cache).unwrap());
        assert!(acc.delta().is_zero());
        assert_eq!(acc.delta().len(), 3);
    }

    #[test]
    fn test_negative_and_missing_weights_skipped() {
        let mesh = mesh_with_shapes();
        let mut acc = BlendShapeAccumulator::default();
        acc.update(&mesh, Some(&[-40.0]), &cache()).unwrap();
        assert!(acc.delta().is_zero());
        assert_eq!(mesh.extractions.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_unchanged_weights_reuse_sum() {
        let mesh = mesh_with_shapes();
        let cache = cache();
        let mut acc = BlendShapeAccumulator::default();

        assert!(acc.update(&mesh, Some(&[30.0, 0.0]), &cache).unwrap());
        let first = acc.delta().clone();
        assert!(!acc.update(&mesh, Some(&[30.0, 0.0]), &cache).unwrap());
        // A shorter weight slice with the same effective weights is unchanged too
        assert!(!acc.update(&mesh, Some(&[30.0]), &cache).unwrap());
        assert_eq!(acc.delta(), &first);

        assert!(acc.update(&mesh, Some(&[30.0, 1.0]), &cache).unwrap());
    }

    #[test]
    fn test_cache_shares_extractions() {
        let mesh = mesh_with_shapes();
        let cache = cache();
        let mut first = BlendShapeAccumulator::default();
        let mut second = BlendShapeAccumulator::default();

        first.update(&mesh, Some(&[10.0, 10.0]), &cache).unwrap();
        second.update(&mesh, Some(&[20.0, 90.0]), &cache).unwrap();
        assert_eq!(mesh.extractions.load(Ordering::Relaxed), 2);

        let guard = cache.lock().unwrap();
        assert!(guard.contains_key(&BlendShapeKey { channel: 0, frame: 1 }));
        assert!(guard.contains_key(&BlendShapeKey { channel: 1, frame: 0 }));
    }

    #[test]
    fn test_stale_cache_entry_is_replaced() {
        let mesh = mesh_with_shapes();
        let cache = cache();
        cache.lock().unwrap().get_or_insert_with(BlendShapeKey { channel: 1, frame: 0 }, || {
            Arc::new(BlendShapeDeltas::zeroed(10))
        });

        let mut acc = BlendShapeAccumulator::default();
        acc.update(&mesh, Some(&[0.0, 100.0]), &cache).unwrap();
        assert_eq!(acc.delta().positions[0], Vec3::Z);
    }

    #[test]
    fn test_mismatched_frame_length_fails() {
        let mut inner = EditableMesh::from_positions(vec![Vec3::ZERO; 3]);
        inner.add_blend_shape_frame(
            "broken",
            BlendShapeFrame {
                weight: 100.0,
                deltas: BlendShapeDeltas::zeroed(2),
            },
        );
        let mut acc = BlendShapeAccumulator::default();
        let err = acc.update(&inner, Some(&[100.0]), &cache()).unwrap_err();
        assert!(matches!(err, BakeError::VertexCountMismatch { expected: 3, actual: 2, .. }));
    }
}
