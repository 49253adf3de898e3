//! Animation track merging
//!
//! Imported animations store position, rotation and scale keys as independent
//! tracks. The engine wants one keyframe per distinct key time with all three
//! values filled in, arranged as a circular chain per bone.

use glam::{Quat, Vec3};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::scene::{ImportedAnimation, ImportedScene, NodeTrack, QuatKey, VectorKey};
use crate::skeleton::BoneNodes;

/// Durations at or below this are treated as zero
pub const TIME_EPSILON: f32 = f32::EPSILON;

/// Full bone pose at one point in time
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Keyframe {
    /// Interpolate between two keyframes, `factor` in [0, 1]
    pub fn blend(&self, other: &Keyframe, time: f32, factor: f32) -> Keyframe {
        Keyframe {
            time,
            position: self.position.lerp(other.position, factor),
            rotation: self.rotation.slerp(other.rotation, factor),
            scale: self.scale.lerp(other.scale, factor),
        }
    }
}

/// Circular chain of keyframes ordered by time.
///
/// The successor of the last frame is the first frame and the predecessor of
/// the first frame is the last.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyframeChain {
    frames: Vec<Keyframe>,
}

impl KeyframeChain {
    /// Returns `None` for an empty frame list
    pub fn new(frames: Vec<Keyframe>) -> Option<Self> {
        if frames.is_empty() {
            None
        } else {
            Some(Self { frames })
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Keyframe] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Keyframe> {
        self.frames.get(index)
    }

    pub fn first(&self) -> &Keyframe {
        &self.frames[0]
    }

    pub fn last(&self) -> &Keyframe {
        &self.frames[self.frames.len() - 1]
    }

    pub fn next(&self, index: usize) -> usize {
        (index + 1) % self.frames.len()
    }

    pub fn prev(&self, index: usize) -> usize {
        (index + self.frames.len() - 1) % self.frames.len()
    }

    /// Time between the first and last frame
    pub fn duration(&self) -> f32 {
        self.last().time - self.first().time
    }

    /// Sample the chain at `time`, looping over [`KeyframeChain::duration`]
    pub fn sample(&self, time: f32) -> Keyframe {
        let duration = self.duration();
        if self.frames.len() == 1 || duration <= 0.0 {
            return *self.first();
        }

        let local = self.first().time + time.rem_euclid(duration);
        let mut index = 0;
        loop {
            let next = self.next(index);
            if next == 0 {
                return *self.last();
            }
            let (a, b) = (&self.frames[index], &self.frames[next]);
            if b.time > local {
                let factor = ((local - a.time) / (b.time - a.time)).clamp(0.0, 1.0);
                return a.blend(b, local, factor);
            }
            index = next;
        }
    }

    /// Replace frame times with 0, 1, 2, ...
    fn retime_by_index(&mut self) {
        for (i, frame) in self.frames.iter_mut().enumerate() {
            frame.time = i as f32;
        }
    }
}

/// Converted animation: one shared chain per animated bone
#[derive(Clone, Debug, Default)]
pub struct Animation {
    name: String,
    duration: f32,
    chains: BTreeMap<usize, Arc<KeyframeChain>>,
}

impl Animation {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
            chains: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Duration declared by the source file
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Longest chain duration
    pub fn length(&self) -> f32 {
        self.chains
            .values()
            .map(|c| c.duration())
            .fold(0.0, f32::max)
    }

    pub fn chain(&self, bone: usize) -> Option<&Arc<KeyframeChain>> {
        self.chains.get(&bone)
    }

    /// Animated bones with their chains, ordered by bone index
    pub fn chains(&self) -> impl Iterator<Item = (usize, &Arc<KeyframeChain>)> {
        self.chains.iter().map(|(&bone, chain)| (bone, chain))
    }

    pub fn animated_bone_count(&self) -> usize {
        self.chains.len()
    }

    /// Pose of `bone` at `time`, if the bone is animated
    pub fn sample(&self, bone: usize, time: f32) -> Option<Keyframe> {
        self.chains.get(&bone).map(|c| c.sample(time))
    }

    /// Attach `chain` to `bone`; an existing chain for the bone is kept
    pub fn insert_chain(&mut self, bone: usize, chain: Arc<KeyframeChain>) {
        self.chains.entry(bone).or_insert(chain);
    }
}

trait TrackKey {
    type Value: Copy;
    fn time(&self) -> f32;
    fn value(&self) -> Self::Value;
    fn blend(a: Self::Value, b: Self::Value, factor: f32) -> Self::Value;
}

impl TrackKey for VectorKey {
    type Value = Vec3;

    fn time(&self) -> f32 {
        self.time
    }

    fn value(&self) -> Vec3 {
        self.value
    }

    fn blend(a: Vec3, b: Vec3, factor: f32) -> Vec3 {
        a.lerp(b, factor)
    }
}

impl TrackKey for QuatKey {
    type Value = Quat;

    fn time(&self) -> f32 {
        self.time
    }

    fn value(&self) -> Quat {
        self.value
    }

    fn blend(a: Quat, b: Quat, factor: f32) -> Quat {
        a.slerp(b, factor)
    }
}

/// Position in one key track during merging
struct TrackCursor<'a, K> {
    keys: &'a [K],
    current: usize,
}

impl<'a, K: TrackKey> TrackCursor<'a, K> {
    fn new(keys: &'a [K]) -> Self {
        Self { keys, current: 0 }
    }

    fn first_time(&self) -> Option<f32> {
        self.keys.first().map(K::time)
    }

    /// Time of the key after the current one; `None` once on the final key
    /// (empty tracks count as being on their final key)
    fn next_time(&self) -> Option<f32> {
        self.keys.get(self.current + 1).map(K::time)
    }

    fn value_at(&self, time: f32, default: K::Value) -> K::Value {
        let Some(key) = self.keys.get(self.current) else {
            return default;
        };
        let Some(next) = self.keys.get(self.current + 1) else {
            return key.value();
        };

        let (t0, t1) = (key.time(), next.time());
        // Unclamped: a track starting after `time` extrapolates backwards
        let factor = if t1 > t0 { (time - t0) / (t1 - t0) } else { 0.0 };
        K::blend(key.value(), next.value(), factor)
    }

    /// Step onto the next key if it sits exactly at `time`
    fn advance_to(&mut self, time: f32) -> bool {
        let hit = self.next_time() == Some(time);
        if hit {
            self.current += 1;
        }
        hit
    }
}

fn min_time(times: [Option<f32>; 3]) -> Option<f32> {
    times.into_iter().flatten().reduce(f32::min)
}

/// Merge the three key tracks of one node into a single keyframe chain.
///
/// Emits one keyframe per distinct key time across the tracks, with times
/// made relative to the earliest key. Returns `None` when every track is
/// empty.
pub fn merge_node_track(track: &NodeTrack) -> Option<KeyframeChain> {
    let mut position = TrackCursor::new(&track.position_keys);
    let mut rotation = TrackCursor::new(&track.rotation_keys);
    let mut scale = TrackCursor::new(&track.scale_keys);

    let start = min_time([position.first_time(), rotation.first_time(), scale.first_time()])?;
    let mut time = start;
    let mut frames = Vec::new();

    loop {
        frames.push(Keyframe {
            time: time - start,
            position: position.value_at(time, Vec3::ZERO),
            rotation: rotation.value_at(time, Quat::IDENTITY),
            scale: scale.value_at(time, Vec3::ONE),
        });

        let Some(next) = min_time([position.next_time(), rotation.next_time(), scale.next_time()])
        else {
            break;
        };
        time = next;
        // `|` rather than `||`: every cursor sitting on `time` steps forward
        let advanced =
            position.advance_to(time) | rotation.advance_to(time) | scale.advance_to(time);
        if !advanced {
            // Only a NaN key time compares unequal to itself
            tracing::warn!(
                "Track for node '{}' has a non-finite key time, truncating after {} frames",
                track.node_name,
                frames.len()
            );
            break;
        }
    }

    KeyframeChain::new(frames)
}

/// Convert one imported animation against the bone list.
///
/// Returns `None` for animations whose declared duration is zero. Tracks
/// targeting nodes outside the skeleton are ignored. A node backing several
/// bones gets a single chain shared by all of them.
pub fn convert_animation(
    scene: &ImportedScene,
    bone_nodes: &BoneNodes,
    imported: &ImportedAnimation,
) -> Option<Animation> {
    if imported.duration.abs() <= TIME_EPSILON {
        tracing::debug!("Skipping zero-length animation '{}'", imported.name);
        return None;
    }

    let mut merged: Vec<(&[usize], KeyframeChain)> = Vec::new();
    for track in &imported.tracks {
        let bones = scene
            .find_node(&track.node_name)
            .map(|node| bone_nodes.bones_of(node))
            .unwrap_or(&[]);
        if bones.is_empty() {
            tracing::debug!(
                "Animation '{}': node '{}' is not a bone, ignoring track",
                imported.name,
                track.node_name
            );
            continue;
        }
        if let Some(chain) = merge_node_track(track) {
            merged.push((bones, chain));
        }
    }

    let length = merged
        .iter()
        .map(|(_, chain)| chain.duration())
        .fold(0.0, f32::max);
    if length <= TIME_EPSILON && !merged.is_empty() {
        tracing::debug!("Animation '{}' has zero length, re-timing frames by index", imported.name);
        for (_, chain) in &mut merged {
            chain.retime_by_index();
        }
    }

    let mut animation = Animation::new(imported.name.clone(), imported.duration);
    for (bones, chain) in merged {
        let chain = Arc::new(chain);
        for &bone in bones {
            animation.insert_chain(bone, Arc::clone(&chain));
        }
    }

    tracing::debug!(
        "Converted animation '{}': {} bones, length {}",
        animation.name(),
        animation.animated_bone_count(),
        animation.length()
    );

    Some(animation)
}
