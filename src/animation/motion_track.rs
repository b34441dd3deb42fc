//! 动画轨道
//!
//! 单个骨骼或 Morph 的关键帧序列，始终按帧号升序且帧号唯一。

use std::collections::HashMap;

use super::keyframe::{BoneKeyframe, Keyframe, MorphKeyframe};

/// 关键帧轨道
#[derive(Debug, Clone)]
pub struct MotionTrack<K> {
    keyframes: Vec<K>,
}

pub type BoneMotionTrack = MotionTrack<BoneKeyframe>;
pub type MorphMotionTrack = MotionTrack<MorphKeyframe>;

impl<K: Keyframe> MotionTrack<K> {
    pub fn new() -> Self {
        Self {
            keyframes: Vec::new(),
        }
    }

    /// 插入关键帧，同帧号的旧关键帧被替换并返回
    pub fn insert_keyframe(&mut self, keyframe: K) -> Option<K> {
        let frame = keyframe.frame();
        match self.keyframes.binary_search_by_key(&frame, K::frame) {
            Ok(i) => Some(std::mem::replace(&mut self.keyframes[i], keyframe)),
            Err(i) => {
                self.keyframes.insert(i, keyframe);
                None
            }
        }
    }

    pub fn remove_keyframe(&mut self, frame: u32) -> Option<K> {
        self.keyframes
            .binary_search_by_key(&frame, K::frame)
            .ok()
            .map(|i| self.keyframes.remove(i))
    }

    /// 查找精确帧
    pub fn find(&self, frame: u32) -> Option<&K> {
        self.keyframes
            .binary_search_by_key(&frame, K::frame)
            .ok()
            .map(|i| &self.keyframes[i])
    }

    pub fn keyframes(&self) -> &[K] {
        &self.keyframes
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn max_frame_index(&self) -> u32 {
        self.keyframes.last().map(K::frame).unwrap_or(0)
    }
}

impl<K: Keyframe> Default for MotionTrack<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Keyframe> FromIterator<K> for MotionTrack<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut track = Self::new();
        for keyframe in iter {
            track.insert_keyframe(keyframe);
        }
        track
    }
}

/// 动作数据：按名称索引的骨骼 / Morph 轨道
#[derive(Debug, Clone, Default)]
pub struct MotionData {
    pub name: String,
    bone_tracks: Vec<BoneMotionTrack>,
    bone_index: HashMap<String, usize>,
    morph_tracks: Vec<MorphMotionTrack>,
    morph_index: HashMap<String, usize>,
}

impl MotionData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn insert_bone_keyframe(&mut self, bone: &str, keyframe: BoneKeyframe) {
        let index = track_slot(&mut self.bone_tracks, &mut self.bone_index, bone);
        self.bone_tracks[index].insert_keyframe(keyframe);
    }

    pub fn insert_morph_keyframe(&mut self, morph: &str, keyframe: MorphKeyframe) {
        let index = track_slot(&mut self.morph_tracks, &mut self.morph_index, morph);
        self.morph_tracks[index].insert_keyframe(keyframe);
    }

    pub fn bone_track(&self, name: &str) -> Option<&BoneMotionTrack> {
        self.bone_index.get(name).map(|&i| &self.bone_tracks[i])
    }

    pub fn morph_track(&self, name: &str) -> Option<&MorphMotionTrack> {
        self.morph_index.get(name).map(|&i| &self.morph_tracks[i])
    }

    /// 按轨道序号取骨骼轨道（序号来自 `bone_channels`）
    pub fn bone_track_at(&self, index: usize) -> Option<&BoneMotionTrack> {
        self.bone_tracks.get(index)
    }

    pub fn morph_track_at(&self, index: usize) -> Option<&MorphMotionTrack> {
        self.morph_tracks.get(index)
    }

    /// 骨骼轨道名 → 轨道序号
    pub fn bone_channels(&self) -> &HashMap<String, usize> {
        &self.bone_index
    }

    pub fn morph_channels(&self) -> &HashMap<String, usize> {
        &self.morph_index
    }

    /// 最后一个关键帧的帧号
    pub fn duration(&self) -> u32 {
        let bones = self.bone_tracks.iter().map(BoneMotionTrack::max_frame_index);
        let morphs = self.morph_tracks.iter().map(MorphMotionTrack::max_frame_index);
        bones.chain(morphs).max().unwrap_or(0)
    }
}

fn track_slot<K: Keyframe>(
    tracks: &mut Vec<MotionTrack<K>>,
    index: &mut HashMap<String, usize>,
    name: &str,
) -> usize {
    if let Some(&i) = index.get(name) {
        return i;
    }
    tracks.push(MotionTrack::new());
    index.insert(name.to_owned(), tracks.len() - 1);
    tracks.len() - 1
}
