//! Skin and animation merge
//!
//! BAF bones are matched to glTF nodes by name. Matched nodes become the
//! joints of a single skin, and every INI clip becomes one glTF animation
//! sampled at the clip's keyframes. Bones without a node are reported and
//! skipped; they never fail the conversion.

use std::path::Path;

use bgfkit_core::types::IDENTITY_ROTATION;
use bgfkit_parsers::{AnimationClip, BafFile, BafIniFile, ParseResult};
use tracing::{debug, warn};

use super::exporter::GltfExporter;
use super::{Animation, AnimationChannel, AnimationSampler, AnimationTarget, Gltf, Skin};
use crate::coords;
use crate::report::{ConversionReport, ConversionWarning};

/// Largest per-component drift still treated as the rest translation
const TRANSLATION_EPSILON: f32 = 1e-5;

/// An animation and the clip table that slices it
#[derive(Debug, Clone)]
pub struct AnimationInput {
    pub baf: BafFile,
    pub ini: BafIniFile,
}

impl AnimationInput {
    pub fn new(baf: BafFile, ini: BafIniFile) -> Self {
        Self { baf, ini }
    }

    /// Load a BAF file and its `.ini` sidecar
    ///
    /// A missing sidecar yields a single clip over every keyframe.
    pub fn load(baf_path: impl AsRef<Path>) -> ParseResult<Self> {
        let baf_path = baf_path.as_ref();
        let baf = BafFile::from_file(baf_path)?;
        let ini = BafIniFile::for_animation(baf_path, baf.keyframe_count())?;
        Ok(Self { baf, ini })
    }
}

impl GltfExporter {
    /// Add the skin and one animation per clip to a built scene
    pub(super) fn add_animation(&mut self, gltf: &mut Gltf, input: &AnimationInput, report: &mut ConversionReport) {
        let baf = &input.baf;

        // (bone, node) for every bone with a node of the same name, in bone order
        let mut joints: Vec<(usize, usize)> = Vec::with_capacity(baf.bone_count());
        for (bone, name) in baf.bones.iter().enumerate() {
            match gltf.node_by_name(name) {
                Some(node) => joints.push((bone, node)),
                None => {
                    warn!(
                        animation = %baf.source.display(),
                        bone = %name,
                        "Animation bone matches no game object, omitting its channels"
                    );
                    report.warn(ConversionWarning::AnimationBoneMismatch { bone: name.clone() });
                }
            }
        }

        if joints.is_empty() {
            debug!(animation = %baf.source.display(), "No animation bone matched, skipping skin");
            return;
        }

        let inverse_bind: Vec<[f32; 16]> = joints
            .iter()
            .map(|&(_, node)| self.node_world[node].inverse().to_cols_array())
            .collect();
        let inverse_bind_matrices = self.push_floats(&inverse_bind, "MAT4", None, None);

        gltf.skins.push(Skin {
            name: baf.source.file_stem().map(|s| s.to_string_lossy().into_owned()),
            inverse_bind_matrices,
            joints: joints.iter().map(|&(_, node)| node).collect(),
            skeleton: None,
        });

        for clip in &input.ini.clips {
            if let Some(animation) = self.add_clip(gltf, baf, clip, &joints, report) {
                gltf.animations.push(animation);
            }
        }
    }

    fn add_clip(
        &mut self,
        gltf: &Gltf,
        baf: &BafFile,
        clip: &AnimationClip,
        joints: &[(usize, usize)],
        report: &mut ConversionReport,
    ) -> Option<Animation> {
        let keyframes = baf.keyframe_count();
        if clip.start >= keyframes {
            warn!(clip = %clip.name, start = clip.start, keyframes, "Animation clip starts past the last keyframe");
            report.warn(ConversionWarning::ClipOutOfRange {
                clip: clip.name.clone(),
                start: clip.start,
                keyframes,
            });
            return None;
        }

        let end = clip.end.clamp(clip.start, keyframes - 1);
        let frames = &baf.keyframes[clip.start..=end];

        // Clip time starts at zero
        let base = frames[0].time;
        let times: Vec<f32> = frames.iter().map(|frame| frame.time - base).collect();
        let min = times.iter().copied().fold(f32::MAX, f32::min);
        let max = times.iter().copied().fold(f32::MIN, f32::max);
        let input = self.push_floats(&times, "SCALAR", Some((vec![min], vec![max])), None);

        let mut channels = Vec::new();
        let mut samplers = Vec::new();

        for &(bone, node) in joints {
            let rotations: Vec<[f32; 4]> = frames
                .iter()
                .map(|frame| {
                    frame
                        .bones
                        .get(bone)
                        .map_or(IDENTITY_ROTATION, |key| coords::unit_rotation(coords::rotation(key.rotation)))
                })
                .collect();
            let output = self.push_floats(&rotations, "VEC4", None, None);
            push_channel(&mut channels, &mut samplers, input, output, node, "rotation");

            let rest = gltf.nodes[node].translation.unwrap_or([0.0; 3]);
            let translations: Vec<[f32; 3]> = frames
                .iter()
                .map(|frame| {
                    frame
                        .bones
                        .get(bone)
                        .map_or(rest, |key| coords::position(key.translation))
                })
                .collect();
            if translations.iter().any(|t| moved(t, &rest)) {
                let output = self.push_floats(&translations, "VEC3", None, None);
                push_channel(&mut channels, &mut samplers, input, output, node, "translation");
            }
        }

        debug!(clip = %clip.name, frames = frames.len(), channels = channels.len(), "Added animation clip");

        Some(Animation {
            name: Some(clip.name.clone()),
            channels,
            samplers,
        })
    }
}

fn push_channel(
    channels: &mut Vec<AnimationChannel>,
    samplers: &mut Vec<AnimationSampler>,
    input: usize,
    output: usize,
    node: usize,
    path: &str,
) {
    let sampler = samplers.len();
    samplers.push(AnimationSampler {
        input,
        output,
        interpolation: Some("LINEAR".to_string()),
    });
    channels.push(AnimationChannel {
        sampler,
        target: AnimationTarget {
            node,
            path: path.to_string(),
        },
    });
}

fn moved(a: &[f32; 3], b: &[f32; 3]) -> bool {
    a.iter().zip(b).any(|(x, y)| (x - y).abs() > TRANSLATION_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::GltfExportOptions;
    use bgfkit_core::Transform;
    use bgfkit_parsers::{
        BafKeyframe, BgfFile, BgfFooter, BgfGameObject, BgfHeader, BgfMappingObject, BoneKey,
    };
    use std::path::PathBuf;

    fn skeleton() -> BgfFile {
        let mut root = BgfGameObject::new("root");
        let mut arm = BgfGameObject::new("arm");
        arm.transform = Transform::from_position([0.0, 1.0, 0.0]);
        root.children.push(arm);

        BgfFile {
            source: PathBuf::from("figure.bgf"),
            header: BgfHeader::default(),
            textures: Vec::new(),
            game_objects: vec![root],
            mapping: BgfMappingObject::default(),
            gap: Vec::new(),
            footer: BgfFooter::Reduced { object_count: 1 },
        }
    }

    fn animation(bones: &[&str], frames: usize, arm_lift: f32) -> AnimationInput {
        let baf = BafFile {
            source: PathBuf::from("wave.baf"),
            version: 1,
            bones: bones.iter().map(|b| b.to_string()).collect(),
            keyframes: (0..frames)
                .map(|i| BafKeyframe {
                    time: 1.0 + i as f32 * 0.5,
                    bones: bones
                        .iter()
                        .map(|&bone| BoneKey {
                            translation: if bone == "arm" {
                                [0.0, 1.0 + arm_lift * i as f32, 0.0]
                            } else {
                                [0.0; 3]
                            },
                            rotation: [0.0, 0.0, 0.0, 1.0],
                        })
                        .collect(),
                })
                .collect(),
        };
        let ini = BafIniFile::whole_range(frames);
        AnimationInput::new(baf, ini)
    }

    #[test]
    fn test_rest_translation_omitted() {
        let mut exporter = GltfExporter::new(GltfExportOptions::default());
        let (gltf, _) = exporter.build(&skeleton(), Some(&animation(&["root", "arm"], 4, 0.0))).unwrap();

        assert_eq!(gltf.skins[0].joints, [0, 1]);
        let paths: Vec<&str> = gltf.animations[0]
            .channels
            .iter()
            .map(|c| c.target.path.as_str())
            .collect();
        assert_eq!(paths, ["rotation", "rotation"]);
    }

    #[test]
    fn test_moving_bone_gets_translation() {
        let mut exporter = GltfExporter::new(GltfExportOptions::default());
        let (gltf, _) = exporter.build(&skeleton(), Some(&animation(&["root", "arm"], 4, 0.25))).unwrap();

        let channels = &gltf.animations[0].channels;
        assert_eq!(channels.len(), 3);
        assert!(channels
            .iter()
            .any(|c| c.target.node == 1 && c.target.path == "translation"));
    }

    #[test]
    fn test_clip_times_start_at_zero() {
        let mut exporter = GltfExporter::new(GltfExportOptions::default());
        let (gltf, _) = exporter.build(&skeleton(), Some(&animation(&["root"], 3, 0.0))).unwrap();

        let sampler = &gltf.animations[0].samplers[0];
        let times = &gltf.accessors[sampler.input];
        assert_eq!(times.count, 3);
        assert_eq!(times.min.as_deref(), Some(&[0.0][..]));
        assert_eq!(times.max.as_deref(), Some(&[1.0][..]));
    }

    #[test]
    fn test_inverse_bind_matrices_undo_world() {
        let mut exporter = GltfExporter::new(GltfExportOptions::default());
        let (gltf, _) = exporter.build(&skeleton(), Some(&animation(&["arm"], 2, 0.0))).unwrap();

        let accessor = &gltf.accessors[gltf.skins[0].inverse_bind_matrices];
        assert_eq!(accessor.accessor_type, "MAT4");
        let view = &gltf.buffer_views[accessor.buffer_view.unwrap()];
        let bytes = &exporter.binary_data()[view.byte_offset.unwrap()..][..view.byte_length];
        let translation_y = f32::from_le_bytes([bytes[52], bytes[53], bytes[54], bytes[55]]);
        // The arm sits one unit up, so its inverse bind moves one unit down
        assert!((translation_y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_clip_skipped() {
        let mut input = animation(&["root"], 3, 0.0);
        input.ini = BafIniFile::parse("[late]\nstart = 10\nend = 12\n");

        let mut exporter = GltfExporter::new(GltfExportOptions::default());
        let (gltf, report) = exporter.build(&skeleton(), Some(&input)).unwrap();
        assert!(gltf.animations.is_empty());
        assert!(matches!(report.warnings[0], ConversionWarning::ClipOutOfRange { .. }));
    }

    #[test]
    fn test_no_matching_bone_means_no_skin() {
        let mut exporter = GltfExporter::new(GltfExportOptions::default());
        let (gltf, report) = exporter.build(&skeleton(), Some(&animation(&["tail"], 2, 0.0))).unwrap();

        assert!(gltf.skins.is_empty());
        assert!(gltf.animations.is_empty());
        assert_eq!(report.bone_mismatches().collect::<Vec<_>>(), ["tail"]);
    }
}
