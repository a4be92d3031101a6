//! Outcome records for single conversions and batch runs

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// A recoverable problem found while converting one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversionWarning {
    /// Faces using this slot were exported without a texture
    UntexturedSlot { slot: u32 },
    /// A BAF bone has no game object of the same name; its channels are omitted
    AnimationBoneMismatch { bone: String },
    /// A clip starts past the last keyframe and was skipped
    ClipOutOfRange { clip: String, start: usize, keyframes: usize },
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UntexturedSlot { slot } => {
                write!(f, "material slot {slot} has no texture; faces exported untextured")
            }
            Self::AnimationBoneMismatch { bone } => {
                write!(f, "animation bone '{bone}' matches no game object; channel omitted")
            }
            Self::ClipOutOfRange { clip, start, keyframes } => write!(
                f,
                "clip '{clip}' starts at frame {start} but the animation has {keyframes} keyframes"
            ),
        }
    }
}

/// What one converter produced for one model
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionReport {
    pub source: PathBuf,
    pub outputs: Vec<PathBuf>,
    pub warnings: Vec<ConversionWarning>,
}

impl ConversionReport {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn warn(&mut self, warning: ConversionWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Fold another report on the same source into this one
    pub fn merge(&mut self, other: ConversionReport) {
        self.outputs.extend(other.outputs);
        for warning in other.warnings {
            self.warn(warning);
        }
    }

    pub fn bone_mismatches(&self) -> impl Iterator<Item = &str> {
        self.warnings.iter().filter_map(|w| match w {
            ConversionWarning::AnimationBoneMismatch { bone } => Some(bone.as_str()),
            _ => None,
        })
    }
}

/// A file the batch could not convert
#[derive(Debug, Clone, Serialize)]
pub struct FailedConversion {
    pub source: PathBuf,
    pub error: String,
}

/// Summary of a directory conversion
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub converted: Vec<ConversionReport>,
    pub failed: Vec<FailedConversion>,
    pub skipped: Vec<PathBuf>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.converted.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn warning_count(&self) -> usize {
        self.converted.iter().map(|r| r.warnings.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_deduplicated() {
        let mut report = ConversionReport::new("a.bgf");
        report.warn(ConversionWarning::UntexturedSlot { slot: 1 });
        report.warn(ConversionWarning::UntexturedSlot { slot: 1 });
        report.warn(ConversionWarning::AnimationBoneMismatch { bone: "tail".into() });

        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.bone_mismatches().collect::<Vec<_>>(), ["tail"]);
    }

    #[test]
    fn test_batch_counts() {
        let mut batch = BatchReport::default();
        let mut report = ConversionReport::new("a.bgf");
        report.warn(ConversionWarning::UntexturedSlot { slot: 0 });
        batch.converted.push(report);
        batch.failed.push(FailedConversion {
            source: "b.bgf".into(),
            error: "truncated".into(),
        });

        assert_eq!(batch.success_count(), 1);
        assert_eq!(batch.failure_count(), 1);
        assert_eq!(batch.warning_count(), 1);
        assert!(!batch.is_clean());
    }
}
