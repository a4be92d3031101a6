//! Models decoder pipeline
//!
//! Ties the pieces together: validate the configuration, prepare the output
//! tree, extract the resource containers, then decode every model and write
//! its Wavefront and glTF projections. Directory runs convert files in
//! parallel with rayon; a failing file is recorded and the rest proceed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bgfkit_core::{Error, ErrorCategory, Result, ResultExt};
use bgfkit_parsers::{BgfFile, ParseOptions};
use rayon::prelude::*;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::error::ExportResult;
use crate::gltf::{AnimationInput, GltfExportOptions, GltfExporter};
use crate::materials::TextureLibrary;
use crate::report::{BatchReport, ConversionReport, FailedConversion};
use crate::paths::write_all_atomic;
use crate::resources::{extract_resources, resource_archives, OutputLayout, RESOURCES_DIR};
use crate::wavefront::{WavefrontObject, WavefrontOptions};

/// Everything a conversion run needs, usually filled from CLI flags
#[derive(Debug, Clone)]
pub struct ModelsDecoderConfig {
    /// Game installation holding `Resources/objects.bin` and `Resources/textures.bin`
    pub game_path: PathBuf,
    /// Root of the output tree
    pub output_path: PathBuf,
    /// Convert only this model; relative names are looked up in `<out>/bgf`
    pub bgf_file: Option<PathBuf>,
    /// Animation merged into the glTF output of `bgf_file`; requires `bgf_file`
    pub baf_file: Option<PathBuf>,
    pub parse: ParseOptions,
    pub wavefront: WavefrontOptions,
    pub gltf: GltfExportOptions,
    /// Model file names (or stems) to leave out, case-insensitive
    pub exclude: Vec<String>,
}

impl ModelsDecoderConfig {
    pub fn new(game_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            game_path: game_path.into(),
            output_path: output_path.into(),
            bgf_file: None,
            baf_file: None,
            parse: ParseOptions::default(),
            wavefront: WavefrontOptions::default(),
            gltf: GltfExportOptions::default(),
            exclude: Vec::new(),
        }
    }

    /// Reject unusable paths before any work starts
    pub fn validate(&self) -> Result<()> {
        if !self.game_path.is_dir() {
            return Err(Error::configuration(format!(
                "game path {} is not a directory",
                self.game_path.display()
            )));
        }
        if self.output_path.exists() && !self.output_path.is_dir() {
            return Err(Error::configuration(format!(
                "output path {} exists and is not a directory",
                self.output_path.display()
            )));
        }
        if let Some(bgf) = &self.bgf_file {
            if !has_extension(bgf, "bgf") {
                return Err(Error::configuration(format!("{} is not a .bgf file", bgf.display())));
            }
        }
        if let Some(baf) = &self.baf_file {
            if self.bgf_file.is_none() {
                return Err(Error::configuration(format!(
                    "animation {} needs a model; pass it together with a BGF file",
                    baf.display()
                )));
            }
            if !has_extension(baf, "baf") {
                return Err(Error::configuration(format!("{} is not a .baf file", baf.display())));
            }
            if !baf.is_file() {
                return Err(Error::FileNotFound(baf.clone()));
            }
        }
        if self.parse.max_nesting_depth == 0 {
            return Err(Error::configuration("nesting depth limit must be at least 1"));
        }
        self.validate_resources()
    }

    /// The texture container is always needed, the model container only for a full run
    fn validate_resources(&self) -> Result<()> {
        let resources = self.game_path.join(RESOURCES_DIR);
        if !resources.is_dir() {
            return Err(Error::configuration(format!(
                "game path {} does not contain a {RESOURCES_DIR} directory",
                self.game_path.display()
            )));
        }
        let (objects, textures) = resource_archives(&self.game_path);
        if !textures.is_file() {
            return Err(Error::configuration(format!("{} not found", textures.display())));
        }
        if self.bgf_file.is_none() && !objects.is_file() {
            return Err(Error::configuration(format!("{} not found", objects.display())));
        }
        Ok(())
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let name = path.file_name().map(|n| n.to_string_lossy().to_lowercase());
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_lowercase());
        self.exclude.iter().any(|pattern| {
            let pattern = pattern.to_lowercase();
            name.as_deref() == Some(pattern.as_str()) || stem.as_deref() == Some(pattern.as_str())
        })
    }
}

/// Progress of a directory run
#[derive(Debug, Clone)]
pub struct BatchProgress<'a> {
    pub current: usize,
    pub total: usize,
    pub file: &'a Path,
}

/// Runs the decode and convert pipeline for one configuration
pub struct ModelsDecoder {
    config: ModelsDecoderConfig,
    layout: OutputLayout,
}

impl ModelsDecoder {
    /// Validate `config`; nothing touches the disk yet
    pub fn new(config: ModelsDecoderConfig) -> Result<Self> {
        config.validate()?;
        let layout = OutputLayout::new(&config.output_path);
        Ok(Self { config, layout })
    }

    pub fn config(&self) -> &ModelsDecoderConfig {
        &self.config
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn run(&self) -> Result<BatchReport> {
        self.run_with_progress(|_| {})
    }

    /// Prepare the output tree, extract resources and convert
    pub fn run_with_progress<F>(&self, progress: F) -> Result<BatchReport>
    where
        F: Fn(&BatchProgress<'_>) + Send + Sync,
    {
        self.layout
            .create_all()
            .with_context(|| format!("creating output tree at {}", self.layout.root.display()))?;

        let extracted = extract_resources(&self.config.game_path, &self.layout).context("extracting resources")?;
        info!(files = extracted, "Resources ready");

        let textures = Arc::new(TextureLibrary::scan(self.layout.texture_dir()));

        let animation = match &self.config.baf_file {
            Some(path) => Some(
                AnimationInput::load(path).with_context(|| format!("loading animation {}", path.display()))?,
            ),
            None => None,
        };

        match &self.config.bgf_file {
            Some(bgf) => {
                let path = self.resolve_bgf_file(bgf)?;
                let bgf_dir = self.layout.bgf_dir();
                let base = if path.starts_with(&bgf_dir) {
                    bgf_dir
                } else {
                    path.parent().map(Path::to_path_buf).unwrap_or_default()
                };
                progress(&BatchProgress {
                    current: 1,
                    total: 1,
                    file: &path,
                });
                let report = self
                    .convert_file(&path, &base, &textures, animation.as_ref())
                    .map_err(|e| Error::from(e).with_path(&path))
                    .with_context(|| format!("converting {}", path.display()))?;
                Ok(BatchReport {
                    converted: vec![report],
                    ..BatchReport::default()
                })
            }
            None => Ok(self.convert_directory(&self.layout.bgf_dir(), &textures, animation.as_ref(), progress)),
        }
    }

    fn resolve_bgf_file(&self, bgf: &Path) -> Result<PathBuf> {
        if bgf.is_file() {
            return Ok(bgf.to_path_buf());
        }
        let extracted = self.layout.bgf_dir().join(bgf);
        if extracted.is_file() {
            return Ok(extracted);
        }
        Err(Error::FileNotFound(bgf.to_path_buf()))
    }

    /// Decode one model and write both projections
    ///
    /// Outputs mirror the position of `path` below `base`. Both documents are
    /// built in memory first, so a model that fails leaves no files behind.
    pub fn convert_file(
        &self,
        path: &Path,
        base: &Path,
        textures: &Arc<TextureLibrary>,
        animation: Option<&AnimationInput>,
    ) -> ExportResult<ConversionReport> {
        let file = BgfFile::from_file(path, &self.config.parse)?;

        let relative_parent = path
            .strip_prefix(base)
            .ok()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        let (wavefront, mut report) = WavefrontObject::from_bgf_file(&file, &self.config.wavefront)?;
        let obj_dir = self.layout.obj_dir().join(&relative_parent);
        let mut pending = wavefront.render(&obj_dir, &stem, textures);

        let mut exporter = GltfExporter::new(self.config.gltf.clone()).with_textures(Arc::clone(textures));
        let gltf_path = self.layout.gltf_dir().join(&relative_parent).join(format!("{stem}.gltf"));
        let (gltf_files, gltf_report) = exporter.render(&file, animation, gltf_path)?;
        report.merge(gltf_report);
        pending.extend(gltf_files);

        report.outputs = write_all_atomic(&pending)?;

        info!(
            file = %path.display(),
            objects = file.all_objects().count(),
            warnings = report.warnings.len(),
            "Converted model"
        );
        Ok(report)
    }

    /// Convert every `.bgf` file below `dir` in parallel
    pub fn convert_directory<F>(
        &self,
        dir: &Path,
        textures: &Arc<TextureLibrary>,
        animation: Option<&AnimationInput>,
        progress: F,
    ) -> BatchReport
    where
        F: Fn(&BatchProgress<'_>) + Send + Sync,
    {
        let (files, skipped): (Vec<PathBuf>, Vec<PathBuf>) =
            find_bgf_files(dir).into_iter().partition(|p| !self.config.is_excluded(p));
        for path in &skipped {
            info!(file = %path.display(), "Skipping excluded model");
        }

        let total = files.len();
        let processed = AtomicUsize::new(0);
        let cancel = &self.config.parse.cancel;

        let outcomes: Vec<Outcome> = files
            .par_iter()
            .map(|path| {
                if cancel.is_cancelled() {
                    return Outcome::Cancelled;
                }
                let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
                progress(&BatchProgress { current, total, file: path });

                match self.convert_file(path, dir, textures, animation) {
                    Ok(report) => Outcome::Converted(report),
                    Err(e) => {
                        let e = Error::from(e).with_path(path);
                        if e.category() == ErrorCategory::Cancelled {
                            return Outcome::Cancelled;
                        }
                        error!(file = %path.display(), error = %e, "Model conversion failed");
                        Outcome::Failed(FailedConversion {
                            source: path.clone(),
                            error: e.to_string(),
                        })
                    }
                }
            })
            .collect();

        let mut report = BatchReport {
            skipped,
            ..BatchReport::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Converted(converted) => report.converted.push(converted),
                Outcome::Failed(failed) => report.failed.push(failed),
                Outcome::Cancelled => report.cancelled = true,
            }
        }

        if report.cancelled {
            warn!(converted = report.success_count(), "Batch cancelled");
        }
        info!(
            converted = report.success_count(),
            failed = report.failure_count(),
            skipped = report.skipped.len(),
            warnings = report.warning_count(),
            "Batch finished"
        );
        report
    }
}

enum Outcome {
    Converted(ConversionReport),
    Failed(FailedConversion),
    Cancelled,
}

/// Find all .bgf files in a directory recursively, sorted
pub fn find_bgf_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), "bgf"))
        .map(walkdir::DirEntry::into_path)
        .collect();

    files.sort();
    files
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
