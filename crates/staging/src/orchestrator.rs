//! Tier orchestration: strictly sequential staging of declared content.
//!
//! Tiers run in their fixed order and content kinds run in declaration
//! order inside each tier; at most one (tier, dataset) spatial index is
//! alive at a time. The only concurrency is inside the bulk transfer
//! collaborator. There is no mid-run cancellation: fatal errors terminate
//! the run, and the missing-files policy decides whether lookup misses are
//! fatal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use aoi_common::{
    ColumnarFile, HdfDataset, RasterDataset, StageError, StageResult, TabularFile, Tier,
    VectorFile,
};
use footprint::{
    build_hdf_index, build_raster_index, AoiGeometry, CoordinateArrayReader, FilterOutcome,
};

use crate::columnar;
use crate::directive::ProcessingDirective;
use crate::locate;
use crate::store::{DataStore, LocalStore, RemoteStore};
use crate::transfer::{self, CopyOutcome};
use crate::vector;

/// Aggregate counts for one staging run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub granules_copied: usize,
    pub sidecars_copied: usize,
    pub features_kept: usize,
    pub rows_kept: usize,
    pub files_copied: usize,
    pub items_skipped: usize,
    pub reference_objects: usize,
}

/// Drives one staging run from a validated directive.
pub struct Orchestrator {
    directive: ProcessingDirective,
    store: Arc<dyn DataStore>,
    aoi: AoiGeometry,
    output_base: PathBuf,
    hdf_reader: Option<Arc<dyn CoordinateArrayReader>>,
    scratch: tempfile::TempDir,
}

impl Orchestrator {
    /// Build a run. The store implementation is chosen here, once: remote
    /// when the directive carries remote settings, local otherwise. The
    /// directive is re-validated first so no I/O happens for a bad one.
    pub fn new(directive: ProcessingDirective, workspace: &Path) -> StageResult<Self> {
        directive.validate()?;

        let store: Arc<dyn DataStore> = match &directive.remote {
            Some(remote) => Arc::new(RemoteStore::new(remote)?),
            None => {
                let root = directive.source_root.as_deref().unwrap_or(".");
                let root_path = if Path::new(root).is_absolute() {
                    PathBuf::from(root)
                } else {
                    workspace.join(root)
                };
                Arc::new(LocalStore::new(root_path))
            }
        };

        let aoi = AoiGeometry::from_path(&workspace.join(&directive.aoi))?;
        let output_base = workspace.join(&directive.output_base);
        let scratch = tempfile::tempdir().map_err(StageError::Io)?;

        Ok(Self {
            directive,
            store,
            aoi,
            output_base,
            hdf_reader: default_hdf_reader(),
            scratch,
        })
    }

    /// Replace the HDF coordinate-array reader (tests, alternate backends).
    pub fn with_hdf_reader(mut self, reader: Arc<dyn CoordinateArrayReader>) -> Self {
        self.hdf_reader = Some(reader);
        self
    }

    /// Run the whole directive and return aggregate counts.
    pub async fn run(&self) -> StageResult<RunSummary> {
        self.ensure_hdf_reader()?;
        let mut summary = RunSummary::default();

        for tier in Tier::ALL {
            let Some(content) = self.directive.tiers.get(&tier) else {
                continue;
            };
            info!(tier = %tier, "processing tier");
            let tier_root = self.directive.tier_root(tier);

            for dataset in &content.raster {
                self.stage_raster(tier, &tier_root, *dataset, &mut summary)
                    .await?;
            }
            for dataset in &content.hdf {
                self.stage_hdf(tier, &tier_root, *dataset, &mut summary)
                    .await?;
            }
            for file in &content.vector {
                self.stage_vector(tier, &tier_root, file, &mut summary)
                    .await?;
            }
            for file in &content.table {
                self.stage_table(tier, &tier_root, file, &mut summary)
                    .await?;
            }
            for file in &content.columnar {
                self.stage_columnar(tier, &tier_root, file, &mut summary)
                    .await?;
            }
        }

        if let Some(reference) = &self.directive.reference {
            let dest = self.output_base.join(Tier::Reference.as_str());
            let mirror = transfer::mirror_tree(self.store.as_ref(), reference, &dest).await?;
            summary.reference_objects = mirror.copied;
        }

        info!(?summary, "staging run complete");
        Ok(summary)
    }

    fn ensure_hdf_reader(&self) -> StageResult<()> {
        let declares_hdf = self.directive.tiers.values().any(|c| !c.hdf.is_empty());
        if declares_hdf && self.hdf_reader.is_none() {
            return Err(StageError::Configuration(
                "HDF datasets are declared but no coordinate-array reader is available \
                 (build with the hdf-native feature)"
                    .into(),
            ));
        }
        Ok(())
    }

    async fn stage_raster(
        &self,
        tier: Tier,
        tier_root: &str,
        dataset: RasterDataset,
        summary: &mut RunSummary,
    ) -> StageResult<()> {
        let date = self.directive.date;
        let granules =
            match locate::rasters_for_date(self.store.as_ref(), tier_root, dataset, date).await {
                Ok(granules) => granules,
                Err(StageError::LookupMiss(message)) => {
                    return self.note_miss(tier, &message, summary);
                }
                Err(other) => return Err(other),
            };

        if granules.is_empty() {
            return self.note_miss(tier, &format!("no {dataset} granules for {date}"), summary);
        }

        let mut batch = Vec::with_capacity(granules.len());
        for granule in &granules {
            let data = self.store.get(&granule.path).await?;
            batch.push((granule.path.clone(), data));
        }
        let index = build_raster_index(&batch)?;

        match self.aoi.filter(&index) {
            FilterOutcome::Matches(paths) => {
                info!(tier = %tier, dataset = %dataset, matches = paths.len(), "copying granules");
                for path in &paths {
                    self.copy_granule(tier, dataset.as_str(), path, summary)
                        .await?;
                    if let Some(suffix) = dataset.sidecar_extension() {
                        self.copy_sidecar(tier, dataset.as_str(), path, suffix, summary)
                            .await;
                    }
                }
            }
            FilterOutcome::NoIntersection => {
                info!(tier = %tier, dataset = %dataset, "no granules intersect the AOI");
            }
            FilterOutcome::NoCandidates => {
                info!(tier = %tier, dataset = %dataset, "no granules to filter");
            }
        }
        Ok(())
    }

    async fn stage_hdf(
        &self,
        tier: Tier,
        tier_root: &str,
        dataset: HdfDataset,
        summary: &mut RunSummary,
    ) -> StageResult<()> {
        let reader = self.hdf_reader.clone().ok_or_else(|| {
            StageError::Configuration("no HDF coordinate-array reader available".into())
        })?;

        let date = self.directive.date;
        let granules =
            match locate::hdf_for_date(self.store.as_ref(), tier_root, dataset, date).await {
                Ok(granules) => granules,
                Err(StageError::LookupMiss(message)) => {
                    return self.note_miss(tier, &message, summary);
                }
                Err(other) => return Err(other),
            };

        if granules.is_empty() {
            return self.note_miss(tier, &format!("no {dataset} granules for {date}"), summary);
        }

        let mut batch = Vec::with_capacity(granules.len());
        for granule in &granules {
            let local = self
                .store
                .materialize(&granule.path, self.scratch.path())
                .await?;
            batch.push((granule.path.clone(), local));
        }
        let index = build_hdf_index(&batch, reader.as_ref())?;

        match self.aoi.filter(&index) {
            FilterOutcome::Matches(paths) => {
                info!(tier = %tier, dataset = %dataset, matches = paths.len(), "copying granules");
                for path in &paths {
                    self.copy_granule(tier, dataset.as_str(), path, summary)
                        .await?;
                }
            }
            FilterOutcome::NoIntersection => {
                info!(tier = %tier, dataset = %dataset, "no granules intersect the AOI");
            }
            FilterOutcome::NoCandidates => {
                info!(tier = %tier, dataset = %dataset, "no granules to filter");
            }
        }
        Ok(())
    }

    async fn stage_vector(
        &self,
        tier: Tier,
        tier_root: &str,
        file: &VectorFile,
        summary: &mut RunSummary,
    ) -> StageResult<()> {
        let source = format!("{tier_root}/{}", file.name);
        if !self.store.exists(&source).await? {
            return self.note_miss(
                tier,
                &format!("vector file {} not found", file.name),
                summary,
            );
        }

        let raw = self.store.get(&source).await?;
        let (subset, stats) = vector::subset_features(&raw, &self.aoi)?;
        if stats.kept == 0 {
            warn!(tier = %tier, file = %file.name, "vector file is empty after AOI filtering");
        }

        let dest = self.output_base.join(tier.as_str()).join(&file.name);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        vector::write_subset(subset, &dest)?;

        info!(
            tier = %tier,
            file = %file.name,
            kept = stats.kept,
            source = stats.source,
            "wrote vector subset"
        );
        summary.features_kept += stats.kept;
        summary.files_copied += 1;
        Ok(())
    }

    async fn stage_table(
        &self,
        tier: Tier,
        tier_root: &str,
        file: &TabularFile,
        summary: &mut RunSummary,
    ) -> StageResult<()> {
        let source = format!("{tier_root}/{}", file.name);
        if !self.store.exists(&source).await? {
            return self.note_miss(
                tier,
                &format!("table file {} not found", file.name),
                summary,
            );
        }

        let dest = self.output_base.join(tier.as_str()).join(&file.name);
        self.copy_required(&source, &dest).await?;
        info!(tier = %tier, file = %file.name, "copied table file");
        summary.files_copied += 1;
        Ok(())
    }

    async fn stage_columnar(
        &self,
        tier: Tier,
        tier_root: &str,
        file: &ColumnarFile,
        summary: &mut RunSummary,
    ) -> StageResult<()> {
        let source = format!("{tier_root}/{}", file.name);
        if !self.store.exists(&source).await? {
            return self.note_miss(
                tier,
                &format!("columnar file {} not found", file.name),
                summary,
            );
        }

        let dest = self.output_base.join(tier.as_str()).join(&file.name);
        self.copy_required(&source, &dest).await?;
        summary.files_copied += 1;

        match columnar::filter_by_date(&dest, self.directive.date) {
            Ok(rows) => {
                info!(tier = %tier, file = %file.name, rows, "filtered columnar file");
                summary.rows_kept += rows;
            }
            Err(StageError::PostProcess { path, message }) => {
                warn!(
                    path = %path,
                    error = %message,
                    "date filter failed, keeping the unfiltered copy"
                );
            }
            Err(other) => return Err(other),
        }
        Ok(())
    }

    async fn copy_granule(
        &self,
        tier: Tier,
        dataset: &str,
        source: &str,
        summary: &mut RunSummary,
    ) -> StageResult<()> {
        let dest = self
            .output_base
            .join(tier.as_str())
            .join(dataset)
            .join(transfer::object_name(source));

        match transfer::copy_object(self.store.as_ref(), source, &dest).await {
            CopyOutcome::Copied { bytes } => {
                info!(source, dest = %dest.display(), bytes, "copied granule");
                summary.granules_copied += 1;
                Ok(())
            }
            CopyOutcome::SkippedMissing => Err(StageError::Copy {
                path: source.to_string(),
                message: "source vanished before copy".into(),
            }),
            CopyOutcome::Failed(message) => Err(StageError::Copy {
                path: source.to_string(),
                message,
            }),
        }
    }

    /// Sidecar copies are best-effort: absence and failure both warn,
    /// never abort, regardless of the missing-files policy.
    async fn copy_sidecar(
        &self,
        tier: Tier,
        dataset: &str,
        primary: &str,
        suffix: &str,
        summary: &mut RunSummary,
    ) {
        let source = transfer::sidecar_key(primary, suffix);
        let dest = self
            .output_base
            .join(tier.as_str())
            .join(dataset)
            .join(transfer::object_name(&source));

        match transfer::copy_object(self.store.as_ref(), &source, &dest).await {
            CopyOutcome::Copied { .. } => {
                summary.sidecars_copied += 1;
            }
            CopyOutcome::SkippedMissing => {
                warn!(sidecar = %source, "sidecar metadata file not found");
            }
            CopyOutcome::Failed(message) => {
                warn!(sidecar = %source, error = %message, "sidecar copy failed");
            }
        }
    }

    async fn copy_required(&self, source: &str, dest: &Path) -> StageResult<()> {
        match transfer::copy_object(self.store.as_ref(), source, dest).await {
            CopyOutcome::Copied { .. } => Ok(()),
            CopyOutcome::SkippedMissing => Err(StageError::Copy {
                path: source.to_string(),
                message: "source vanished before copy".into(),
            }),
            CopyOutcome::Failed(message) => Err(StageError::Copy {
                path: source.to_string(),
                message,
            }),
        }
    }

    /// Apply the missing-files policy to one lookup miss.
    fn note_miss(&self, tier: Tier, message: &str, summary: &mut RunSummary) -> StageResult<()> {
        if self.directive.error_for_missing_files {
            return Err(StageError::LookupMiss(format!("tier '{tier}': {message}")));
        }
        warn!(tier = %tier, detail = message, "skipping missing content");
        summary.items_skipped += 1;
        Ok(())
    }
}

fn default_hdf_reader() -> Option<Arc<dyn CoordinateArrayReader>> {
    #[cfg(feature = "hdf-native")]
    {
        Some(Arc::new(footprint::NetcdfArrayReader))
    }
    #[cfg(not(feature = "hdf-native"))]
    {
        None
    }
}
