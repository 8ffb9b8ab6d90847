//! Per-category and per-source orchestration.
//!
//! A source run loads and balances the panel once. Every category then starts
//! from that same balanced snapshot and builds all of its artifacts in
//! memory; files are written only after the whole category succeeded.

use std::path::{Path, PathBuf};

use serde::Serialize;
use ucr_core::{CategorySpec, CrimeCategory, DataSource, Error, Frequency, Result};
use ucr_inference::{DidRequest, DynamicAtt, EstimatorSettings, GroupTimeEstimator, SimpleAtt};
use ucr_panel::{
    BalanceSummary, EncodedPanel, LoaderConfig, Panel, PeriodIndex, balance_panel, encode_time,
    filter_discrepancies, load_panel,
};
use ucr_viz::{EventStudyArtifact, PlotConfig};

use crate::effect_size::{
    EffectSizeRow, SeBinning, effect_sizes_to_csv, extract_effect_sizes, read_effect_sizes,
};
use crate::naming::{ArtifactKind, OutputNames};
use crate::tables::{MasterTable, SimpleAttColumn, effect_size_table};

/// Everything a source run needs.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub input: PathBuf,
    /// Period index CSV; `None` numbers the balanced panel's periods densely.
    pub period_index: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub source: DataSource,
    pub frequency: Frequency,
    pub placebo: bool,
    /// Source whose persisted effect sizes are joined into each category table.
    pub comparison: Option<DataSource>,
    pub categories: Vec<CategorySpec>,
    pub loader: LoaderConfig,
    pub excluded_states: Vec<String>,
    pub estimator: EstimatorSettings,
    pub se_binning: SeBinning,
    pub plot: PlotConfig,
}

impl RunPlan {
    /// Defaults for every optional setting.
    pub fn new(input: impl Into<PathBuf>, out_dir: impl Into<PathBuf>, source: DataSource) -> Self {
        Self {
            input: input.into(),
            period_index: None,
            out_dir: out_dir.into(),
            source,
            frequency: Frequency::Monthly,
            placebo: false,
            comparison: None,
            categories: CategorySpec::table(),
            loader: LoaderConfig::default(),
            excluded_states: ucr_panel::EXCLUDED_STATES.iter().map(|s| s.to_string()).collect(),
            estimator: EstimatorSettings::default(),
            se_binning: SeBinning::default(),
            plot: PlotConfig::default(),
        }
    }

    pub fn names(&self) -> OutputNames {
        OutputNames::new(self.source, self.placebo)
    }
}

/// Stage counts for one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: CrimeCategory,
    pub units_dropped_discrepancy: usize,
    pub units: usize,
    pub rows: usize,
    pub negatives_corrected: usize,
    pub simple_att: f64,
    pub simple_se: f64,
}

/// A category's results and serialised artifacts, not yet on disk.
#[derive(Debug, Clone)]
pub struct CategoryArtifacts {
    pub summary: CategorySummary,
    /// The category's own corrected, encoded panel.
    pub panel: EncodedPanel,
    pub dynamic: DynamicAtt,
    pub simple: SimpleAtt,
    pub effect_sizes: Vec<EffectSizeRow>,
    files: Vec<(String, Vec<u8>)>,
}

impl CategoryArtifacts {
    /// File names this category will write.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(name, _)| name.as_str())
    }

    /// Write every artifact into `dir`.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.files.len());
        for (name, bytes) in &self.files {
            let path = dir.join(name);
            std::fs::write(&path, bytes)?;
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote");
            written.push(path);
        }
        Ok(written)
    }
}

/// Run one category from the balanced snapshot, entirely in memory.
pub fn compute_category(
    balanced: &Panel,
    index: &PeriodIndex,
    spec: &CategorySpec,
    plan: &RunPlan,
    estimator: &dyn GroupTimeEstimator,
) -> Result<CategoryArtifacts> {
    let category = spec.category;
    let names = plan.names();

    let (filtered, dropped) = if spec.filter_discrepancy {
        filter_discrepancies(balanced, &spec.rate_column, &spec.count_column, plan.frequency)?
    } else {
        (balanced.clone(), 0)
    };
    let encoded = encode_time(&filtered, index, plan.frequency, plan.placebo)?;
    let (corrected, n_corrected) = encoded.correct_negatives(&spec.count_column)?;

    let outcome = corrected
        .panel
        .column(&spec.count_column)?
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                Error::EstimatorFailure(format!(
                    "{}: missing outcome for unit {} at {}",
                    spec.count_column,
                    corrected.panel.ori()[i],
                    corrected.panel.date_key()[i]
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    let request = DidRequest {
        outcome_name: &spec.count_column,
        outcome: &outcome,
        time: &corrected.period,
        unit: &corrected.unit_id,
        onset: &corrected.onset_period,
        cluster: &corrected.state_group,
        settings: plan.estimator,
    };
    let result = estimator.estimate(&request)?;
    let dynamic = result.dynamic()?;
    let simple = result.simple()?;

    let effect_sizes = extract_effect_sizes(&dynamic, plan.frequency, plan.se_binning);

    let comparison_rows = match plan.comparison {
        Some(other) => {
            let path =
                names.for_source(other).path(&plan.out_dir, category, ArtifactKind::EffectSize);
            Some((other, read_effect_sizes(&path)?))
        }
        None => None,
    };
    let table = effect_size_table(
        category,
        plan.source,
        &effect_sizes,
        comparison_rows.as_ref().map(|(src, rows)| (*src, rows.as_slice())),
    );

    let artifact =
        EventStudyArtifact::new(&dynamic, category, plan.source, plan.frequency, plan.placebo);
    let mut files = vec![
        (names.primary(category, ArtifactKind::EffectSize), effect_sizes_to_csv(&effect_sizes)?),
        (
            names.primary(category, ArtifactKind::SimpleAtt),
            SimpleAttColumn::new(category, &simple).to_csv()?,
        ),
        (names.primary(category, ArtifactKind::Table), table.render().into_bytes()),
    ];
    for ext in ArtifactKind::EventStudy.extensions() {
        if ucr_viz::formats().contains(ext) {
            let bytes = ucr_viz::render_to_bytes(&artifact, ext, &plan.plot)?;
            files.push((names.file(category, ArtifactKind::EventStudy, ext), bytes));
        }
    }

    let summary = CategorySummary {
        category,
        units_dropped_discrepancy: dropped,
        units: corrected.panel.n_units(),
        rows: corrected.panel.len(),
        negatives_corrected: n_corrected,
        simple_att: simple.att,
        simple_se: simple.se,
    };
    tracing::info!(
        category = category.name(),
        estimator = estimator.name(),
        units = summary.units,
        dropped,
        corrected = n_corrected,
        att = simple.att,
        se = simple.se,
        "category estimated"
    );

    Ok(CategoryArtifacts { summary, panel: corrected, dynamic, simple, effect_sizes, files })
}

/// [`compute_category`], then write its artifacts to `plan.out_dir`.
pub fn run_category(
    balanced: &Panel,
    index: &PeriodIndex,
    spec: &CategorySpec,
    plan: &RunPlan,
    estimator: &dyn GroupTimeEstimator,
) -> Result<CategoryArtifacts> {
    let artifacts = compute_category(balanced, index, spec, plan, estimator)?;
    artifacts.write(&plan.out_dir)?;
    Ok(artifacts)
}

/// Loaded and balanced panel with its period index.
#[derive(Debug, Clone)]
pub struct PreparedSource {
    pub panel: Panel,
    pub balance: BalanceSummary,
    pub index: PeriodIndex,
}

/// Load, balance and index the input once per source.
pub fn prepare_source(plan: &RunPlan) -> Result<PreparedSource> {
    let raw = load_panel(&plan.input, &plan.loader)?;
    let excluded: Vec<&str> = plan.excluded_states.iter().map(String::as_str).collect();
    let (panel, balance) = balance_panel(&raw, &excluded)?;
    let index = match &plan.period_index {
        Some(path) => PeriodIndex::from_csv(path)?,
        None => PeriodIndex::dense_from_panel(&panel),
    };
    tracing::info!(
        input = %plan.input.display(),
        source = plan.source.tag(),
        units = balance.units_kept,
        periods = balance.n_periods,
        index_periods = index.len(),
        "panel prepared"
    );
    Ok(PreparedSource { panel, balance, index })
}

/// Outcome of a full source run.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub balance: BalanceSummary,
    pub categories: Vec<CategorySummary>,
    pub master: MasterTable,
    pub written: Vec<PathBuf>,
}

/// Run every configured category for one source, then write the master table.
///
/// The first failing category aborts the run; categories already finished
/// keep their files.
pub fn run_source(plan: &RunPlan, estimator: &dyn GroupTimeEstimator) -> Result<SourceReport> {
    if plan.categories.is_empty() {
        return Err(Error::Validation("no categories configured".into()));
    }
    let prepared = prepare_source(plan)?;

    let mut summaries = Vec::with_capacity(plan.categories.len());
    let mut columns = Vec::with_capacity(plan.categories.len());
    let mut written = Vec::new();
    for spec in &plan.categories {
        let artifacts = run_category(&prepared.panel, &prepared.index, spec, plan, estimator)?;
        columns.push(SimpleAttColumn::new(spec.category, &artifacts.simple));
        written.extend(artifacts.file_names().map(|n| plan.out_dir.join(n)));
        summaries.push(artifacts.summary);
    }

    let master = MasterTable::combine(plan.source, plan.placebo, columns)?;
    let path = plan.out_dir.join(plan.names().master_table());
    std::fs::write(&path, master.to_latex().render())?;
    written.push(path);

    Ok(SourceReport { balance: prepared.balance, categories: summaries, master, written })
}

/// Rebuild the master table from persisted simple-ATT CSVs in `out_dir`.
pub fn combine_source(out_dir: &Path, names: OutputNames) -> Result<(MasterTable, PathBuf)> {
    let mut columns = Vec::new();
    for category in CrimeCategory::ALL {
        let path = names.path(out_dir, category, ArtifactKind::SimpleAtt);
        if path.exists() {
            columns.push(SimpleAttColumn::read(&path)?);
        } else {
            tracing::warn!(path = %path.display(), "simple-ATT file not found; column skipped");
        }
    }
    if columns.is_empty() {
        return Err(Error::MissingFile(names.path(
            out_dir,
            CrimeCategory::Crime,
            ArtifactKind::SimpleAtt,
        )));
    }
    let master = MasterTable::combine(names.source, names.placebo, columns)?;
    let path = out_dir.join(names.master_table());
    std::fs::write(&path, master.to_latex().render())?;
    tracing::info!(
        path = %path.display(),
        columns = master.columns().len(),
        "master table written"
    );
    Ok((master, path))
}
