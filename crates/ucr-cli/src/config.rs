//! Run configuration (YAML, or JSON by extension).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use ucr_core::{CategorySpec, CrimeCategory, DataSource, Frequency};
use ucr_inference::EstimatorSettings;
use ucr_panel::LoaderConfig;
use ucr_report::{RunPlan, SeBinning};
use ucr_viz::PlotConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Panel file (csv/tsv/txt, parquet with the `parquet` feature).
    pub input: PathBuf,
    /// Optional `key,index` period table.
    #[serde(default)]
    pub period_index: Option<PathBuf>,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default = "default_source")]
    pub source: DataSource,
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
    #[serde(default)]
    pub placebo: bool,
    /// Join the other source's persisted effect sizes into each table.
    #[serde(default)]
    pub alt_comparison: bool,
    /// Comparison source; defaults to the other one.
    #[serde(default)]
    pub comparison_source: Option<DataSource>,
    /// Subset of categories; all eight when absent.
    #[serde(default)]
    pub categories: Option<Vec<CrimeCategory>>,
    #[serde(default)]
    pub category_overrides: BTreeMap<CrimeCategory, CategoryOverride>,
    #[serde(default)]
    pub columns: LoaderConfig,
    #[serde(default)]
    pub excluded_states: Option<Vec<String>>,
    #[serde(default)]
    pub estimator: EstimatorSettings,
    #[serde(default)]
    pub se_binning: SeBinning,
    #[serde(default)]
    pub plot: PlotConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryOverride {
    pub count_column: Option<String>,
    pub rate_column: Option<String>,
    pub filter_discrepancy: Option<bool>,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_source() -> DataSource {
    DataSource::Fbi
}

fn default_frequency() -> Frequency {
    Frequency::Monthly
}

pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read config {}", path.display()))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let cfg: RunConfig = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        serde_yaml_ng::from_slice(&bytes)
            .with_context(|| format!("invalid run config {}", path.display()))?
    };
    Ok(cfg)
}

impl RunConfig {
    /// Category table after applying the subset and per-category overrides.
    pub fn category_specs(&self) -> Vec<CategorySpec> {
        let selected: Vec<CrimeCategory> = match &self.categories {
            Some(list) => list.clone(),
            None => CrimeCategory::ALL.to_vec(),
        };
        selected
            .into_iter()
            .map(|category| {
                let mut spec = CategorySpec::default_for(category);
                if let Some(o) = self.category_overrides.get(&category) {
                    if let Some(c) = &o.count_column {
                        spec.count_column = c.clone();
                    }
                    if let Some(c) = &o.rate_column {
                        spec.rate_column = c.clone();
                    }
                    if let Some(f) = o.filter_discrepancy {
                        spec.filter_discrepancy = f;
                    }
                }
                spec
            })
            .collect()
    }

    /// Resolve into a [`RunPlan`]. Relative paths are taken from `base_dir`.
    pub fn into_plan(self, base_dir: &Path) -> RunPlan {
        let resolve = |p: &Path| if p.is_absolute() { p.to_path_buf() } else { base_dir.join(p) };
        let categories = self.category_specs();
        let mut plan = RunPlan::new(resolve(&self.input), resolve(&self.out_dir), self.source);
        plan.period_index = self.period_index.as_deref().map(resolve);
        plan.frequency = self.frequency;
        plan.placebo = self.placebo;
        plan.comparison = self
            .alt_comparison
            .then(|| self.comparison_source.unwrap_or_else(|| self.source.other()));
        plan.categories = categories;
        plan.loader = self.columns;
        if let Some(states) = self.excluded_states {
            plan.excluded_states = states;
        }
        plan.estimator = self.estimator;
        plan.se_binning = self.se_binning;
        plan.plot = self.plot;
        plan
    }
}
