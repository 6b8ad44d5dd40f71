use log::{info, warn};
use reqwest::blocking::Client;

use crate::config::{PipelineConfig, Source};
use crate::data::loader::load_file;
use crate::data::model::Table;
use crate::data::partition::{inner_join_keys, partition_by_indicator, restrict_to_keys};
use crate::data::preprocess::{Preprocessor, ThresholdPolicy};
use crate::error::Result;
use crate::fetch::{client, fetch_table};
use crate::store::Store;

// ---------------------------------------------------------------------------
// Pipeline: extract → transform → load, then analyse
// ---------------------------------------------------------------------------

/// The collaborators shared by every stage of a run.
pub struct Pipeline {
    client: Client,
    store: Store,
    policy: ThresholdPolicy,
}

/// Tables written by a full run, in the order they were stored.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub cleaned: Vec<(String, Table)>,
    pub analysed: Vec<(String, Table)>,
}

impl Pipeline {
    pub fn new(store: Store, policy: ThresholdPolicy) -> Result<Self> {
        Ok(Self {
            client: client()?,
            store,
            policy,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Read a dataset from its URL or local file.
    pub fn extract(&self, source: &Source) -> Result<Table> {
        match source {
            Source::Url(url) => fetch_table(&self.client, url),
            Source::Path(path) => {
                info!("reading {}", path.display());
                load_file(path)
            }
        }
    }

    /// Read, clean and store one dataset; returns the cleaned table.
    pub fn etl<S: AsRef<str>>(
        &self,
        source: &Source,
        table_name: &str,
        unused_columns: &[S],
    ) -> Result<Table> {
        let raw = self.extract(source)?;
        let before = raw.shape();
        let table = Preprocessor::new(raw, unused_columns).transform_with(self.policy);
        info!("{table_name}: cleaned {before:?} -> {:?}", table.shape());
        self.store.save(&table, table_name)?;
        Ok(table)
    }

    /// Restrict both tables to their shared keys, split `secondary` by its
    /// indicator column and store the restricted `primary` plus every split.
    pub fn analyse(
        &self,
        primary: &Table,
        secondary: &Table,
        key_column: &str,
        indicator_column: &str,
        primary_label: &str,
    ) -> Result<Vec<(String, Table)>> {
        let keys = inner_join_keys(primary, secondary, key_column)?;
        info!("{} {key_column} values shared by both tables", keys.len());
        let primary = restrict_to_keys(primary, key_column, &keys)?;
        let secondary = restrict_to_keys(secondary, key_column, &keys)?;

        let mut mapping = vec![(primary_label.to_string(), primary)];
        for (value, table) in partition_by_indicator(&secondary, indicator_column)? {
            let label = value.to_string();
            // SQLite table names ignore ASCII case.
            let clash = mapping.iter().find(|(l, _)| l.eq_ignore_ascii_case(&label));
            if let Some((taken, _)) = clash {
                warn!("partition '{label}' clashes with table '{taken}'; skipping it");
                continue;
            }
            mapping.push((label, table));
        }

        for (label, table) in &mapping {
            self.store.save(table, label)?;
        }
        Ok(mapping)
    }
}

/// Run every configured dataset through [`Pipeline::etl`], then the analyse
/// step over the first two.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let store = Store::open(&config.database)?;
    info!("using database {}", store.path().display());
    let pipeline = Pipeline::new(store, config.threshold_policy)?;

    let mut summary = RunSummary::default();
    for dataset in &config.datasets {
        let table = pipeline.etl(&dataset.source, &dataset.table, &dataset.unused_columns)?;
        summary.cleaned.push((dataset.table.clone(), table));
    }

    let analyse = &config.analyse;
    if !analyse.enabled {
        info!("analyse step disabled");
    } else if let [(_, primary), (_, secondary)] = summary.cleaned.as_slice() {
        summary.analysed = pipeline.analyse(
            primary,
            secondary,
            &analyse.key_column,
            &analyse.indicator_column,
            &analyse.primary_label,
        )?;
    } else {
        warn!(
            "analyse step needs exactly two datasets, found {}; skipping",
            summary.cleaned.len()
        );
    }
    Ok(summary)
}
