//! Subcommand implementations.
//!
//! Every command writes a JSON document (YAML for `config`) to the given
//! writer; logs go through `tracing`.

use std::io::Write;
use std::path::{Path, PathBuf};

use batchmeas_core::analysis::{Measurement, MeasurementTarget, extract_traces, map_all};
use batchmeas_core::model::TraceField;
use batchmeas_core::{
    AggregateStore, BatchDirectory, CellId, CollectOptions, LoadMode, ParameterGrid, Recording,
    RecordingAxis, ResultSet, diff_result_sets, list_batches, measure_recording, read_batch,
};
use color_eyre::eyre::{WrapErr, bail};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::cli::{CollectArgs, Command, MeasureArgs, SourceArgs, TargetArgs};
use crate::config::AppConfig;

/// State shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub data_dir: PathBuf,
    pub config: AppConfig,
    /// Where `config --write` saves
    pub config_path: PathBuf,
}

pub fn run(ctx: &Context, command: Command, out: &mut dyn Write) -> color_eyre::Result<()> {
    match command {
        Command::List => list(ctx, out),
        Command::Collect {
            batch,
            filter,
            no_save,
        } => collect_batch(ctx, &batch, &filter, !no_save, out),
        Command::Measure {
            batch,
            measurements,
            target,
            source,
            overrides,
        } => measure(ctx, &batch, &measurements, &target, &source, &overrides, out),
        Command::Traces {
            batch,
            target,
            source,
            stable,
            recstep,
        } => traces(ctx, &batch, &target, &source, stable, recstep, out),
        Command::Recording {
            path,
            measurements,
            axis,
            min,
            max,
            overrides,
        } => {
            let axis = RecordingAxis {
                label: axis,
                min,
                max,
            };
            recording(ctx, &path, &measurements, &axis, &overrides, out)
        }
        Command::Diff { left, right } => diff(&left, &right, out),
        Command::Config { write } => show_config(ctx, write, out),
    }
}

fn emit<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> color_eyre::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn open_batch(ctx: &Context, label: &str) -> color_eyre::Result<BatchDirectory> {
    let dir = BatchDirectory::open(&ctx.data_dir, label);
    if !dir.exists() {
        bail!("no batch '{label}' in {}", ctx.data_dir.display());
    }
    Ok(dir)
}

fn collect_options(args: &CollectArgs) -> color_eyre::Result<CollectOptions> {
    let mut options = CollectOptions::default();
    if !args.fields.is_empty() {
        options = options.with_fields(args.fields.clone());
    }
    if let Some(max) = args.max {
        options = options.with_max_combinations(max);
    }
    if let Some(path) = &args.only {
        options = options
            .only_from_file(path)
            .wrap_err_with(|| format!("reading combination filter {}", path.display()))?;
    }
    Ok(options)
}

fn load_results(
    ctx: &Context,
    label: &str,
    source: &SourceArgs,
) -> color_eyre::Result<(ParameterGrid, ResultSet)> {
    let dir = open_batch(ctx, label)?;
    let mode = if source.cached {
        LoadMode::LoadAggregate
    } else {
        LoadMode::Scan
    };
    let options = collect_options(&source.filter)?;
    let (grid, collection) =
        read_batch(&dir, &options, mode).wrap_err_with(|| format!("loading batch '{label}'"))?;
    if collection.missing > 0 {
        warn!(batch = label, missing = collection.missing, "batch has missing records");
    }
    Ok((grid, collection.results))
}

fn target(args: &TargetArgs) -> color_eyre::Result<MeasurementTarget> {
    let field: TraceField = args
        .trace
        .parse()
        .wrap_err_with(|| format!("invalid trace name '{}'", args.trace))?;
    Ok(MeasurementTarget::new(CellId(args.cell), field))
}

fn list(ctx: &Context, out: &mut dyn Write) -> color_eyre::Result<()> {
    let batches = if ctx.data_dir.exists() {
        list_batches(&ctx.data_dir)?
    } else {
        Vec::new()
    };
    emit(out, &batches)
}

fn collect_batch(
    ctx: &Context,
    label: &str,
    filter: &CollectArgs,
    save: bool,
    out: &mut dyn Write,
) -> color_eyre::Result<()> {
    let dir = open_batch(ctx, label)?;
    let options = collect_options(filter)?;
    let mode = if save {
        LoadMode::ScanAndSave
    } else {
        LoadMode::Scan
    };
    let (grid, collection) =
        read_batch(&dir, &options, mode).wrap_err_with(|| format!("collecting batch '{label}'"))?;

    emit(
        out,
        &json!({
            "batch": label,
            "combinations": grid.combination_count(),
            "collected": collection.results.len(),
            "missing": collection.missing,
            "aggregate": save.then(|| dir.aggregate_path().display().to_string()),
        }),
    )
}

fn measure(
    ctx: &Context,
    label: &str,
    measurements: &[Measurement],
    target_args: &TargetArgs,
    source: &SourceArgs,
    overrides: &MeasureArgs,
    out: &mut dyn Write,
) -> color_eyre::Result<()> {
    let config = overrides.apply(&ctx.config.measure);
    let target = target(target_args)?;
    let (grid, results) = load_results(ctx, label, source)?;

    let mapped = map_all(&grid, &results, &target, measurements, &config)
        .wrap_err_with(|| format!("measuring batch '{label}'"))?;
    info!(batch = label, measurements = mapped.len(), "measured batch");
    emit(out, &mapped)
}

fn traces(
    ctx: &Context,
    label: &str,
    target_args: &TargetArgs,
    source: &SourceArgs,
    stable: Option<f64>,
    recstep: Option<f64>,
    out: &mut dyn Write,
) -> color_eyre::Result<()> {
    let mut config = ctx.config.measure.clone();
    if let Some(recstep) = recstep {
        config.recstep = recstep;
    }
    let target = target(target_args)?;
    let (grid, results) = load_results(ctx, label, source)?;

    let traces = extract_traces(&grid, &results, &target, stable, &config)
        .wrap_err_with(|| format!("extracting traces of batch '{label}'"))?;
    emit(out, &traces)
}

fn recording(
    ctx: &Context,
    path: &Path,
    measurements: &[Measurement],
    axis: &RecordingAxis,
    overrides: &MeasureArgs,
    out: &mut dyn Write,
) -> color_eyre::Result<()> {
    let recording = Recording::load(path, &ctx.config.recording)?;

    // Sampling interval of the file unless given explicitly
    let mut base = ctx.config.measure.clone();
    if let Some(interval) = recording.sampling_interval() {
        base.recstep = interval;
    }
    let config = overrides.apply(&base);

    let results = measurements
        .iter()
        .map(|m| {
            measure_recording(&recording, axis, m, &config)
                .wrap_err_with(|| format!("measuring {m} on {}", path.display()))
        })
        .collect::<color_eyre::Result<Vec<_>>>()?;
    emit(out, &results)
}

fn diff(left: &Path, right: &Path, out: &mut dyn Write) -> color_eyre::Result<()> {
    let (left_grid, left_results) = AggregateStore::new(left).load()?;
    let (right_grid, right_results) = AggregateStore::new(right).load()?;
    let diff = diff_result_sets(&left_results, &right_results);

    let keys = |keys: &[batchmeas_core::CombinationKey]| -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    };
    let changed: serde_json::Map<String, serde_json::Value> = diff
        .changed
        .iter()
        .map(|(key, fields)| (key.to_string(), json!(fields)))
        .collect();

    emit(
        out,
        &json!({
            "sameGrid": left_grid == right_grid,
            "identical": diff.is_empty() && left_grid == right_grid,
            "onlyLeft": keys(&diff.only_left),
            "onlyRight": keys(&diff.only_right),
            "changed": changed,
        }),
    )
}

fn show_config(ctx: &Context, write: bool, out: &mut dyn Write) -> color_eyre::Result<()> {
    let yaml = ctx.config.to_yaml()?;
    out.write_all(yaml.as_bytes())?;
    if write {
        ctx.config.save(&ctx.config_path)?;
        info!(path = %ctx.config_path.display(), "saved config");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;
    use serde_json::Value;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    /// A 3x2 batch `sweep` where record `_i_j` spikes `i + j` times and
    /// `_2_1` is missing
    fn batch_dir() -> TempDir {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("sweep");
        fs::create_dir_all(&root).unwrap();
        fs::write(
            root.join("sweep_batch.json"),
            json!({"batch": {"params": [
                {"label": "amp", "values": [0.1, 0.2, 0.3]},
                {"label": "loc", "values": [0.5, 1.0]}
            ]}})
            .to_string(),
        )
        .unwrap();

        for i in 0..3 {
            for j in 0..2 {
                if (i, j) == (2, 1) {
                    continue;
                }
                let mut trace = vec![-70.0; 50];
                for k in 0..(i + j) {
                    trace[10 + 10 * k] = 20.0;
                }
                let record = json!({
                    "simData": {"V_soma": {"cell_0": trace}},
                    "net": {"cells": [{"gid": 0, "tags": {"cellType": "PT5B"}}]}
                });
                fs::write(root.join(format!("sweep_{i}_{j}.json")), record.to_string()).unwrap();
            }
        }
        tmp
    }

    fn context(data_dir: &Path) -> Context {
        Context {
            data_dir: data_dir.to_path_buf(),
            config: AppConfig::default(),
            config_path: AppConfig::path(data_dir),
        }
    }

    fn run_args(ctx: &Context, argv: &[&str]) -> color_eyre::Result<String> {
        let args = Args::try_parse_from(std::iter::once("batchmeas").chain(argv.iter().copied()))?;
        let mut out = Vec::new();
        run(ctx, args.command, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    fn run_json(ctx: &Context, argv: &[&str]) -> Value {
        serde_json::from_str(&run_args(ctx, argv).unwrap()).unwrap()
    }

    #[test]
    fn test_list_and_collect() {
        let tmp = batch_dir();
        let ctx = context(tmp.path());

        assert_eq!(run_json(&ctx, &["list"]), json!(["sweep"]));

        let summary = run_json(&ctx, &["collect", "sweep"]);
        assert_eq!(summary["combinations"], 6);
        assert_eq!(summary["collected"], 5);
        assert_eq!(summary["missing"], 1);
        assert!(tmp.path().join("sweep").join("sweep_allData.json").exists());

        let summary = run_json(&ctx, &["collect", "sweep", "--max", "2", "--no-save"]);
        assert_eq!(summary["collected"], 2);
        assert_eq!(summary["missing"], 4);
        assert_eq!(summary["aggregate"], Value::Null);
    }

    #[test]
    fn test_measure_spike_counts() {
        let tmp = batch_dir();
        let ctx = context(tmp.path());

        let mapped = run_json(
            &ctx,
            &["measure", "sweep", "-m", "num_spikes", "--spike-threshold", "0"],
        );
        let result = &mapped[0];
        assert_eq!(result["label"], "Number of spikes");
        // loc is the outer dimension; the missing record reads 0
        assert_eq!(result["values"], json!([[0.0, 1.0, 2.0], [1.0, 2.0, 0.0]]));
    }

    #[test]
    fn test_measure_from_aggregate() {
        let tmp = batch_dir();
        let ctx = context(tmp.path());

        assert!(run_args(&ctx, &["measure", "sweep", "-m", "num_spikes", "--cached"]).is_err());
        run_args(&ctx, &["collect", "sweep"]).unwrap();
        let scanned = run_json(&ctx, &["measure", "sweep", "-m", "num_spikes"]);
        let cached = run_json(&ctx, &["measure", "sweep", "-m", "num_spikes", "--cached"]);
        assert_eq!(scanned, cached);
    }

    #[test]
    fn test_unknown_batch_and_cell() {
        let tmp = batch_dir();
        let ctx = context(tmp.path());

        let err = run_args(&ctx, &["measure", "nope", "-m", "num_spikes"]).unwrap_err();
        assert!(err.to_string().contains("no batch 'nope'"));
        assert!(run_args(&ctx, &["measure", "sweep", "-m", "num_spikes", "--cell", "3"]).is_err());
    }

    #[test]
    fn test_traces_labels_cell_type() {
        let tmp = batch_dir();
        let ctx = context(tmp.path());

        let grid = run_json(&ctx, &["traces", "sweep", "--stable", "2", "--recstep", "0.1"]);
        assert_eq!(grid["label"], "PT5B V_soma");
        assert_eq!(grid["time"].as_array().unwrap().len(), 30);
    }

    #[test]
    fn test_recording_uses_file_interval() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("rec.json");
        let time: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let mut trace = vec![-70.0; 20];
        trace[4] = 10.0;
        trace[12] = 10.0;
        fs::write(&path, json!({"time": time, "traces": [trace]}).to_string()).unwrap();
        let ctx = context(tmp.path());

        let results = run_json(
            &ctx,
            &["recording", path.to_str().unwrap(), "-m", "spike_frequency"],
        );
        // Spikes at 2 ms and 6 ms
        assert_eq!(results[0]["values"], json!([250.0]));
    }

    #[test]
    fn test_diff_aggregates() {
        let tmp = batch_dir();
        let ctx = context(tmp.path());
        run_args(&ctx, &["collect", "sweep"]).unwrap();
        let aggregate = tmp.path().join("sweep").join("sweep_allData.json");
        let complete = tmp.path().join("complete.json");
        fs::copy(&aggregate, &complete).unwrap();
        run_args(&ctx, &["collect", "sweep", "--max", "3"]).unwrap();

        let diff = run_json(
            &ctx,
            &["diff", aggregate.to_str().unwrap(), complete.to_str().unwrap()],
        );
        assert_eq!(diff["sameGrid"], true);
        assert_eq!(diff["identical"], false);
        assert_eq!(diff["onlyRight"], json!(["_1_1", "_2_0"]));
        assert_eq!(diff["onlyLeft"], json!([]));
    }

    #[test]
    fn test_config_write() {
        let tmp = tempdir().unwrap();
        let mut ctx = context(tmp.path());
        ctx.config.measure.syn_time = 150.0;

        let yaml = run_args(&ctx, &["config", "--write"]).unwrap();
        assert!(yaml.contains("syn_time"));
        assert_eq!(AppConfig::load_or_default(&ctx.config_path), ctx.config);
    }
}
