use std::path::PathBuf;

use batchmeas_core::MeasureConfig;
use batchmeas_core::analysis::Measurement;
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "batchmeas")]
#[command(about = "Collect neuron parameter-sweep batches and measure their traces")]
pub struct Args {
    /// Directory holding the batch directories (default: ~/.batchmeas/)
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Configuration file (default: <data-dir>/batchmeas.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Write the log to <data-dir>/batchmeas.log instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the batches in the data directory
    List,

    /// Read every output record of a batch and write the aggregate file
    Collect {
        batch: String,
        #[command(flatten)]
        filter: CollectArgs,
        /// Do not write the aggregate file
        #[arg(long)]
        no_save: bool,
    },

    /// Map measurements across a batch
    Measure {
        batch: String,
        /// Measurements to map, e.g. plateau_amplitude or backprop_amplitude=250
        #[arg(short, long = "measurement", required = true, value_delimiter = ',')]
        measurements: Vec<Measurement>,
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        overrides: MeasureArgs,
    },

    /// Gather the raw traces of a batch onto its grid
    Traces {
        batch: String,
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        source: SourceArgs,
        /// Drop samples before this time (ms)
        #[arg(long)]
        stable: Option<f64>,
        /// Sampling interval (ms)
        #[arg(long)]
        recstep: Option<f64>,
    },

    /// Measure an experimental recording
    Recording {
        /// JSON file with `time` and `traces`
        path: PathBuf,
        #[arg(short, long = "measurement", required = true, value_delimiter = ',')]
        measurements: Vec<Measurement>,
        /// Label of the synthetic axis the sweeps are spread over
        #[arg(long, default_value = "sweep")]
        axis: String,
        #[arg(long, default_value_t = 0.0)]
        min: f64,
        #[arg(long, default_value_t = 1.0)]
        max: f64,
        #[command(flatten)]
        overrides: MeasureArgs,
    },

    /// Compare two aggregate files
    Diff { left: PathBuf, right: PathBuf },

    /// Print the effective configuration as YAML
    Config {
        /// Also write it to the configuration file
        #[arg(long)]
        write: bool,
    },
}

#[derive(ClapArgs, Debug, Default, Clone)]
pub struct CollectArgs {
    /// Only keep these record fields (default: all fields of the first record)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,
    /// Attempt at most this many combinations
    #[arg(long)]
    pub max: Option<usize>,
    /// JSON file whose `paramsMatch` lists the value tuples to attempt
    #[arg(long)]
    pub only: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TargetArgs {
    /// Cell id (also its position in the network)
    #[arg(long, default_value_t = 0)]
    pub cell: usize,
    /// Recorded trace, e.g. V_soma or V_Bdend1
    #[arg(long, default_value = "V_soma")]
    pub trace: String,
}

#[derive(ClapArgs, Debug, Default, Clone)]
pub struct SourceArgs {
    /// Reload the aggregate file instead of reading every record
    #[arg(long)]
    pub cached: bool,
    #[command(flatten)]
    pub filter: CollectArgs,
}

/// Per-run overrides of the configured measurement settings
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct MeasureArgs {
    #[arg(long)]
    pub recstep: Option<f64>,
    #[arg(long)]
    pub spike_threshold: Option<f64>,
    #[arg(long)]
    pub spike_width: Option<f64>,
    #[arg(long)]
    pub plateau_threshold: Option<f64>,
    #[arg(long)]
    pub stable_time: Option<f64>,
    #[arg(long)]
    pub syn_time: Option<f64>,
}

impl MeasureArgs {
    pub fn apply(&self, config: &MeasureConfig) -> MeasureConfig {
        MeasureConfig {
            recstep: self.recstep.unwrap_or(config.recstep),
            spike_threshold: self.spike_threshold.unwrap_or(config.spike_threshold),
            spike_width: self.spike_width.unwrap_or(config.spike_width),
            plateau_threshold: self.plateau_threshold.unwrap_or(config.plateau_threshold),
            stable_time: self.stable_time.unwrap_or(config.stable_time),
            syn_time: self.syn_time.unwrap_or(config.syn_time),
        }
    }
}
