use std::io;
use std::path::PathBuf;

use batchmeas::cli::Args;
use batchmeas::commands::{self, Context};
use batchmeas::config::AppConfig;
use batchmeas::{LogTarget, init_logging};
use clap::Parser;

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".batchmeas")
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);

    let target = if args.log_file {
        LogTarget::File
    } else {
        LogTarget::Stderr
    };
    init_logging(&data_dir, &args.log_level, target)?;

    let config_path = args.config.unwrap_or_else(|| AppConfig::path(&data_dir));
    let ctx = Context {
        config: AppConfig::load_or_default(&config_path),
        config_path,
        data_dir,
    };

    let stdout = io::stdout();
    commands::run(&ctx, args.command, &mut stdout.lock())
}
