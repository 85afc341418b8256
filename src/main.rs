use std::io;
use std::path::PathBuf;

use boxbox::{AppConfig, BoxBoxError, HttpProvider, Shell, ShellOptions};
use clap::Parser;
use log::{error, info, warn};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory for cached provider responses
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Always fetch from the network
    #[arg(long)]
    no_cache: bool,

    /// Directory the charts are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Skip rendering the track map and strategy chart
    #[arg(long)]
    no_charts: bool,

    /// Seed for the strategy simulation, for repeatable runs
    #[arg(long)]
    seed: Option<u64>,

    /// Store the effective settings as the new config file
    #[arg(long)]
    save_config: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = Some(cache_dir.clone());
        }
        if self.no_cache {
            config.cache_enabled = false;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if self.no_charts {
            config.charts_enabled = false;
        }
    }
}

fn run(args: &Args) -> Result<(), BoxBoxError> {
    let mut config = AppConfig::from_local_file().unwrap_or_else(|e| {
        warn!("Could not read config file, using defaults: {e}");
        AppConfig::default()
    });
    args.apply(&mut config);
    if args.save_config {
        config.save()?;
        info!("Saved config to {:?}", AppConfig::default_path());
    }

    let provider = HttpProvider::new(config.provider_config()?)?;
    let stdin = io::stdin();
    let mut shell = Shell::new(
        &provider,
        stdin.lock(),
        io::stdout(),
        ShellOptions::from_config(&config, args.seed),
    );
    shell.run()
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let args = Args::parse();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    }) {
        warn!("Could not set Ctrl-C handler: {e}");
    }

    if let Err(e) = run(&args) {
        error!("{e:?}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
