#![deny(clippy::all, clippy::pedantic)]

mod demos;
mod watcher;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use physics::{World, WorldConfig};

use crate::demos::DemoRegistry;

/// Headless driver for the Strata physics core.
#[derive(Parser, Debug)]
#[command(name = "strata", about = "Run a physics demo without a renderer", version)]
struct Cli {
    /// Demo scene to load.
    #[arg(long, default_value = "sphere_stack")]
    demo: String,
    /// Number of steps to simulate.
    #[arg(long, default_value_t = 240)]
    steps: usize,
    /// Worker count, overriding the configuration file.
    #[arg(long)]
    threads: Option<usize>,
    /// JSON world configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Reload the configuration file whenever it changes.
    #[arg(long, requires = "config")]
    watch: bool,
    /// Print the available demos and exit.
    #[arg(long)]
    list: bool,
}

impl Cli {
    fn world_config(&self) -> Result<WorldConfig> {
        let config = match &self.config {
            Some(path) => watcher::load_config(path)?,
            None => WorldConfig::default(),
        };
        Ok(self.with_overrides(config))
    }

    fn with_overrides(&self, mut config: WorldConfig) -> WorldConfig {
        if let Some(threads) = self.threads {
            config.thread_count = threads;
        }
        config
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let registry = DemoRegistry::builtin();

    if cli.list {
        for demo in registry.demos() {
            println!("{:<16} {}", demo.name, demo.description);
        }
        return Ok(());
    }

    let demo = registry.get(&cli.demo).ok_or_else(|| {
        anyhow!(
            "unknown demo '{}', expected one of: {}",
            cli.demo,
            registry.names().join(", ")
        )
    })?;

    let mut world = World::new(cli.world_config()?)?;
    (demo.build)(&mut world)?;
    tracing::info!(
        demo = demo.name,
        bodies = world.body_count(),
        joints = world.joint_count(),
        threads = world.thread_count(),
        "Running in headless mode."
    );

    let config_watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => match watcher::start(path) {
            Ok(watcher_instance) => Some(watcher_instance),
            Err(e) => {
                tracing::error!("Failed to start configuration watcher: {e:?}");
                None
            }
        },
        _ => None,
    };

    for i in 0..cli.steps {
        if let Some(config) = config_watcher.as_ref().and_then(watcher::ConfigWatcher::latest) {
            if let Err(e) = world.set_config(cli.with_overrides(config)) {
                tracing::warn!("Rejected reloaded configuration: {e}");
            }
        }
        world.step()?;
        if (i + 1) % 60 == 0 {
            let stats = world.stats();
            tracing::info!(
                step = i + 1,
                pairs = stats.pairs,
                contacts = stats.contacts,
                islands = stats.islands,
                iterations = stats.solver_iterations,
                "progress"
            );
        }
    }

    let lowest = world
        .transforms()
        .iter()
        .map(|t| t.position[1])
        .fold(f32::INFINITY, f32::min);
    let stats = world.stats();
    tracing::info!(
        steps = stats.steps,
        lowest,
        scene_area = world.scene().total_surface_area(),
        "Demo finished."
    );
    Ok(())
}
