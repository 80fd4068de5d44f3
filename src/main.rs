use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use formicary::config::{SimulationConfig, load_config};
use formicary::simulation::{DEFAULT_RESOURCE_AMOUNT, ResourceKind, Simulation};

/// Command-line arguments for the headless runner.
#[derive(Parser)]
#[command(name = "formicary", version, about = "Headless ant colony simulation")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulation steps to run.
    #[arg(short, long, default_value_t = 2000)]
    ticks: u64,

    /// Override the config seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of colonies to found.
    #[arg(long, default_value_t = 2)]
    colonies: u32,
}

/// Fixed step length in simulated seconds.
const STEP_DT: f32 = 0.05;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let mut sim = Simulation::new(&config);
    scatter_terrain(&mut sim, &config);
    found_colonies(&mut sim, cli.colonies)?;

    sim.unpause();
    for step in 1..=cli.ticks {
        sim.update(STEP_DT);
        if step % 400 == 0 {
            log_stats(&sim, step);
        }
    }

    info!(
        ticks = cli.ticks,
        sim_seconds = cli.ticks as f32 * STEP_DT,
        "run finished"
    );
    log_stats(&sim, cli.ticks);
    Ok(())
}

/// Paint a demo world through the same mutation surface an editor shell
/// would use: food and leaf patches, a few rock ridges, a pond.
fn scatter_terrain(sim: &mut Simulation, config: &SimulationConfig) {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
    let w = config.map_width as usize;
    let h = config.map_height as usize;
    if w < 16 || h < 16 {
        return;
    }

    for _ in 0..w * h / 600 {
        let cx = rng.random_range(2..w - 2);
        let cy = rng.random_range(2..h - 2);
        let kind = if rng.random_range(0..3) == 0 {
            ResourceKind::Leaf
        } else {
            ResourceKind::Food
        };
        for dy in 0..2 {
            for dx in 0..2 {
                sim.place_resource_at(cx + dx, cy + dy, kind, DEFAULT_RESOURCE_AMOUNT);
            }
        }
    }

    for _ in 0..w * h / 1500 {
        let x0 = rng.random_range(0..w);
        let y0 = rng.random_range(0..h);
        let horizontal = rng.random_range(0..2) == 0;
        for i in 0..rng.random_range(3..9) {
            let (x, y) = if horizontal { (x0 + i, y0) } else { (x0, y0 + i) };
            if x < w && y < h {
                sim.place_rock_at(x, y);
            }
        }
    }

    let px = rng.random_range(w / 4..3 * w / 4);
    let py = rng.random_range(h / 4..3 * h / 4);
    for dy in 0..4 {
        for dx in 0..4 {
            sim.place_water_at(px + dx, py + dy);
            if dy == 3 || dx == 3 {
                sim.place_mud_at(px + dx + 1, py + dy + 1);
            }
        }
    }
}

fn found_colonies(sim: &mut Simulation, count: u32) -> Result<()> {
    let w = sim.config.map_width as f32;
    let h = sim.config.map_height as f32;
    for i in 0..count {
        // Spread nests evenly along the horizontal axis.
        let x = w * (i as f32 + 1.0) / (count as f32 + 1.0);
        let pos = Vec2::new(x.floor() + 0.5, (h / 2.0).floor() + 0.5);
        let tile = (pos.x.floor() as usize, pos.y.floor() as usize);
        sim.clear_terrain_at(tile.0, tile.1);
        sim.spawn_colony(pos)?;
    }
    Ok(())
}

fn log_stats(sim: &Simulation, step: u64) {
    for colony in sim.colonies.values() {
        info!(
            step,
            colony = colony.colony_id,
            population = colony.population(),
            food = colony.stockpile.total(ResourceKind::Food),
            leaves = colony.stockpile.total(ResourceKind::Leaf),
            tasks = colony.tasks.len(),
            "colony status"
        );
    }
}
