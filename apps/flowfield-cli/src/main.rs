use anyhow::Context;
use clap::{Parser, Subcommand};
use flowfield_assets::{PointCloud, ShapeLibrary, shapes};
use flowfield_morph::{AttributeBuffer, MorphConfig, MorphController, reconcile};
use flowfield_render_wgpu::{GpuContext, WgpuComputation};
use flowfield_sim::{FrameClock, ParticleSimulation, SimConfig, StateTexture, seed_points};
use glam::{Vec3, Vec4};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowfield-cli", about = "Headless driver for the flowfield particle simulation")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info and the default configuration
    Info,
    /// Seed particles and advance the flow-field simulation
    Simulate {
        /// YAML or JSON simulation config
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Particle count for the generated sphere (overrides the config)
        #[arg(short, long)]
        particles: Option<u32>,
        /// JSON point cloud to seed from instead of a sphere
        #[arg(long)]
        points: Option<PathBuf>,
        /// Number of ticks to run
        #[arg(short, long, default_value = "120")]
        ticks: u32,
        /// Seconds per tick
        #[arg(long, default_value = "0.016666668")]
        dt: f32,
        /// RNG seed (overrides the config)
        #[arg(short, long)]
        seed: Option<u64>,
        /// Run the passes on the GPU
        #[arg(long)]
        gpu: bool,
    },
    /// Reconcile procedural shapes and walk the morph controller
    Morph {
        /// Seconds per transition
        #[arg(short, long, default_value = "3.0")]
        duration: f32,
        /// Progress samples to print per transition
        #[arg(long, default_value = "5")]
        steps: u32,
        /// Points on the largest shape
        #[arg(short, long, default_value = "2000")]
        count: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("flowfield-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", flowfield_common::crate_info());
            println!("sim: {}", flowfield_sim::crate_info());
            println!("morph: {}", flowfield_morph::crate_info());
            println!("assets: {}", flowfield_assets::crate_info());
            println!("render-wgpu: {}", flowfield_render_wgpu::crate_info());
            println!("\ndefault config:\n{}", serde_yaml::to_string(&SimConfig::default())?);
        }
        Commands::Simulate {
            config,
            particles,
            points,
            ticks,
            dt,
            seed,
            gpu,
        } => {
            let mut config = match config {
                Some(path) => SimConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => SimConfig::default(),
            };
            if let Some(n) = particles {
                config.particles = n;
            }
            if let Some(s) = seed {
                config.rng_seed = s;
            }
            config.validate()?;

            let cloud = match points {
                Some(path) => PointCloud::load(&path)
                    .with_context(|| format!("loading points {}", path.display()))?,
                None => shapes::fibonacci_sphere("sphere", config.particles as usize, 1.0),
            };
            println!(
                "Simulate: {} points from '{}', ticks={ticks}, dt={dt}, seed={}, backend={}",
                cloud.len(),
                cloud.name,
                config.rng_seed,
                if gpu { "gpu" } else { "cpu" }
            );

            if gpu {
                simulate_gpu(&cloud, &config, ticks, dt)?;
            } else {
                simulate_cpu(&cloud, &config, ticks, dt)?;
            }
        }
        Commands::Morph {
            duration,
            steps,
            count,
        } => {
            let library = ShapeLibrary::procedural(count);
            let sets: BTreeMap<String, AttributeBuffer> = library
                .iter()
                .map(|c| (c.name.clone(), AttributeBuffer::from_points(&c.positions)))
                .collect();
            for cloud in library.iter() {
                println!("source '{}': {} points", cloud.name, cloud.len());
            }

            let mut rng = StdRng::seed_from_u64(42);
            let targets = reconcile(&sets, &mut rng)?;
            println!("reconciled: {} slots per shape", targets.count());

            let config = MorphConfig {
                duration,
                ..MorphConfig::default()
            };
            let mut controller = MorphController::new(targets, "sphere", config)?;
            let steps = steps.max(1);
            let step_dt = duration / steps as f32;

            for name in ["cube", "torus"] {
                controller.go_to(name)?;
                println!("go_to('{name}'): state={:?}", controller.state());
                for _ in 0..steps {
                    controller.advance(step_dt);
                    let shape = controller.interpolated();
                    println!(
                        "  progress={:.3} eased={:.3} centroid={:?}",
                        controller.raw_progress(),
                        controller.progress(),
                        centroid(shape.points())
                    );
                }
                println!(
                    "  settled: state={:?} current={:?}",
                    controller.state(),
                    controller.current_name()
                );
            }
        }
    }

    Ok(())
}

fn simulate_cpu(cloud: &PointCloud, config: &SimConfig, ticks: u32, dt: f32) -> anyhow::Result<()> {
    let mut sim = ParticleSimulation::new(&cloud.positions, cloud.colors(), config)?;
    let grid = sim.grid();
    println!("grid {}x{} for {} particles", grid.width, grid.height, sim.count());

    let mut clock = FrameClock::new(config.max_delta);
    let step = Duration::try_from_secs_f32(dt.max(0.0)).context("--dt must be a finite number of seconds")?;
    for _ in 0..ticks {
        sim.compute(clock.advance(step));
    }

    let view = sim.current_position_texture();
    report(&cloud.positions, view.positions(), sim.live_index());
    Ok(())
}

fn simulate_gpu(cloud: &PointCloud, config: &SimConfig, ticks: u32, dt: f32) -> anyhow::Result<()> {
    let ctx = GpuContext::new_headless()?;
    let mut rng = StdRng::seed_from_u64(config.rng_seed);
    let max_side = config.max_texture_dimension.min(ctx.max_texture_dimension());
    let (grid, initial) = seed_points(&cloud.positions, max_side, &mut rng)?;
    println!("grid {}x{} for {} particles", grid.width, grid.height, cloud.len());

    let mut comp = WgpuComputation::flow_field(&ctx, initial, config)?;
    let particles = comp
        .variable(flowfield_sim::PARTICLES)
        .context("particles variable missing")?;

    let mut clock = FrameClock::new(config.max_delta);
    let step = Duration::try_from_secs_f32(dt.max(0.0)).context("--dt must be a finite number of seconds")?;
    for _ in 0..ticks {
        let time = clock.advance(step);
        comp.compute(&ctx, time);
    }

    let state: StateTexture = comp.read_back(&ctx, particles)?;
    let count = cloud.len() as u32;
    let positions = state.particles(count).iter().map(|t: &Vec4| t.truncate());
    report(&cloud.positions, positions, comp.live_index(particles));
    Ok(())
}

fn report(seeded: &[Vec3], positions: impl Iterator<Item = Vec3>, live_index: usize) {
    let positions: Vec<Vec3> = positions.collect();
    let Some(&first) = positions.first() else {
        println!("no particles");
        return;
    };
    let (lo, hi) = positions
        .iter()
        .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
    let displacement = positions
        .iter()
        .zip(seeded)
        .map(|(p, q)| p.distance(*q))
        .sum::<f32>()
        / positions.len() as f32;
    println!("bounds min={lo:?} max={hi:?}");
    println!("mean displacement={displacement:.5} live_index={live_index}");
}

fn centroid(points: impl Iterator<Item = Vec3>) -> Vec3 {
    let (sum, n) = points.fold((Vec3::ZERO, 0usize), |(s, n), p| (s + p, n + 1));
    if n == 0 { Vec3::ZERO } else { sum / n as f32 }
}
