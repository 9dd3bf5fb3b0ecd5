// Central CBF-QP controller for a team of unicycle robots.
//
// Each configured robot gets its own controller worker. Without a
// motion-capture feed attached, the robots are simulated here and their
// poses are fed back through the same dispatch path a live system would use.
//
// Run with: cargo run --bin barrier_certificate -- --plot ./img/barrier_certificate.svg

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use plotlib::page::Page;
use plotlib::repr::Plot;
use plotlib::style::{LineStyle, PointStyle};
use plotlib::view::ContinuousView;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use barrier_certificate::common::{ControlInput, Pose2D, PoseSample, QpSolver, RoboticsError, RoboticsResult};
use barrier_certificate::config::{AppConfig, SceneConfig, SceneHandle};
use barrier_certificate::control::{barrier_value, lookahead_point, CbfController};
use barrier_certificate::pipeline::{await_command, Dispatcher, RobotId, RobotRegistry, StaticDiscovery};
use barrier_certificate::simulation::{PoseNoise, UnicycleModel};
use barrier_certificate::solver::{ActiveSetSolver, ClarabelSolver};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SolverKind {
    Clarabel,
    ActiveSet,
}

#[derive(Debug, Parser)]
#[command(version, about = "CBF-QP safety-filtered velocity control for unicycle robots")]
struct Args {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of control periods to simulate
    #[arg(long, default_value_t = 2000)]
    steps: usize,

    /// Control period [s]
    #[arg(long, default_value_t = 0.01)]
    dt: f64,

    /// Standard deviation of position noise [m]; heading noise is 5x this in rad
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    /// QP backend
    #[arg(long, value_enum, default_value_t = SolverKind::Clarabel)]
    solver: SolverKind,

    /// Write an SVG of the trajectories
    #[arg(long)]
    plot: Option<PathBuf>,

    /// Seed for the measurement noise
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> RoboticsResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("barrier_certificate=info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            AppConfig::from_file(path)?
        }
        None => {
            info!("Using default configuration");
            AppConfig::default()
        }
    };
    config.validate()?;
    if !(args.dt.is_finite() && args.dt > 0.0) {
        return Err(RoboticsError::InvalidParameter(format!("dt must be positive, got {}", args.dt)));
    }

    let scene = config.scene.clone();
    info!(
        obstacle_x = scene.obstacle.center.x,
        obstacle_y = scene.obstacle.center.y,
        radius = scene.obstacle.radius,
        goal_x = scene.goal.x,
        goal_y = scene.goal.y,
        kp = scene.kp,
        gamma = scene.gamma,
        d = scene.lookahead,
        "scene"
    );

    let solver: Box<dyn QpSolver> = match args.solver {
        SolverKind::Clarabel => Box::new(ClarabelSolver::new(config.solver.clone())),
        SolverKind::ActiveSet => Box::new(ActiveSetSolver::default()),
    };
    let controller = Arc::new(CbfController::new(
        SceneHandle::new(scene.clone())?,
        solver,
        &config.solver,
        config.output.clone(),
    ));

    let discovery = StaticDiscovery::from_entries(&config.robots);
    let (registry, commands) = RobotRegistry::discover(&discovery, config.output.channel_capacity)?;
    let dispatcher = Dispatcher::spawn(controller, registry, config.output.channel_capacity)?;

    let noise = if args.noise > 0.0 {
        Some(PoseNoise::new(args.noise, 5.0 * args.noise)?)
    } else {
        None
    };
    let mut rng = StdRng::seed_from_u64(args.seed);

    let mut poses: BTreeMap<RobotId, Pose2D> = config
        .robots
        .iter()
        .map(|r| (RobotId::new(r.id.clone()), r.start))
        .collect();
    let mut paths: BTreeMap<RobotId, Vec<(f64, f64)>> =
        poses.iter().map(|(id, p)| (id.clone(), vec![(p.x, p.y)])).collect();
    let mut min_barrier = f64::INFINITY;
    let model = UnicycleModel;
    let wait = Duration::from_millis(config.solver.time_limit_ms.max(1) * 5);

    for step in 0..args.steps as u64 {
        for (id, pose) in poses.iter() {
            let measured = match &noise {
                Some(n) => n.perturb(pose, &mut rng),
                None => *pose,
            };
            dispatcher.submit(id, PoseSample::from_pose(&measured).with_seq(step))?;
        }
        for (id, pose) in poses.iter_mut() {
            // a skipped or late cycle leaves the robot standing
            let input = match commands.get(id).and_then(|rx| await_command(rx, step, wait)) {
                Some(cmd) => ControlInput::new(cmd.linear / config.output.linear_scale, cmd.angular),
                None => ControlInput::zero(),
            };
            *pose = model.step(pose, &input, args.dt);
            let z = lookahead_point(pose, scene.lookahead);
            min_barrier = min_barrier.min(barrier_value(&z, &scene.obstacle));
            if let Some(path) = paths.get_mut(id) {
                path.push((pose.x, pose.y));
            }
        }
    }

    let stats = dispatcher.shutdown();
    for (id, pose) in poses.iter() {
        let z = lookahead_point(pose, scene.lookahead);
        let s = stats.get(id).copied().unwrap_or_default();
        info!(
            robot = %id,
            x = pose.x,
            y = pose.y,
            goal_distance = z.distance(&scene.goal),
            skipped = s.skipped,
            "final pose"
        );
    }
    if min_barrier < 0.0 {
        warn!(min_barrier, "lookahead point entered the unsafe set");
    } else {
        info!(min_barrier, "safe set preserved");
    }

    if let Some(path) = &args.plot {
        save_plot(path, &scene, &paths)?;
        info!("Trajectory plot saved to {:?}", path);
    }
    Ok(())
}

fn save_plot(path: &Path, scene: &SceneConfig, paths: &BTreeMap<RobotId, Vec<(f64, f64)>>) -> RoboticsResult<()> {
    const COLOURS: [&str; 4] = ["#35C788", "#DD3355", "#3355DD", "#DDAA33"];

    let circle: Vec<(f64, f64)> = (0..=72)
        .map(|i| {
            let a = 2.0 * PI * i as f64 / 72.0;
            (
                scene.obstacle.center.x + scene.obstacle.radius * a.cos(),
                scene.obstacle.center.y + scene.obstacle.radius * a.sin(),
            )
        })
        .collect();
    let obstacle: Plot = Plot::new(circle).line_style(LineStyle::new().colour("#000000").width(2.));
    let goal: Plot = Plot::new(vec![(scene.goal.x, scene.goal.y)])
        .point_style(PointStyle::new().colour("#DD3355").size(5.));

    let mut view = ContinuousView::new()
        .add(obstacle)
        .add(goal)
        .x_range(-2., 2.)
        .y_range(-1.5, 1.5)
        .x_label("x [m]")
        .y_label("y [m]");
    for (i, xy) in paths.values().enumerate() {
        let trajectory: Plot =
            Plot::new(xy.clone()).line_style(LineStyle::new().colour(COLOURS[i % COLOURS.len()]).width(2.));
        view = view.add(trajectory);
    }

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Page::single(&view)
        .save(path)
        .map_err(|e| RoboticsError::VisualizationError(format!("{}", e)))?;
    Ok(())
}
