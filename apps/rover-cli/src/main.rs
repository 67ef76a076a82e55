use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use perception::{CameraSource, DetectorChain, MockCamera, ObjectDetector};
use robot_link::{LinkMetrics, MockLink, MotorLink, TcpLink};

mod config;
mod controller;
mod run;

use config::RoverConfig;
use run::Capture;

#[derive(Parser, Debug)]
#[command(
    name = "rover",
    version,
    about = "Voice-controlled rover",
    disable_help_subcommand = true
)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-process mock link and synthetic camera
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    /// Robot address (overrides config)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Robot port (overrides config)
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse one utterance and print the resolved command
    Parse {
        text: Vec<String>,
        /// Print the command as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Run the object detectors over camera frames and print what they see
    VisionTest {
        /// Device spec: index like 0, a path or a stream URL
        #[arg(long)]
        device: Option<String>,
        /// Number of frames to process
        #[arg(long, default_value_t = 5u32)]
        frames: u32,
        /// Use OpenCV backend if available; otherwise mock
        #[arg(long, action = ArgAction::SetTrue)]
        opencv: bool,
    },
    /// Ask the robot for its status
    Status,
    /// Run the motor calibration sequence
    Calibrate {
        /// PWM used for the single-wheel steps
        #[arg(long)]
        speed: Option<i32>,
    },
    /// Start the control loop; utterances are read from stdin, one per line
    Run {
        /// Camera device (overrides config)
        #[arg(long)]
        device: Option<String>,
        /// Skip motor calibration at startup
        #[arg(long, action = ArgAction::SetTrue)]
        no_calibrate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let mut config = RoverConfig::load_or_default(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.link.host = host;
    }
    if let Some(port) = cli.port {
        config.link.port = port;
    }

    match cli.command {
        Commands::Parse { text, json } => parse_text(&config, &text.join(" "), json),
        Commands::VisionTest {
            device,
            frames,
            opencv,
        } => {
            if let Some(device) = device {
                config.camera.device = Some(device);
            }
            vision_test(&config, frames, opencv && !cli.mock)
        }
        Commands::Status => tokio::task::block_in_place(|| robot_status(&config, cli.mock)),
        Commands::Calibrate { speed } => {
            let speed = speed.unwrap_or(config.policy.base_speed);
            tokio::task::block_in_place(|| robot_calibrate(&config, cli.mock, speed))
        }
        Commands::Run {
            device,
            no_calibrate,
        } => {
            if let Some(device) = device {
                config.camera.device = Some(device);
            }
            if no_calibrate {
                config.control.calibrate_on_start = false;
            }
            run_rover(config, cli.mock).await
        }
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn parse_text(config: &RoverConfig, text: &str, json: bool) -> Result<()> {
    intent_parser::init()?;
    let parser = intent_parser::IntentParser::new(config.intent.clone())?;
    let command = parser.parse(text);
    if json {
        println!("{}", serde_json::to_string_pretty(&command)?);
        return Ok(());
    }
    println!("action:      {}", command.action);
    println!("description: {}", intent_parser::describe(&command));
    println!("confidence:  {:.2}", command.confidence);
    println!(
        "actionable:  {}",
        command.is_actionable(config.intent.confidence_threshold)
    );
    for (key, value) in &command.parameters {
        println!("  {key}: {value}");
    }
    Ok(())
}

#[cfg(feature = "opencv")]
fn build_detector(config: &RoverConfig) -> DetectorChain {
    let cascade = config
        .camera
        .person_cascade
        .as_deref()
        .unwrap_or(perception::DEFAULT_FACE_CASCADE);
    let chain = match perception::CascadePersonDetector::new(cascade) {
        Ok(person) => DetectorChain::new().push(person),
        Err(e) => {
            warn!("Person detector unavailable ({}), using colour blobs only", e);
            DetectorChain::new()
        }
    };
    chain.push(perception::OpenCvColorDetector::default())
}

#[cfg(not(feature = "opencv"))]
fn build_detector(config: &RoverConfig) -> DetectorChain {
    if config.camera.person_cascade.is_some() {
        warn!("person_cascade is ignored: built without the opencv feature");
    }
    perception::default_detector()
}

fn vision_test(config: &RoverConfig, frames: u32, opencv: bool) -> Result<()> {
    perception::init()?;
    let mut detector = build_detector(config);
    let spec = config.camera_spec();

    if opencv {
        #[cfg(feature = "opencv")]
        {
            let mut cam = perception::OpenCvCamera::open(&spec)
                .map_err(|e| anyhow::anyhow!("opencv open failed: {e}"))?;
            return print_detections(&mut cam, &mut detector, frames);
        }
        #[cfg(not(feature = "opencv"))]
        {
            println!("OpenCV backend not enabled at compile time");
            return Ok(());
        }
    }
    let mut cam =
        MockCamera::open(&spec).map_err(|e| anyhow::anyhow!("mock open failed: {e}"))?;
    print_detections(&mut cam, &mut detector, frames)
}

fn print_detections<C: CameraSource>(
    cam: &mut C,
    detector: &mut DetectorChain,
    frames: u32,
) -> Result<()> {
    for i in 0..frames {
        let frame = cam
            .read()
            .map_err(|e| anyhow::anyhow!("camera read failed: {e}"))?;
        let objects = detector.detect(&frame)?;
        println!(
            "frame {i}: {}x{} {:?}, {} objects",
            frame.width,
            frame.height,
            frame.pixel_format,
            objects.len()
        );
        for obj in &objects {
            println!(
                "  {:<14} conf {:.2} center ({}, {}) area {:>6} -> {}",
                obj.name,
                obj.confidence,
                obj.center.x,
                obj.center.y,
                obj.area,
                perception::direction(obj, frame.width)
            );
        }
    }
    Ok(())
}

type Link = Box<dyn MotorLink + Send>;

fn connect_link(config: &RoverConfig, mock: bool) -> Result<(Link, Option<LinkMetrics>)> {
    if mock {
        let mut link = MockLink::new();
        link.connect()?;
        return Ok((Box::new(link), None));
    }
    let metrics = LinkMetrics::new().map_err(|e| anyhow::anyhow!(e))?;
    let mut link = TcpLink::new(config.link.clone()).with_metrics(metrics.clone());
    if let Err(e) = link.connect() {
        warn!("Robot unreachable at {} ({}); will retry", config.link.address(), e);
    }
    Ok((Box::new(link), Some(metrics)))
}

fn robot_status(config: &RoverConfig, mock: bool) -> Result<()> {
    let (mut link, _) = connect_link(config, mock)?;
    if !link.is_connected() {
        anyhow::bail!("not connected to robot at {}", config.link.address());
    }
    let status = link.request_status()?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn robot_calibrate(config: &RoverConfig, mock: bool, speed: i32) -> Result<()> {
    let (mut link, _) = connect_link(config, mock)?;
    if !link.is_connected() {
        anyhow::bail!("not connected to robot at {}", config.link.address());
    }
    link.calibrate(speed)?;
    println!("calibration sent (speed {speed})");
    Ok(())
}

async fn run_rover(config: RoverConfig, mock: bool) -> Result<()> {
    intent_parser::init()?;
    perception::init()?;
    motion_policy::init();
    info!("Rover starting ({} link)", if mock { "mock" } else { "tcp" });

    let (link, metrics) = tokio::task::block_in_place(|| connect_link(&config, mock))?;
    let interval = Duration::from_millis(config.camera.frame_interval_ms);
    let detector = build_detector(&config);
    let spec = config.camera_spec();

    let capture = if mock {
        Capture::start(MockCamera::open(&spec)?, detector, interval)?
    } else {
        open_camera(&spec, detector, interval)?
    };

    run::run(config, link, capture, metrics).await?;
    info!("Rover stopped");
    Ok(())
}

#[cfg(feature = "opencv")]
fn open_camera(spec: &str, detector: DetectorChain, interval: Duration) -> Result<Capture> {
    info!("Opening camera {}", spec);
    let cam = perception::OpenCvCamera::open(spec)?;
    Capture::start(cam, detector, interval)
}

#[cfg(not(feature = "opencv"))]
fn open_camera(spec: &str, detector: DetectorChain, interval: Duration) -> Result<Capture> {
    warn!(
        "Built without the opencv feature; using the synthetic camera instead of {}",
        spec
    );
    Capture::start(MockCamera::open(spec)?, detector, interval)
}
