use anyhow::{anyhow, bail, Context};
use crabfocus::acquisition::{
    FocusSession, FrameSource, JsonLinesReporter, PipelinedSession, ReportSink, SessionFailure,
    SessionSummary, TextReporter,
};
use crabfocus::config::{CrabFocusConfig, ReportFormat};
use crabfocus::testing::SyntheticFocusSource;
use crabfocus::{CancelToken, Frame};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const USAGE: &str = "\
Usage: crabfocus-cli <command> [args]

Commands:
  run [--config <path>] [--frames <n>] [--timeout <ms>] [--json] [--pipelined] [--no-wait] [--device <index>]
  score <image-path> [--config <path>]
  init-config [path]";

fn main() {
    crabfocus::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = &args[1];
    let result = match command.as_str() {
        "run" => cmd_run(&args[2..]),
        "score" => cmd_score(&args[2..]),
        "init-config" => cmd_init_config(&args[2..]),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(0)
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[derive(Debug, Default)]
struct RunArgs {
    config: Option<PathBuf>,
    frames: Option<u64>,
    timeout_ms: Option<u64>,
    json: bool,
    pipelined: bool,
    no_wait: bool,
    device: Option<u32>,
}

fn option_value<'a>(args: &'a [String], i: usize, flag: &str) -> anyhow::Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} requires a value", flag))
}

fn parse_run_args(args: &[String]) -> anyhow::Result<RunArgs> {
    let mut parsed = RunArgs::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                parsed.config = Some(PathBuf::from(option_value(args, i, "--config")?));
            }
            "--frames" => {
                i += 1;
                parsed.frames = Some(option_value(args, i, "--frames")?.parse()?);
            }
            "--timeout" => {
                i += 1;
                parsed.timeout_ms = Some(option_value(args, i, "--timeout")?.parse()?);
            }
            "--device" => {
                i += 1;
                parsed.device = Some(option_value(args, i, "--device")?.parse()?);
            }
            "--json" => parsed.json = true,
            "--pipelined" => parsed.pipelined = true,
            "--no-wait" => parsed.no_wait = true,
            other => bail!("Unknown option for run: {}", other),
        }
        i += 1;
    }
    Ok(parsed)
}

fn cmd_run(args: &[String]) -> anyhow::Result<i32> {
    let run = parse_run_args(args)?;

    let mut wait = !run.no_wait;
    let code = run_session(&run, &mut wait).unwrap_or_else(|e| {
        eprintln!("Error: {:#}", e);
        1
    });
    if wait {
        wait_for_enter();
    }
    Ok(code)
}

/// Runs one session and returns the process exit code. `wait` follows the
/// loaded configuration as soon as it is known, so setup failures still pause.
fn run_session(run: &RunArgs, wait: &mut bool) -> anyhow::Result<i32> {
    let mut config = CrabFocusConfig::load_layered(run.config.as_ref())?;
    if let Some(frames) = run.frames {
        config.session.frame_budget = frames;
    }
    if let Some(timeout_ms) = run.timeout_ms {
        config.session.retrieve_timeout_ms = timeout_ms;
    }
    if let Some(device) = run.device {
        config.camera.device_index = device;
    }
    if run.json {
        config.report.format = ReportFormat::Json;
    }
    if run.pipelined {
        config.session.pipelined = true;
    }
    if run.no_wait {
        config.report.wait_for_enter = false;
    }
    *wait = config.report.wait_for_enter;
    let session_config = config.session_config()?;

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
            log::warn!("Ctrl-C will not stop the session cleanly: {}", e);
        }
    }

    let reporter: Box<dyn ReportSink> = match config.report.format {
        ReportFormat::Text => Box::new(TextReporter::stdout()),
        ReportFormat::Json => Box::new(JsonLinesReporter::stdout()),
    };
    let source = open_source(&config, run.device.is_some())?;

    let outcome = if config.session.pipelined {
        PipelinedSession::new(source, reporter, session_config)
            .with_queue_capacity(config.session.queue_capacity)
            .with_cancel_token(cancel)
            .run()
    } else {
        FocusSession::new(source, reporter, session_config)
            .with_cancel_token(cancel)
            .run()
    };

    Ok(exit_code(&outcome))
}

fn exit_code(outcome: &Result<SessionSummary, SessionFailure>) -> i32 {
    match outcome {
        Ok(_) => 0,
        Err(failure) => {
            eprintln!("Error: {}", failure);
            1
        }
    }
}

#[cfg(feature = "camera")]
fn open_source(
    config: &CrabFocusConfig,
    use_camera: bool,
) -> anyhow::Result<Box<dyn FrameSource + Send>> {
    if use_camera {
        return Ok(Box::new(crabfocus::platform::CameraSource::new(
            config.camera.device_index,
        )));
    }
    Ok(Box::new(SyntheticFocusSource::default()))
}

#[cfg(not(feature = "camera"))]
fn open_source(
    _config: &CrabFocusConfig,
    use_camera: bool,
) -> anyhow::Result<Box<dyn FrameSource + Send>> {
    if use_camera {
        bail!("crabfocus-cli was built without camera support (enable the `camera` feature)");
    }
    Ok(Box::new(SyntheticFocusSource::default()))
}

fn wait_for_enter() {
    eprintln!("Press Enter to exit.");
    let _ = io::stderr().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}

fn cmd_score(args: &[String]) -> anyhow::Result<i32> {
    let mut path = None;
    let mut config_path = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(option_value(args, i, "--config")?));
            }
            other if path.is_none() => path = Some(PathBuf::from(other)),
            other => bail!("Unexpected argument: {}", other),
        }
        i += 1;
    }
    let path = path.ok_or_else(|| anyhow!("Usage: crabfocus-cli score <image-path> [--config <path>]"))?;

    let config = CrabFocusConfig::load_layered(config_path.as_ref())?;
    let meter = config.session_config()?.meter();

    let image = image::open(&path)
        .with_context(|| format!("Failed to load image {}", path.display()))?;
    let frame = Frame::from_rgb(image.to_rgb8());
    let measurement = meter.measure(&frame)?;

    println!(
        "Focus: {:.3} (roi {} of {}x{})",
        measurement.level,
        measurement.roi,
        frame.width(),
        frame.height()
    );
    Ok(0)
}

fn cmd_init_config(args: &[String]) -> anyhow::Result<i32> {
    let path = args
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(CrabFocusConfig::default_path);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    CrabFocusConfig::default().save_to_file(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(0)
}
