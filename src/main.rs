//! MenuLens - Read text from photographed menus
//!
//! Loads a photo, maps the selected regions from the viewport the photo was
//! shown in onto the image, normalizes contrast and runs each region through
//! the OCR engine.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use menu_lens::capture::{CaptureSource, FileCapture};
use menu_lens::config::{self, AppConfig};
use menu_lens::geometry::{DisplaySpace, Rect, Size};
use menu_lens::storage;
use menu_lens::vision::{
    preprocess, BatchOutput, DiagnosticSink, RecognitionService, RecognitionTask, SegmentationMode,
    TaskBatch, TaskOrchestrator, TaskOutcome, TesseractFactory, WorkingImage, CHAR_WHITELIST,
};

/// MenuLens - OCR for photographed menus
#[derive(Parser, Debug)]
#[command(name = "menu-lens")]
#[command(about = "Recognize text in regions of a menu photo")]
struct Args {
    /// Photo to read (PNG, JPEG, ...)
    image: PathBuf,

    /// Viewport the photo was displayed in, e.g. 390x844 (defaults to the image size)
    #[arg(long, value_parser = parse_viewport)]
    viewport: Option<Size<DisplaySpace>>,

    /// Region in viewport coordinates as LEFT,TOP,WIDTH,HEIGHT (repeatable)
    #[arg(long = "region", value_parser = parse_region)]
    regions: Vec<Rect<DisplaySpace>>,

    /// Page segmentation mode
    #[arg(long, value_enum)]
    mode: Option<SegmentationMode>,

    /// Recognition language (repeatable, Tesseract codes)
    #[arg(long = "lang")]
    languages: Vec<String>,

    /// Only recognize these characters
    #[arg(long)]
    whitelist: Option<String>,

    /// JSON file holding one task or a list of tasks
    #[arg(long, conflicts_with_all = ["regions", "mode", "languages", "whitelist"])]
    tasks: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Write the preprocessed image to this path and exit
    #[arg(long)]
    preprocess_only: Option<PathBuf>,

    /// Write the working image to this path before recognition
    #[arg(long)]
    dump_working: Option<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let config = load_or_create_config(args.config.as_deref())?;

    let mut source = FileCapture::new(&args.image, args.viewport);
    debug!("Capture capabilities: {:?}", source.capabilities());
    let frame = source.capture()?;

    if let Some(out) = &args.preprocess_only {
        let working = preprocess(frame.image(), &config.preprocessing)?;
        let (width, height) = (working.width(), working.height());
        working
            .into_inner()
            .save(out)
            .with_context(|| format!("Failed to write {:?}", out))?;
        info!("Wrote {}x{} working image to {:?}", width, height, out);
        return Ok(());
    }

    let batch = build_batch(&args)?;

    let factory = Arc::new(TesseractFactory::new(&config.recognition));
    let mut orchestrator = TaskOrchestrator::new(factory, &config);
    let dump_path = args
        .dump_working
        .clone()
        .or_else(|| config.diagnostics.dump_working_image.clone());
    if let Some(path) = dump_path {
        orchestrator = orchestrator.with_diagnostic_sink(dump_sink(path));
    }

    let service = RecognitionService::spawn(orchestrator)?;
    let output = service.recognize(frame, batch).await?;
    service.terminate().await?;

    let status = service.status();
    info!(
        "Finished {} batch(es), {} failed task(s)",
        status.batches_completed, status.tasks_failed
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output_json(&output))?);
    } else {
        print_output(&output);
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Results go to stdout; keep logs out of the way
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path).with_context(|| format!("Failed to load config {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    match storage::default_config_path() {
        Ok(config_path) if config_path.exists() => {
            let config = config::load_config(&config_path)
                .with_context(|| format!("Failed to load config {:?}", config_path))?;
            info!("Loaded configuration from {:?}", config_path);
            Ok(config)
        }
        Ok(config_path) => {
            let config = AppConfig::default();
            match config::save_config(&config, &config_path) {
                Ok(()) => info!("Wrote default configuration to {:?}", config_path),
                Err(e) => warn!("Could not write default configuration: {}", e),
            }
            Ok(config)
        }
        Err(e) => {
            warn!("{}; using default configuration", e);
            Ok(AppConfig::default())
        }
    }
}

/// Turn the command-line flags into a task batch
fn build_batch(args: &Args) -> Result<TaskBatch> {
    if let Some(path) = &args.tasks {
        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let batch: TaskBatch =
            serde_json::from_str(&content).with_context(|| format!("Invalid task file {:?}", path))?;
        return Ok(batch);
    }

    let mut template = RecognitionTask::new();
    if !args.languages.is_empty() {
        template = template.with_languages(args.languages.iter().cloned());
    }
    if let Some(mode) = args.mode {
        template = template.with_mode(mode);
    }
    if let Some(whitelist) = &args.whitelist {
        template = template.with_parameter(CHAR_WHITELIST, whitelist.clone());
    }

    Ok(match args.regions.as_slice() {
        [] => TaskBatch::Single(template),
        [region] => TaskBatch::Single(template.with_region(*region)),
        regions => TaskBatch::Many(
            regions
                .iter()
                .map(|region| template.clone().with_region(*region))
                .collect(),
        ),
    })
}

fn dump_sink(path: PathBuf) -> DiagnosticSink {
    Box::new(move |working: &WorkingImage| match working.image().save(&path) {
        Ok(()) => debug!("Dumped working image to {:?}", path),
        Err(e) => warn!("Failed to dump working image to {:?}: {}", path, e),
    })
}

fn print_output(output: &BatchOutput) {
    match output {
        BatchOutput::Single(outcome) => println!("{}", outcome),
        BatchOutput::Many(outcomes) => {
            for (index, outcome) in outcomes.iter().enumerate() {
                println!("[{}] {}", index + 1, outcome);
            }
        }
    }
}

fn outcome_json(outcome: &TaskOutcome) -> serde_json::Value {
    match (outcome.text(), outcome.error()) {
        (Some(text), _) => serde_json::json!({ "text": text }),
        (None, Some(err)) => serde_json::json!({ "error": err.to_string() }),
        (None, None) => serde_json::Value::Null,
    }
}

fn output_json(output: &BatchOutput) -> serde_json::Value {
    match output {
        BatchOutput::Single(outcome) => outcome_json(outcome),
        BatchOutput::Many(outcomes) => outcomes.iter().map(outcome_json).collect(),
    }
}

fn parse_viewport(s: &str) -> std::result::Result<Size<DisplaySpace>, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width: f32 = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
    let height: f32 = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
    let size = Size::new(width, height);
    if size.is_degenerate() {
        return Err(format!("viewport {}x{} has no area", width, height));
    }
    Ok(size)
}

fn parse_region(s: &str) -> std::result::Result<Rect<DisplaySpace>, String> {
    let values = s
        .split(',')
        .map(|part| part.trim().parse::<f32>().map_err(|_| format!("invalid number '{}'", part)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(format!("region values must be finite, got {}", bad));
    }
    match values.as_slice() {
        &[left, top, width, height] => Ok(Rect::new(left, top, width, height)),
        _ => Err(format!("expected LEFT,TOP,WIDTH,HEIGHT, got '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use menu_lens::OcrError;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["menu-lens", "menu.jpg"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_viewport() {
        assert_eq!(parse_viewport("390x844").unwrap(), Size::new(390.0, 844.0));
        assert!(parse_viewport("390").is_err());
        assert!(parse_viewport("0x844").is_err());
    }

    #[test]
    fn test_parse_region() {
        assert_eq!(parse_region("10, 20,30,40").unwrap(), Rect::new(10.0, 20.0, 30.0, 40.0));
        assert!(parse_region("10,20,30").is_err());
        assert!(parse_region("a,b,c,d").is_err());
        assert!(parse_region("nan,0,10,10").is_err());
        assert!(parse_region("0,0,inf,10").is_err());
    }

    #[test]
    fn test_flags_build_single_task() {
        let args = args(&["--mode", "single-line", "--whitelist", "0123456789", "--lang", "eng"]);
        let batch = build_batch(&args).unwrap();
        let TaskBatch::Single(task) = batch else {
            panic!("expected a single task");
        };
        assert_eq!(task.segmentation_mode, Some(SegmentationMode::SingleLine));
        assert_eq!(task.languages.unwrap().to_string(), "eng");
        assert!(task.region.is_none());
    }

    #[test]
    fn test_repeated_regions_build_list() {
        let args = args(&["--region", "0,0,10,10", "--region", "5,5,20,20"]);
        let batch = build_batch(&args).unwrap();
        assert!(matches!(batch, TaskBatch::Many(ref tasks) if tasks.len() == 2));
        assert_eq!(batch.tasks()[1].region, Some(Rect::new(5.0, 5.0, 20.0, 20.0)));
    }

    #[test]
    fn test_tasks_conflict_with_flags() {
        let argv = ["menu-lens", "menu.jpg", "--tasks", "t.json", "--mode", "auto"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_json_output_shape() {
        let single = output_json(&BatchOutput::Single(TaskOutcome::Recognized("Soup".to_string())));
        assert_eq!(single, serde_json::json!({ "text": "Soup" }));

        let many = output_json(&BatchOutput::Many(vec![
            TaskOutcome::Recognized(String::new()),
            TaskOutcome::Failed(OcrError::RecognitionFailure("timeout".to_string())),
        ]));
        assert_eq!(
            many,
            serde_json::json!([{ "text": "" }, { "error": "recognition failed: timeout" }])
        );
    }
}
