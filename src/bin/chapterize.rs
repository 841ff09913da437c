use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chapterize::{
    Chapter, ChapterPipeline, DirectorySink, FfmpegLogLevel, FrameSampler, FrameSink, ManifestEntry,
    MediaFile, MergeOptions, PipelineOptions, PixelFormat, PredictionDirectory, ProgressCallback,
    ProgressInfo, SampleOptions, VideoChapters, VideoSource,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  chapterize metadata talk.ogv --json\n  chapterize sample talk.ogv --out frames --progress\n  chapterize chapters predictions/talk --video talk.ogv\n  chapterize run part_1.ogv part_2.ogv --out frames --predictions predictions\n  chapterize completions zsh > _chapterize";

#[derive(Debug, Parser)]
#[command(
    name = "chapterize",
    version,
    about = "Sample video frames and merge their classifications into chapters",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output (skipped frames, written files).
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while sampling.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow writing into existing output directories.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Pixel format of sampled frames (rgb8, rgba8, gray8).
    #[arg(long, global = true)]
    pixel_format: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print video metadata.
    #[command(
        about = "Print video metadata",
        visible_alias = "info",
        after_help = "Examples:\n  chapterize metadata talk.ogv\n  chapterize metadata talk.ogv --json"
    )]
    Metadata {
        /// Input video path or URL.
        input: String,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Sample one frame per second and write a classification manifest.
    #[command(
        about = "Sample frames for classification",
        after_help = "Examples:\n  chapterize sample talk.ogv --out frames\n  chapterize sample talk.ogv --out frames --ext jpg --progress"
    )]
    Sample {
        /// Input video path or URL.
        input: String,
        /// Output directory; frames land in `<out>/<video id>/`.
        #[arg(long)]
        out: PathBuf,
        /// Frame image extension (png, jpg, jpeg, bmp, tiff).
        #[arg(long, default_value = "png")]
        ext: String,
    },

    /// Merge prediction records into chapters.
    #[command(
        about = "Merge predictions into chapters",
        after_help = "Examples:\n  chapterize chapters predictions/talk --fps 29.97\n  chapterize chapters predictions/talk --video talk.ogv --json"
    )]
    Chapters {
        /// Directory containing `*.jsonl` prediction files.
        predictions: PathBuf,
        /// Frame rate used to convert frame indices to time.
        #[arg(long, conflicts_with = "video", required_unless_present = "video")]
        fps: Option<f64>,
        /// Read the frame rate from this video instead of `--fps`.
        #[arg(long)]
        video: Option<String>,
        /// Print chapters as JSON.
        #[arg(long)]
        json: bool,
        /// Print nothing instead of failing when there are no predictions.
        #[arg(long)]
        allow_empty: bool,
    },

    /// Sample, classify from stored predictions, and merge, for each video.
    #[command(
        about = "Run the full pipeline for several videos",
        after_help = "Examples:\n  chapterize run part_1.ogv part_2.ogv --out frames --predictions predictions --parallelism 5"
    )]
    Run {
        /// Input video paths or URLs.
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Output directory for sampled frames and manifests.
        #[arg(long)]
        out: PathBuf,
        /// Root directory holding `<video id>/*.jsonl` predictions.
        #[arg(long)]
        predictions: PathBuf,
        /// Maximum number of videos processed at once.
        #[arg(long, default_value_t = 5)]
        parallelism: usize,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_image_format(value: &str) -> Option<ImageFormat> {
    match value.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "png" => Some(ImageFormat::Png),
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "bmp" => Some(ImageFormat::Bmp),
        "tif" | "tiff" => Some(ImageFormat::Tiff),
        _ => None,
    }
}

fn ensure_output_directory(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if !overwrite {
            return Err(format!(
                "output directory already exists: {} (use --overwrite)",
                path.display()
            )
            .into());
        }
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("writing into existing directory {}", path.display()).yellow()
        );
    }
    fs::create_dir_all(path)?;
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level.parse()?;
        chapterize::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

fn base_sample_options(global: &GlobalOptions) -> Result<SampleOptions, Box<dyn std::error::Error>> {
    let mut options = SampleOptions::new();
    if let Some(pixel_format) = &global.pixel_format {
        let parsed: PixelFormat = pixel_format.parse()?;
        options = options.with_pixel_format(parsed);
    }
    Ok(options)
}

/// Drives an indicatif bar from sampler progress callbacks.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        if let Some(frame) = info.current_frame {
            self.bar.set_message(format!("frame {frame}"));
        }
    }
}

/// Counts frames sampled across every video of a `run`.
///
/// Videos sample concurrently and their totals are unknown up front, so the
/// bar is a running count rather than a ratio. Expects a batch size of 1.
struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    fn new(videos: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} frames sampled [{elapsed_precise}] {msg}",
        )?);
        bar.set_message(format!("{videos} video(s)"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for RunProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.current_frame.is_some() {
            self.bar.inc(1);
        }
    }
}

fn chapters_json(chapters: &[Chapter]) -> serde_json::Value {
    chapters
        .iter()
        .map(|chapter| {
            json!({
                "display_name": chapter.display_name,
                "start": chapterize::format_timestamp(chapter.start),
                "end": chapterize::format_timestamp(chapter.end),
                "start_seconds": chapter.start.as_secs_f64(),
                "end_seconds": chapter.end.as_secs_f64(),
            })
        })
        .collect()
}

fn video_json(video: &VideoChapters) -> serde_json::Value {
    json!({
        "video": video.video,
        "video_id": video.video_id,
        "fps": video.frames_per_second,
        "frames": video.frames.len(),
        "skipped": video.skipped,
        "manifest": video.manifest,
        "chapters": chapters_json(&video.chapters),
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Metadata { input, json } => {
            let media = MediaFile::open(&input)?;
            let metadata = media.metadata();
            if json {
                let payload = json!({
                    "format": metadata.format,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "width": metadata.width,
                    "height": metadata.height,
                    "fps": metadata.frames_per_second,
                    "frame_count": metadata.frame_count,
                    "codec": metadata.codec,
                    "sampled_frames": chapterize::sample_indices(
                        metadata.frame_count,
                        metadata.frames_per_second,
                    ).map(|indices| indices.len()).ok(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {}", metadata.format);
                println!("Duration: {:?}", metadata.duration);
                println!(
                    "Video: {}x{} @ {:.3} fps [{}]",
                    metadata.width, metadata.height, metadata.frames_per_second, metadata.codec,
                );
                println!("Frames: {}", metadata.frame_count);
            }
        }
        Commands::Sample { input, out, ext } => {
            let image_format =
                parse_image_format(&ext).ok_or(format!("unsupported --ext: {ext}"))?;
            ensure_output_directory(&out, cli.global.overwrite)?;

            let mut options = base_sample_options(&cli.global)?.with_image_format(image_format);
            let progress = if cli.global.progress {
                let progress = Arc::new(BarProgress::new()?);
                options = options.with_progress(progress.clone());
                Some(progress)
            } else {
                None
            };

            let mut media = MediaFile::open(&input)?;
            media.set_frame_output(options.frame_output().clone());
            let video_id = chapterize::video_identity(&input);
            let sink = DirectorySink::new(&out);

            let (frames, report) = FrameSampler::new(&options)
                .sample_to_sink_with_report(&mut media, &sink, &video_id)?;

            if let Some(progress) = progress {
                progress.bar.finish_with_message("done");
            }

            let entries = ManifestEntry::for_frames(&frames, image_format);
            let key = chapterize::manifest_key(&video_id);
            let written = sink
                .put_manifest(&key, &entries)?
                .unwrap_or_else(|| out.join(&key).display().to_string());

            if cli.global.verbose {
                for frame in &frames {
                    eprintln!("saved frame {} -> {}", frame.index, frame.uri);
                }
            }
            if !report.skipped.is_empty() {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("could not read frames {:?}", report.skipped).yellow()
                );
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "Sampled {} frame(s) at {:.3} fps to {}; manifest {}",
                    frames.len(),
                    media.frames_per_second(),
                    out.join(&video_id).display(),
                    written
                )
                .green()
            );
        }
        Commands::Chapters {
            predictions,
            fps,
            video,
            json,
            allow_empty,
        } => {
            let frames_per_second = match (fps, video) {
                (Some(fps), _) => fps,
                (None, Some(video)) => MediaFile::open(&video)?.metadata().frames_per_second,
                (None, None) => return Err("provide --fps or --video".into()),
            };

            let results = chapterize::read_predictions(&predictions)?;
            let options = MergeOptions::new().with_allow_empty(allow_empty);
            let chapters = chapterize::merge_chapters(&results, frames_per_second, &options)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&chapters_json(&chapters))?);
            } else {
                for chapter in &chapters {
                    println!("{chapter}");
                }
            }
        }
        Commands::Run {
            inputs,
            out,
            predictions,
            parallelism,
            json,
        } => {
            ensure_output_directory(&out, cli.global.overwrite)?;

            let mut sample_options = base_sample_options(&cli.global)?;
            let progress = if cli.global.progress {
                let progress = Arc::new(RunProgress::new(inputs.len())?);
                sample_options = sample_options
                    .with_progress(progress.clone())
                    .with_batch_size(1);
                Some(progress)
            } else {
                None
            };

            let options = PipelineOptions::new()
                .with_sample_options(sample_options)
                .with_parallelism(parallelism);
            let pipeline = ChapterPipeline::new(
                DirectorySink::new(&out),
                PredictionDirectory::new(&predictions),
            )
            .with_options(options);

            let results = pipeline.process_many(&inputs);
            if let Some(progress) = progress {
                progress.bar.finish_with_message("done");
            }
            let failures = results.iter().filter(|result| result.is_err()).count();

            if json {
                let payload: Vec<_> = inputs
                    .iter()
                    .zip(&results)
                    .map(|(input, result)| match result {
                        Ok(video) => video_json(video),
                        Err(error) => json!({
                            "video": input,
                            "stage": error.stage().map(|stage| stage.to_string()),
                            "error": error.to_string(),
                        }),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for (input, result) in inputs.iter().zip(&results) {
                    match result {
                        Ok(video) => {
                            println!("{}", input.bold());
                            for chapter in &video.chapters {
                                println!("  {chapter}");
                            }
                            if cli.global.verbose && !video.skipped.is_empty() {
                                eprintln!("  could not read frames {:?}", video.skipped);
                            }
                        }
                        Err(error) => {
                            eprintln!("{} {}: {error}", "failed:".red().bold(), input);
                        }
                    }
                }
            }

            if failures > 0 {
                return Err(format!("{failures} of {} video(s) failed", inputs.len()).into());
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "chapterize", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
