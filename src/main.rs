use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use pneumai_lib::config::{self, ClientConfig};
use pneumai_lib::models::{PatientInfo, ScanFile, ScanResult};
use pneumai_lib::pipeline::analysis::AnalysisClient;
use pneumai_lib::pipeline::hash::hash_file;
use pneumai_lib::pipeline::progress::{AbortHandle, ProgressReporter};
use pneumai_lib::pipeline::report::{export_report, load_scan_result, ReportGenerator};
use pneumai_lib::pipeline::storage::{StorageClient, UploadOutcome, UploadPipeline};
use pneumai_lib::pipeline::thumbnail::{self, generate_thumbnail, ThumbnailOptions};

/// PneumAI scan pipeline client
#[derive(Parser, Debug)]
#[command(name = "pneumai", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the SHA-256 content hash of a file
    Hash { file: PathBuf },

    /// Write a JPEG preview of a scan image
    Thumbnail {
        file: PathBuf,
        /// Output path (default: thumb_<name>.jpg next to the input)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = thumbnail::DEFAULT_MAX_WIDTH)]
        max_width: u32,
        #[arg(long, default_value_t = thumbnail::DEFAULT_MAX_HEIGHT)]
        max_height: u32,
        /// JPEG quality (0-100)
        #[arg(long, default_value_t = thumbnail::DEFAULT_JPEG_QUALITY)]
        quality: u8,
    },

    /// Upload a scan and its thumbnail to storage (Ctrl-C aborts)
    Upload {
        file: PathBuf,
        /// Upload even if the same bytes are already stored
        #[arg(long)]
        force: bool,
    },

    /// Submit a scan for analysis and optionally export reports
    Analyze {
        file: PathBuf,
        /// Print upload progress
        #[arg(long)]
        progress: bool,
        #[command(flatten)]
        report: ReportArgs,
    },

    /// Submit several slices as one batch analysis
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Build reports from a stored analysis result (JSON file)
    Report {
        result: PathBuf,
        #[command(flatten)]
        report: ReportArgs,
    },

    /// Check the analysis service
    Health,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Export a PDF report
    #[arg(long)]
    pdf: bool,
    /// Export a JSON report
    #[arg(long)]
    json: bool,
    #[arg(long, value_name = "NAME")]
    patient_name: Option<String>,
    #[arg(long, value_name = "ID")]
    patient_id: Option<String>,
    #[arg(long, value_name = "YEARS")]
    patient_age: Option<u32>,
    /// Export directory (default: PNEUMAI_EXPORT_DIR or the download directory)
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
}

impl ReportArgs {
    fn patient(&self) -> PatientInfo {
        PatientInfo {
            name: self.patient_name.clone(),
            id: self.patient_id.clone(),
            age: self.patient_age,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    pneumai_lib::init_tracing();
    let cli = Cli::parse();
    let config = ClientConfig::from_env();

    info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    match cli.command {
        Command::Hash { file } => {
            let hash = hash_file(&file).with_context(|| format!("hashing {}", file.display()))?;
            println!("{hash}  {}", file.display());
        }
        Command::Thumbnail {
            file,
            output,
            max_width,
            max_height,
            quality,
        } => {
            let scan = read_scan(&file)?;
            let options = ThumbnailOptions {
                max_width,
                max_height,
                quality,
            };
            let thumb = generate_thumbnail(&scan.bytes, &options)?;
            let output = output.unwrap_or_else(|| {
                file.with_file_name(format!("thumb_{}.jpg", stem(&scan.file_name)))
            });
            std::fs::write(&output, &thumb.bytes)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{} ({}x{})", output.display(), thumb.width, thumb.height);
        }
        Command::Upload { file, force } => {
            let scan = read_scan(&file)?;
            let mut pipeline = UploadPipeline::new(StorageClient::from_config(&config)?);
            if force {
                pipeline = pipeline.always_upload();
            }

            let reporter = ProgressReporter::new(|p| eprintln!("upload {p:>3}%"));
            let abort = AbortHandle::linked(&reporter);
            let on_ctrl_c = abort.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.abort();
                }
            });

            match pipeline.upload_scan(&scan, &reporter, &abort).await {
                Ok(UploadOutcome::Uploaded(receipt)) => {
                    println!("{}", serde_json::to_string_pretty(&receipt)?);
                }
                Ok(UploadOutcome::Duplicate { file_hash, existing }) => {
                    println!(
                        "duplicate of {} (hash {file_hash})",
                        existing.scan_id.as_deref().unwrap_or("an existing scan")
                    );
                }
                Err(e) if e.is_aborted() => {
                    warn!("Upload cancelled by user");
                    std::process::exit(130);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Analyze {
            file,
            progress,
            report,
        } => {
            let scan = read_scan(&file)?;
            let client = AnalysisClient::from_config(&config)?;
            let result = if progress {
                let reporter = ProgressReporter::new(|p| eprintln!("upload {p:>3}%"));
                client.analyze_with_progress(&scan, Utc::now(), &reporter).await?
            } else {
                client.analyze(&scan, Utc::now()).await?
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
            export_reports(&result, &report, &config)?;
        }
        Command::Batch { files } => {
            let scans = files
                .iter()
                .map(|f| read_scan(f))
                .collect::<Result<Vec<_>>>()?;
            let client = AnalysisClient::from_config(&config)?;
            let batch = client.analyze_batch(&scans, Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&batch)?);
        }
        Command::Report { result, report } => {
            let json = std::fs::read_to_string(&result)
                .with_context(|| format!("reading {}", result.display()))?;
            let scan = load_scan_result(&json)?;
            if !report.pdf && !report.json {
                warn!("Neither --pdf nor --json given; nothing to export");
            }
            export_reports(&scan, &report, &config)?;
        }
        Command::Health => {
            let client = AnalysisClient::from_config(&config)?;
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            if !health.is_healthy() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn read_scan(path: &Path) -> Result<ScanFile> {
    ScanFile::from_path(path).with_context(|| format!("reading {}", path.display()))
}

fn stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

fn export_reports(scan: &ScanResult, args: &ReportArgs, config: &ClientConfig) -> Result<()> {
    let generator = ReportGenerator::now();
    let patient = args.patient();
    let dir = args.out.as_deref().unwrap_or(&config.export_dir);

    if args.pdf {
        let bytes = generator.render_pdf(scan, &patient)?;
        let path = export_report(&bytes, &generator.filename(scan, "pdf"), dir)?;
        println!("{}", path.display());
    }
    if args.json {
        let bytes = generator.render_json(scan, &patient)?;
        let path = export_report(&bytes, &generator.filename(scan, "json"), dir)?;
        println!("{}", path.display());
    }
    Ok(())
}
