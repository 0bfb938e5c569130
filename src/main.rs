// src/main.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use strategy_insights::backfill;
use strategy_insights::config::Config;
use strategy_insights::repository::{FileRepositoryManager, MemoryRepositoryManager, RepositoryManager};
use strategy_insights::services::documents::UploadFile;
use strategy_insights::services::upload::{simulate_upload_progress, UploadProgress};
use strategy_insights::services::ServiceManager;
use strategy_insights::storage::{InsightSource, NewProject, ReviewStatus};
use strategy_insights::web;

#[derive(Parser)]
#[command(name = "strategy-insights")]
#[command(about = "Upload client material, analyze it and review strategic insights")]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml when present)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Web {
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep all data in memory instead of the data directory
        #[arg(long)]
        ephemeral: bool,
    },
    /// Create a project
    CreateProject {
        #[arg(short, long)]
        title: String,
        #[arg(short = 'n', long)]
        client_name: String,
        #[arg(short, long)]
        industry: Option<String>,
        #[arg(short, long)]
        website: Option<String>,
    },
    /// List all projects
    ListProjects,
    /// Upload documents to a project
    Upload {
        #[arg(short, long)]
        project: String,
        #[arg(short, long, default_value = "cli")]
        user: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Analyze the uploaded documents of a project
    Analyze {
        #[arg(short, long)]
        project: String,
    },
    /// Analyze the client website of a project
    AnalyzeWebsite {
        #[arg(short, long)]
        project: String,
    },
    /// Print the stored insights of a project
    Insights {
        #[arg(short, long)]
        project: String,
    },
    /// Accept or reject an insight
    Review {
        #[arg(short, long)]
        project: String,
        #[arg(short, long)]
        insight: String,
        #[arg(short, long, value_enum)]
        status: ReviewChoice,
    },
    /// Show review statistics and the presentation outline
    Stats {
        #[arg(short, long)]
        project: String,
    },
    /// Re-run analysis for projects holding fallback data
    Backfill,
    /// Show or write the configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Write the current configuration to a file
    Init {
        #[arg(default_value = "config.toml")]
        path: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReviewChoice {
    Accepted,
    Rejected,
    Pending,
}

impl From<ReviewChoice> for ReviewStatus {
    fn from(choice: ReviewChoice) -> Self {
        match choice {
            ReviewChoice::Accepted => ReviewStatus::Accepted,
            ReviewChoice::Rejected => ReviewStatus::Rejected,
            ReviewChoice::Pending => ReviewStatus::Pending,
        }
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load_from_file(path)?;
            config.load_from_env()?;
            config.validate()?;
            Ok(config)
        }
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    info!("Starting strategy-insights...");

    match cli.command {
        Commands::Web { port, ephemeral } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if ephemeral {
                warn!("Running with in-memory storage; data is lost on exit");
                let repos = Arc::new(MemoryRepositoryManager::new());
                web::start_server(Arc::new(ServiceManager::new(repos, &config)?)).await
            } else {
                let services = file_services(&config).await?;
                web::start_server(services).await
            }
        }
        Commands::Config { action } => show_or_write_config(&config, action),
        command => {
            let services = file_services(&config).await?;
            run_command(command, services).await
        }
    }
}

async fn file_services(config: &Config) -> Result<Arc<ServiceManager<FileRepositoryManager>>> {
    let root = config.storage.data_directory.join("records");
    let repos = FileRepositoryManager::open(&root)
        .await
        .with_context(|| format!("Failed to open data directory {}", root.display()))?;
    Ok(Arc::new(ServiceManager::new(Arc::new(repos), config)?))
}

fn show_or_write_config(config: &Config, action: Option<ConfigCommands>) -> Result<()> {
    match action.unwrap_or(ConfigCommands::Show) {
        ConfigCommands::Show => {
            info!("Environment: {:?}", config.environment);
            info!("Server: {}:{}", config.server.host, config.server.port);
            info!("Analysis backend: {}", config.backend.base_url);
            info!(
                "AI API key: {} ({})",
                config.ai.masked_key(),
                if config.ai.is_configured() { "valid" } else { "analysis will use fallback data" }
            );
            info!("Data directory: {}", config.storage.data_directory.display());
            info!(
                "Upload limits: {} files, {} bytes each, types {}",
                config.upload.max_files,
                config.upload.max_file_size,
                config.upload.allowed_extensions.join(", ")
            );
        }
        ConfigCommands::Init { path } => {
            config.save_to_file(&path)?;
            info!("Configuration written to {}", path);
        }
    }
    Ok(())
}

async fn read_upload(path: &PathBuf) -> Result<UploadFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(UploadFile {
        name,
        mime_type: None,
        data,
    })
}

/// Log analysis progress until the task is aborted.
async fn log_progress<R: RepositoryManager>(services: Arc<ServiceManager<R>>, project_id: String) {
    let mut last = None;
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        if let Ok(job) = services.analysis().status(&project_id).await {
            let snapshot = (job.status.progress, job.status.message.clone());
            if last.as_ref() != Some(&snapshot) {
                info!("[{:>3}%] {}", snapshot.0, snapshot.1);
                last = Some(snapshot);
            }
        }
    }
}

async fn analyze<R: RepositoryManager>(
    services: Arc<ServiceManager<R>>,
    project_id: &str,
    source: InsightSource,
) -> Result<()> {
    let watcher = tokio::spawn(log_progress(services.clone(), project_id.to_string()));
    let result = services.analysis().run(project_id, source).await;
    watcher.abort();

    let report = result?;
    info!("{} ({}%)", report.status.message, report.status.progress);
    info!("Project now holds {} insights", report.insight_count);
    if let Some(reason) = &report.error {
        warn!(
            "{}{}",
            reason,
            if report.retriable { " (retrying may help)" } else { "" }
        );
    }
    Ok(())
}

async fn run_command<R: RepositoryManager>(command: Commands, services: Arc<ServiceManager<R>>) -> Result<()> {
    match command {
        Commands::CreateProject {
            title,
            client_name,
            industry,
            website,
        } => {
            let project = services
                .projects()
                .create(NewProject {
                    title,
                    client_name,
                    client_industry: industry,
                    client_website: website,
                })
                .await?;
            info!("Created project {} ({})", project.title, project.id);
        }
        Commands::ListProjects => {
            for project in services.projects().list().await? {
                info!(
                    "Project ID: {}, Title: {}, Client: {}, Status: {:?}, Created: {}",
                    project.id, project.title, project.client_name, project.status, project.created_at
                );
            }
        }
        Commands::Upload { project, user, files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                uploads.push(read_upload(path).await?);
            }

            let progress = UploadProgress::new(uploads.iter().map(|f| f.name.clone()), 20);
            let interval = Duration::from_millis(services.config().upload.progress_interval_ms);
            let (report, _) = tokio::join!(
                services.documents().upload(&project, &user, uploads),
                simulate_upload_progress(progress, interval, |p| {
                    for (name, percent) in p.entries() {
                        info!("Uploading {}: {}%", name, percent);
                    }
                })
            );
            let report = report?;

            for document in &report.uploaded {
                info!(
                    "Uploaded {} as {} (priority {})",
                    document.name, document.id, document.priority
                );
            }
            for rejected in &report.rejected {
                warn!("Rejected {}: {}", rejected.name, rejected.reason);
            }
            if !report.local_only.is_empty() {
                warn!("{} documents were kept locally only", report.local_only.len());
            }
        }
        Commands::Analyze { project } => {
            analyze(services, &project, InsightSource::Document).await?;
        }
        Commands::AnalyzeWebsite { project } => {
            analyze(services, &project, InsightSource::Website).await?;
        }
        Commands::Insights { project } => {
            services.projects().get(&project).await?;
            let record = services.insights().load(&project).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Review {
            project,
            insight,
            status,
        } => {
            let stats = services
                .reviews()
                .set_status(&project, &insight, status.into())
                .await?;
            info!(
                "Accepted {}, rejected {}, pending {}, overall confidence {}%",
                stats.accepted, stats.rejected, stats.pending, stats.overall_confidence
            );
        }
        Commands::Stats { project } => {
            services.projects().get(&project).await?;
            let snapshot = services.reviews().snapshot(&project).await?;
            let stats = &snapshot.stats;
            info!(
                "{} insights: {} accepted, {} rejected, {} pending, overall confidence {}%",
                stats.total, stats.accepted, stats.rejected, stats.pending, stats.overall_confidence
            );
            if snapshot.using_fallback_data {
                warn!("These insights are fallback data, not AI analysis");
            }
            for section in services.reviews().outline(&project).await? {
                info!("{}", section.heading);
                for insight in &section.insights {
                    info!("  - {} ({}%)", insight.title(), insight.confidence);
                }
            }
        }
        Commands::Backfill => {
            info!("Starting backfill process...");
            backfill::backfill_projects(services.as_ref()).await?;
        }
        Commands::Web { .. } | Commands::Config { .. } => {
            anyhow::bail!("this command does not use project storage")
        }
    }

    Ok(())
}
