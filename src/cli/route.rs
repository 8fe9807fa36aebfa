//! CLI route: run context and the command table. Each handler owns a small
//! presentation loop on the main thread and a tokio runtime for the workers.

use std::io::{BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::batch::{BatchController, ExecutionState};
use crate::cleanup::CleanupWorker;
use crate::cli::parse::{Commands, PromptCommands};
use crate::cli::presentation::{format_item_table, format_summary, parse_control, TerminalSink};
use crate::config::{AppConfig, ConfigLoader};
use crate::delivery::{drain_pending, EventBus};
use crate::error::{ApiError, ControlAction};
use crate::modes::ModeArbiter;
use crate::provider::{backend_from_config, AiBackend};
use crate::storage::{FileTextStore, TextStore};

const PUMP_INTERVAL: Duration = Duration::from_millis(25);

/// Runtime context for CLI execution: resolved configuration plus overrides.
pub struct RunContext {
    config: AppConfig,
    model_override: Option<String>,
    color: bool,
}

impl RunContext {
    /// Load and validate configuration. An explicit path replaces the global
    /// and working-directory files.
    pub fn new(config_path: Option<PathBuf>, model: Option<String>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(path) => ConfigLoader::load_from_file(&path)?,
            None => {
                let work_dir = std::env::current_dir()?;
                ConfigLoader::load(&work_dir)?
            }
        };
        Ok(Self::from_config(config.validated()?, model))
    }

    pub fn from_config(config: AppConfig, model_override: Option<String>) -> Self {
        let color = config.logging.color && std::io::stdout().is_terminal();
        Self {
            config,
            model_override,
            color,
        }
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Run { file, format } => self.handle_run(file, format),
            Commands::Clean { file, in_place } => self.handle_clean(file, *in_place),
            Commands::Prompt { command } => self.handle_prompt(command),
        }
    }

    fn model(&self) -> String {
        self.model_override
            .clone()
            .unwrap_or_else(|| self.config.provider.model.clone())
    }

    fn backend(&self) -> Result<Arc<dyn AiBackend>, ApiError> {
        backend_from_config(&self.config.provider)
    }

    fn cleanup_worker(&self, runtime: &Runtime) -> Result<CleanupWorker, ApiError> {
        let store: Arc<dyn TextStore> = Arc::new(FileTextStore::from_config(&self.config.storage)?);
        Ok(CleanupWorker::new(
            self.backend()?,
            self.model(),
            store,
            self.config.cleanup.clone(),
            runtime.handle().clone(),
        ))
    }

    fn handle_run(&self, file: &Path, format: &str) -> Result<String, ApiError> {
        let text = read_input(file)?;
        let runtime = build_runtime()?;
        let arbiter = Arc::new(ModeArbiter::new(self.config.modes));
        let mut controller = BatchController::new(
            self.backend()?,
            self.model(),
            arbiter,
            self.config.batch.clone(),
            runtime.handle().clone(),
        );
        let mut sink = TerminalSink::new(self.color);

        let job_id = controller.start(&text)?;
        info!(job_id = %job_id, file = %file.display(), "Running batch from file");
        eprintln!("Processing {} item(s). Type p/r/s + Enter to pause, resume or stop.", controller.snapshot().total);

        let controls = spawn_control_reader();
        loop {
            for action in drain_pending(&controls) {
                let outcome = match action {
                    ControlAction::Pause => controller.pause(),
                    ControlAction::Resume => controller.resume(),
                    ControlAction::Stop => controller.stop(),
                };
                if let Err(rejection) = outcome {
                    eprintln!("{}", rejection);
                }
            }
            controller.pump(&mut sink);
            if controller.state() == ExecutionState::Idle {
                break;
            }
            std::thread::sleep(PUMP_INTERVAL);
        }
        controller.pump(&mut sink);

        let snapshot = controller.snapshot();
        if format == "json" {
            return serde_json::to_string_pretty(&snapshot)
                .map_err(|e| ApiError::SerializationError(e.to_string()));
        }
        let mut output = format_item_table(&snapshot);
        if let Some(summary) = &snapshot.summary {
            output.push('\n');
            output.push_str(&format_summary(summary, self.color));
        }
        Ok(output)
    }

    fn handle_clean(&self, file: &Path, in_place: bool) -> Result<String, ApiError> {
        let text = read_input(file)?;
        let runtime = build_runtime()?;
        let mut worker = self.cleanup_worker(&runtime)?;
        let mut sink = TerminalSink::new(self.color);

        worker.submit_cleanup(&text)?;
        loop {
            worker.pump(&mut sink);
            if !worker.is_in_flight() {
                break;
            }
            std::thread::sleep(PUMP_INTERVAL);
        }

        if let Some(error) = sink.cleanup_error {
            return Err(error);
        }
        let Some(cleaned) = sink.cleaned else {
            return Err(ApiError::ProviderRequestFailed(
                "cleanup did not produce any text".to_string(),
            ));
        };
        if in_place {
            std::fs::write(file, &cleaned)?;
            info!(file = %file.display(), "Replaced input with cleaned text");
        }
        Ok(cleaned)
    }

    fn handle_prompt(&self, command: &PromptCommands) -> Result<String, ApiError> {
        let runtime = build_runtime()?;
        let store: Arc<dyn TextStore> = Arc::new(FileTextStore::from_config(&self.config.storage)?);
        // Prompt commands never call the backend; a misconfigured provider
        // must not block editing the prompt.
        let backend: Arc<dyn AiBackend> = match self.backend() {
            Ok(backend) => backend,
            Err(e) => {
                warn!(error = %e, "Provider unavailable");
                Arc::new(Unconfigured)
            }
        };
        let mut worker = CleanupWorker::new(
            backend,
            self.model(),
            store,
            self.config.cleanup.clone(),
            runtime.handle().clone(),
        );

        match command {
            PromptCommands::Show => Ok(worker.prompt()),
            PromptCommands::Set { text } => {
                worker.save_prompt(text)?;
                Ok("Cleanup prompt saved.".to_string())
            }
        }
    }
}

struct Unconfigured;

#[async_trait::async_trait]
impl AiBackend for Unconfigured {
    async fn generate(&self, _text: &str, _model: &str) -> Result<String, ApiError> {
        Err(ApiError::ProviderNotConfigured(
            "no usable provider configuration".to_string(),
        ))
    }

    fn provider_name(&self) -> &str {
        "unconfigured"
    }
}

fn read_input(file: &Path) -> Result<String, ApiError> {
    std::fs::read_to_string(file).map_err(|e| {
        ApiError::StorageError(format!("Failed to read {}: {}", file.display(), e))
    })
}

fn build_runtime() -> Result<Runtime, ApiError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("flashbatch-worker")
        .build()
        .map_err(|e| ApiError::ConfigError(format!("Failed to start async runtime: {}", e)))
}

/// Forward stdin control commands to the presentation loop.
fn spawn_control_reader() -> Receiver<ControlAction> {
    let (bus, receiver) = EventBus::new_pair();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if let Some(action) = parse_control(&line) {
                if !bus.emit(action) {
                    break;
                }
            }
        }
    });
    receiver
}
