pub mod capture;
pub mod cli;
pub mod commands;
pub mod error;
pub mod export;
pub mod identity;
pub mod sampler;
pub mod scoring;
pub mod session;
pub mod settings;
pub mod training;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command};
use scoring::{build_model, EmotionScorer};
use session::SessionController;
use settings::SettingsStore;

pub struct AppState {
    pub settings: SettingsStore,
    pub session: SessionController,
}

impl AppState {
    /// Wires the camera, model and session controller from the current settings.
    pub fn from_settings(settings: SettingsStore) -> Result<Self> {
        let current = settings.current();

        let source = capture::build_source(&current.camera)
            .context("Failed to set up the camera backend")?;
        let model = build_model(&current.model);
        let scorer = EmotionScorer::new(model)
            .with_training_step(Duration::from_millis(current.model.training_step_ms));
        let session = SessionController::new(
            source,
            Arc::new(scorer),
            current.session.sampler_config(),
        );

        Ok(Self { settings, session })
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let settings_store = SettingsStore::new(cli.config.clone())?;
    let mut settings = settings_store.current();
    settings.apply_env();
    utils::init_logging(cli.debug || settings.debug);

    log::info!("emotrust starting up...");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async move {
        let state = AppState::from_settings(settings_store)?;
        match cli.command {
            Command::Analyze(args) => commands::analyze(&state, args).await,
            Command::Train(args) => commands::train(&state, args).await,
        }
    })
}
