use async_trait::async_trait;
use tracing::info;

use tt_api_types::{channels, UpdateStatus, UpdaterEvent};

use crate::event_hub::EventHub;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdaterError {
    #[error("updates are not available in this build")]
    Unavailable,
    #[error("no update has been downloaded")]
    NothingToInstall,
    #[error("update failed: {0}")]
    Failed(String),
}

/// Update lifecycle. Progress is reported asynchronously on
/// `updater:status`; the calls themselves only say whether the action was
/// accepted.
#[async_trait]
pub trait UpdaterService: Send + Sync + 'static {
    async fn check_for_updates(&self) -> Result<(), UpdaterError>;
    async fn download_update(&self) -> Result<(), UpdaterError>;
    async fn install_update(&self) -> Result<(), UpdaterError>;
}

/// Updater for builds without an update channel. A check always finds
/// nothing; download and install are refused.
pub struct DisabledUpdater {
    hub: EventHub,
}

impl DisabledUpdater {
    pub fn new(hub: EventHub) -> Self {
        Self { hub }
    }

    fn emit(&self, status: UpdateStatus) {
        self.hub.publish(
            channels::UPDATER_STATUS,
            &UpdaterEvent {
                status,
                ..Default::default()
            },
        );
    }
}

#[async_trait]
impl UpdaterService for DisabledUpdater {
    async fn check_for_updates(&self) -> Result<(), UpdaterError> {
        self.emit(UpdateStatus::Checking);
        info!("update check skipped, updater disabled");
        self.emit(UpdateStatus::NotAvailable);
        Ok(())
    }

    async fn download_update(&self) -> Result<(), UpdaterError> {
        Err(UpdaterError::Unavailable)
    }

    async fn install_update(&self) -> Result<(), UpdaterError> {
        Err(UpdaterError::NothingToInstall)
    }
}
