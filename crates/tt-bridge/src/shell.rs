use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use tt_api_types::{channels, AppMode};

use crate::event_hub::EventHub;
use crate::remote::{ModeSwitchHook, RemoteError};

pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 5.0;

/// Host-shell state the UI mirrors: operating mode and zoom factor.
///
/// Every change is announced on the hub so all attached views follow.
pub struct ShellState {
    mode: RwLock<AppMode>,
    zoom: RwLock<f64>,
    hub: EventHub,
}

impl ShellState {
    pub fn new(hub: EventHub) -> Self {
        Self {
            mode: RwLock::new(AppMode::Local),
            zoom: RwLock::new(1.0),
            hub,
        }
    }

    pub fn mode(&self) -> AppMode {
        *self.mode.read()
    }

    /// Record the mode and publish `mode:changed`, even when unchanged, so
    /// late views can resync.
    pub fn set_mode(&self, mode: AppMode) {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous != mode {
            info!(from = %previous, to = %mode, "mode switched");
        }
        self.hub.publish(channels::MODE_CHANGED, &mode);
    }

    pub fn zoom_factor(&self) -> f64 {
        *self.zoom.read()
    }

    /// Clamp into `MIN_ZOOM..=MAX_ZOOM`, store, and publish
    /// `zoom-factor-changed`. Non-finite input is ignored.
    pub fn set_zoom_factor(&self, factor: f64) -> f64 {
        if !factor.is_finite() {
            return self.zoom_factor();
        }
        let factor = factor.clamp(MIN_ZOOM, MAX_ZOOM);
        *self.zoom.write() = factor;
        self.hub.publish(channels::ZOOM_FACTOR_CHANGED, &factor);
        factor
    }
}

#[async_trait]
impl ModeSwitchHook for ShellState {
    async fn switch_mode(&self, mode: AppMode) -> Result<(), RemoteError> {
        self.set_mode(mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zoom_is_clamped_and_announced() {
        let hub = EventHub::new();
        let conn = hub.subscribe();
        let shell = ShellState::new(hub);

        assert_eq!(shell.zoom_factor(), 1.0);
        assert_eq!(shell.set_zoom_factor(9.0), MAX_ZOOM);
        assert_eq!(shell.set_zoom_factor(f64::NAN), MAX_ZOOM);
        assert_eq!(shell.set_zoom_factor(1.5), 1.5);

        let frames: Vec<String> = std::iter::from_fn(|| conn.try_recv())
            .map(|f| f.encode())
            .collect();
        assert_eq!(
            frames,
            vec![
                "event: zoom-factor-changed\ndata: 5.0\n\n".to_string(),
                "event: zoom-factor-changed\ndata: 1.5\n\n".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn mode_hook_records_and_publishes() {
        let hub = EventHub::new();
        let conn = hub.subscribe();
        let shell = ShellState::new(hub);

        shell.switch_mode(AppMode::Ssh).await.unwrap();
        assert_eq!(shell.mode(), AppMode::Ssh);
        assert_eq!(
            conn.try_recv().map(|f| f.encode()).as_deref(),
            Some("event: mode:changed\ndata: \"ssh\"\n\n")
        );
    }
}
