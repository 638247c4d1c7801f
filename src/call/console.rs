//! Terminal implementations of the call capabilities.
//!
//! `ConsoleVideoCall` prints the meeting link instead of embedding a video
//! client; `TerminalBell` rings the terminal bell until stopped.

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::{AlertTone, CallError, CallIdentity, VideoCall};

/// Bell repetition while an incoming call is pending.
const BELL_PERIOD: Duration = Duration::from_secs(2);

pub struct ConsoleVideoCall {
    base_url: String,
    current: Mutex<Option<String>>,
}

impl ConsoleVideoCall {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            current: Mutex::new(None),
        }
    }

    /// Meeting link for a room.
    pub fn room_url(&self, room: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), room)
    }

    pub fn current_url(&self) -> Option<String> {
        self.current.lock().ok().and_then(|current| current.clone())
    }
}

#[async_trait]
impl VideoCall for ConsoleVideoCall {
    async fn start(&self, room: &str, identity: &CallIdentity) -> Result<(), CallError> {
        let url = self.room_url(room);
        let mut current = self
            .current
            .lock()
            .map_err(|_| CallError::LaunchFailed("call state poisoned".to_string()))?;

        tracing::info!("Video call started as '{}': {url}", identity.display_name);
        println!("Join the video call: {url}");
        *current = Some(url);
        Ok(())
    }

    async fn end(&self) -> Result<(), CallError> {
        if let Ok(mut current) = self.current.lock() {
            if let Some(url) = current.take() {
                tracing::info!("Video call ended: {url}");
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct TerminalBell {
    ringing: Mutex<Option<JoinHandle<()>>>,
}

impl TerminalBell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ringing(&self) -> bool {
        self.ringing
            .lock()
            .map(|ringing| ringing.is_some())
            .unwrap_or(false)
    }
}

#[async_trait]
impl AlertTone for TerminalBell {
    async fn play_looped(&self) -> Result<(), CallError> {
        let mut ringing = self
            .ringing
            .lock()
            .map_err(|_| CallError::ToneFailed("tone state poisoned".to_string()))?;
        if ringing.is_some() {
            return Ok(());
        }

        *ringing = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(BELL_PERIOD);
            loop {
                ticker.tick().await;
                let mut stderr = std::io::stderr();
                let _ = stderr.write_all(b"\x07");
                let _ = stderr.flush();
            }
        }));
        tracing::debug!("Ringtone started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), CallError> {
        if let Ok(mut ringing) = self.ringing.lock() {
            if let Some(handle) = ringing.take() {
                handle.abort();
                tracing::debug!("Ringtone stopped");
            }
        }
        Ok(())
    }
}

impl Drop for TerminalBell {
    fn drop(&mut self) {
        if let Ok(mut ringing) = self.ringing.lock() {
            if let Some(handle) = ringing.take() {
                handle.abort();
            }
        }
    }
}
