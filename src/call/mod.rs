//! Video-call and alert-tone capabilities.
//!
//! The coordinator only decides *when* a call starts or stops and when the
//! ringtone sounds; the media side lives behind [`VideoCall`] and
//! [`AlertTone`]. A missing capability is a normal state, not an error.

pub mod console;

use async_trait::async_trait;

pub use console::{ConsoleVideoCall, TerminalBell};

/// Call and tone failures. Always converted into a user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    Unavailable(String),
    LaunchFailed(String),
    ToneFailed(String),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Unavailable(e) => write!(f, "Video unavailable: {e}"),
            CallError::LaunchFailed(e) => write!(f, "Call launch failed: {e}"),
            CallError::ToneFailed(e) => write!(f, "Ringtone failed: {e}"),
        }
    }
}

impl std::error::Error for CallError {}

/// How the patient appears to the other participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallIdentity {
    pub display_name: String,
}

impl CallIdentity {
    pub fn for_patient(patient_id: &str) -> Self {
        Self {
            display_name: format!("Patient {patient_id}"),
        }
    }
}

/// Launches and ends the video call for a room.
#[async_trait]
pub trait VideoCall: Send + Sync {
    async fn start(&self, room: &str, identity: &CallIdentity) -> Result<(), CallError>;

    /// End the current call. Ending with no call in progress is not an error.
    async fn end(&self) -> Result<(), CallError>;
}

/// Looping ringtone for incoming calls.
#[async_trait]
pub trait AlertTone: Send + Sync {
    /// Start looping. A request while already sounding is a no-op.
    async fn play_looped(&self) -> Result<(), CallError>;

    async fn stop(&self) -> Result<(), CallError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_identity() {
        assert_eq!(CallIdentity::for_patient("42").display_name, "Patient 42");
    }
}
