//! Session value objects and coordinator inputs.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::routing::RoutingError;
use crate::call::{AlertTone, CallIdentity, VideoCall};
use crate::sensor::provider::BiosensorProvider;

/// Kind of scheduled activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// Individual exercise session
    Solo,
    /// Group exercise session
    Group,
    /// Group education workshop, no biometrics
    Workshop,
    /// Video consultation with a professional
    Consultation,
}

impl SessionType {
    /// Whether the session streams ECG from the biosensor.
    pub fn uses_sensor(&self) -> bool {
        matches!(self, SessionType::Solo | SessionType::Group)
    }

    pub fn requires_group(&self) -> bool {
        matches!(self, SessionType::Group | SessionType::Workshop)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Solo => "solo",
            SessionType::Group => "group",
            SessionType::Workshop => "workshop",
            SessionType::Consultation => "consultation",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "solo" => Ok(SessionType::Solo),
            "group" => Ok(SessionType::Group),
            "workshop" => Ok(SessionType::Workshop),
            "consultation" => Ok(SessionType::Consultation),
            other => Err(format!(
                "unknown session type '{other}' (expected solo, group, workshop or consultation)"
            )),
        }
    }
}

/// One scheduled activity the patient joins.
///
/// Created when the session screen is entered; everything the coordinator
/// acquires for it is released when the screen is left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub session_type: SessionType,
    pub patient_id: String,
    /// Present for group and workshop sessions
    pub group_id: Option<String>,
    /// Known up front for consultations; exercise rooms arrive with the
    /// room announcement.
    pub room_id: Option<String>,
}

impl Session {
    pub fn new(
        session_type: SessionType,
        patient_id: impl Into<String>,
        group_id: Option<String>,
    ) -> Result<Self, RoutingError> {
        let patient_id = patient_id.into();
        let group_id = if session_type.requires_group() {
            Some(group_id.ok_or(RoutingError::MissingGroup(session_type))?)
        } else {
            None
        };
        let room_id =
            (session_type == SessionType::Consultation).then(|| consultation_room(&patient_id));

        Ok(Self {
            id: Uuid::new_v4(),
            session_type,
            patient_id,
            group_id,
            room_id,
        })
    }

    pub fn solo(patient_id: impl Into<String>) -> Self {
        let patient_id = patient_id.into();
        Self {
            id: Uuid::new_v4(),
            session_type: SessionType::Solo,
            patient_id,
            group_id: None,
            room_id: None,
        }
    }

    pub fn group(patient_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_type: SessionType::Group,
            patient_id: patient_id.into(),
            group_id: Some(group_id.into()),
            room_id: None,
        }
    }

    pub fn workshop(patient_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_type: SessionType::Workshop,
            patient_id: patient_id.into(),
            group_id: Some(group_id.into()),
            room_id: None,
        }
    }

    pub fn consultation(patient_id: impl Into<String>) -> Self {
        let patient_id = patient_id.into();
        Self {
            id: Uuid::new_v4(),
            session_type: SessionType::Consultation,
            room_id: Some(consultation_room(&patient_id)),
            patient_id,
            group_id: None,
        }
    }

    /// Identifier in the `room-available-for-activity-{id}` announcement.
    /// Consultations have no announcement.
    pub fn activity_id(&self) -> Option<&str> {
        match self.session_type {
            SessionType::Solo => Some(&self.patient_id),
            SessionType::Group | SessionType::Workshop => self.group_id.as_deref(),
            SessionType::Consultation => None,
        }
    }

    pub fn identity(&self) -> CallIdentity {
        CallIdentity::for_patient(&self.patient_id)
    }
}

/// Waiting room of a patient's consultation.
pub fn consultation_room(patient_id: &str) -> String {
    format!("teleconsultation-{patient_id}")
}

/// Coordinator state.
///
/// Exercise sessions: `AwaitingRoom → Active → Ended`.
/// Consultations: `AwaitingProfessional → {RingingIncoming | VisioActive} → Ended`,
/// with a declined call returning to `AwaitingProfessional`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    AwaitingRoom,
    Active { room: String },
    AwaitingProfessional,
    RingingIncoming(CallInvitation),
    VisioActive { room: String },
    Ended,
}

impl SessionState {
    pub fn initial(session_type: SessionType) -> Self {
        match session_type {
            SessionType::Consultation => SessionState::AwaitingProfessional,
            _ => SessionState::AwaitingRoom,
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, SessionState::Ended)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::AwaitingRoom => "waiting for the room",
            SessionState::Active { .. } => "session in progress",
            SessionState::AwaitingProfessional => "waiting for the professional",
            SessionState::RingingIncoming(_) => "incoming call",
            SessionState::VisioActive { .. } => "video call in progress",
            SessionState::Ended => "ended",
        }
    }
}

/// An out-of-schedule call from the professional. Consumed once, by accept
/// or reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInvitation {
    pub target_patient_id: String,
    pub room: String,
}

/// User-visible acknowledgements raised by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    SessionFinished(SessionType),
    CallDeclined,
    VideoUnavailable,
    CallFailed(String),
    ToneFailed(String),
    ChannelUnreachable(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::SessionFinished(SessionType::Workshop) => {
                "Workshop finished. Thank you for taking part!".to_string()
            }
            Notice::SessionFinished(SessionType::Consultation) => {
                "Consultation finished.".to_string()
            }
            Notice::SessionFinished(_) => "Session finished. Thank you for your effort!".to_string(),
            Notice::CallDeclined => "You declined the call.".to_string(),
            Notice::VideoUnavailable => "Video calls are not available on this device".to_string(),
            Notice::CallFailed(e) => format!("Could not start the video call: {e}"),
            Notice::ToneFailed(e) => format!("Could not play the ringtone: {e}"),
            Notice::ChannelUnreachable(e) => format!("Cannot reach the session server: {e}"),
        }
    }
}

/// What the patient can do on the session screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserAction {
    Accept,
    Reject,
    Leave,
}

impl FromStr for UserAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" | "a" => Ok(UserAction::Accept),
            "reject" | "r" => Ok(UserAction::Reject),
            "leave" | "quit" | "q" => Ok(UserAction::Leave),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// Platform capabilities injected into the coordinator. `None` means the
/// platform lacks the capability.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub sensor: Option<Arc<dyn BiosensorProvider>>,
    pub video: Option<Arc<dyn VideoCall>>,
    pub tone: Option<Arc<dyn AlertTone>>,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_sensor(mut self, sensor: Arc<dyn BiosensorProvider>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    pub fn with_video(mut self, video: Arc<dyn VideoCall>) -> Self {
        self.video = Some(video);
        self
    }

    pub fn with_tone(mut self, tone: Arc<dyn AlertTone>) -> Self {
        self.tone = Some(tone);
        self
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("sensor", &self.sensor.is_some())
            .field("video", &self.video.is_some())
            .field("tone", &self.tone.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_ids() {
        assert_eq!(Session::solo("p-1").activity_id(), Some("p-1"));
        assert_eq!(Session::group("p-1", "g-9").activity_id(), Some("g-9"));
        assert_eq!(Session::workshop("p-1", "g-3").activity_id(), Some("g-3"));
        assert_eq!(Session::consultation("p-1").activity_id(), None);
    }

    #[test]
    fn test_consultation_room() {
        let session = Session::consultation("42");
        assert_eq!(session.room_id.as_deref(), Some("teleconsultation-42"));
        assert_eq!(session.identity().display_name, "Patient 42");
    }

    #[test]
    fn test_new_validates_group() {
        assert_eq!(
            Session::new(SessionType::Workshop, "p-1", None),
            Err(RoutingError::MissingGroup(SessionType::Workshop))
        );
        let solo = Session::new(SessionType::Solo, "p-1", Some("ignored".to_string())).unwrap();
        assert_eq!(solo.group_id, None);
    }

    #[test]
    fn test_each_session_has_its_own_id() {
        assert_ne!(Session::solo("p-1").id, Session::solo("p-1").id);
    }

    #[test]
    fn test_sensor_only_for_exercise() {
        assert!(SessionType::Solo.uses_sensor());
        assert!(SessionType::Group.uses_sensor());
        assert!(!SessionType::Workshop.uses_sensor());
        assert!(!SessionType::Consultation.uses_sensor());
    }

    #[test]
    fn test_parse_inputs() {
        assert_eq!("Workshop".parse::<SessionType>(), Ok(SessionType::Workshop));
        assert!("velo".parse::<SessionType>().is_err());
        assert_eq!(" accept\n".parse::<UserAction>(), Ok(UserAction::Accept));
        assert_eq!("q".parse::<UserAction>(), Ok(UserAction::Leave));
    }
}
