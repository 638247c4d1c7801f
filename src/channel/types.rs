//! Wire messages and typed events of the real-time channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::ChannelError;
use crate::core::telemetry::TelemetryFrame;
use crate::session::types::CallInvitation;

/// Prefix of the per-activity room announcement.
pub const ROOM_AVAILABLE_PREFIX: &str = "room-available-for-activity-";
pub const PRESENCE_CONFIRMED: &str = "presence-confirmed";
pub const INCOMING_CALL: &str = "incoming-call";

pub const JOIN_ACTIVITY_ROOM: &str = "join-activity-room";
pub const JOIN_ROOM: &str = "join-room";
pub const CONFIRM_ARRIVAL: &str = "confirm-arrival";
pub const RESPOND_TO_INCOMING_CALL: &str = "respond-to-incoming-call";
pub const ECG_TELEMETRY: &str = "ecg-telemetry";

/// Identifies one registered listener.
pub type ListenerId = Uuid;

/// A named event with a JSON payload, as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl ChannelMessage {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Name of the room announcement for one activity.
pub fn room_available_event(activity_id: &str) -> String {
    format!("{ROOM_AVAILABLE_PREFIX}{activity_id}")
}

#[derive(Debug, Deserialize)]
struct RoomPayload {
    room: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingCallPayload {
    #[serde(alias = "patientId")]
    target_patient_id: String,
    room: String,
}

/// Events the coordinator reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    RoomAvailable { activity_id: String, room: String },
    PresenceConfirmed,
    IncomingCall(CallInvitation),
}

impl InboundEvent {
    /// Interpret a wire message. Unknown names and malformed payloads yield `None`.
    pub fn parse(message: &ChannelMessage) -> Option<Self> {
        if let Some(activity_id) = message.event.strip_prefix(ROOM_AVAILABLE_PREFIX) {
            let payload: RoomPayload = serde_json::from_value(message.data.clone()).ok()?;
            return Some(InboundEvent::RoomAvailable {
                activity_id: activity_id.to_string(),
                room: payload.room,
            });
        }

        match message.event.as_str() {
            PRESENCE_CONFIRMED => Some(InboundEvent::PresenceConfirmed),
            INCOMING_CALL => {
                let payload: IncomingCallPayload =
                    serde_json::from_value(message.data.clone()).ok()?;
                Some(InboundEvent::IncomingCall(CallInvitation {
                    target_patient_id: payload.target_patient_id,
                    room: payload.room,
                }))
            }
            _ => None,
        }
    }
}

/// Events the coordinator sends.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    JoinActivityRoom {
        group_id: Option<String>,
        patient_id: String,
    },
    JoinRoom {
        room: String,
    },
    ConfirmArrival {
        room: String,
    },
    CallResponse {
        room: String,
        patient_id: String,
        accepted: bool,
    },
    Telemetry(TelemetryFrame),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinActivityRoom { .. } => JOIN_ACTIVITY_ROOM,
            OutboundEvent::JoinRoom { .. } => JOIN_ROOM,
            OutboundEvent::ConfirmArrival { .. } => CONFIRM_ARRIVAL,
            OutboundEvent::CallResponse { .. } => RESPOND_TO_INCOMING_CALL,
            OutboundEvent::Telemetry(_) => ECG_TELEMETRY,
        }
    }

    pub fn to_message(&self) -> Result<ChannelMessage, ChannelError> {
        let data = match self {
            OutboundEvent::JoinActivityRoom {
                group_id,
                patient_id,
            } => serde_json::json!({ "groupId": group_id, "patientId": patient_id }),
            OutboundEvent::JoinRoom { room } | OutboundEvent::ConfirmArrival { room } => {
                Value::String(room.clone())
            }
            OutboundEvent::CallResponse {
                room,
                patient_id,
                accepted,
            } => serde_json::json!({
                "room": room,
                "patientId": patient_id,
                "accepted": accepted,
            }),
            OutboundEvent::Telemetry(frame) => {
                serde_json::to_value(frame).map_err(|e| ChannelError::Encode(e.to_string()))?
            }
        };
        Ok(ChannelMessage::new(self.name(), data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_room_available() {
        let msg = ChannelMessage::new(room_available_event("g-12"), json!({ "room": "atelier-12" }));
        assert_eq!(
            InboundEvent::parse(&msg),
            Some(InboundEvent::RoomAvailable {
                activity_id: "g-12".to_string(),
                room: "atelier-12".to_string()
            })
        );
    }

    #[test]
    fn test_parse_incoming_call() {
        let msg = ChannelMessage::new(
            INCOMING_CALL,
            json!({ "targetPatientId": "p-1", "room": "teleconsultation-p-1" }),
        );
        let Some(InboundEvent::IncomingCall(invitation)) = InboundEvent::parse(&msg) else {
            panic!("expected an incoming call");
        };
        assert_eq!(invitation.target_patient_id, "p-1");
        assert_eq!(invitation.room, "teleconsultation-p-1");

        let legacy = ChannelMessage::new(INCOMING_CALL, json!({ "patientId": "p-2", "room": "r" }));
        assert!(matches!(
            InboundEvent::parse(&legacy),
            Some(InboundEvent::IncomingCall(CallInvitation { ref target_patient_id, .. })) if target_patient_id == "p-2"
        ));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let missing_room = ChannelMessage::new(room_available_event("g"), json!({}));
        assert_eq!(InboundEvent::parse(&missing_room), None);

        let unknown = ChannelMessage::new("chat-message", json!("hello"));
        assert_eq!(InboundEvent::parse(&unknown), None);
    }

    #[test]
    fn test_outbound_payloads() {
        let join = OutboundEvent::JoinActivityRoom {
            group_id: Some("g-1".to_string()),
            patient_id: "p-1".to_string(),
        }
        .to_message()
        .unwrap();
        assert_eq!(join.event, JOIN_ACTIVITY_ROOM);
        assert_eq!(join.data, json!({ "groupId": "g-1", "patientId": "p-1" }));

        let arrival = OutboundEvent::ConfirmArrival {
            room: "teleconsultation-p-1".to_string(),
        }
        .to_message()
        .unwrap();
        assert_eq!(arrival.event, CONFIRM_ARRIVAL);
        assert_eq!(arrival.data, json!("teleconsultation-p-1"));
    }

    #[test]
    fn test_message_round_trips_with_missing_data() {
        let msg: ChannelMessage = serde_json::from_str(r#"{"event":"presence-confirmed"}"#).unwrap();
        assert_eq!(InboundEvent::parse(&msg), Some(InboundEvent::PresenceConfirmed));
    }
}
