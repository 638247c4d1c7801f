//! Session coordination.
//!
//! A [`Session`] is one scheduled activity (solo or group exercise, group
//! workshop, video consultation). The [`SessionCoordinator`] owns its
//! lifecycle: presence signalling on the event channel, the sensor chain for
//! exercise sessions, the video call and the incoming-call ringtone.

pub mod coordinator;
pub mod latch;
pub mod routing;
pub mod types;

pub use coordinator::{CoordinatorSettings, SessionCoordinator, SessionUpdate};
pub use latch::Latch;
pub use routing::{appointment_label, route_appointment, session_type_for, RoutingError};
pub use types::{
    consultation_room, Capabilities, CallInvitation, Notice, Session, SessionState, SessionType,
    UserAction,
};
