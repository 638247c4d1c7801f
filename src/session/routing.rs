//! Appointment → session routing.
//!
//! Agenda entries carry an appointment type; each maps to one session
//! screen.

use super::types::{Session, SessionType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    UnknownAppointmentType(String),
    MissingGroup(SessionType),
}

impl std::fmt::Display for RoutingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingError::UnknownAppointmentType(t) => {
                write!(f, "Unrecognised appointment type: {t}")
            }
            RoutingError::MissingGroup(t) => write!(f, "A {t} session needs a group id"),
        }
    }
}

impl std::error::Error for RoutingError {}

/// Appointment types as stored in the agenda.
pub const APPOINTMENT_TYPES: [&str; 4] = [
    "teleconsultation",
    "reentrainement_individuel",
    "reentrainement_collectif",
    "atelier",
];

pub fn session_type_for(appointment_type: &str) -> Result<SessionType, RoutingError> {
    match appointment_type {
        "teleconsultation" => Ok(SessionType::Consultation),
        "reentrainement_individuel" => Ok(SessionType::Solo),
        "reentrainement_collectif" => Ok(SessionType::Group),
        "atelier" => Ok(SessionType::Workshop),
        other => Err(RoutingError::UnknownAppointmentType(other.to_string())),
    }
}

/// Agenda label, with a generic fallback for unknown types.
pub fn appointment_label(appointment_type: &str) -> &'static str {
    match appointment_type {
        "teleconsultation" => "Téléconsultation",
        "reentrainement_individuel" => "Réentraînement individuel",
        "reentrainement_collectif" => "Réentraînement collectif",
        "atelier" => "Atelier collectif",
        _ => "Rendez-vous",
    }
}

/// Build the session an appointment opens. The group id is only kept for
/// group and workshop sessions.
pub fn route_appointment(
    appointment_type: &str,
    patient_id: &str,
    group_id: Option<&str>,
) -> Result<Session, RoutingError> {
    let session_type = session_type_for(appointment_type)?;
    Session::new(session_type, patient_id, group_id.map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_appointment_type_routes() {
        for kind in APPOINTMENT_TYPES {
            let session = route_appointment(kind, "p-1", Some("g-1")).unwrap();
            assert_ne!(appointment_label(kind), "Rendez-vous");
            assert_eq!(session.patient_id, "p-1");
        }
    }

    #[test]
    fn test_routing_targets() {
        let consultation = route_appointment("teleconsultation", "p-1", None).unwrap();
        assert_eq!(consultation.session_type, SessionType::Consultation);
        assert_eq!(consultation.room_id.as_deref(), Some("teleconsultation-p-1"));

        let group = route_appointment("reentrainement_collectif", "p-1", Some("g-4")).unwrap();
        assert_eq!(group.session_type, SessionType::Group);
        assert_eq!(group.group_id.as_deref(), Some("g-4"));

        let solo = route_appointment("reentrainement_individuel", "p-1", Some("g-4")).unwrap();
        assert_eq!(solo.group_id, None);
    }

    #[test]
    fn test_routing_errors() {
        assert_eq!(
            route_appointment("kine", "p-1", None),
            Err(RoutingError::UnknownAppointmentType("kine".to_string()))
        );
        assert_eq!(
            route_appointment("atelier", "p-1", None),
            Err(RoutingError::MissingGroup(SessionType::Workshop))
        );
        assert_eq!(appointment_label("kine"), "Rendez-vous");
    }
}
