//! Inbound venue status-change events.

use serde::{Deserialize, Serialize};

/// Operator-asserted status for a venue. Both flags are taken verbatim.
///
/// Every field is required; a payload missing one fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueStatusUpdate {
    pub venue_name: String,
    pub is_sold_out: bool,
    pub is_first_sold_out: bool,
}

/// Sold-out signal derived from ticket inventory.
///
/// The first-sold-out flag is computed by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSoldOutSignal {
    pub venue_name: String,
    pub is_sold_out: bool,
}

/// A status change to apply to one venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StatusChangeEvent {
    VenueStatusUpdate(VenueStatusUpdate),
    TicketSoldOutSignal(TicketSoldOutSignal),
}

impl StatusChangeEvent {
    pub fn venue_name(&self) -> &str {
        match self {
            Self::VenueStatusUpdate(e) => &e.venue_name,
            Self::TicketSoldOutSignal(e) => &e.venue_name,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::VenueStatusUpdate(_) => "VenueStatusUpdate",
            Self::TicketSoldOutSignal(_) => "TicketSoldOutSignal",
        }
    }
}

impl From<VenueStatusUpdate> for StatusChangeEvent {
    fn from(e: VenueStatusUpdate) -> Self {
        Self::VenueStatusUpdate(e)
    }
}

impl From<TicketSoldOutSignal> for StatusChangeEvent {
    fn from(e: TicketSoldOutSignal) -> Self {
        Self::TicketSoldOutSignal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_requires_every_field() {
        let ok: VenueStatusUpdate = serde_json::from_str(
            r#"{"venue_name": "Jakarta", "is_sold_out": true, "is_first_sold_out": false}"#,
        )
        .unwrap();
        assert_eq!(ok.venue_name, "Jakarta");
        assert!(!ok.is_first_sold_out);

        let missing = serde_json::from_str::<VenueStatusUpdate>(
            r#"{"venue_name": "Jakarta", "is_sold_out": true}"#,
        );
        assert!(missing.is_err());
    }

    #[test]
    fn signal_requires_every_field() {
        assert!(serde_json::from_str::<TicketSoldOutSignal>(r#"{"venue_name": "Bandung"}"#).is_err());
        assert!(serde_json::from_str::<TicketSoldOutSignal>(r#"{"is_sold_out": true}"#).is_err());
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let result = serde_json::from_str::<TicketSoldOutSignal>(
            r#"{"venue_name": "Bandung", "is_sold_out": "yes"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn event_exposes_venue_name() {
        let event: StatusChangeEvent = TicketSoldOutSignal {
            venue_name: "Surabaya".into(),
            is_sold_out: true,
        }
        .into();
        assert_eq!(event.venue_name(), "Surabaya");
        assert_eq!(event.event_type(), "TicketSoldOutSignal");
    }
}
