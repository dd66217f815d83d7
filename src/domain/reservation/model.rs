//! Reservation domain entity

use chrono::{DateTime, Utc};

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    /// Accepted by the counterpart (or by local hardware)
    Active,
    /// Cancelled through CANCEL_RESERVATION
    Cancelled,
    /// Past expiry_date
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ACTIVE" => Self::Active,
            "EXPIRED" => Self::Expired,
            _ => Self::Cancelled,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// EVSE reservation created by an accepted RESERVE_NOW
#[derive(Debug, Clone)]
pub struct Reservation {
    pub reservation_id: String,
    /// Counterpart the reservation was made with
    pub platform_id: String,
    pub location_id: String,
    /// Absent means any EVSE of the location
    pub evse_uid: Option<String>,
    pub token_uid: Option<String>,
    pub expiry_date: DateTime<Utc>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(
        reservation_id: impl Into<String>,
        platform_id: impl Into<String>,
        location_id: impl Into<String>,
        evse_uid: Option<String>,
        token_uid: Option<String>,
        expiry_date: DateTime<Utc>,
    ) -> Self {
        Self {
            reservation_id: reservation_id.into(),
            platform_id: platform_id.into(),
            location_id: location_id.into(),
            evse_uid,
            token_uid,
            expiry_date,
            status: ReservationStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn cancel(&mut self) {
        self.status = ReservationStatus::Cancelled;
    }

    pub fn expire(&mut self) {
        self.status = ReservationStatus::Expired;
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// Still active but past its expiry date
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expiry_date < now
    }
}

// ── Tests ──────────────────────────────────────────────────────
