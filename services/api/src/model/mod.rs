//! Relief domain model.
//!
//! # Purpose
//! Defines the records stored by both backends and returned by the HTTP API.
//! Enum string forms match the CHECK constraints in the migrations.
mod announcement;
mod audit;
mod disaster_area;
mod discussion;
mod donation;
mod grid;
mod permission;
mod registration;
mod user;

pub use announcement::{Announcement, AnnouncementPriority};
pub use audit::{AuditEntry, AuditLog, AuditQuery};
pub use disaster_area::{AreaStatus, DisasterArea};
pub use discussion::GridDiscussion;
pub use donation::{DonationStatus, SupplyDonation};
pub use grid::{Grid, GridBounds, GridStatus, GridType, SupplyNeed};
pub use permission::UserPermission;
pub use registration::VolunteerRegistration;
pub use user::User;

/// Implements `as_str`, `Display` and `FromStr` for a snake_case text enum.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("invalid {}: {other}", stringify!($name))),
                }
            }
        }
    };
}

pub(crate) use text_enum;
