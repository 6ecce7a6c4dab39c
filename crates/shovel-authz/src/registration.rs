//! Volunteer registration status machine.
//!
//! ```text
//! pending ──▶ confirmed ──▶ arrived ──▶ completed
//!    │            │            │
//!    └────────────┴────────────┴──▶ cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal. Volunteers acting on their own
//! registration may only cancel or check in (`arrived`); grid managers and
//! admins may take any edge above.
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Arrived,
    Completed,
    Cancelled,
}

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// The volunteer who owns the registration.
    Owner,
    /// The grid's manager or an admin.
    Steward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot move registration from {from} to {to}")]
    Invalid {
        from: RegistrationStatus,
        to: RegistrationStatus,
    },
    #[error("volunteers may only cancel or check in, not move to {to}")]
    NotPermitted { to: RegistrationStatus },
}

impl RegistrationStatus {
    pub const ALL: [RegistrationStatus; 5] = [
        RegistrationStatus::Pending,
        RegistrationStatus::Confirmed,
        RegistrationStatus::Arrived,
        RegistrationStatus::Completed,
        RegistrationStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Arrived => "arrived",
            RegistrationStatus::Completed => "completed",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RegistrationStatus::Completed | RegistrationStatus::Cancelled)
    }

    /// Whether the row counts toward `grids.volunteer_registered`.
    pub fn counts_toward_grid(self) -> bool {
        self != RegistrationStatus::Cancelled
    }

    pub fn next_states(self) -> &'static [RegistrationStatus] {
        use RegistrationStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Arrived, Cancelled],
            Arrived => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: RegistrationStatus) -> bool {
        self.next_states().contains(&next)
    }

    pub fn check_transition(
        self,
        next: RegistrationStatus,
        actor: Actor,
    ) -> Result<(), TransitionError> {
        if !self.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                from: self,
                to: next,
            });
        }
        if actor == Actor::Owner
            && !matches!(next, RegistrationStatus::Cancelled | RegistrationStatus::Arrived)
        {
            return Err(TransitionError::NotPermitted { to: next });
        }
        Ok(())
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RegistrationStatus {
    type Err = AuthzError;

    fn from_str(value: &str) -> AuthzResult<Self> {
        RegistrationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| AuthzError::InvalidRegistrationStatus(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::RegistrationStatus::*;
    use super::*;

    #[test]
    fn forward_edges_are_valid() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Arrived));
        assert!(Arrived.can_transition_to(Completed));
        for status in [Pending, Confirmed, Arrived] {
            assert!(status.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn skips_and_reversals_are_rejected() {
        assert!(!Pending.can_transition_to(Arrived));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Arrived.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Pending));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for status in RegistrationStatus::ALL {
            assert!(!status.can_transition_to(status), "self edge on {status}");
            if status.is_terminal() {
                assert!(status.next_states().is_empty());
            }
        }
    }

    #[test]
    fn owner_may_only_cancel_or_check_in() {
        assert_eq!(Confirmed.check_transition(Arrived, Actor::Owner), Ok(()));
        assert_eq!(Pending.check_transition(Cancelled, Actor::Owner), Ok(()));
        assert_eq!(
            Pending.check_transition(Confirmed, Actor::Owner),
            Err(TransitionError::NotPermitted { to: Confirmed })
        );
        assert_eq!(
            Arrived.check_transition(Completed, Actor::Owner),
            Err(TransitionError::NotPermitted { to: Completed })
        );
    }

    #[test]
    fn steward_takes_any_valid_edge() {
        assert_eq!(Pending.check_transition(Confirmed, Actor::Steward), Ok(()));
        assert_eq!(Arrived.check_transition(Completed, Actor::Steward), Ok(()));
        assert_eq!(
            Completed.check_transition(Cancelled, Actor::Steward),
            Err(TransitionError::Invalid {
                from: Completed,
                to: Cancelled
            })
        );
    }

    #[test]
    fn invalid_edge_reported_before_actor_rule() {
        assert_eq!(
            Pending.check_transition(Completed, Actor::Owner),
            Err(TransitionError::Invalid {
                from: Pending,
                to: Completed
            })
        );
    }

    #[test]
    fn cancelled_does_not_count() {
        assert!(Pending.counts_toward_grid());
        assert!(Completed.counts_toward_grid());
        assert!(!Cancelled.counts_toward_grid());
        assert!("lost".parse::<RegistrationStatus>().is_err());
    }
}
