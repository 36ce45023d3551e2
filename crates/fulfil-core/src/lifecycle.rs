//! # Order Lifecycle
//!
//! The closed transition table for orders, and which role drives each step.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌─────────┐ claim  ┌───────────┐ pack  ┌────────┐ claim ┌──────────┐ │
//! │   │ pending │───────►│ gathering │──────►│ packed │──────►│in_transit│ │
//! │   └────┬────┘ picker └─────┬─────┘ owner └────────┘ driver└────┬─────┘ │
//! │        │                   │                                   │       │
//! │        │ cancel            │ cancel               deliver (owner)│       │
//! │        ▼                   ▼                                   ▼       │
//! │   ┌─────────────────────────────┐                       ┌───────────┐  │
//! │   │          cancelled          │                       │ delivered │  │
//! │   └─────────────────────────────┘                       └───────────┘  │
//! │                                                                         │
//! │   Terminal: delivered, cancelled. No state is ever skipped.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ownership (picker owns `gathering → packed`, driver owns
//! `in_transit → delivered`) is enforced by the conditional writes in
//! fulfil-db; this module decides role and status legality.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::{OrderStatus, Role};

impl OrderStatus {
    /// Whether `self → next` is an edge of the lifecycle.
    pub const fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Pending => matches!(next, Gathering | Cancelled),
            Gathering => matches!(next, Packed | Cancelled),
            Packed => matches!(next, InTransit),
            InTransit => matches!(next, Delivered),
            Delivered | Cancelled => false,
        }
    }
}

// =============================================================================
// Actions
// =============================================================================

/// A step an actor can take on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    ClaimForPicking,
    Pack,
    ClaimForDelivery,
    CompleteDelivery,
    Cancel,
}

impl OrderAction {
    /// Statuses the action may start from.
    pub const fn from_statuses(&self) -> &'static [OrderStatus] {
        match self {
            OrderAction::ClaimForPicking => &[OrderStatus::Pending],
            OrderAction::Pack => &[OrderStatus::Gathering],
            OrderAction::ClaimForDelivery => &[OrderStatus::Packed],
            OrderAction::CompleteDelivery => &[OrderStatus::InTransit],
            OrderAction::Cancel => &[OrderStatus::Pending, OrderStatus::Gathering],
        }
    }

    /// Status the action lands on.
    pub const fn target(&self) -> OrderStatus {
        match self {
            OrderAction::ClaimForPicking => OrderStatus::Gathering,
            OrderAction::Pack => OrderStatus::Packed,
            OrderAction::ClaimForDelivery => OrderStatus::InTransit,
            OrderAction::CompleteDelivery => OrderStatus::Delivered,
            OrderAction::Cancel => OrderStatus::Cancelled,
        }
    }

    /// Admins may take any step.
    pub const fn permits(&self, role: Role) -> bool {
        match (self, role) {
            (_, Role::Admin) => true,
            (OrderAction::ClaimForPicking | OrderAction::Pack, Role::Picker) => true,
            (OrderAction::ClaimForDelivery | OrderAction::CompleteDelivery, Role::Driver) => true,
            (OrderAction::Cancel, Role::Customer) => true,
            _ => false,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderAction::ClaimForPicking => "claim an order for picking",
            OrderAction::Pack => "pack an order",
            OrderAction::ClaimForDelivery => "claim an order for delivery",
            OrderAction::CompleteDelivery => "complete a delivery",
            OrderAction::Cancel => "cancel an order",
        }
    }

    /// Checks the role is allowed to take this action at all.
    pub fn authorize(&self, role: Role) -> CoreResult<()> {
        if self.permits(role) {
            Ok(())
        } else {
            Err(CoreError::Forbidden {
                role,
                action: self.as_str().to_string(),
            })
        }
    }

    /// Checks the action is legal from `current`, returning the new status.
    pub fn apply(&self, current: OrderStatus) -> CoreResult<OrderStatus> {
        let target = self.target();
        if self.from_statuses().contains(&current) && current.can_transition_to(target) {
            Ok(target)
        } else {
            Err(CoreError::InvalidTransition {
                from: current,
                to: target,
            })
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Role Guards
// =============================================================================

/// Finding or marking items missing: pickers and admins.
pub fn authorize_item_resolution(role: Role) -> CoreResult<()> {
    require_role(role, &[Role::Picker, Role::Admin], "resolve order items")
}

/// Settling withdrawals and running reports: admins only.
pub fn authorize_admin(role: Role, action: &str) -> CoreResult<()> {
    require_role(role, &[Role::Admin], action)
}

/// Rejects any role not in `allowed`.
pub fn require_role(role: Role, allowed: &[Role], action: &str) -> CoreResult<()> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(CoreError::Forbidden {
            role,
            action: action.to_string(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 6] = [Pending, Gathering, Packed, InTransit, Delivered, Cancelled];

    #[test]
    fn test_happy_path_is_linear() {
        let path = [Pending, Gathering, Packed, InTransit, Delivered];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_skips_or_regressions() {
        let rank = |s: OrderStatus| match s {
            Pending => 0,
            Gathering => 1,
            Packed => 2,
            InTransit => 3,
            Delivered => 4,
            Cancelled => 99,
        };
        for from in ALL {
            for to in ALL {
                if from.can_transition_to(to) && to != Cancelled {
                    assert_eq!(rank(to), rank(from) + 1, "{from} -> {to}");
                }
            }
        }
    }

    #[test]
    fn test_cancel_only_before_packing() {
        for from in ALL {
            let expected = matches!(from, Pending | Gathering);
            assert_eq!(OrderAction::Cancel.apply(from).is_ok(), expected, "{from}");
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for to in ALL {
            assert!(!Delivered.can_transition_to(to));
            assert!(!Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn test_apply_reports_invalid_transition() {
        let err = OrderAction::Pack.apply(Pending).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition { from: Pending, to: Packed }
        ));
    }

    #[test]
    fn test_role_permissions() {
        assert!(OrderAction::ClaimForPicking.authorize(Role::Picker).is_ok());
        assert!(OrderAction::ClaimForPicking.authorize(Role::Driver).is_err());
        assert!(OrderAction::ClaimForDelivery.authorize(Role::Picker).is_err());
        assert!(OrderAction::Cancel.authorize(Role::Customer).is_ok());
        assert!(OrderAction::Cancel.authorize(Role::Driver).is_err());
        assert!(OrderAction::CompleteDelivery.authorize(Role::Admin).is_ok());
        assert!(authorize_item_resolution(Role::Customer).is_err());
        assert!(authorize_admin(Role::Driver, "approve withdrawals").is_err());
    }
}
