//! The authoritative order state machine.
//!
//! The rules here are checked twice on every mutation: once up front by [`check_transition`] so that callers get a
//! precise error, and once more inside the conditional `UPDATE` in the storage layer, whose `WHERE status = ...`
//! clause makes the decision race-safe. A transition that loses the race matches zero rows and surfaces as a
//! conflict, never as a silent regression.

use thiserror::Error;

use crate::db_types::{OrderStatusType, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("payment pending")]
    PaymentPending,
    #[error("cannot move to {to} from {from}")]
    IllegalTransition { from: OrderStatusType, to: OrderStatusType },
}

/// Validates a single status transition against the transition table:
///
/// | From             | To               | Precondition        |
/// |------------------|------------------|---------------------|
/// | placed           | cooking          | payment is `paid`   |
/// | cooking          | ready            | —                   |
/// | ready            | out_for_delivery | claim path only     |
/// | out_for_delivery | delivered        | assigned rider only |
/// | placed           | cancelled        | reconciliation only |
///
/// Actor authorization (who may request which row of the table) is enforced by the order flow API, not here.
pub fn check_transition(
    current: OrderStatusType,
    target: OrderStatusType,
    payment: PaymentStatus,
) -> Result<(), TransitionError> {
    use OrderStatusType::*;
    match (current, target) {
        (Placed, Cooking) if payment == PaymentStatus::Paid => Ok(()),
        (Placed, Cooking) => Err(TransitionError::PaymentPending),
        (Cooking, Ready) => Ok(()),
        (Ready, OutForDelivery) => Ok(()),
        (OutForDelivery, Delivered) => Ok(()),
        (Placed, Cancelled) => Ok(()),
        (from, to) => Err(TransitionError::IllegalTransition { from, to }),
    }
}

/// The transitions a vendor is allowed to request. Claims, deliveries and cancellations go through their own
/// dedicated operations.
pub fn is_vendor_target(target: OrderStatusType) -> bool {
    matches!(target, OrderStatusType::Cooking | OrderStatusType::Ready)
}
