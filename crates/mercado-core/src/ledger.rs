//! # Stock Ledger Arithmetic
//!
//! The rules every movement obeys, independent of storage.
//!
//! ## Movement Arithmetic
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  type         new_quantity               reference                      │
//! │  ──────────   ────────────────────────   ────────────────────────       │
//! │  in           previous + quantity        "Return Sale #N", receipts    │
//! │  out          previous − quantity        "Sale #N"                     │
//! │  transfer     previous − quantity        transfer slip                 │
//! │  adjustment   previous ± quantity        physical count                │
//! │                                                                         │
//! │  quantity is always the positive magnitude; the sign lives in          │
//! │  new − previous. new_quantity is never negative.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ledger Invariant
//! For every product, the signed deltas of its movements add up to how far
//! its counter has moved since it entered the catalogue:
//!
//! `Σ (new − previous) == quantity − initial_quantity`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Movement, MovementType};

// =============================================================================
// Errors
// =============================================================================

/// A movement whose numbers do not add up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MovementError {
    #[error("Movement quantity must be positive (got {0})")]
    NonPositiveQuantity(i64),

    #[error("Movement would leave negative stock: {previous} - {quantity}")]
    NegativeStock { previous: i64, quantity: i64 },

    #[error("Inconsistent {movement_type} movement: {previous} -> {new} for quantity {quantity}")]
    Inconsistent {
        movement_type: MovementType,
        quantity: i64,
        previous: i64,
        new: i64,
    },
}

// =============================================================================
// New Movement
// =============================================================================

/// A movement about to be appended.
///
/// Built through the typed constructors so `new_quantity` always follows from
/// `previous_quantity`, `quantity` and the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub product_id: i64,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub reference_number: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewMovement {
    fn build(
        product_id: i64,
        movement_type: MovementType,
        quantity: i64,
        previous_quantity: i64,
        at: DateTime<Utc>,
    ) -> Result<Self, MovementError> {
        if quantity <= 0 {
            return Err(MovementError::NonPositiveQuantity(quantity));
        }

        let new_quantity = match movement_type {
            MovementType::In | MovementType::Adjustment => previous_quantity + quantity,
            MovementType::Out | MovementType::Transfer => previous_quantity - quantity,
        };

        if new_quantity < 0 {
            return Err(MovementError::NegativeStock {
                previous: previous_quantity,
                quantity,
            });
        }

        Ok(Self {
            product_id,
            movement_type,
            quantity,
            previous_quantity,
            new_quantity,
            reference_number: None,
            reason: None,
            created_at: at,
        })
    }

    /// Stock entering the shelf.
    pub fn stock_in(
        product_id: i64,
        quantity: i64,
        previous_quantity: i64,
        at: DateTime<Utc>,
    ) -> Result<Self, MovementError> {
        Self::build(product_id, MovementType::In, quantity, previous_quantity, at)
    }

    /// Stock leaving through a sale.
    pub fn stock_out(
        product_id: i64,
        quantity: i64,
        previous_quantity: i64,
        at: DateTime<Utc>,
    ) -> Result<Self, MovementError> {
        Self::build(product_id, MovementType::Out, quantity, previous_quantity, at)
    }

    /// Stock sent to another location.
    pub fn transfer_out(
        product_id: i64,
        quantity: i64,
        previous_quantity: i64,
        at: DateTime<Utc>,
    ) -> Result<Self, MovementError> {
        Self::build(product_id, MovementType::Transfer, quantity, previous_quantity, at)
    }

    /// Correction from a physical count. `None` when nothing changes.
    pub fn adjustment(
        product_id: i64,
        previous_quantity: i64,
        counted_quantity: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<Self>, MovementError> {
        if counted_quantity < 0 {
            return Err(MovementError::NegativeStock {
                previous: previous_quantity,
                quantity: previous_quantity - counted_quantity,
            });
        }

        let delta = counted_quantity - previous_quantity;
        if delta == 0 {
            return Ok(None);
        }

        let mut movement =
            Self::build(product_id, MovementType::Adjustment, delta.abs(), previous_quantity, at)?;
        movement.new_quantity = counted_quantity;
        Ok(Some(movement))
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference_number = Some(reference.into());
        self
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason.filter(|r| !r.trim().is_empty());
        self
    }

    /// Signed effect on the counter.
    #[inline]
    pub fn signed_delta(&self) -> i64 {
        self.new_quantity - self.previous_quantity
    }

    /// Re-checks the arithmetic, for rows assembled by hand.
    pub fn check(&self) -> Result<(), MovementError> {
        check_arithmetic(
            self.movement_type,
            self.quantity,
            self.previous_quantity,
            self.new_quantity,
        )
    }
}

/// Checks one movement's numbers against its type.
///
/// ## Example
/// ```rust
/// use mercado_core::ledger::check_arithmetic;
/// use mercado_core::MovementType;
///
/// assert!(check_arithmetic(MovementType::Out, 3, 10, 7).is_ok());
/// assert!(check_arithmetic(MovementType::Out, 3, 10, 8).is_err());
/// assert!(check_arithmetic(MovementType::Adjustment, 2, 10, 8).is_ok());
/// ```
pub fn check_arithmetic(
    movement_type: MovementType,
    quantity: i64,
    previous: i64,
    new: i64,
) -> Result<(), MovementError> {
    if quantity <= 0 {
        return Err(MovementError::NonPositiveQuantity(quantity));
    }
    if new < 0 {
        return Err(MovementError::NegativeStock { previous, quantity });
    }

    let consistent = match movement_type {
        MovementType::In => new == previous + quantity,
        MovementType::Out | MovementType::Transfer => new == previous - quantity,
        MovementType::Adjustment => (new - previous).abs() == quantity,
    };

    if consistent {
        Ok(())
    } else {
        Err(MovementError::Inconsistent {
            movement_type,
            quantity,
            previous,
            new,
        })
    }
}

// =============================================================================
// Ledger Check
// =============================================================================

/// Result of reconciling a product's counter against its movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCheck {
    pub product_id: i64,
    /// `quantity − initial_quantity`
    pub expected_delta: i64,
    /// `Σ (new − previous)` over the product's movements
    pub recorded_delta: i64,
    pub consistent: bool,
}

impl LedgerCheck {
    pub fn new(product_id: i64, expected_delta: i64, recorded_delta: i64) -> Self {
        Self {
            product_id,
            expected_delta,
            recorded_delta,
            consistent: expected_delta == recorded_delta,
        }
    }

    /// Checks a product's counters against a full movement history.
    pub fn from_movements(
        product_id: i64,
        initial_quantity: i64,
        quantity: i64,
        movements: &[Movement],
    ) -> Self {
        let recorded = movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .map(Movement::signed_delta)
            .sum();
        Self::new(product_id, quantity - initial_quantity, recorded)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
