//! # Payment Reconciler
//!
//! Turns the payment lines a cashier entered into an accepted set, or rejects
//! the whole sale.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Payment Line Lifecycle                             │
//! │                                                                         │
//! │  PaymentInput          (proposed: raw method string, any amount)       │
//! │       │                                                                 │
//! │       │ validate(line)                                                  │
//! │       │   ├── unknown method      → InvalidPaymentMethod               │
//! │       │   ├── amount <= 0         → InvalidAmount                      │
//! │       │   └── bank rail, no ref   → MissingReference                   │
//! │       ▼                                                                 │
//! │  ValidatedPayment      (typed method, positive amount)                 │
//! │       │                                                                 │
//! │       │ reconcile(total)                                                │
//! │       │   ├── Σ amounts overflows → InvalidAmount (offending line)     │
//! │       │   └── Σ amounts < total   → UnderPayment                       │
//! │       ▼                                                                 │
//! │  AcceptedPayments      (lines + total paid + change for display)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only an [`AcceptedPayments`] can go into a sale write-set, so a payment set
//! that was never checked against the total cannot reach storage.

use serde::{Deserialize, Serialize};

use crate::error::{SaleError, SaleResult};
use crate::money::Money;
use crate::types::PaymentMethod;

// =============================================================================
// Proposed
// =============================================================================

/// A payment line as submitted. Nothing about it has been checked yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInput {
    /// Wire name of the method, e.g. `"mobile-transfer"`.
    pub method: String,
    pub amount_usd: Money,
    #[serde(default)]
    pub bank_code: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub mon: Option<String>,
}

impl PaymentInput {
    pub fn new(method: impl Into<String>, amount_usd: Money) -> Self {
        Self {
            method: method.into(),
            amount_usd,
            bank_code: None,
            reference: None,
            mon: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_bank_code(mut self, bank_code: impl Into<String>) -> Self {
        self.bank_code = Some(bank_code.into());
        self
    }

    pub fn with_mon(mut self, mon: impl Into<String>) -> Self {
        self.mon = Some(mon.into());
        self
    }

    /// Checks one line. `line` is 1-based and only used in error messages.
    pub fn validate(self, line: usize) -> SaleResult<ValidatedPayment> {
        let method: PaymentMethod =
            self.method
                .parse()
                .map_err(|_| SaleError::InvalidPaymentMethod {
                    line,
                    method: self.method.clone(),
                })?;

        if !self.amount_usd.is_positive() {
            return Err(SaleError::InvalidAmount {
                line,
                amount: self.amount_usd,
            });
        }

        let reference = non_blank(self.reference);
        if method.requires_bank_reference() && reference.is_none() {
            return Err(SaleError::MissingReference { line, method });
        }

        Ok(ValidatedPayment {
            method,
            amount_usd: self.amount_usd,
            bank_code: non_blank(self.bank_code),
            reference,
            mon: non_blank(self.mon),
        })
    }
}

/// Whitespace-only strings count as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Validated
// =============================================================================

/// A payment line with a known method, a positive amount and, for bank-rail
/// methods, a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedPayment {
    pub method: PaymentMethod,
    pub amount_usd: Money,
    pub bank_code: Option<String>,
    pub reference: Option<String>,
    pub mon: Option<String>,
}

// =============================================================================
// Accepted
// =============================================================================

/// The full payment set of a sale, known to cover its total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedPayments {
    payments: Vec<ValidatedPayment>,
    total_paid: Money,
    change: Money,
}

impl AcceptedPayments {
    /// Validates every line, then checks the rounded sum against `total_usd`.
    ///
    /// Lines are checked in order and the first failure wins. Over-payment is
    /// accepted; the excess is reported as change and never stored.
    ///
    /// ## Example
    /// ```rust
    /// use mercado_core::{AcceptedPayments, Money, PaymentInput};
    /// use rust_decimal::Decimal;
    ///
    /// let total = Money::new(Decimal::new(2500, 2));
    /// let accepted = AcceptedPayments::reconcile(
    ///     vec![PaymentInput::new("cash-usd", Money::new(Decimal::new(3000, 2)))],
    ///     total,
    /// )
    /// .unwrap();
    /// assert_eq!(accepted.change().to_string(), "5.00");
    /// ```
    pub fn reconcile(inputs: Vec<PaymentInput>, total_usd: Money) -> SaleResult<Self> {
        let payments = inputs
            .into_iter()
            .enumerate()
            .map(|(idx, input)| input.validate(idx + 1))
            .collect::<SaleResult<Vec<_>>>()?;

        let total_paid = payments
            .iter()
            .enumerate()
            .try_fold(Money::zero(), |acc, (idx, p)| {
                acc.checked_add(p.amount_usd).ok_or(SaleError::InvalidAmount {
                    line: idx + 1,
                    amount: p.amount_usd,
                })
            })?
            .rounded();
        let total_usd = total_usd.rounded();

        if total_paid < total_usd {
            return Err(SaleError::UnderPayment {
                total: total_usd,
                paid: total_paid,
                shortfall: total_usd - total_paid,
            });
        }

        Ok(Self {
            change: total_paid.saturating_sub(total_usd),
            payments,
            total_paid,
        })
    }

    pub fn payments(&self) -> &[ValidatedPayment] {
        &self.payments
    }

    pub fn total_paid(&self) -> Money {
        self.total_paid
    }

    /// Amount to hand back to the customer.
    pub fn change(&self) -> Money {
        self.change
    }

    pub fn into_payments(self) -> Vec<ValidatedPayment> {
        self.payments
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
