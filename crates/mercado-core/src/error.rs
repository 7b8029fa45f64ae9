//! # Error Types
//!
//! Domain error types for mercado-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mercado-core errors (this file)                                       │
//! │  ├── ValidationError  - Malformed input, rejected before any read      │
//! │  └── SaleError        - Business rejections (stock, payment, void)     │
//! │                                                                         │
//! │  mercado-db errors (separate crate)                                    │
//! │  ├── DbError          - Storage failures                               │
//! │  └── EngineError      - Rejected(SaleError) | Persistence(DbError)     │
//! │                                                                         │
//! │  Flow: ValidationError → SaleError → EngineError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Every rejection names what failed: which product, how much short,
//!    which payment line
//! 2. Each variant carries a stable machine-readable [`SaleError::code`]
//! 3. Nothing here is retried; the caller resubmits corrected input

use thiserror::Error;

use crate::money::Money;
use crate::types::PaymentMethod;

// =============================================================================
// Sale Error
// =============================================================================

/// A sale or void request was rejected.
///
/// All of these are detected before any write, except `InsufficientStock`
/// which the persistence layer can also raise when another sale took the last
/// units between the read and the write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaleError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Product id in the cart does not exist.
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: i64 },

    /// The cart asks for more than the shelf holds.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: 5 × Harina PAN
    ///      │
    ///      ▼
    /// Stock read: available = 3
    ///      │
    ///      ▼
    /// InsufficientStock { name: "Harina PAN", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Operator sees: "Insufficient stock for Harina PAN (#12): available 3, requested 5"
    /// ```
    #[error("Insufficient stock for {name} (#{product_id}): available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        name: String,
        available: i64,
        requested: i64,
    },

    /// Payment line `line` names a method outside the known set.
    #[error("Payment line {line}: invalid payment method '{method}'")]
    InvalidPaymentMethod { line: usize, method: String },

    /// Payment line `line` has a zero or negative amount.
    #[error("Payment line {line}: amount must be greater than zero (got {amount})")]
    InvalidAmount { line: usize, amount: Money },

    /// A bank-rail payment arrived without its transaction reference.
    #[error("Payment line {line}: {method} requires a reference")]
    MissingReference { line: usize, method: PaymentMethod },

    /// Payments do not cover the total. Partial payment is never accepted.
    #[error("Under payment: total {total}, paid {paid}, short by {shortfall}")]
    UnderPayment {
        total: Money,
        paid: Money,
        shortfall: Money,
    },

    #[error("Sale not found: {0}")]
    SaleNotFound(i64),

    /// The sale is already voided; voiding is terminal.
    #[error("Sale #{0} is already voided")]
    AlreadyVoided(i64),

    #[error("Client not found: {0}")]
    ClientNotFound(i64),
}

impl SaleError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            SaleError::Validation(_) => "VALIDATION_ERROR",
            SaleError::ProductNotFound { .. } => "PRODUCT_NOT_FOUND",
            SaleError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            SaleError::InvalidPaymentMethod { .. } => "INVALID_PAYMENT_METHOD",
            SaleError::InvalidAmount { .. } => "INVALID_AMOUNT",
            SaleError::MissingReference { .. } => "MISSING_REFERENCE",
            SaleError::UnderPayment { .. } => "UNDER_PAYMENT",
            SaleError::SaleNotFound(_) => "SALE_NOT_FOUND",
            SaleError::AlreadyVoided(_) => "ALREADY_VOIDED",
            SaleError::ClientNotFound(_) => "CLIENT_NOT_FOUND",
        }
    }

    /// Not-found family (product, sale, client).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SaleError::ProductNotFound { .. } | SaleError::SaleNotFound(_) | SaleError::ClientNotFound(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before the engine reads anything from storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. unparseable decimal).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Arithmetic on the value does not fit in a decimal.
    #[error("{field} is too large")]
    Overflow { field: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("At least one payment is required")]
    NoPayments,
}

/// Convenience type alias for Results with SaleError.
pub type SaleResult<T> = Result<T, SaleError>;

// =============================================================================
// Unit Tests
// =============================================================================
