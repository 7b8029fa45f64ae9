//! # Validation Module
//!
//! Input validation that runs before the engine reads anything.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (no reads)                                       │
//! │  ├── Empty cart, empty payment list                                    │
//! │  └── Quantity bounds, note length                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Sale Builder (reads product snapshot + rate)                 │
//! │  ├── Unknown products, insufficient stock                              │
//! │  └── Payment reconciliation                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0), CHECK (status IN …)                        │
//! │  ├── Foreign keys                                                      │
//! │  └── Append-only triggers                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;

use crate::builder::SaleRequest;
use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted free-text note (sale notes, void reasons).
pub const MAX_NOTE_LENGTH: usize = 500;

// =============================================================================
// Request Validators
// =============================================================================

/// Validates the shape of a sale request.
///
/// ## Rules
/// - At least one cart line, at most [`MAX_CART_ITEMS`]
/// - Every line quantity in `1..=MAX_ITEM_QUANTITY`
/// - At least one payment
/// - Notes no longer than [`MAX_NOTE_LENGTH`]
///
/// Payment contents (method, amount, reference) are checked later by the
/// reconciler so that the error can name the offending line.
pub fn validate_sale_request(request: &SaleRequest) -> ValidationResult<()> {
    if request.items.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    validate_cart_size(request.items.len())?;

    for line in &request.items {
        validate_quantity(line.quantity)?;
    }

    if request.payments.is_empty() {
        return Err(ValidationError::NoPayments);
    }

    if let Some(notes) = &request.notes {
        validate_note("notes", notes)?;
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_ITEM_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates cart size (number of lines).
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

/// Validates a list price. Zero is allowed (free items), negative is not.
///
/// ## Example
/// ```rust
/// use mercado_core::money::Money;
/// use mercado_core::validation::validate_list_price;
/// use rust_decimal::Decimal;
///
/// assert!(validate_list_price(Money::new(Decimal::new(1099, 2))).is_ok());
/// assert!(validate_list_price(Money::zero()).is_ok());
/// assert!(validate_list_price(Money::new(Decimal::new(-1, 0))).is_err());
/// ```
pub fn validate_list_price(price: Money) -> ValidationResult<()> {
    if price.amount() < Decimal::ZERO {
        return Err(ValidationError::OutOfRange {
            field: "list_price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a stock quantity for catalogue insertion or a physical count.
pub fn validate_stock_level(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name: non-empty after trimming, at most 200 chars.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name)
}

/// Validates a display name (products, clients).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an optional free-text field.
pub fn validate_note(field: &str, text: &str) -> ValidationResult<()> {
    if text.chars().count() > MAX_NOTE_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTE_LENGTH,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
