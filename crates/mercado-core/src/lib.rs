//! # mercado-core: Pure Business Logic for Mercado POS
//!
//! This crate holds everything about a sale that can be decided without
//! touching storage: money arithmetic, payment reconciliation, the Sale
//! Builder that turns a cart into a write-set, and the arithmetic rules of the
//! stock ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Mercado POS Architecture                          │
//! │                                                                         │
//! │  Caller (HTTP layer, CLI, tests)                                       │
//! │       │  SaleRequest { items, payments, discount, client, notes }      │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ mercado-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │   │
//! │  │   │  money   │  │ payment  │  │ builder  │  │    ledger    │   │   │
//! │  │   │  Money   │  │Reconciler│  │ WriteSet │  │ MovementType │   │   │
//! │  │   └──────────┘  └──────────┘  └──────────┘  └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │  SaleWriteSet                                                  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              mercado-db (Transactional Persistence)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, SaleItem, SalePayment, Movement)
//! - [`money`] - Decimal money with round-half-up at two places
//! - [`error`] - Validation and sale rejection errors
//! - [`validation`] - Request pre-validation (runs before any read)
//! - [`payment`] - Payment Reconciler (Proposed → Validated → Accepted)
//! - [`builder`] - Sale Builder (cart + snapshot → write-set)
//! - [`ledger`] - Movement arithmetic and the ledger consistency check
//!
//! ## Example Usage
//!
//! ```rust
//! use mercado_core::money::Money;
//! use rust_decimal::Decimal;
//!
//! let unit = Money::new(Decimal::new(3335, 3)); // 3.335
//! assert_eq!(unit.checked_mul_quantity(3).unwrap().to_string(), "10.01");
//! ```

pub mod builder;
pub mod error;
pub mod ledger;
pub mod money;
pub mod payment;
pub mod types;
pub mod validation;

pub use builder::{build_sale, CartLine, SaleRequest, SaleWriteSet};
pub use error::{SaleError, SaleResult, ValidationError};
pub use ledger::{LedgerCheck, MovementError, NewMovement};
pub use money::Money;
pub use payment::{AcceptedPayments, PaymentInput, ValidatedPayment};
pub use types::*;

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single cart line.
///
/// Catches typing 10000 instead of 10 at the register.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;
