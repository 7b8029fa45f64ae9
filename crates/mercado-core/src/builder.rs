//! # Sale Builder
//!
//! Turns a cart, a product snapshot and an exchange rate into a
//! [`SaleWriteSet`]: every row and stock change a sale needs, computed and
//! checked, with nothing written yet.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         build_sale()                                    │
//! │                                                                         │
//! │  SaleRequest ──► pre-validation (empty cart, quantities, no payments)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. clamp discount to [0, 100]                                         │
//! │  2. resolve product ids        ──► ProductNotFound                     │
//! │  3. cumulative stock check     ──► InsufficientStock                   │
//! │  4. line subtotals, gross      (round half-up, 2dp)                    │
//! │  5. total_usd = gross × (1 − d/100)                                    │
//! │  6. total_bs  = total_usd × rate                                       │
//! │  7. validate payment lines     ──► InvalidPaymentMethod/Amount/Ref     │
//! │  8. payment sufficiency        ──► UnderPayment                        │
//! │  9. SaleWriteSet { sale, items, payments, stock }                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The builder is a pure function of its inputs. The clock is passed in, and
//! the rate is read once by the caller, so the same request against the same
//! snapshot always produces the same write-set.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{SaleError, SaleResult, ValidationError};
use crate::money::Money;
use crate::payment::{AcceptedPayments, PaymentInput};
use crate::types::{DiscountPercent, ExchangeRate, Product};
use crate::validation::validate_sale_request;

// =============================================================================
// Request
// =============================================================================

/// One cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// What the register submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub items: Vec<CartLine>,
    pub payments: Vec<PaymentInput>,
    /// Out-of-range values are clamped, not rejected.
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SaleRequest {
    pub fn new(items: Vec<CartLine>, payments: Vec<PaymentInput>) -> Self {
        Self {
            items,
            payments,
            discount_percent: None,
            client_id: None,
            notes: None,
        }
    }

    pub fn with_discount(mut self, percent: Decimal) -> Self {
        self.discount_percent = Some(percent);
        self
    }

    pub fn with_client(mut self, client_id: i64) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Distinct product ids, in first-appearance order.
    pub fn product_ids(&self) -> Vec<i64> {
        let mut seen = HashSet::with_capacity(self.items.len());
        self.items
            .iter()
            .map(|line| line.product_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

// =============================================================================
// Write-Set
// =============================================================================

/// The sale header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSale {
    pub subtotal_usd: Money,
    pub total_usd: Money,
    pub total_bs: Money,
    pub exchange_rate: ExchangeRate,
    pub discount_percent: DiscountPercent,
    pub notes: Option<String>,
    pub client_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// One sale line with its price frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSaleItem {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_usd: Money,
    pub subtotal_usd: Money,
}

/// One stock decrement, paired with one `out` movement when persisted.
///
/// `expected_previous`/`expected_new` come from the snapshot the builder saw.
/// The persistence layer decrements conditionally and records what it
/// actually observed, which only differs if another sale committed in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDecrement {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub expected_previous: i64,
    pub expected_new: i64,
}

/// Everything one sale writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleWriteSet {
    pub sale: NewSale,
    pub items: Vec<NewSaleItem>,
    pub payments: AcceptedPayments,
    pub stock: Vec<StockDecrement>,
}

impl SaleWriteSet {
    /// Change owed to the customer. Display only; never stored.
    pub fn change(&self) -> Money {
        self.payments.change()
    }

    /// Total units leaving the shelf.
    pub fn units(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds the write-set for one sale.
///
/// `products` must hold the current rows for [`SaleRequest::product_ids`];
/// extra rows are ignored. Inactive products are treated as missing.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use mercado_core::builder::{build_sale, CartLine, SaleRequest};
/// use mercado_core::{ExchangeRate, Money, PaymentInput, Product};
/// use rust_decimal::Decimal;
///
/// let now = Utc::now();
/// let product = Product {
///     id: 1,
///     name: "Café 500g".to_string(),
///     quantity: 10,
///     initial_quantity: 10,
///     list_price: Money::new(Decimal::new(3335, 3)),
///     min_stock: 2,
///     is_active: true,
///     created_at: now,
///     updated_at: now,
/// };
/// let request = SaleRequest::new(
///     vec![CartLine::new(1, 3)],
///     vec![PaymentInput::new("cash-usd", Money::new(Decimal::new(1001, 2)))],
/// );
/// let rate = ExchangeRate::new(Decimal::from(40)).unwrap();
///
/// let write_set = build_sale(request, &[product], rate, now).unwrap();
/// assert_eq!(write_set.sale.total_usd.to_string(), "10.01");
/// assert_eq!(write_set.sale.total_bs.to_string(), "400.40");
/// ```
pub fn build_sale(
    request: SaleRequest,
    products: &[Product],
    rate: ExchangeRate,
    now: DateTime<Utc>,
) -> SaleResult<SaleWriteSet> {
    validate_sale_request(&request)?;

    let SaleRequest {
        items: cart,
        payments,
        discount_percent,
        client_id,
        notes,
    } = request;

    let discount = discount_percent
        .map(DiscountPercent::clamped)
        .unwrap_or_default();

    let catalogue: HashMap<i64, &Product> = products
        .iter()
        .filter(|p| p.is_active)
        .map(|p| (p.id, p))
        .collect();

    // Resolve and check cumulative demand per product before pricing anything.
    let mut demand: Vec<(i64, i64)> = Vec::new();
    for line in &cart {
        if !catalogue.contains_key(&line.product_id) {
            return Err(SaleError::ProductNotFound {
                product_id: line.product_id,
            });
        }
        match demand.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, total)) => *total += line.quantity,
            None => demand.push((line.product_id, line.quantity)),
        }
    }

    for &(product_id, requested) in &demand {
        let product = catalogue[&product_id];
        if !product.can_sell(requested) {
            return Err(SaleError::InsufficientStock {
                product_id,
                name: product.name.clone(),
                available: product.quantity,
                requested,
            });
        }
    }

    let mut remaining: HashMap<i64, i64> = demand
        .iter()
        .map(|&(id, _)| (id, catalogue[&id].quantity))
        .collect();

    let mut items = Vec::with_capacity(cart.len());
    let mut stock = Vec::with_capacity(cart.len());

    for line in &cart {
        let product = catalogue[&line.product_id];
        let unit_price_usd = product.list_price;
        let subtotal_usd = unit_price_usd
            .checked_mul_quantity(line.quantity)
            .ok_or_else(|| overflow("subtotal_usd"))?;

        items.push(NewSaleItem {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: line.quantity,
            unit_price_usd,
            subtotal_usd,
        });

        let previous = remaining.get(&product.id).copied().unwrap_or(product.quantity);
        let next = previous - line.quantity;
        remaining.insert(product.id, next);

        stock.push(StockDecrement {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: line.quantity,
            expected_previous: previous,
            expected_new: next,
        });
    }

    let subtotal_usd = Money::checked_sum(items.iter().map(|i| i.subtotal_usd))
        .ok_or_else(|| overflow("subtotal_usd"))?
        .rounded();
    let total_usd = subtotal_usd.apply_percentage_discount(discount);
    let total_bs = total_usd
        .checked_convert(rate)
        .ok_or_else(|| overflow("total_bs"))?;

    let payments = AcceptedPayments::reconcile(payments, total_usd)?;

    Ok(SaleWriteSet {
        sale: NewSale {
            subtotal_usd,
            total_usd,
            total_bs,
            exchange_rate: rate,
            discount_percent: discount,
            notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            client_id,
            created_at: now,
        },
        items,
        payments,
        stock,
    })
}

fn overflow(field: &str) -> SaleError {
    ValidationError::Overflow {
        field: field.to_string(),
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================
