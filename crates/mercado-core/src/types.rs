//! # Domain Types
//!
//! Core domain types used throughout Mercado POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │  SalePayment    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id ("Sale #N") │   │  sale_id (FK)   │       │
//! │  │  quantity (≥0)  │   │  total_usd      │   │  method         │       │
//! │  │  list_price     │   │  total_bs       │   │  amount_usd     │       │
//! │  └─────────────────┘   │  exchange_rate  │   │  reference      │       │
//! │                        │  status         │   └─────────────────┘       │
//! │  ┌─────────────────┐   └─────────────────┘   ┌─────────────────┐       │
//! │  │    Movement     │   ┌─────────────────┐   │ PaymentMethod   │       │
//! │  │  ─────────────  │   │    SaleItem     │   │  ─────────────  │       │
//! │  │  type in/out/…  │   │  ─────────────  │   │  mobile-transfer│       │
//! │  │  previous_qty   │   │  unit_price_usd │   │  debit-card     │       │
//! │  │  new_qty        │   │  subtotal_usd   │   │  cash-usd / -bs │       │
//! │  └─────────────────┘   └─────────────────┘   │  bio-payment    │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A sale freezes everything it depends on: the unit price of every line, the
//! exchange rate and the discount. Later price or rate edits never reach a
//! stored sale.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Discount Percent
// =============================================================================

/// A sale-level discount, always within `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct DiscountPercent(Decimal);

impl DiscountPercent {
    /// Builds a discount, clamping out-of-range input into `[0, 100]`.
    ///
    /// ## Example
    /// ```rust
    /// use mercado_core::DiscountPercent;
    /// use rust_decimal::Decimal;
    ///
    /// assert_eq!(DiscountPercent::clamped(Decimal::from(150)).percent(), Decimal::from(100));
    /// assert_eq!(DiscountPercent::clamped(Decimal::from(-5)).percent(), Decimal::ZERO);
    /// ```
    pub fn clamped(percent: Decimal) -> Self {
        DiscountPercent(percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
    }

    #[inline]
    pub const fn none() -> Self {
        DiscountPercent(Decimal::ZERO)
    }

    #[inline]
    pub const fn percent(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Default for DiscountPercent {
    fn default() -> Self {
        DiscountPercent::none()
    }
}

impl fmt::Display for DiscountPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for DiscountPercent {
    fn from(value: Decimal) -> Self {
        DiscountPercent::clamped(value)
    }
}

impl From<DiscountPercent> for Decimal {
    fn from(discount: DiscountPercent) -> Self {
        discount.0
    }
}

impl TryFrom<String> for DiscountPercent {
    type Error = rust_decimal::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Decimal::from_str(value.trim()).map(DiscountPercent::clamped)
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Bs per USD. Strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct ExchangeRate(Decimal);

impl ExchangeRate {
    pub fn new(rate: Decimal) -> Result<Self, ValidationError> {
        if rate <= Decimal::ZERO {
            return Err(ValidationError::MustBePositive {
                field: "exchange_rate".to_string(),
            });
        }
        Ok(ExchangeRate(rate))
    }

    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for ExchangeRate {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        ExchangeRate::new(value)
    }
}

impl From<ExchangeRate> for Decimal {
    fn from(rate: ExchangeRate) -> Self {
        rate.0
    }
}

impl TryFrom<String> for ExchangeRate {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let rate = Decimal::from_str(value.trim()).map_err(|e| ValidationError::InvalidFormat {
            field: "exchange_rate".to_string(),
            reason: e.to_string(),
        })?;
        ExchangeRate::new(rate)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product as the engine sees it: a mutable stock counter and a list price.
///
/// The catalogue itself (categories, descriptions, images) lives elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Authoritative stock counter. Never negative.
    pub quantity: i64,
    /// Quantity when the product entered the catalogue; the ledger baseline.
    pub initial_quantity: i64,
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub list_price: Money,
    /// Low-stock threshold.
    pub min_stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Checks if `quantity` units can leave the shelf.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.quantity >= quantity
    }

    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }
}

/// Fields needed to add a product to the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub list_price: Money,
    pub quantity: i64,
    pub min_stock: i64,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale. `Voided` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Paid in full and stock decremented.
    Completed,
    /// Reversed; stock restored.
    Voided,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Voided => "voided",
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// A payment instrument.
///
/// ## Adding a Method
/// Add the variant, its wire name in [`PaymentMethod::as_str`] and its rail in
/// [`PaymentMethod::requires_bank_reference`]. Validation picks it up from
/// there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    /// Bank-to-bank mobile transfer ("pago móvil").
    MobileTransfer,
    /// Debit card on a bank terminal.
    DebitCard,
    /// US dollar bills.
    CashUsd,
    /// Bolívar bills (amount still recorded in USD).
    CashBs,
    /// Biometric payment terminal.
    BioPayment,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::MobileTransfer,
        PaymentMethod::DebitCard,
        PaymentMethod::CashUsd,
        PaymentMethod::CashBs,
        PaymentMethod::BioPayment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MobileTransfer => "mobile-transfer",
            PaymentMethod::DebitCard => "debit-card",
            PaymentMethod::CashUsd => "cash-usd",
            PaymentMethod::CashBs => "cash-bs",
            PaymentMethod::BioPayment => "bio-payment",
        }
    }

    /// Whether the instrument clears through a bank rail and therefore needs
    /// a transaction reference for reconciliation.
    pub fn requires_bank_reference(&self) -> bool {
        match self {
            PaymentMethod::MobileTransfer | PaymentMethod::DebitCard => true,
            PaymentMethod::CashUsd | PaymentMethod::CashBs | PaymentMethod::BioPayment => false,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PaymentMethod::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: PaymentMethod::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Movement Type
// =============================================================================

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Stock entering (receipts, returns from voided sales).
    In,
    /// Stock leaving through a sale.
    Out,
    /// Physical count correction, either direction.
    Adjustment,
    /// Stock sent to another location.
    Transfer,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Adjustment => "adjustment",
            MovementType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A persisted sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: i64,
    /// Σ line subtotals before the discount.
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub subtotal_usd: Money,
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub total_usd: Money,
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub total_bs: Money,
    /// Rate snapshot taken when the sale was built.
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub exchange_rate: ExchangeRate,
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub discount_percent: DiscountPercent,
    pub notes: Option<String>,
    /// Weak reference: nulled when the client is deleted.
    pub client_id: Option<i64>,
    pub status: SaleStatus,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn is_voided(&self) -> bool {
        self.status == SaleStatus::Voided
    }

    /// Reference written on the sale's `out` movements.
    pub fn reference(&self) -> String {
        sale_reference(self.id)
    }
}

/// `"Sale #N"`
pub fn sale_reference(sale_id: i64) -> String {
    format!("Sale #{}", sale_id)
}

/// `"Return Sale #N"`
pub fn return_reference(sale_id: i64) -> String {
    format!("Return Sale #{}", sale_id)
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line of a sale. Price and name are frozen at sale time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub unit_price_usd: Money,
    /// `round(unit_price_usd × quantity, 2)`
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub subtotal_usd: Money,
}

// =============================================================================
// Sale Payment
// =============================================================================

/// One payment instrument applied to a sale. Always expressed in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalePayment {
    pub id: i64,
    pub sale_id: i64,
    pub method: PaymentMethod,
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub amount_usd: Money,
    pub bank_code: Option<String>,
    pub reference: Option<String>,
    pub mon: Option<String>,
}

// =============================================================================
// Movement
// =============================================================================

/// An append-only audit record of one stock change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Movement {
    pub id: i64,
    pub product_id: i64,
    pub movement_type: MovementType,
    /// Unsigned magnitude.
    pub quantity: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub reference_number: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Signed effect on the stock counter (`new − previous`).
    #[inline]
    pub fn signed_delta(&self) -> i64 {
        self.new_quantity - self.previous_quantity
    }
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub document_id: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Read Projections
// =============================================================================

/// A sale with its lines and payments (`get_sale`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleDetail {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<SalePayment>,
}

/// A row of the sales list: the sale plus joined counts and client name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleSummary {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub sale: Sale,
    pub item_count: i64,
    pub client_name: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_payment_method_round_trip_names() {
        for method in PaymentMethod::ALL {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
        }
        assert!("cheque".parse::<PaymentMethod>().is_err());
        assert!("".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_bank_rail_capability() {
        assert!(PaymentMethod::MobileTransfer.requires_bank_reference());
        assert!(PaymentMethod::DebitCard.requires_bank_reference());
        assert!(!PaymentMethod::CashUsd.requires_bank_reference());
        assert!(!PaymentMethod::CashBs.requires_bank_reference());
        assert!(!PaymentMethod::BioPayment.requires_bank_reference());
    }

    #[test]
    fn test_payment_method_serde_uses_kebab_case() {
        let json = serde_json::to_string(&PaymentMethod::MobileTransfer).unwrap();
        assert_eq!(json, "\"mobile-transfer\"");
    }

    #[test]
    fn test_discount_clamps() {
        assert_eq!(DiscountPercent::clamped(dec!(250)).percent(), dec!(100));
        assert_eq!(DiscountPercent::clamped(dec!(-1)).percent(), dec!(0));
        assert_eq!(DiscountPercent::clamped(dec!(15.5)).percent(), dec!(15.5));
        assert_eq!(DiscountPercent::try_from("120".to_string()).unwrap().percent(), dec!(100));
    }

    #[test]
    fn test_exchange_rate_must_be_positive() {
        assert!(ExchangeRate::new(dec!(36.5)).is_ok());
        assert!(ExchangeRate::new(dec!(0)).is_err());
        assert!(ExchangeRate::new(dec!(-1)).is_err());
        assert!(ExchangeRate::try_from("abc".to_string()).is_err());
        assert_eq!(
            ExchangeRate::try_from("40.10".to_string()).unwrap().value(),
            dec!(40.10)
        );
    }

    #[test]
    fn test_references() {
        assert_eq!(sale_reference(7), "Sale #7");
        assert_eq!(return_reference(7), "Return Sale #7");
    }
}
