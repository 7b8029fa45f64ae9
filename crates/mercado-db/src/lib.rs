//! # mercado-db: Transactional Persistence for Mercado POS
//!
//! This crate turns a sale write-set built by `mercado-core` into committed
//! rows. It owns the SQLite pool, the embedded migrations, the repositories,
//! the stock ledger and the [`SaleEngine`] façade.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercado POS Data Flow                            │
//! │                                                                         │
//! │  Caller (create_sale / void_sale / get_sale / list_sales)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   mercado-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │  SaleEngine   │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │  (engine.rs)  │───►│  SaleRepo     │    │  (embedded)  │   │   │
//! │  │   │               │    │  ProductRepo  │    │ 001_initial  │   │   │
//! │  │   │ rates: dyn    │    │  ClientRepo   │    │ 002_triggers │   │   │
//! │  │   │ Provider      │    │  StockLedger  │    │              │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   products · sales · sale_items · sale_payments · movements    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and engine error types
//! - [`config`] - Environment configuration and tracing setup
//! - [`repository`] - Repository implementations (product, sale, movement, client)
//! - [`ledger`] - Stock counter writes paired with movements
//! - [`rates`] - Exchange rate providers
//! - [`engine`] - The sale engine
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mercado_db::{EngineConfig, SaleEngine};
//! use mercado_core::{CartLine, PaymentInput, SaleRequest};
//!
//! let engine = SaleEngine::from_config(&EngineConfig::from_env()?).await?;
//!
//! let receipt = engine
//!     .create_sale(SaleRequest::new(
//!         vec![CartLine::new(product_id, 3)],
//!         vec![PaymentInput::new("cash-usd", Money::new(dec!(10.01)))],
//!     ))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod rates;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{init_tracing, ConfigError, EngineConfig};
pub use engine::{SaleEngine, SaleReceipt};
pub use error::{DbError, DbResult, EngineError, EngineResult};
pub use ledger::StockLedger;
pub use pool::{Database, DbConfig};
pub use rates::{ExchangeRateProvider, FixedExchangeRate, StoredExchangeRates};

// Repository re-exports for convenience
pub use repository::client::{ClientRepository, NewClient};
pub use repository::movement::MovementRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::{SaleFilter, SaleRepository};
