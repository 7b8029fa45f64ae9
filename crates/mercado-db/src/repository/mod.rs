//! # Repository Module
//!
//! Database repository implementations for Mercado POS.
//!
//! ## Who Writes What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleEngine / StockLedger                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleRepository ──────────┐                                            │
//! │  ├── create_sale(ws)      │  same transaction                          │
//! │  └── void_sale(id)        ▼                                            │
//! │                     ledger::decrement_stock / increment_stock          │
//! │                     movement::append_movement                          │
//! │                                                                         │
//! │  ProductRepository   catalogue reads, insert, price changes            │
//! │  ClientRepository    insert / get / delete                             │
//! │  MovementRepository  read-only audit views                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Product catalogue
//! - [`SaleRepository`](sale::SaleRepository) - Sale writes and read views
//! - [`MovementRepository`](movement::MovementRepository) - Stock audit trail
//! - [`ClientRepository`](client::ClientRepository) - Client registry

pub mod client;
pub mod movement;
pub mod product;
pub mod sale;
