//! End-to-end tests for the sale engine against an in-memory SQLite database.

use std::sync::Arc;

use chrono::Utc;
use mercado_core::{
    build_sale, return_reference, sale_reference, CartLine, ExchangeRate, Money, MovementType,
    NewProduct, PaymentInput, PaymentMethod, Product, SaleRequest, SaleStatus,
};
use mercado_db::{
    Database, DbConfig, DbError, EngineError, FixedExchangeRate, NewClient, SaleEngine, SaleFilter,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// =============================================================================
// Fixtures
// =============================================================================

const RATE: Decimal = dec!(40.00);

async fn engine() -> SaleEngine {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let rate = ExchangeRate::new(RATE).unwrap();
    SaleEngine::new(db, Arc::new(FixedExchangeRate(rate)))
}

async fn add_product(engine: &SaleEngine, name: &str, price: Decimal, quantity: i64) -> Product {
    engine
        .database()
        .products()
        .insert(&NewProduct {
            name: name.to_string(),
            list_price: Money::new(price),
            quantity,
            min_stock: 1,
        })
        .await
        .unwrap()
}

async fn quantity_of(engine: &SaleEngine, product_id: i64) -> i64 {
    engine
        .database()
        .products()
        .get_by_id(product_id)
        .await
        .unwrap()
        .unwrap()
        .quantity
}

async fn sale_count(engine: &SaleEngine) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM sales")
        .fetch_one(engine.database().pool())
        .await
        .unwrap()
}

async fn movement_count(engine: &SaleEngine) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM movements")
        .fetch_one(engine.database().pool())
        .await
        .unwrap()
}

fn cash(amount: Decimal) -> PaymentInput {
    PaymentInput::new("cash-usd", Money::new(amount))
}

fn immutable(err: sqlx::Error) -> bool {
    matches!(DbError::from(err), DbError::ImmutableRecord { .. })
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_sale_writes_everything() {
    let engine = engine().await;
    let rice = add_product(&engine, "Arroz 1kg", dec!(1.25), 10).await;
    let oil = add_product(&engine, "Aceite 1L", dec!(4.50), 5).await;

    let receipt = engine
        .create_sale(
            SaleRequest::new(
                vec![CartLine::new(rice.id, 2), CartLine::new(oil.id, 1)],
                vec![cash(dec!(5.00)), PaymentInput::new("cash-bs", Money::new(dec!(2.00)))],
            )
            .with_notes("mostrador 1"),
        )
        .await
        .unwrap();

    assert_eq!(receipt.total_usd.amount(), dec!(7.00));
    assert_eq!(receipt.total_bs.amount(), dec!(280.00));
    assert!(receipt.change_usd.is_zero());

    let detail = engine.get_sale(receipt.id).await.unwrap();
    assert_eq!(detail.sale.status, SaleStatus::Completed);
    assert_eq!(detail.sale.notes.as_deref(), Some("mostrador 1"));
    assert_eq!(detail.items.len(), 2);
    assert_eq!(detail.payments.len(), 2);
    assert_eq!(detail.payments[1].method, PaymentMethod::CashBs);

    assert_eq!(quantity_of(&engine, rice.id).await, 8);
    assert_eq!(quantity_of(&engine, oil.id).await, 4);

    let out = engine
        .database()
        .movements()
        .by_reference(&sale_reference(receipt.id))
        .await
        .unwrap();
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|m| m.movement_type == MovementType::Out));
    assert_eq!((out[0].previous_quantity, out[0].new_quantity), (10, 8));
    assert_eq!((out[1].previous_quantity, out[1].new_quantity), (5, 4));
}

#[tokio::test]
async fn test_rounding_three_decimal_price() {
    let engine = engine().await;
    let cheese = add_product(&engine, "Queso 250g", dec!(3.335), 10).await;

    let receipt = engine
        .create_sale(SaleRequest::new(
            vec![CartLine::new(cheese.id, 3)],
            vec![cash(dec!(10.01))],
        ))
        .await
        .unwrap();

    assert_eq!(receipt.total_usd.to_string(), "10.01");
    assert_eq!(receipt.total_bs.to_string(), "400.40");

    let detail = engine.get_sale(receipt.id).await.unwrap();
    assert_eq!(detail.items[0].unit_price_usd.amount(), dec!(3.335));
    assert_eq!(detail.items[0].subtotal_usd.amount(), dec!(10.01));
    assert_eq!(detail.sale.total_usd.amount(), dec!(10.01));
}

#[tokio::test]
async fn test_discount_is_applied_and_stored() {
    let engine = engine().await;
    let coffee = add_product(&engine, "Café 500g", dec!(6.00), 10).await;

    let receipt = engine
        .create_sale(
            SaleRequest::new(vec![CartLine::new(coffee.id, 2)], vec![cash(dec!(10.80))])
                .with_discount(dec!(10)),
        )
        .await
        .unwrap();
    assert_eq!(receipt.total_usd.amount(), dec!(10.80));

    let sale = engine.get_sale(receipt.id).await.unwrap().sale;
    assert_eq!(sale.subtotal_usd.amount(), dec!(12.00));
    assert_eq!(sale.discount_percent.percent(), dec!(10));
}

// =============================================================================
// Payment Sufficiency
// =============================================================================

#[tokio::test]
async fn test_payment_sufficiency() {
    let engine = engine().await;
    let item = add_product(&engine, "Jabón", dec!(25.00), 10).await;

    let err = engine
        .create_sale(SaleRequest::new(vec![CartLine::new(item.id, 1)], vec![cash(dec!(24.99))]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNDER_PAYMENT");
    assert_eq!(sale_count(&engine).await, 0);
    assert_eq!(quantity_of(&engine, item.id).await, 10);

    let exact = engine
        .create_sale(SaleRequest::new(vec![CartLine::new(item.id, 1)], vec![cash(dec!(25.00))]))
        .await
        .unwrap();
    assert!(exact.change_usd.is_zero());

    let over = engine
        .create_sale(SaleRequest::new(vec![CartLine::new(item.id, 1)], vec![cash(dec!(30.00))]))
        .await
        .unwrap();
    assert_eq!(over.change_usd.amount(), dec!(5.00));

    // Change is never persisted: the stored payment is what was handed over.
    let payments = engine.get_sale(over.id).await.unwrap().payments;
    assert_eq!(payments[0].amount_usd.amount(), dec!(30.00));
}

#[tokio::test]
async fn test_bank_rail_needs_reference() {
    let engine = engine().await;
    let item = add_product(&engine, "Detergente", dec!(3.00), 10).await;

    let err = engine
        .create_sale(SaleRequest::new(
            vec![CartLine::new(item.id, 1)],
            vec![PaymentInput::new("mobile-transfer", Money::new(dec!(3.00))).with_bank_code("0102")],
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "MISSING_REFERENCE");
    assert_eq!(sale_count(&engine).await, 0);

    let receipt = engine
        .create_sale(SaleRequest::new(
            vec![CartLine::new(item.id, 1)],
            vec![PaymentInput::new("mobile-transfer", Money::new(dec!(3.00)))
                .with_bank_code("0102")
                .with_reference("00451122")],
        ))
        .await
        .unwrap();

    let payment = &engine.get_sale(receipt.id).await.unwrap().payments[0];
    assert_eq!(payment.method, PaymentMethod::MobileTransfer);
    assert_eq!(payment.reference.as_deref(), Some("00451122"));
    assert_eq!(payment.bank_code.as_deref(), Some("0102"));
}

#[tokio::test]
async fn test_unknown_payment_method_names_the_line() {
    let engine = engine().await;
    let item = add_product(&engine, "Sal", dec!(0.50), 10).await;

    let err = engine
        .create_sale(SaleRequest::new(
            vec![CartLine::new(item.id, 1)],
            vec![cash(dec!(0.25)), PaymentInput::new("cheque", Money::new(dec!(0.25)))],
        ))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INVALID_PAYMENT_METHOD");
    assert!(err.to_string().contains("line 2"));
}

// =============================================================================
// Atomicity
// =============================================================================

#[tokio::test]
async fn test_rejection_writes_nothing() {
    let engine = engine().await;
    let plenty = add_product(&engine, "Pasta", dec!(1.00), 10).await;
    let scarce = add_product(&engine, "Atún", dec!(2.00), 1).await;

    let err = engine
        .create_sale(SaleRequest::new(
            vec![CartLine::new(plenty.id, 3), CartLine::new(scarce.id, 2)],
            vec![cash(dec!(7.00))],
        ))
        .await
        .unwrap_err();

    match err.as_rejection() {
        Some(mercado_core::SaleError::InsufficientStock {
            product_id,
            available,
            requested,
            ..
        }) => {
            assert_eq!(*product_id, scarce.id);
            assert_eq!((*available, *requested), (1, 2));
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }

    assert_eq!(sale_count(&engine).await, 0);
    assert_eq!(movement_count(&engine).await, 0);
    assert_eq!(quantity_of(&engine, plenty.id).await, 10);
    assert_eq!(quantity_of(&engine, scarce.id).await, 1);
}

#[tokio::test]
async fn test_one_short_line_leaves_every_product_untouched() {
    let engine = engine().await;
    let mut products = Vec::new();
    for (name, quantity) in [
        ("Harina", 20),
        ("Arroz", 20),
        ("Pasta", 20),
        ("Sardinas", 2),
        ("Mayonesa", 20),
    ] {
        products.push(add_product(&engine, name, dec!(1.50), quantity).await);
    }

    // An earlier sale gives every product some history to compare against.
    engine
        .create_sale(SaleRequest::new(
            products.iter().map(|p| CartLine::new(p.id, 1)).collect(),
            vec![cash(dec!(7.50))],
        ))
        .await
        .unwrap();

    let ledger = engine.database().ledger();
    let mut quantities_before = Vec::new();
    let mut movements_before = Vec::new();
    for product in &products {
        quantities_before.push(quantity_of(&engine, product.id).await);
        movements_before.push(ledger.movements_for(product.id).await.unwrap());
    }
    let listed_before = engine.list_sales(&SaleFilter::default()).await.unwrap();
    assert_eq!(quantities_before, vec![19, 19, 19, 1, 19]);

    let err = engine
        .create_sale(SaleRequest::new(
            products.iter().map(|p| CartLine::new(p.id, 2)).collect(),
            vec![cash(dec!(15.00))],
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");

    for (i, product) in products.iter().enumerate() {
        assert_eq!(quantity_of(&engine, product.id).await, quantities_before[i]);
        assert_eq!(ledger.movements_for(product.id).await.unwrap(), movements_before[i]);
    }
    let listed_after = engine.list_sales(&SaleFilter::default()).await.unwrap();
    assert_eq!(listed_after.len(), listed_before.len());
    assert_eq!(listed_after, listed_before);
}

#[tokio::test]
async fn test_failure_inside_transaction_rolls_back_earlier_lines() {
    let engine = engine().await;
    let first = add_product(&engine, "Harina", dec!(1.20), 10).await;
    let last_unit = add_product(&engine, "Mantequilla", dec!(3.00), 1).await;
    let db = engine.database();

    // Priced while the last unit was still there...
    let snapshot = db.products().get_by_ids(&[first.id, last_unit.id]).await.unwrap();
    let write_set = build_sale(
        SaleRequest::new(
            vec![CartLine::new(first.id, 4), CartLine::new(last_unit.id, 1)],
            vec![cash(dec!(7.80))],
        ),
        &snapshot,
        ExchangeRate::new(RATE).unwrap(),
        Utc::now(),
    )
    .unwrap();

    // ...but another register takes it before this sale commits.
    db.ledger().transfer_out(last_unit.id, 1, None, None).await.unwrap();

    let err = db.sales().create_sale(&write_set).await.unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");

    // The first line's decrement was rolled back with the rest.
    assert_eq!(sale_count(&engine).await, 0);
    assert_eq!(quantity_of(&engine, first.id).await, 10);
    assert_eq!(quantity_of(&engine, last_unit.id).await, 0);
    assert_eq!(movement_count(&engine).await, 1);
}

#[tokio::test]
async fn test_last_unit_sold_once() {
    let engine = engine().await;
    let last = add_product(&engine, "Torta", dec!(15.00), 1).await;
    let db = engine.database();

    let snapshot = db.products().get_by_ids(&[last.id]).await.unwrap();
    let rate = ExchangeRate::new(RATE).unwrap();
    let build = || {
        build_sale(
            SaleRequest::new(vec![CartLine::new(last.id, 1)], vec![cash(dec!(15.00))]),
            &snapshot,
            rate,
            Utc::now(),
        )
        .unwrap()
    };

    // Both registers priced the same snapshot.
    let first = build();
    let second = build();

    db.sales().create_sale(&first).await.unwrap();
    let err = db.sales().create_sale(&second).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::Rejected(mercado_core::SaleError::InsufficientStock { available: 0, .. })
    ));
    assert_eq!(quantity_of(&engine, last.id).await, 0);
    assert_eq!(sale_count(&engine).await, 1);
    assert!(db.ledger().verify(last.id).await.unwrap().consistent);
}

#[tokio::test]
async fn test_duplicate_lines_chain_movements() {
    let engine = engine().await;
    let soda = add_product(&engine, "Refresco 2L", dec!(2.50), 5).await;

    let receipt = engine
        .create_sale(SaleRequest::new(
            vec![CartLine::new(soda.id, 2), CartLine::new(soda.id, 3)],
            vec![cash(dec!(12.50))],
        ))
        .await
        .unwrap();

    let out = engine
        .database()
        .movements()
        .by_reference(&sale_reference(receipt.id))
        .await
        .unwrap();
    assert_eq!((out[0].previous_quantity, out[0].new_quantity), (5, 3));
    assert_eq!((out[1].previous_quantity, out[1].new_quantity), (3, 0));

    let err = engine
        .create_sale(SaleRequest::new(
            vec![CartLine::new(soda.id, 1), CartLine::new(soda.id, 1)],
            vec![cash(dec!(5.00))],
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
}

// =============================================================================
// Void
// =============================================================================

#[tokio::test]
async fn test_void_restores_stock_additively() {
    let engine = engine().await;
    let beans = add_product(&engine, "Caraotas", dec!(1.80), 10).await;
    let db = engine.database();

    let receipt = engine
        .create_sale(SaleRequest::new(vec![CartLine::new(beans.id, 4)], vec![cash(dec!(7.20))]))
        .await
        .unwrap();
    assert_eq!(quantity_of(&engine, beans.id).await, 6);

    // Stock arrives between the sale and the void.
    db.ledger().receive(beans.id, 5, Some("Factura 77"), None).await.unwrap();

    engine.void_sale(receipt.id, Some("cliente devolvió")).await.unwrap();
    assert_eq!(quantity_of(&engine, beans.id).await, 15);

    let sale = engine.get_sale(receipt.id).await.unwrap().sale;
    assert_eq!(sale.status, SaleStatus::Voided);
    assert_eq!(sale.void_reason.as_deref(), Some("cliente devolvió"));

    let returns = db.movements().by_reference(&return_reference(receipt.id)).await.unwrap();
    assert_eq!(returns.len(), 1);
    assert_eq!(returns[0].movement_type, MovementType::In);
    assert_eq!((returns[0].previous_quantity, returns[0].new_quantity), (11, 15));

    let err = engine.void_sale(receipt.id, None).await.unwrap_err();
    assert_eq!(err.code(), "ALREADY_VOIDED");
    assert_eq!(quantity_of(&engine, beans.id).await, 15);

    let err = engine.void_sale(receipt.id + 1, None).await.unwrap_err();
    assert_eq!(err.code(), "SALE_NOT_FOUND");

    assert!(db.ledger().verify(beans.id).await.unwrap().consistent);
}

// =============================================================================
// Historical Immutability
// =============================================================================

#[tokio::test]
async fn test_past_sales_keep_their_snapshot() {
    let engine = engine().await;
    let milk = add_product(&engine, "Leche 1L", dec!(1.80), 10).await;
    let db = engine.database();

    let receipt = engine
        .create_sale(SaleRequest::new(vec![CartLine::new(milk.id, 2)], vec![cash(dec!(3.60))]))
        .await
        .unwrap();

    db.products().update_price(milk.id, Money::new(dec!(2.40))).await.unwrap();

    let detail = engine.get_sale(receipt.id).await.unwrap();
    assert_eq!(detail.items[0].unit_price_usd.amount(), dec!(1.80));
    assert_eq!(detail.sale.total_usd.amount(), dec!(3.60));
    assert_eq!(detail.sale.exchange_rate.value(), RATE);

    let pool = db.pool();
    let edit_total = sqlx::query("UPDATE sales SET total_usd = '1.00' WHERE id = ?1")
        .bind(receipt.id)
        .execute(pool)
        .await
        .unwrap_err();
    assert!(immutable(edit_total));

    let edit_line = sqlx::query("UPDATE sale_items SET unit_price_usd = '2.40' WHERE sale_id = ?1")
        .bind(receipt.id)
        .execute(pool)
        .await
        .unwrap_err();
    assert!(immutable(edit_line));

    let delete_sale = sqlx::query("DELETE FROM sales WHERE id = ?1")
        .bind(receipt.id)
        .execute(pool)
        .await
        .unwrap_err();
    assert!(immutable(delete_sale));

    let delete_payment = sqlx::query("DELETE FROM sale_payments WHERE sale_id = ?1")
        .bind(receipt.id)
        .execute(pool)
        .await
        .unwrap_err();
    assert!(immutable(delete_payment));
}

#[tokio::test]
async fn test_voided_sale_cannot_be_reopened() {
    let engine = engine().await;
    let item = add_product(&engine, "Galletas", dec!(0.90), 3).await;

    let receipt = engine
        .create_sale(SaleRequest::new(vec![CartLine::new(item.id, 1)], vec![cash(dec!(0.90))]))
        .await
        .unwrap();
    engine.void_sale(receipt.id, None).await.unwrap();

    let reopen = sqlx::query("UPDATE sales SET status = 'completed' WHERE id = ?1")
        .bind(receipt.id)
        .execute(engine.database().pool())
        .await
        .unwrap_err();
    assert!(immutable(reopen));
}

// =============================================================================
// Ledger
// =============================================================================

#[tokio::test]
async fn test_ledger_consistent_after_mixed_activity() {
    let engine = engine().await;
    let sugar = add_product(&engine, "Azúcar", dec!(1.10), 20).await;
    let ledger = engine.database().ledger();

    let a = engine
        .create_sale(SaleRequest::new(vec![CartLine::new(sugar.id, 3)], vec![cash(dec!(3.30))]))
        .await
        .unwrap();
    engine
        .create_sale(SaleRequest::new(vec![CartLine::new(sugar.id, 2)], vec![cash(dec!(2.20))]))
        .await
        .unwrap();
    ledger.receive(sugar.id, 10, None, None).await.unwrap();
    ledger.adjust_to(sugar.id, 22, Some("conteo")).await.unwrap();
    ledger.transfer_out(sugar.id, 4, Some("Sucursal 2"), None).await.unwrap();
    engine.void_sale(a.id, None).await.unwrap();

    let movements = ledger.movements_for(sugar.id).await.unwrap();
    assert_eq!(movements.len(), 6);
    for pair in movements.windows(2) {
        assert_eq!(pair[0].new_quantity, pair[1].previous_quantity);
    }

    let check = ledger.verify(sugar.id).await.unwrap();
    assert!(check.consistent);
    assert_eq!(check.recorded_delta, quantity_of(&engine, sugar.id).await - 20);

    assert!(ledger.verify_all().await.unwrap().iter().all(|c| c.consistent));
}

// =============================================================================
// Clients and Listing
// =============================================================================

#[tokio::test]
async fn test_deleting_client_keeps_sale() {
    let engine = engine().await;
    let item = add_product(&engine, "Mayonesa", dec!(2.75), 5).await;
    let client = engine
        .database()
        .clients()
        .insert(&NewClient {
            name: "José Rodríguez".to_string(),
            document_id: Some("V-18222333".to_string()),
            phone: None,
        })
        .await
        .unwrap();

    let receipt = engine
        .create_sale(
            SaleRequest::new(vec![CartLine::new(item.id, 1)], vec![cash(dec!(2.75))])
                .with_client(client.id),
        )
        .await
        .unwrap();

    let listed = engine.list_sales(&SaleFilter::default()).await.unwrap();
    assert_eq!(listed[0].client_name.as_deref(), Some("José Rodríguez"));

    engine.database().clients().delete(client.id).await.unwrap();

    let sale = engine.get_sale(receipt.id).await.unwrap().sale;
    assert_eq!(sale.client_id, None);
    assert_eq!(sale.total_usd.amount(), dec!(2.75));

    let listed = engine.list_sales(&SaleFilter::default()).await.unwrap();
    assert_eq!(listed[0].client_name, None);
}

#[tokio::test]
async fn test_list_sales_newest_first_with_limit() {
    let engine = engine().await.with_page_limit(2);
    let item = add_product(&engine, "Agua", dec!(0.60), 50).await;

    let mut ids = Vec::new();
    for qty in 1..=3 {
        let receipt = engine
            .create_sale(SaleRequest::new(
                vec![CartLine::new(item.id, qty)],
                vec![cash(dec!(5.00))],
            ))
            .await
            .unwrap();
        ids.push(receipt.id);
    }

    let page = engine.list_sales(&SaleFilter::default()).await.unwrap();
    assert_eq!(page.iter().map(|s| s.sale.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);
    assert!(page.iter().all(|s| s.item_count == 1));

    let all = engine.list_sales(&SaleFilter::default().with_limit(10)).await.unwrap();
    assert_eq!(all.len(), 3);

    let today = Utc::now().date_naive();
    let today_only = engine
        .list_sales(&SaleFilter::default().between(today, today).with_limit(10))
        .await
        .unwrap();
    assert_eq!(today_only.len(), 3);
}

// =============================================================================
// Serialization
// =============================================================================

#[tokio::test]
async fn test_receipt_and_detail_json_round_trip() {
    let engine = engine().await;
    let cheese = add_product(&engine, "Queso 250g", dec!(3.335), 10).await;

    let receipt = engine
        .create_sale(SaleRequest::new(
            vec![CartLine::new(cheese.id, 3)],
            vec![PaymentInput::new("debit-card", Money::new(dec!(12.00))).with_reference("778812")],
        ))
        .await
        .unwrap();

    let json = serde_json::to_value(&receipt).unwrap();
    assert_eq!(json["total_usd"], "10.01");
    assert_eq!(json["change_usd"], "1.99");
    let back: mercado_db::SaleReceipt = serde_json::from_value(json).unwrap();
    assert_eq!(back, receipt);

    let detail = engine.get_sale(receipt.id).await.unwrap();
    let json = serde_json::to_string(&detail).unwrap();
    assert!(json.contains("\"debit-card\""));
    assert!(json.contains("\"3.335\""));
    let back: mercado_core::SaleDetail = serde_json::from_str(&json).unwrap();
    assert_eq!(back, detail);
}
