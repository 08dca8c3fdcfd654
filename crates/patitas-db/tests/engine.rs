//! Integration tests for the sale engine against in-memory SQLite.
//!
//! Every test gets a fresh database with migrations applied, so the
//! walk-in customer and generic pet sentinels are always present.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use patitas_core::{
    CoreError, Customer, Pet, Product, SaleAggregate, SaleKind, SaleStatus, ServiceItem,
    ValidationError, GENERIC_PET_ID, WALK_IN_CUSTOMER_ID,
};
use patitas_db::{
    ComposeSaleRequest, Database, DbConfig, EngineError, MutateSaleRequest, Notifier, NotifyError,
    ProcessReturnRequest, ProductLineRequest, ReturnLineRequest, SaleEngine, ServiceLineRequest,
};

async fn setup() -> (Database, SaleEngine) {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database");
    let engine = SaleEngine::new(db.pool().clone());
    (db, engine)
}

async fn seed_product(db: &Database, id: &str, stock: i64, price_cents: i64) {
    let now = Utc::now();
    db.products()
        .insert(&Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            category: None,
            stock,
            tax_applicable: false,
            tax_rate_bps: 0,
            price_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("insert product");
}

async fn seed_taxed_product(db: &Database, id: &str, stock: i64, price_cents: i64, bps: u32) {
    let now = Utc::now();
    db.products()
        .insert(&Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            category: None,
            stock,
            tax_applicable: true,
            tax_rate_bps: bps,
            price_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("insert product");
}

async fn seed_customer(db: &Database, id: &str) {
    db.customers()
        .insert(&Customer {
            id: id.to_string(),
            name: format!("Customer {id}"),
            document_number: format!("doc-{id}"),
            created_at: Utc::now(),
        })
        .await
        .expect("insert customer");
}

async fn seed_pet(db: &Database, id: &str, customer_id: &str) {
    db.customers()
        .insert_pet(&Pet {
            id: id.to_string(),
            customer_id: customer_id.to_string(),
            name: format!("Pet {id}"),
            species: "dog".to_string(),
            active: true,
            created_at: Utc::now(),
        })
        .await
        .expect("insert pet");
}

async fn seed_service(db: &Database, id: &str, price_cents: i64) {
    db.services()
        .insert(&ServiceItem {
            id: id.to_string(),
            name: format!("Service {id}"),
            price_cents,
            is_active: true,
            created_at: Utc::now(),
        })
        .await
        .expect("insert service");
}

async fn stock_of(db: &Database, id: &str) -> i64 {
    db.products()
        .get_by_id(id)
        .await
        .expect("get product")
        .expect("product exists")
        .stock
}

fn cash_sale(customer_id: &str, lines: Vec<ProductLineRequest>, tendered: &str) -> ComposeSaleRequest {
    ComposeSaleRequest {
        customer_id: Some(customer_id.to_string()),
        user_id: "u-1".to_string(),
        payment_method: "cash".to_string(),
        status: None,
        tendered: Some(tendered.to_string()),
        payment_reference: None,
        notes: None,
        receipt_attachment: None,
        sold_at: None,
        product_lines: lines,
        service_lines: vec![],
    }
}

fn product_line(product_id: &str, quantity: i64, unit_price: &str) -> ProductLineRequest {
    ProductLineRequest {
        product_id: product_id.to_string(),
        quantity,
        unit_price: unit_price.to_string(),
    }
}

fn return_request(origin_sale_id: &str, product_id: &str, quantity: i64) -> ProcessReturnRequest {
    ProcessReturnRequest {
        origin_sale_id: origin_sale_id.to_string(),
        user_id: "u-2".to_string(),
        reason: None,
        prior_balance: None,
        returned_lines: vec![ReturnLineRequest {
            product_id: product_id.to_string(),
            quantity,
        }],
        exchange_lines: vec![],
    }
}

// =============================================================================
// Composition
// =============================================================================

#[tokio::test]
async fn compose_cash_sale_totals_and_stock() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00"))
        .await
        .expect("compose");

    assert_eq!(aggregate.sale.subtotal_cents, 2000);
    assert_eq!(aggregate.sale.tax_cents, 0);
    assert_eq!(aggregate.sale.total_cents, 2000);
    assert_eq!(aggregate.sale.tendered_cents, Some(2000));
    assert_eq!(aggregate.sale.change_cents, Some(0));
    assert_eq!(aggregate.sale.status, SaleStatus::Effective);
    assert_eq!(aggregate.sale.kind, SaleKind::Sale);
    assert_eq!(aggregate.product_lines.len(), 1);
    assert_eq!(stock_of(&db, "p-1").await, 8);
}

#[tokio::test]
async fn compose_applies_tax_and_change() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_taxed_product(&db, "p-1", 10, 1000, 1900).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 3, "10.00")], "40.00"))
        .await
        .expect("compose");

    // 3 x $10.00 + 19% unit tax ($1.90) per unit.
    assert_eq!(aggregate.sale.subtotal_cents, 3000);
    assert_eq!(aggregate.sale.tax_cents, 570);
    assert_eq!(aggregate.sale.total_cents, 3570);
    assert_eq!(aggregate.sale.change_cents, Some(4000 - 3570));

    let line = &aggregate.product_lines[0];
    assert_eq!(line.unit_tax_cents, 190);
    assert_eq!(line.total_with_tax_cents, 3570);
}

#[tokio::test]
async fn compose_read_back_round_trips() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let composed = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 1, "10.00")], "10.00"))
        .await
        .expect("compose");

    let read_back = engine.get_sale(&composed.sale.id).await.expect("get_sale");

    assert_eq!(read_back.sale.subtotal_cents, composed.sale.subtotal_cents);
    assert_eq!(read_back.sale.total_cents, composed.sale.total_cents);
    assert_eq!(read_back.product_lines.len(), composed.product_lines.len());
}

#[tokio::test]
async fn compose_rejects_insufficient_stock_without_persisting() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 5, 1000).await;

    let err = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 6, "10.00")], "100.00"))
        .await
        .expect_err("must fail");

    assert!(matches!(
        err,
        EngineError::Core(CoreError::InsufficientStock {
            available: 5,
            requested: 6,
            ..
        })
    ));

    // Full rollback: no header, stock untouched.
    assert!(engine
        .list_by_customer("c-1", 10)
        .await
        .expect("list")
        .is_empty());
    assert_eq!(stock_of(&db, "p-1").await, 5);
}

#[tokio::test]
async fn compose_rejects_empty_sale() {
    let (_db, engine) = setup().await;

    let err = engine
        .compose_sale(cash_sale("c-1", vec![], "10.00"))
        .await
        .expect_err("must fail");

    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::EmptySale)
    ));
}

#[tokio::test]
async fn compose_rejects_cash_under_tender() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let err = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "19.99"))
        .await
        .expect_err("must fail");

    assert!(matches!(
        err,
        EngineError::Core(CoreError::InvalidPaymentAmount { .. })
    ));
    assert_eq!(stock_of(&db, "p-1").await, 10);
}

#[tokio::test]
async fn compose_unknown_product_rolls_back() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let err = engine
        .compose_sale(cash_sale(
            "c-1",
            vec![
                product_line("p-1", 2, "10.00"),
                product_line("missing", 1, "5.00"),
            ],
            "50.00",
        ))
        .await
        .expect_err("must fail");

    assert!(matches!(err, EngineError::NotFound { .. }));
    assert_eq!(stock_of(&db, "p-1").await, 10);
}

#[tokio::test]
async fn transfer_sale_starts_pending() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let mut request = cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00");
    request.payment_method = "transfer".to_string();
    request.tendered = None;

    let aggregate = engine.compose_sale(request).await.expect("compose");

    assert_eq!(aggregate.sale.status, SaleStatus::Pending);
    // Stock is decremented at creation regardless of initial status.
    assert_eq!(stock_of(&db, "p-1").await, 8);
}

// =============================================================================
// Pet resolution
// =============================================================================

#[tokio::test]
async fn service_line_resolves_first_active_pet() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_pet(&db, "pet-a", "c-1").await;
    seed_pet(&db, "pet-b", "c-1").await;
    seed_service(&db, "s-1", 2500).await;

    let mut request = cash_sale("c-1", vec![], "25.00");
    request.service_lines = vec![ServiceLineRequest {
        service_id: "s-1".to_string(),
        pet_id: None,
        temp_pet_name: None,
        temp_pet_species: None,
        quantity: 1,
        unit_price: "25.00".to_string(),
    }];

    let aggregate = engine.compose_sale(request).await.expect("compose");

    assert_eq!(aggregate.service_lines[0].pet_id, "pet-a");
    assert_eq!(aggregate.sale.subtotal_cents, 2500);
    assert_eq!(aggregate.sale.tax_cents, 0);
}

#[tokio::test]
async fn walk_in_sale_uses_generic_pet() {
    let (db, engine) = setup().await;
    seed_service(&db, "s-1", 2500).await;

    let mut request = cash_sale("ignored", vec![], "25.00");
    request.customer_id = None;
    request.service_lines = vec![ServiceLineRequest {
        service_id: "s-1".to_string(),
        pet_id: None,
        temp_pet_name: Some("Firulais".to_string()),
        temp_pet_species: Some("dog".to_string()),
        quantity: 1,
        unit_price: "25.00".to_string(),
    }];

    let aggregate = engine.compose_sale(request).await.expect("compose");

    assert_eq!(aggregate.sale.customer_id, WALK_IN_CUSTOMER_ID);
    assert_eq!(aggregate.service_lines[0].pet_id, GENERIC_PET_ID);
    assert_eq!(
        aggregate.service_lines[0].temp_pet_name.as_deref(),
        Some("Firulais")
    );
}

#[tokio::test]
async fn foreign_pet_is_rejected() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_customer(&db, "c-2").await;
    seed_pet(&db, "pet-a", "c-2").await;
    seed_service(&db, "s-1", 2500).await;

    let mut request = cash_sale("c-1", vec![], "25.00");
    request.service_lines = vec![ServiceLineRequest {
        service_id: "s-1".to_string(),
        pet_id: Some("pet-a".to_string()),
        temp_pet_name: None,
        temp_pet_species: None,
        quantity: 1,
        unit_price: "25.00".to_string(),
    }];

    let err = engine.compose_sale(request).await.expect_err("must fail");

    assert!(matches!(
        err,
        EngineError::Core(CoreError::PetOwnershipMismatch { .. })
    ));
}

#[tokio::test]
async fn petless_customer_is_rejected() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_service(&db, "s-1", 2500).await;

    let mut request = cash_sale("c-1", vec![], "25.00");
    request.service_lines = vec![ServiceLineRequest {
        service_id: "s-1".to_string(),
        pet_id: None,
        temp_pet_name: None,
        temp_pet_species: None,
        quantity: 1,
        unit_price: "25.00".to_string(),
    }];

    let err = engine.compose_sale(request).await.expect_err("must fail");

    assert!(matches!(
        err,
        EngineError::Core(CoreError::NoRegisteredPet { .. })
    ));
}

// =============================================================================
// Status changes
// =============================================================================

#[tokio::test]
async fn cancel_restores_stock() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00"))
        .await
        .expect("compose");
    assert_eq!(stock_of(&db, "p-1").await, 8);

    let cancelled = engine
        .change_status(&aggregate.sale.id, SaleStatus::Cancelled, false)
        .await
        .expect("cancel");

    assert_eq!(cancelled.sale.status, SaleStatus::Cancelled);
    assert_eq!(stock_of(&db, "p-1").await, 10);
}

#[tokio::test]
async fn approving_pending_sale_touches_no_stock() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let mut request = cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00");
    request.payment_method = "transfer".to_string();
    request.tendered = None;

    let aggregate = engine.compose_sale(request).await.expect("compose");

    let approved = engine
        .change_status(&aggregate.sale.id, SaleStatus::Effective, false)
        .await
        .expect("approve");

    assert_eq!(approved.sale.status, SaleStatus::Effective);
    assert_eq!(stock_of(&db, "p-1").await, 8);
}

#[tokio::test]
async fn pending_rejection_can_skip_stock_reversal() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let mut request = cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00");
    request.payment_method = "transfer".to_string();
    request.tendered = None;

    let aggregate = engine.compose_sale(request).await.expect("compose");

    engine
        .change_status(&aggregate.sale.id, SaleStatus::Cancelled, true)
        .await
        .expect("cancel with skip");

    // Explicitly skipped: the decrement from composition stays.
    assert_eq!(stock_of(&db, "p-1").await, 8);
}

#[tokio::test]
async fn invalid_transition_is_rejected_before_any_write() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00"))
        .await
        .expect("compose");

    let err = engine
        .change_status(&aggregate.sale.id, SaleStatus::Pending, false)
        .await
        .expect_err("must fail");

    assert!(matches!(
        err,
        EngineError::Core(CoreError::InvalidStatus { .. })
    ));

    let unchanged = engine.get_sale(&aggregate.sale.id).await.expect("get");
    assert_eq!(unchanged.sale.status, SaleStatus::Effective);
    assert_eq!(stock_of(&db, "p-1").await, 8);
}

#[tokio::test]
async fn return_bookkeeping_states_refuse_direct_requests() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 3, "10.00")], "30.00"))
        .await
        .expect("compose");

    // Only the return processor may mark a sale partially returned; a
    // direct request would flip the status without moving any stock.
    let err = engine
        .change_status(&aggregate.sale.id, SaleStatus::PartiallyReturned, false)
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        EngineError::Core(CoreError::InvalidStatus { .. })
    ));

    engine
        .process_return(return_request(&aggregate.sale.id, "p-1", 1))
        .await
        .expect("partial return");
    assert_eq!(stock_of(&db, "p-1").await, 8);

    // Completing the return is likewise the processor's job.
    let err = engine
        .change_status(&aggregate.sale.id, SaleStatus::Returned, false)
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        EngineError::Core(CoreError::InvalidStatus { .. })
    ));

    let unchanged = engine.get_sale(&aggregate.sale.id).await.expect("get");
    assert_eq!(unchanged.sale.status, SaleStatus::PartiallyReturned);
    assert_eq!(stock_of(&db, "p-1").await, 8);
}

// =============================================================================
// Mutation
// =============================================================================

#[tokio::test]
async fn mutate_replaces_lines_and_rebalances_stock() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;
    seed_product(&db, "p-2", 10, 500).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00"))
        .await
        .expect("compose");
    assert_eq!(stock_of(&db, "p-1").await, 8);

    let mutated = engine
        .mutate_sale(
            &aggregate.sale.id,
            MutateSaleRequest {
                tendered: Some("15.00".to_string()),
                product_lines: Some(vec![product_line("p-2", 3, "5.00")]),
                ..Default::default()
            },
        )
        .await
        .expect("mutate");

    // Old effect reversed, new applied, totals recomputed.
    assert_eq!(stock_of(&db, "p-1").await, 10);
    assert_eq!(stock_of(&db, "p-2").await, 7);
    assert_eq!(mutated.sale.subtotal_cents, 1500);
    assert_eq!(mutated.sale.total_cents, 1500);
    assert_eq!(mutated.product_lines.len(), 1);
    assert_eq!(mutated.product_lines[0].product_id, "p-2");
}

#[tokio::test]
async fn mutate_header_only_keeps_lines_and_totals() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00"))
        .await
        .expect("compose");

    let mutated = engine
        .mutate_sale(
            &aggregate.sale.id,
            MutateSaleRequest {
                notes: Some("updated note".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("mutate");

    assert_eq!(mutated.sale.notes.as_deref(), Some("updated note"));
    assert_eq!(mutated.sale.total_cents, 2000);
    assert_eq!(mutated.product_lines.len(), 1);
    assert_eq!(stock_of(&db, "p-1").await, 8);
}

#[tokio::test]
async fn mutate_failure_rolls_back_stock_reversal() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00"))
        .await
        .expect("compose");

    let err = engine
        .mutate_sale(
            &aggregate.sale.id,
            MutateSaleRequest {
                product_lines: Some(vec![product_line("missing", 1, "5.00")]),
                ..Default::default()
            },
        )
        .await
        .expect_err("must fail");

    assert!(matches!(err, EngineError::NotFound { .. }));

    // Original state untouched, including the stock decrement.
    let unchanged = engine.get_sale(&aggregate.sale.id).await.expect("get");
    assert_eq!(unchanged.product_lines.len(), 1);
    assert_eq!(unchanged.product_lines[0].product_id, "p-1");
    assert_eq!(stock_of(&db, "p-1").await, 8);
}

#[tokio::test]
async fn cancelled_sale_refuses_mutation() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00"))
        .await
        .expect("compose");
    engine
        .change_status(&aggregate.sale.id, SaleStatus::Cancelled, false)
        .await
        .expect("cancel");

    let err = engine
        .mutate_sale(
            &aggregate.sale.id,
            MutateSaleRequest {
                notes: Some("too late".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect_err("must fail");

    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn partially_returned_sale_refuses_line_mutation() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 3, "10.00")], "30.00"))
        .await
        .expect("compose");
    engine
        .process_return(return_request(&aggregate.sale.id, "p-1", 1))
        .await
        .expect("partial return");
    assert_eq!(stock_of(&db, "p-1").await, 8);

    // Rewriting the lines would reverse all 3 units although one was
    // already restocked by the compensating sale.
    let err = engine
        .mutate_sale(
            &aggregate.sale.id,
            MutateSaleRequest {
                product_lines: Some(vec![product_line("p-1", 1, "10.00")]),
                ..Default::default()
            },
        )
        .await
        .expect_err("must fail");

    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::NotAllowed { .. })
    ));

    let unchanged = engine.get_sale(&aggregate.sale.id).await.expect("get");
    assert_eq!(unchanged.sale.status, SaleStatus::PartiallyReturned);
    assert_eq!(unchanged.product_lines[0].quantity, 3);
    assert_eq!(stock_of(&db, "p-1").await, 8);
}

#[tokio::test]
async fn customer_change_revalidates_service_line_pets() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_pet(&db, "pet-a", "c-1").await;
    seed_customer(&db, "c-2").await;
    seed_pet(&db, "pet-b", "c-2").await;
    seed_service(&db, "s-1", 2500).await;

    let mut request = cash_sale("c-1", vec![], "25.00");
    request.service_lines = vec![ServiceLineRequest {
        service_id: "s-1".to_string(),
        pet_id: None,
        temp_pet_name: None,
        temp_pet_species: None,
        quantity: 1,
        unit_price: "25.00".to_string(),
    }];
    let aggregate = engine.compose_sale(request).await.expect("compose");
    assert_eq!(aggregate.service_lines[0].pet_id, "pet-a");

    // A header-only customer change would leave the service line
    // pointing at the previous customer's pet.
    let err = engine
        .mutate_sale(
            &aggregate.sale.id,
            MutateSaleRequest {
                customer_id: Some("c-2".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect_err("must fail");

    assert!(matches!(
        err,
        EngineError::Core(CoreError::PetOwnershipMismatch { .. })
    ));

    let unchanged = engine.get_sale(&aggregate.sale.id).await.expect("get");
    assert_eq!(unchanged.sale.customer_id, "c-1");
}

// =============================================================================
// Returns and exchanges
// =============================================================================

#[tokio::test]
async fn full_return_reclassifies_origin_and_restores_stock() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 3, "10.00")], "30.00"))
        .await
        .expect("compose");
    assert_eq!(stock_of(&db, "p-1").await, 7);

    let compensating = engine
        .process_return(ProcessReturnRequest {
            origin_sale_id: aggregate.sale.id.clone(),
            user_id: "u-2".to_string(),
            reason: Some("defective".to_string()),
            prior_balance: None,
            returned_lines: vec![ReturnLineRequest {
                product_id: "p-1".to_string(),
                quantity: 3,
            }],
            exchange_lines: vec![],
        })
        .await
        .expect("process return");

    assert_eq!(compensating.sale.kind, SaleKind::Return);
    assert_eq!(
        compensating.sale.origin_sale_id.as_deref(),
        Some(aggregate.sale.id.as_str())
    );
    // Compensating totals recompute from its own (negative) lines.
    assert_eq!(compensating.sale.total_cents, -3000);
    assert_eq!(compensating.product_lines[0].quantity, -3);
    assert!(compensating.sale.notes.is_some());

    let origin = engine.get_sale(&aggregate.sale.id).await.expect("get");
    assert_eq!(origin.sale.status, SaleStatus::Returned);
    assert_eq!(stock_of(&db, "p-1").await, 10);
}

#[tokio::test]
async fn partial_return_marks_origin_partially_returned() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 3, "10.00")], "30.00"))
        .await
        .expect("compose");

    engine
        .process_return(ProcessReturnRequest {
            origin_sale_id: aggregate.sale.id.clone(),
            user_id: "u-2".to_string(),
            reason: None,
            prior_balance: None,
            returned_lines: vec![ReturnLineRequest {
                product_id: "p-1".to_string(),
                quantity: 1,
            }],
            exchange_lines: vec![],
        })
        .await
        .expect("process return");

    let origin = engine.get_sale(&aggregate.sale.id).await.expect("get");
    assert_eq!(origin.sale.status, SaleStatus::PartiallyReturned);
    assert_eq!(stock_of(&db, "p-1").await, 8);

    // A second return completing the quantity finishes the chain.
    engine
        .process_return(ProcessReturnRequest {
            origin_sale_id: aggregate.sale.id.clone(),
            user_id: "u-2".to_string(),
            reason: None,
            prior_balance: None,
            returned_lines: vec![ReturnLineRequest {
                product_id: "p-1".to_string(),
                quantity: 2,
            }],
            exchange_lines: vec![],
        })
        .await
        .expect("second return");

    let origin = engine.get_sale(&aggregate.sale.id).await.expect("get");
    assert_eq!(origin.sale.status, SaleStatus::Returned);
    assert_eq!(stock_of(&db, "p-1").await, 10);
}

#[tokio::test]
async fn over_return_is_rejected() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00"))
        .await
        .expect("compose");

    let err = engine
        .process_return(ProcessReturnRequest {
            origin_sale_id: aggregate.sale.id.clone(),
            user_id: "u-2".to_string(),
            reason: None,
            prior_balance: None,
            returned_lines: vec![ReturnLineRequest {
                product_id: "p-1".to_string(),
                quantity: 3,
            }],
            exchange_lines: vec![],
        })
        .await
        .expect_err("must fail");

    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::OutOfRange { .. })
    ));
    assert_eq!(stock_of(&db, "p-1").await, 8);
}

#[tokio::test]
async fn pure_exchange_leaves_origin_status_untouched() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;
    seed_product(&db, "p-2", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00"))
        .await
        .expect("compose");

    let compensating = engine
        .process_return(ProcessReturnRequest {
            origin_sale_id: aggregate.sale.id.clone(),
            user_id: "u-2".to_string(),
            reason: Some("swap".to_string()),
            prior_balance: None,
            returned_lines: vec![],
            exchange_lines: vec![product_line("p-2", 1, "10.00")],
        })
        .await
        .expect("process exchange");

    assert_eq!(compensating.sale.kind, SaleKind::Exchange);
    assert_eq!(compensating.sale.total_cents, 1000);
    assert_eq!(stock_of(&db, "p-2").await, 9);

    let origin = engine.get_sale(&aggregate.sale.id).await.expect("get");
    assert_eq!(origin.sale.status, SaleStatus::Effective);
}

#[tokio::test]
async fn return_against_cancelled_sale_is_rejected() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 2, "10.00")], "20.00"))
        .await
        .expect("compose");
    engine
        .change_status(&aggregate.sale.id, SaleStatus::Cancelled, false)
        .await
        .expect("cancel");

    let err = engine
        .process_return(ProcessReturnRequest {
            origin_sale_id: aggregate.sale.id.clone(),
            user_id: "u-2".to_string(),
            reason: None,
            prior_balance: None,
            returned_lines: vec![ReturnLineRequest {
                product_id: "p-1".to_string(),
                quantity: 1,
            }],
            exchange_lines: vec![],
        })
        .await
        .expect_err("must fail");

    assert!(matches!(
        err,
        EngineError::Core(CoreError::InvalidStatus { .. })
    ));
}

#[tokio::test]
async fn compensating_sale_refuses_status_change() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 3, "10.00")], "30.00"))
        .await
        .expect("compose");
    let compensating = engine
        .process_return(return_request(&aggregate.sale.id, "p-1", 1))
        .await
        .expect("return");
    assert_eq!(stock_of(&db, "p-1").await, 8);

    // Cancelling the compensating sale would keep its stock increment
    // while erasing the returned quantity from the origin's accounting.
    let err = engine
        .change_status(&compensating.sale.id, SaleStatus::Cancelled, false)
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::NotAllowed { .. })
    ));
    assert_eq!(stock_of(&db, "p-1").await, 8);

    // The returned unit still counts against the origin: only two of
    // the three sold remain returnable.
    let err = engine
        .process_return(return_request(&aggregate.sale.id, "p-1", 3))
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::OutOfRange { .. })
    ));
    assert_eq!(stock_of(&db, "p-1").await, 8);
}

#[tokio::test]
async fn list_compensations_links_returns_to_origin() {
    let (db, engine) = setup().await;
    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 3, "10.00")], "30.00"))
        .await
        .expect("compose");
    let compensating = engine
        .process_return(return_request(&aggregate.sale.id, "p-1", 1))
        .await
        .expect("return");

    let compensations = engine
        .list_compensations(&aggregate.sale.id)
        .await
        .expect("list compensations");

    assert_eq!(compensations.len(), 1);
    assert_eq!(compensations[0].id, compensating.sale.id);
    assert_eq!(compensations[0].kind, SaleKind::Return);
    assert_eq!(
        compensations[0].origin_sale_id.as_deref(),
        Some(aggregate.sale.id.as_str())
    );
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn record(&self, event: &str) {
        self.events.lock().expect("events lock").push(event.to_string());
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn sale_composed(&self, _aggregate: &SaleAggregate) -> Result<(), NotifyError> {
        self.record("composed");
        Ok(())
    }

    async fn sale_mutated(&self, _aggregate: &SaleAggregate) -> Result<(), NotifyError> {
        self.record("mutated");
        Ok(())
    }

    async fn sale_status_changed(
        &self,
        _sale_id: &str,
        _from: SaleStatus,
        _to: SaleStatus,
    ) -> Result<(), NotifyError> {
        self.record("status_changed");
        Ok(())
    }

    async fn return_processed(
        &self,
        _origin_sale_id: &str,
        _compensating: &SaleAggregate,
    ) -> Result<(), NotifyError> {
        self.record("return_processed");
        Ok(())
    }
}

#[tokio::test]
async fn mutation_notifies_listeners_as_mutation() {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database");
    let recorder = Arc::new(RecordingNotifier::default());
    let engine = SaleEngine::with_notifier(db.pool().clone(), recorder.clone());

    seed_customer(&db, "c-1").await;
    seed_product(&db, "p-1", 10, 1000).await;

    let aggregate = engine
        .compose_sale(cash_sale("c-1", vec![product_line("p-1", 1, "10.00")], "10.00"))
        .await
        .expect("compose");
    engine
        .mutate_sale(
            &aggregate.sale.id,
            MutateSaleRequest {
                notes: Some("corrected".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("mutate");

    let events = recorder.events.lock().expect("events lock").clone();
    assert_eq!(
        events,
        vec!["composed".to_string(), "mutated".to_string()]
    );
}
