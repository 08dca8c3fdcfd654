//! Seeds a local database with demo catalog data and composes one
//! sample sale.
//!
//! ```text
//! cargo run --bin seed -- [path/to/patitas.db]
//! ```

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use patitas_core::{Customer, Pet, Product, ServiceItem};
use patitas_db::{
    ComposeSaleRequest, Database, DbConfig, ProductLineRequest, SaleEngine, ServiceLineRequest,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "patitas.db".to_string());

    let db = Database::new(DbConfig::new(&path)).await?;
    info!(path = %path, "Database ready");

    let now = Utc::now();

    let customer = Customer {
        id: Uuid::new_v4().to_string(),
        name: "Lucia Fernandez".to_string(),
        document_number: "10203040".to_string(),
        created_at: now,
    };
    db.customers().insert(&customer).await?;

    let pet = Pet {
        id: Uuid::new_v4().to_string(),
        customer_id: customer.id.clone(),
        name: "Rocky".to_string(),
        species: "dog".to_string(),
        active: true,
        created_at: now,
    };
    db.customers().insert_pet(&pet).await?;

    let food = Product {
        id: Uuid::new_v4().to_string(),
        name: "Dog food 15kg".to_string(),
        category: Some("food".to_string()),
        stock: 40,
        tax_applicable: true,
        tax_rate_bps: 1900,
        price_cents: 89_900,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&food).await?;

    let shampoo = Product {
        id: Uuid::new_v4().to_string(),
        name: "Hypoallergenic shampoo".to_string(),
        category: Some("grooming".to_string()),
        stock: 25,
        tax_applicable: false,
        tax_rate_bps: 0,
        price_cents: 24_500,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&shampoo).await?;

    let bath = ServiceItem {
        id: Uuid::new_v4().to_string(),
        name: "Full bath".to_string(),
        price_cents: 35_000,
        is_active: true,
        created_at: now,
    };
    db.services().insert(&bath).await?;

    info!("Catalog seeded, composing a sample sale");

    let engine = SaleEngine::new(db.pool().clone());
    let aggregate = engine
        .compose_sale(ComposeSaleRequest {
            customer_id: Some(customer.id.clone()),
            user_id: "seed".to_string(),
            payment_method: "cash".to_string(),
            status: None,
            tendered: Some("1500.00".to_string()),
            payment_reference: None,
            notes: Some("seed data".to_string()),
            receipt_attachment: None,
            sold_at: None,
            product_lines: vec![ProductLineRequest {
                product_id: food.id.clone(),
                quantity: 1,
                unit_price: "899.00".to_string(),
            }],
            service_lines: vec![ServiceLineRequest {
                service_id: bath.id.clone(),
                pet_id: Some(pet.id.clone()),
                temp_pet_name: None,
                temp_pet_species: None,
                quantity: 1,
                unit_price: "350.00".to_string(),
            }],
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&aggregate)?);

    db.close().await;
    Ok(())
}
