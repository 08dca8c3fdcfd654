//! # Stock Ledger
//!
//! The only sanctioned path to mutate `products.stock` from sale-related
//! code. Nothing else in a sale transaction may write stock directly, so
//! the non-negativity invariant is enforced in exactly one place.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Adjustment Strategy                            │
//! │                                                                         │
//! │  ❌ WRONG: compute from a snapshot read earlier in the transaction     │
//! │     stock = 7 (read) ... UPDATE products SET stock = 4                 │
//! │     (a concurrent sale between read and write goes negative)           │
//! │                                                                         │
//! │  ✅ CORRECT: guarded delta update, re-checked at the write itself      │
//! │     UPDATE products SET stock = stock - ?  WHERE id = ? AND stock >= ? │
//! │     rows_affected == 0  →  InsufficientStock                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger runs on the caller's transaction connection; the caller
//! decides whether a failure rolls the whole operation back (it always
//! does, in the sale engine).

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, EngineError, EngineResult};
use patitas_core::CoreError;

/// Direction of a stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDirection {
    /// Sale-driven consumption. Fails with `InsufficientStock` if the
    /// product would go negative.
    Decrement,
    /// Reversal or goods-in. Unconditional, no upper bound.
    Increment,
}

/// The stock ledger operation.
pub struct StockLedger;

impl StockLedger {
    /// Atomically adjusts a single product's on-hand quantity inside
    /// the caller's transaction. `quantity` must be positive; the
    /// direction carries the sign.
    ///
    /// Returns the stock level after the adjustment.
    pub async fn adjust(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
        direction: StockDirection,
    ) -> EngineResult<i64> {
        debug_assert!(quantity > 0, "ledger quantities are positive; direction carries sign");

        let current: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(DbError::from)?;

        let current = match current {
            Some(stock) => stock,
            None => return Err(EngineError::not_found("Product", product_id)),
        };

        let now = Utc::now();

        match direction {
            StockDirection::Decrement => {
                // Guarded write: the stock predicate re-checks at the
                // UPDATE itself rather than trusting the earlier read.
                let result = sqlx::query(
                    r#"
                    UPDATE products
                    SET stock = stock - ?2, updated_at = ?3
                    WHERE id = ?1 AND stock >= ?2
                    "#,
                )
                .bind(product_id)
                .bind(quantity)
                .bind(now)
                .execute(&mut *conn)
                .await
                .map_err(DbError::from)?;

                if result.rows_affected() == 0 {
                    return Err(CoreError::InsufficientStock {
                        product_id: product_id.to_string(),
                        available: current,
                        requested: quantity,
                    }
                    .into());
                }

                debug!(product_id = %product_id, quantity, "Stock decremented");
                Ok(current - quantity)
            }

            StockDirection::Increment => {
                sqlx::query(
                    r#"
                    UPDATE products
                    SET stock = stock + ?2, updated_at = ?3
                    WHERE id = ?1
                    "#,
                )
                .bind(product_id)
                .bind(quantity)
                .bind(now)
                .execute(&mut *conn)
                .await
                .map_err(DbError::from)?;

                debug!(product_id = %product_id, quantity, "Stock incremented");
                Ok(current + quantity)
            }
        }
    }
}
