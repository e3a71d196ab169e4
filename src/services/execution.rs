//! Order execution interface and the bundled paper executor.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::error::ExecutionError;
use crate::models::market::{OrderResult, OrderSide};

#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Place one order. Only called after the protection gate admitted it.
    async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<OrderResult, ExecutionError>;
}

/// Dry-run executor: every valid order is reported as placed, with no fill price.
#[derive(Debug, Default)]
pub struct PaperOrderExecutor {
    sequence: AtomicU64,
}

impl PaperOrderExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders_placed(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl OrderExecutor for PaperOrderExecutor {
    async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<OrderResult, ExecutionError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ExecutionError::InvalidOrder(format!(
                "quantity {} for {}",
                quantity, symbol
            )));
        }

        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let result = OrderResult {
            order_id: format!("paper-{}", id),
            symbol: symbol.to_string(),
            side,
            quantity,
            price: None,
            placed_at: Utc::now(),
        };

        info!(
            order_id = %result.order_id,
            symbol = %symbol,
            side = %side,
            quantity = quantity,
            "PaperOrderExecutor: placed"
        );
        Ok(result)
    }
}
