//! Shop Example
//!
//! A small order workflow routed through Middleman:
//!
//! ```text
//! PlaceOrder ──send──► PlaceOrderHandler ──notify──► OrderPlaced
//!                                                     ├── SendReceiptHandler     (order 500)
//!                                                     └── UpdateInventoryHandler (default order)
//! GetUserQuery ──query──► GetUserQueryHandler ──► UserDto
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package shop -- --config demos/shop/middleman.toml
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use clap::Parser;
use middleman::core::HandlerError;
use middleman::prelude::*;
use parking_lot::Mutex;

#[derive(Parser, Debug)]
#[command(version, about = "Routes a few orders through Middleman")]
struct Args {
    /// Configuration file to load instead of ./middleman.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. "production"
    #[arg(short, long)]
    profile: Option<String>,

    /// Number of orders to place
    #[arg(short, long, default_value_t = 3)]
    orders: u64,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Command, Debug)]
struct PlaceOrder {
    user_id: u64,
    sku: u32,
}

#[derive(Event, Debug, Clone)]
struct OrderPlaced {
    order_id: u64,
    user_id: u64,
    sku: u32,
}

#[derive(Debug, Clone)]
struct UserDto {
    id: u64,
    name: String,
}

#[derive(Query, Debug, Default)]
#[query(result = UserDto)]
struct GetUserQuery {
    id: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// The router, for handlers that dispatch further messages.
///
/// Handlers are created by the provider the router is built over, so the
/// handle is filled in once the router exists and holds it weakly.
#[derive(Clone, Default)]
struct RouterHandle(Arc<OnceLock<WeakMiddleman>>);

impl RouterHandle {
    fn set(&self, middleman: &Middleman) {
        let _ = self.0.set(middleman.downgrade());
    }

    fn get(&self) -> Result<Middleman, HandlerError> {
        self.0
            .get()
            .and_then(WeakMiddleman::upgrade)
            .ok_or_else(|| "router is not available".into())
    }
}

/// Places an order and announces it to every `OrderPlaced` handler.
struct PlaceOrderHandler {
    router: RouterHandle,
    next_id: Arc<AtomicU64>,
}

#[async_trait]
impl CommandHandler<PlaceOrder> for PlaceOrderHandler {
    async fn handle(&self, command: &PlaceOrder, cancel: &CancellationToken) -> HandlerResult {
        let order_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        info!(order_id, sku = command.sku, "Order placed");

        let event = OrderPlaced {
            order_id,
            user_id: command.user_id,
            sku: command.sku,
        };
        self.router.get()?.notify(&event, cancel).await?;
        Ok(())
    }
}

#[derive(HandlerOrder)]
#[order(500)]
struct SendReceiptHandler {
    router: RouterHandle,
}

#[async_trait]
impl EventHandler<OrderPlaced> for SendReceiptHandler {
    async fn handle(&self, event: &OrderPlaced, cancel: &CancellationToken) -> HandlerResult {
        let user = self
            .router
            .get()?
            .query(&GetUserQuery { id: event.user_id }, cancel)
            .await?;
        info!(order_id = event.order_id, to = %user.name, "Receipt sent");
        Ok(())
    }
}

#[derive(HandlerOrder)]
struct UpdateInventoryHandler {
    stock: Arc<Mutex<HashMap<u32, u32>>>,
}

#[async_trait]
impl EventHandler<OrderPlaced> for UpdateInventoryHandler {
    async fn handle(&self, event: &OrderPlaced, _cancel: &CancellationToken) -> HandlerResult {
        let mut stock = self.stock.lock();
        let left = stock.entry(event.sku).or_insert(0);
        if *left == 0 {
            return Err(format!("sku {} is out of stock", event.sku).into());
        }
        *left -= 1;
        info!(sku = event.sku, left = *left, "Inventory updated");
        Ok(())
    }
}

struct GetUserQueryHandler;

#[async_trait]
impl QueryHandler<GetUserQuery> for GetUserQueryHandler {
    async fn handle(&self, query: &GetUserQuery, _cancel: &CancellationToken) -> HandlerResult<UserDto> {
        Ok(UserDto {
            id: query.id,
            name: format!("customer-{}", query.id),
        })
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = MiddlemanRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    let router = RouterHandle::default();
    let stock = Arc::new(Mutex::new(HashMap::from([(7, 2), (9, 1)])));
    let next_id = Arc::new(AtomicU64::new(0));

    let mut services = ServiceCollection::new();
    let (for_orders, for_receipts) = (router.clone(), router.clone());
    services
        .add_command_handler::<PlaceOrder, _>(Lifetime::Scoped, move || PlaceOrderHandler {
            router: for_orders.clone(),
            next_id: next_id.clone(),
        })
        .add_event_handler::<OrderPlaced, _>(Lifetime::Scoped, move || SendReceiptHandler {
            router: for_receipts.clone(),
        })
        .add_event_handler::<OrderPlaced, _>(Lifetime::Singleton, move || {
            UpdateInventoryHandler {
                stock: stock.clone(),
            }
        })
        .add_query_handler::<GetUserQuery, _>(Lifetime::Singleton, || GetUserQueryHandler);

    let middleman = runtime.build(services);
    router.set(&middleman);

    let cancel = CancellationToken::new();
    for n in 0..args.orders {
        let sku = if n % 2 == 0 { 7 } else { 9 };
        if let Err(e) = middleman.send(&PlaceOrder { user_id: n + 1, sku }, &cancel).await {
            warn!(sku, error = %e, "Order failed");
        }
    }

    let user = middleman
        .query_with(|q: &mut GetUserQuery| q.id = 1, &cancel)
        .await?;
    info!(id = user.id, name = %user.name, "Looked up user");

    // Routed by runtime type only.
    let restock = AnyMessage::new(OrderPlaced {
        order_id: 0,
        user_id: 1,
        sku: 7,
    });
    if let Err(e) = middleman.notify_dynamic(Some(restock), &cancel).await {
        warn!(error = %e, "Dynamic notification failed");
    }

    Ok(())
}
