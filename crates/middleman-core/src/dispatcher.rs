//! Event fan-out for a single event type.
//!
//! An [`EventDispatcher`] is created per notify call from the handlers the
//! lookup scope returns. When an event is dispatched:
//!
//! 1. Each handler's order is resolved through the shared [`HandlerOrderResolver`]
//! 2. Handlers are stable-sorted by ascending order; ties keep lookup order
//! 3. Handlers run one at a time, each awaited before the next starts
//! 4. The first failure stops dispatch and is returned unchanged
//!
//! [`EventDispatcher::plan`] exposes the resolved sequence without running it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, trace};

use crate::error::{MiddlemanError, MiddlemanResult};
use crate::handler::EventHandler;
use crate::lookup::{Resolved, ServiceScope};
use crate::message::{Event, TypeInfo};
use crate::order::HandlerOrderResolver;

/// One entry of a dispatch plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedHandler {
    /// Concrete handler type.
    pub implementation: TypeInfo,
    /// Its effective order.
    pub order: i32,
}

/// Dispatches events of type `E` to their handlers in order.
pub struct EventDispatcher<E: Event> {
    handlers: Vec<Resolved<dyn EventHandler<E>>>,
    resolver: Arc<HandlerOrderResolver>,
}

impl<E: Event> EventDispatcher<E> {
    /// Creates a dispatcher over `handlers`, given in lookup order.
    pub fn new(
        handlers: Vec<Resolved<dyn EventHandler<E>>>,
        resolver: Arc<HandlerOrderResolver>,
    ) -> Self {
        Self { handlers, resolver }
    }

    /// Creates a dispatcher over every `E` handler registered in `scope`.
    pub fn from_scope(scope: &dyn ServiceScope, resolver: Arc<HandlerOrderResolver>) -> Self {
        Self::new(scope.get_all::<dyn EventHandler<E>>(), resolver)
    }

    /// Returns the number of handlers this dispatcher fans out to.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn ordered(&self) -> Vec<(i32, &Resolved<dyn EventHandler<E>>)> {
        let mut ordered: Vec<_> = self
            .handlers
            .iter()
            .map(|handler| (self.resolver.order_of(&handler.implementation), handler))
            .collect();
        // `sort_by_key` is stable, which keeps lookup order among equal orders.
        ordered.sort_by_key(|(order, _)| *order);
        ordered
    }

    /// Returns the handlers in the order [`dispatch`](Self::dispatch) invokes them.
    pub fn plan(&self) -> Vec<PlannedHandler> {
        self.ordered()
            .into_iter()
            .map(|(order, handler)| PlannedHandler {
                implementation: handler.implementation,
                order,
            })
            .collect()
    }

    /// Invokes every handler with `event`, sequentially, in order.
    ///
    /// Stops at the first handler failure and returns it; the remaining
    /// handlers are not invoked.
    pub async fn dispatch(&self, event: &E, cancel: &CancellationToken) -> MiddlemanResult<()> {
        let ordered = self.ordered();
        debug!(
            event = std::any::type_name::<E>(),
            handlers = ordered.len(),
            "Dispatching event"
        );

        for (position, (order, handler)) in ordered.into_iter().enumerate() {
            let name = handler.implementation.name();
            let span = debug_span!("handler", handler = name, order, position);
            trace!(handler = name, order, "Executing event handler");

            if let Err(err) = handler.instance.handle(event, cancel).instrument(span).await {
                debug!(handler = name, order, "Event handler failed, halting dispatch");
                return Err(MiddlemanError::Handler(err));
            }
        }

        Ok(())
    }
}

impl<E: Event> std::fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("event", &std::any::type_name::<E>())
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Cancelled, HandlerResult};
    use crate::order::OrderMetadata;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct OrderPlaced;

    impl Event for OrderPlaced {}

    #[derive(Debug, thiserror::Error)]
    #[error("handler {0} failed")]
    struct Boom(usize);

    type Log = Arc<Mutex<Vec<usize>>>;

    /// Each `N` is a distinct handler type.
    struct Recording<const N: usize> {
        log: Log,
        fail: bool,
    }

    #[async_trait]
    impl<const N: usize> EventHandler<OrderPlaced> for Recording<N> {
        async fn handle(&self, _event: &OrderPlaced, cancel: &CancellationToken) -> HandlerResult {
            if cancel.is_cancelled() {
                return Err(Cancelled.into());
            }
            self.log.lock().push(N);
            if self.fail {
                return Err(Boom(N).into());
            }
            Ok(())
        }
    }

    fn handler<const N: usize>(log: &Log, fail: bool) -> Resolved<dyn EventHandler<OrderPlaced>> {
        Resolved {
            implementation: TypeInfo::of::<Recording<N>>(),
            instance: Arc::new(Recording::<N> {
                log: Arc::clone(log),
                fail,
            }),
        }
    }

    fn resolver(orders: &[(TypeInfo, i32)]) -> Arc<HandlerOrderResolver> {
        let mut metadata = OrderMetadata::new();
        for (handler, order) in orders {
            metadata.declare(handler.id(), *order);
        }
        Arc::new(HandlerOrderResolver::new(Arc::new(metadata)))
    }

    #[tokio::test]
    async fn runs_in_ascending_order() {
        let log = Log::default();
        let dispatcher = EventDispatcher::new(
            vec![handler::<1>(&log, false), handler::<2>(&log, false), handler::<3>(&log, false)],
            resolver(&[
                (TypeInfo::of::<Recording<1>>(), 30),
                (TypeInfo::of::<Recording<2>>(), 10),
                (TypeInfo::of::<Recording<3>>(), 20),
            ]),
        );

        dispatcher.dispatch(&OrderPlaced, &CancellationToken::new()).await.unwrap();
        assert_eq!(*log.lock(), [2, 3, 1]);
    }

    #[tokio::test]
    async fn equal_orders_keep_lookup_order() {
        let log = Log::default();
        let dispatcher = EventDispatcher::new(
            vec![handler::<4>(&log, false), handler::<1>(&log, false), handler::<2>(&log, false)],
            resolver(&[(TypeInfo::of::<Recording<2>>(), 1000)]),
        );

        dispatcher.dispatch(&OrderPlaced, &CancellationToken::new()).await.unwrap();
        assert_eq!(*log.lock(), [4, 1, 2]);
    }

    #[tokio::test]
    async fn failure_halts_fan_out() {
        let log = Log::default();
        let dispatcher = EventDispatcher::new(
            vec![handler::<1>(&log, false), handler::<2>(&log, true), handler::<3>(&log, false)],
            Arc::default(),
        );

        let err = dispatcher
            .dispatch(&OrderPlaced, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.downcast_handler_ref::<Boom>().map(|b| b.0), Some(2));
        assert_eq!(*log.lock(), [1, 2]);
    }

    #[tokio::test]
    async fn no_handlers_is_a_no_op() {
        let dispatcher = EventDispatcher::<OrderPlaced>::new(Vec::new(), Arc::default());
        assert_eq!(dispatcher.handler_count(), 0);
        assert!(dispatcher.plan().is_empty());
        dispatcher.dispatch(&OrderPlaced, &CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_propagates_from_first_handler() {
        let log = Log::default();
        let dispatcher = EventDispatcher::new(
            vec![handler::<1>(&log, false), handler::<2>(&log, false)],
            Arc::default(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = dispatcher.dispatch(&OrderPlaced, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn plan_reports_identity_and_order() {
        let log = Log::default();
        let dispatcher = EventDispatcher::new(
            vec![handler::<1>(&log, false), handler::<2>(&log, false)],
            resolver(&[(TypeInfo::of::<Recording<2>>(), 500)]),
        );

        assert_eq!(
            dispatcher.plan(),
            [
                PlannedHandler {
                    implementation: TypeInfo::of::<Recording<2>>(),
                    order: 500,
                },
                PlannedHandler {
                    implementation: TypeInfo::of::<Recording<1>>(),
                    order: 1000,
                },
            ]
        );
        assert!(log.lock().is_empty());
    }
}
