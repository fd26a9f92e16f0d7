//! Integration tests for the full order pipeline.
//!
//! Tests: Cart → Reservations → EventStore → EventBus → Order history
//!
//! Verifies:
//! - Stock is never oversold under concurrent checkouts
//! - Failed checkouts leave stock and carts untouched
//! - Cancellation and deletion hand stock back exactly once

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use proptest::prelude::*;
    use storefront_core::{AggregateId, DomainError, ErrorKind, ExpectedVersion, Money, ProductId, UserId};
    use storefront_orders::{OrderNumber, OrderStatus};

    use crate::config::StorefrontConfig;
    use crate::event_store::{
        EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent,
    };
    use crate::storefront::Storefront;

    /// Event store whose appends always fail.
    #[derive(Debug, Default)]
    struct UnavailableEventStore {
        inner: InMemoryEventStore,
    }

    impl EventStore for UnavailableEventStore {
        fn append(
            &self,
            _events: Vec<UncommittedEvent>,
            _expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            Err(EventStoreError::Unavailable("disk full".to_string()))
        }

        fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(aggregate_id)
        }
    }

    fn setup() -> Storefront {
        Storefront::in_memory(StorefrontConfig::default())
    }

    fn test_product(shop: &Storefront<impl EventStore>, price: u64, stock: u64) -> ProductId {
        let id = ProductId::new();
        shop.add_product(id, "Espresso beans 1kg", Money::from_minor(price), stock)
            .unwrap();
        id
    }

    #[test]
    fn last_unit_goes_to_exactly_one_of_two_concurrent_checkouts() {
        let shop = Arc::new(setup());
        let product = test_product(&*shop, 2_000, 1);
        let users = [UserId::new(), UserId::new()];
        for user in users {
            shop.add_to_cart(user, product, 1).unwrap();
        }

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = users
            .into_iter()
            .map(|user| {
                let shop = shop.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    (user, shop.create_order(user))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners: Vec<_> = results.iter().filter(|(_, r)| r.is_ok()).collect();
        assert_eq!(winners.len(), 1);

        let (loser, outcome) = results.iter().find(|(_, r)| r.is_err()).unwrap();
        match outcome {
            Err(DomainError::InsufficientStock { product_id, requested: 1, available: 0 })
                if *product_id == product => {}
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(shop.ledger().get_available(product).unwrap(), 0);
        assert_eq!(shop.ledger().level(product).unwrap().unwrap().reserved(), 0);
        // The loser keeps their cart.
        assert_eq!(shop.carts().get_cart(*loser).unwrap().items().len(), 1);
        assert!(shop.carts().get_cart(winners[0].0).unwrap().is_empty());
    }

    #[test]
    fn persistence_failure_releases_every_reservation() {
        let shop = Storefront::with_event_store(
            StorefrontConfig::default(),
            UnavailableEventStore::default(),
        );
        let sub = shop.subscribe();
        let user = UserId::new();
        let products: Vec<_> = (0..3).map(|_| test_product(&shop, 500, 5)).collect();
        for (i, product) in products.iter().enumerate() {
            shop.add_to_cart(user, *product, i as u32 + 1).unwrap();
        }

        let err = shop.create_order(user).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
        for product in &products {
            let level = shop.ledger().level(*product).unwrap().unwrap();
            assert_eq!(level.available(), 5);
            assert_eq!(level.reserved(), 0);
        }
        assert_eq!(shop.carts().get_cart(user).unwrap().items().len(), 3);
        assert!(shop.orders().list_orders(user).unwrap().is_empty());
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn insufficient_stock_on_a_later_line_releases_earlier_ones() {
        let shop = setup();
        let user = UserId::new();
        let plenty = test_product(&shop, 100, 10);
        let scarce = test_product(&shop, 100, 1);
        shop.add_to_cart(user, plenty, 4).unwrap();
        shop.add_to_cart(user, scarce, 2).unwrap();

        let err = shop.create_order(user).unwrap_err();

        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product_id: scarce,
                requested: 2,
                available: 1
            }
        );
        assert_eq!(shop.ledger().get_available(plenty).unwrap(), 10);
        assert_eq!(shop.ledger().get_available(scarce).unwrap(), 1);
        assert_eq!(shop.carts().get_cart(user).unwrap().items().len(), 2);
    }

    #[test]
    fn merged_cart_line_becomes_one_order_line() {
        let shop = setup();
        let user = UserId::new();
        let product = test_product(&shop, 350, 10);

        shop.add_to_cart(user, product, 2).unwrap();
        shop.add_to_cart(user, product, 3).unwrap();
        let order = shop.create_order(user).unwrap();

        assert_eq!(order.items().len(), 1);
        assert_eq!(order.items()[0].quantity, 5);
        assert_eq!(order.total().unwrap(), Money::from_minor(1_750));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(shop.ledger().get_available(product).unwrap(), 5);
        assert!(shop.carts().get_cart(user).unwrap().is_empty());
    }

    #[test]
    fn order_keeps_the_cart_price_snapshot() {
        let shop = setup();
        let user = UserId::new();
        let product = test_product(&shop, 500, 3);
        shop.add_to_cart(user, product, 1).unwrap();

        shop.catalog().set_price(product, Money::from_minor(900)).unwrap();
        let order = shop.create_order(user).unwrap();

        assert_eq!(order.items()[0].unit_price, Money::from_minor(500));
    }

    #[test]
    fn empty_cart_checkout_leaves_the_ledger_untouched() {
        let shop = setup();
        let sub = shop.subscribe();
        let user = UserId::new();
        let product = test_product(&shop, 100, 7);

        let err = shop.create_order(user).unwrap_err();

        assert_eq!(err, DomainError::EmptyCart);
        let level = shop.ledger().level(product).unwrap().unwrap();
        assert_eq!(level.available(), 7);
        assert_eq!(level.reserved(), 0);
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn cancelling_a_confirmed_order_restores_stock() {
        let shop = setup();
        let user = UserId::new();
        let product = test_product(&shop, 100, 10);
        shop.add_to_cart(user, product, 3).unwrap();
        let order = shop.create_order(user).unwrap();
        let order_id = order.id_typed();

        shop.update_status(order_id, OrderStatus::Confirmed).unwrap();
        assert_eq!(shop.ledger().get_available(product).unwrap(), 7);

        let cancelled = shop.update_status(order_id, OrderStatus::Cancelled).unwrap();

        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert_eq!(shop.ledger().get_available(product).unwrap(), 10);
    }

    #[test]
    fn cancelling_a_shipped_order_is_rejected_and_stock_is_unchanged() {
        let shop = setup();
        let user = UserId::new();
        let product = test_product(&shop, 100, 10);
        shop.add_to_cart(user, product, 3).unwrap();
        let order_id = shop.create_order(user).unwrap().id_typed();
        shop.update_status(order_id, OrderStatus::Confirmed).unwrap();
        shop.update_status(order_id, OrderStatus::Shipped).unwrap();

        let err = shop.update_status(order_id, OrderStatus::Cancelled).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
        assert_eq!(shop.ledger().get_available(product).unwrap(), 7);
        assert_eq!(
            shop.orders().get_order(order_id).unwrap().status(),
            OrderStatus::Shipped
        );
    }

    #[test]
    fn racing_cancellations_restore_stock_once() {
        let shop = Arc::new(setup());
        let user = UserId::new();
        let product = test_product(&*shop, 100, 10);
        shop.add_to_cart(user, product, 4).unwrap();
        let order_id = shop.create_order(user).unwrap().id_typed();

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shop = shop.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    shop.update_status(order_id, OrderStatus::Cancelled)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
        }
        assert_eq!(shop.ledger().get_available(product).unwrap(), 10);
    }

    #[test]
    fn history_keeps_up_with_back_to_back_transitions_from_two_threads() {
        const ORDERS: usize = 100;

        let shop = Arc::new(setup());
        let user = UserId::new();
        let product = test_product(&*shop, 100, ORDERS as u64);
        let order_ids: Arc<Vec<_>> = Arc::new(
            (0..ORDERS)
                .map(|_| {
                    shop.add_to_cart(user, product, 1).unwrap();
                    shop.create_order(user).unwrap().id_typed()
                })
                .collect(),
        );

        let confirmer = {
            let shop = shop.clone();
            let order_ids = order_ids.clone();
            thread::spawn(move || {
                for order_id in order_ids.iter() {
                    shop.update_status(*order_id, OrderStatus::Confirmed).unwrap();
                }
            })
        };
        let shipper = {
            let shop = shop.clone();
            let order_ids = order_ids.clone();
            thread::spawn(move || {
                for order_id in order_ids.iter() {
                    // Ship as soon as the confirmation is visible in the event store.
                    while shop.orders().get_order(*order_id).unwrap().status() != OrderStatus::Confirmed {
                        thread::yield_now();
                    }
                    shop.update_status(*order_id, OrderStatus::Shipped).unwrap();
                }
            })
        };
        confirmer.join().unwrap();
        shipper.join().unwrap();

        let history = shop.orders().list_orders(user).unwrap();
        assert_eq!(history.len(), ORDERS);
        for row in &history {
            assert_eq!(row.status, OrderStatus::Shipped, "stale row for {}", row.order_id);
            assert_eq!(row.status, shop.orders().get_order(row.order_id).unwrap().status());
        }
    }

    #[test]
    fn deleting_a_pending_order_restores_stock_and_hides_it() {
        let shop = setup();
        let user = UserId::new();
        let product = test_product(&shop, 100, 5);
        shop.add_to_cart(user, product, 2).unwrap();
        let order = shop.create_order(user).unwrap();
        let number = order.order_number().cloned().unwrap();

        shop.delete_order(order.id_typed()).unwrap();

        assert_eq!(shop.ledger().get_available(product).unwrap(), 5);
        assert_eq!(
            shop.orders().get_order(order.id_typed()).unwrap_err(),
            DomainError::OrderNotFound(order.id_typed())
        );
        assert!(shop.orders().find_by_number(&number).unwrap().is_none());
        assert!(shop.orders().list_orders(user).unwrap().is_empty());
    }

    #[test]
    fn order_lines_keep_cart_order() {
        let shop = setup();
        let user = UserId::new();
        let mut products = [test_product(&shop, 100, 5), test_product(&shop, 250, 5)];
        // Highest id first, against the ascending reservation order.
        products.sort();
        products.reverse();
        for product in products {
            shop.add_to_cart(user, product, 1).unwrap();
        }

        let order = shop.create_order(user).unwrap();

        let placed: Vec<_> = order.items().iter().map(|item| item.product_id).collect();
        assert_eq!(placed, products);
        let stored: Vec<_> = shop
            .orders()
            .get_order(order.id_typed())
            .unwrap()
            .items()
            .iter()
            .map(|item| item.product_id)
            .collect();
        assert_eq!(stored, products);
        let history = shop.orders().list_orders(user).unwrap();
        let projected: Vec<_> = history[0].items.iter().map(|item| item.product_id).collect();
        assert_eq!(projected, products);
    }

    #[test]
    fn deleting_a_cancelled_order_does_not_restore_twice() {
        let shop = setup();
        let user = UserId::new();
        let product = test_product(&shop, 100, 5);
        shop.add_to_cart(user, product, 2).unwrap();
        let order_id = shop.create_order(user).unwrap().id_typed();

        shop.update_status(order_id, OrderStatus::Cancelled).unwrap();
        shop.delete_order(order_id).unwrap();

        assert_eq!(shop.ledger().get_available(product).unwrap(), 5);
    }

    #[test]
    fn delivered_orders_cannot_be_deleted() {
        let shop = setup();
        let user = UserId::new();
        let product = test_product(&shop, 100, 5);
        shop.add_to_cart(user, product, 1).unwrap();
        let order_id = shop.create_order(user).unwrap().id_typed();
        for status in [OrderStatus::Confirmed, OrderStatus::Shipped, OrderStatus::Delivered] {
            shop.update_status(order_id, status).unwrap();
        }

        let err = shop.delete_order(order_id).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
        assert_eq!(shop.ledger().get_available(product).unwrap(), 4);
        assert!(shop.orders().get_order(order_id).is_ok());
    }

    #[test]
    fn archived_products_block_checkout_and_keep_the_cart() {
        let shop = setup();
        let user = UserId::new();
        let product = test_product(&shop, 100, 5);
        shop.add_to_cart(user, product, 1).unwrap();

        shop.archive_product(product).unwrap();
        let err = shop.create_order(user).unwrap_err();

        assert_eq!(err, DomainError::ProductUnavailable(product));
        assert_eq!(shop.ledger().get_available(product).unwrap(), 5);
        assert_eq!(shop.carts().get_cart(user).unwrap().items().len(), 1);
    }

    #[test]
    fn lifecycle_events_are_published_and_history_follows() {
        let shop = setup();
        let sub = shop.subscribe();
        let user = UserId::new();
        let product = test_product(&shop, 100, 5);
        shop.add_to_cart(user, product, 1).unwrap();

        let order = shop.create_order(user).unwrap();
        shop.update_status(order.id_typed(), OrderStatus::Confirmed).unwrap();

        let types: Vec<_> = sub
            .drain()
            .into_iter()
            .map(|env| env.event_type().to_string())
            .collect();
        assert_eq!(types, vec!["orders.order.placed", "orders.order.status_changed"]);

        let history = shop.orders().list_orders(user).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, OrderStatus::Confirmed);

        let number = order.order_number().cloned().unwrap();
        let found = shop.orders().find_by_number(&number).unwrap().unwrap();
        assert_eq!(found.id_typed(), order.id_typed());
        assert!(
            shop.orders()
                .find_by_number(&OrderNumber::new("ORD-99999999").unwrap())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn a_thousand_concurrent_checkouts_get_unique_order_numbers() {
        const THREADS: usize = 50;
        const ORDERS_PER_THREAD: usize = 20;

        let shop = Arc::new(setup());
        let product = test_product(&*shop, 100, (THREADS * ORDERS_PER_THREAD) as u64);
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let shop = shop.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let users: Vec<_> = (0..ORDERS_PER_THREAD).map(|_| UserId::new()).collect();
                    for user in &users {
                        shop.add_to_cart(*user, product, 1).unwrap();
                    }
                    barrier.wait();
                    users
                        .into_iter()
                        .map(|user| {
                            shop.create_order(user)
                                .unwrap()
                                .order_number()
                                .cloned()
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let numbers: Vec<_> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let unique: HashSet<_> = numbers.iter().cloned().collect();

        assert_eq!(numbers.len(), THREADS * ORDERS_PER_THREAD);
        assert_eq!(unique.len(), numbers.len());
        assert_eq!(shop.ledger().get_available(product).unwrap(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 32, ..ProptestConfig::default() })]

        /// Property: concurrent checkouts never sell more than the stock on hand,
        /// and every unit is either sold or still available.
        #[test]
        fn concurrent_checkouts_never_oversell(
            stock in 0u64..40,
            wants in prop::collection::vec(1u32..6, 1..16),
        ) {
            let shop = Arc::new(setup());
            let product = test_product(&*shop, 100, stock);
            let barrier = Arc::new(Barrier::new(wants.len()));

            let handles: Vec<_> = wants
                .iter()
                .map(|&qty| {
                    let shop = shop.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        let user = UserId::new();
                        shop.add_to_cart(user, product, qty).unwrap();
                        barrier.wait();
                        shop.create_order(user).ok().map(|_| u64::from(qty))
                    })
                })
                .collect();
            let sold: u64 = handles.into_iter().filter_map(|h| h.join().unwrap()).sum();

            let level = shop.ledger().level(product).unwrap().unwrap();
            prop_assert!(sold <= stock);
            prop_assert_eq!(level.available(), stock - sold);
            prop_assert_eq!(level.reserved(), 0);
        }
    }
}
