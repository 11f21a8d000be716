//! # Ordering Guarantees
//!
//! The bus promises one global FIFO across every identifier: for publishes
//! P1 before P2, all listener side effects of P1 are complete before any
//! side effect of P2 begins, and nothing runs until control has been yielded
//! back to the scheduler at least once.

#[cfg(test)]
mod tests {
    use parking_lot::RwLock;
    use proptest::prelude::*;
    use serial_bus::{EventId, SerialEventBus};
    use std::sync::Arc;

    type Log<T> = Arc<RwLock<Vec<T>>>;

    #[tokio::test]
    async fn test_same_identifier_delivers_in_publish_order() {
        let bus = SerialEventBus::new();
        let log: Log<u32> = Arc::default();
        let sink = Arc::clone(&log);
        bus.register("x", move |item: &u32| sink.write().push(*item));

        bus.publish("x", 1);
        bus.publish("x", 2);

        // Publishing is synchronous; nothing may have run yet.
        assert!(log.read().is_empty());

        bus.settled().await;
        assert_eq!(*log.read(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_global_fifo_across_identifiers() {
        let bus = SerialEventBus::new();
        let log: Log<u32> = Arc::default();

        for id in ["alpha", "beta"] {
            let sink = Arc::clone(&log);
            bus.register(id, move |item: &u32| sink.write().push(*item));
        }

        let sequence = [("alpha", 1), ("beta", 2), ("alpha", 3), ("beta", 4), ("alpha", 5)];
        for (id, item) in sequence {
            bus.publish(id, item);
        }

        bus.settled().await;
        assert_eq!(*log.read(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_emission_listeners_complete_before_next_emission() {
        let bus = SerialEventBus::new();
        let log: Log<String> = Arc::default();

        for tag in ["first", "second"] {
            let sink = Arc::clone(&log);
            bus.register("steps", move |item: &u32| {
                sink.write().push(format!("{tag}-{item}"));
            });
        }

        bus.publish("steps", 1);
        bus.publish("steps", 2);
        bus.settled().await;

        // Both listeners of emission 1 run before any listener of emission 2.
        assert_eq!(
            *log.read(),
            vec!["first-1", "second-1", "first-2", "second-2"]
        );
    }

    #[tokio::test]
    async fn test_listener_publishing_from_callback_is_ordered_after() {
        let bus = SerialEventBus::new();
        let log: Log<u32> = Arc::default();

        let sink = Arc::clone(&log);
        let chained = bus.clone();
        bus.register("outer", move |item: &u32| {
            sink.write().push(*item);
            if *item == 1 {
                // Re-entrant publish lands at the tail of the queue.
                chained.publish("outer", 10);
            }
        });

        bus.publish("outer", 1);
        bus.publish("outer", 2);
        bus.settled().await;

        assert_eq!(*log.read(), vec![1, 2, 10]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_any_publish_sequence_is_delivered_in_order(
            emissions in proptest::collection::vec((0u8..4u8, any::<u16>()), 0..48)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");

            runtime.block_on(async {
                let bus = SerialEventBus::new();
                let log: Log<(u8, u16)> = Arc::default();

                for topic in 0u8..4 {
                    let sink = Arc::clone(&log);
                    bus.register(EventId::named(format!("topic-{topic}")), move |item: &(u8, u16)| {
                        sink.write().push(*item);
                    });
                }

                for &(topic, value) in &emissions {
                    bus.publish(EventId::named(format!("topic-{topic}")), (topic, value));
                }

                bus.settled().await;
                assert_eq!(*log.read(), emissions);
            });
        }
    }
}
