use nestbus::bus::fallible;
use nestbus::{BusError, ConsumerKind, MessageBus};

use crate::support::drain;

#[derive(Debug)]
struct Rejected(u32);

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rejected {}", self.0)
    }
}

impl std::error::Error for Rejected {}

fn reject_thirteen(n: &u32) -> Result<bool, Rejected> {
    if *n == 13 {
        Err(Rejected(*n))
    } else {
        Ok(n % 2 == 0)
    }
}

#[tokio::test]
async fn failing_callback_does_not_block_other_consumers() {
    let root = MessageBus::new();
    let fragile = root.subscribe(fallible(reject_thirteen), false).unwrap();
    let all = root.observe(false).unwrap();

    let err = root.send(13).unwrap_err();

    match &err {
        BusError::Routing { index, failures, .. } => {
            assert_eq!(*index, 0);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].consumer, fragile.id());
            assert_eq!(failures[0].kind, ConsumerKind::Subscription);
            assert_eq!(failures[0].source.to_string(), "rejected 13");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(drain(&all), vec![13]);
    assert!(drain(&fragile).is_empty());

    // Pointers kept moving: the next message routes normally.
    root.send(14).unwrap();
    assert_eq!(drain(&fragile), vec![14]);
    assert_eq!(drain(&all), vec![14]);
}

#[tokio::test]
async fn unclaimed_message_still_reaches_fallback_when_a_callback_fails() {
    let root = MessageBus::new();
    let _fragile = root.subscribe(fallible(reject_thirteen), false).unwrap();

    assert!(root.send(13).is_err());
    assert_eq!(drain(&root), vec![13]);
}

#[tokio::test]
async fn failures_are_aggregated_across_consumer_kinds() {
    let root = MessageBus::<u32>::new();
    let _sub = root.subscribe(fallible(reject_thirteen), false).unwrap();
    let _modifier = root
        .modify(fallible(|_: &u32| Err::<Option<u32>, _>("modifier down")), false)
        .unwrap();
    let _captor = root
        .capture(fallible(|_: &u32| Err::<Option<u32>, _>("captor down")))
        .unwrap();

    let err = root.send(13).unwrap_err();

    let kinds: Vec<_> = err.failures().iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ConsumerKind::Captor,
            ConsumerKind::Subscription,
            ConsumerKind::Modifier
        ]
    );
    assert_eq!(root.history_len().unwrap(), 1);
}

#[tokio::test]
async fn backfill_failure_rejects_registration() {
    let root = MessageBus::new();
    root.send_batch([2, 13, 4]).unwrap();

    let err = root
        .subscribe(fallible(reject_thirteen), true)
        .unwrap_err();

    match err {
        BusError::Backfill { kind, index, .. } => {
            assert_eq!(kind, ConsumerKind::Subscription);
            assert_eq!(index, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(root.consumers().unwrap().total(), 0);

    // Without replay the same matcher registers fine.
    let live = root.subscribe(fallible(reject_thirteen), false).unwrap();
    root.send(6).unwrap();
    assert_eq!(drain(&live), vec![6]);
}

#[tokio::test]
async fn nested_failures_are_reported_by_the_delivering_consumer() {
    let root = MessageBus::new();
    let outer = root.observe(false).unwrap();
    let _inner = outer.subscribe(fallible(reject_thirteen), false).unwrap();

    let err = root.send(13).unwrap_err();

    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].consumer, outer.id());
    let nested = failures[0]
        .source
        .downcast_ref::<BusError>()
        .expect("nested bus error");
    assert_eq!(nested.failures().len(), 1);

    // The nested bus still routed the message to its own fallback.
    assert_eq!(drain(&outer), vec![13]);
}

#[tokio::test]
async fn batch_keeps_routing_after_a_failing_message() {
    let root = MessageBus::new();
    let fragile = root.subscribe(fallible(reject_thirteen), false).unwrap();

    let err = root.send_batch([1, 13, 2, 3, 13]).unwrap_err();

    match &err {
        BusError::Batch { sent, errors, .. } => {
            assert_eq!(*sent, 5);
            let indices: Vec<_> = errors
                .iter()
                .map(|e| match e {
                    BusError::Routing { index, .. } => *index,
                    other => panic!("unexpected batch entry: {other}"),
                })
                .collect();
            assert_eq!(indices, vec![1, 4]);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Every message was appended and routed, including those after the failure.
    assert_eq!(root.history().unwrap(), vec![1, 13, 2, 3, 13]);
    assert_eq!(drain(&fragile), vec![2]);
    assert_eq!(drain(&root), vec![1, 13, 3, 13]);
}

#[tokio::test]
async fn batch_without_failures_is_ok() {
    let root = MessageBus::new();
    let _fragile = root.subscribe(fallible(reject_thirteen), false).unwrap();

    root.send_batch([1, 2, 3]).unwrap();
    assert_eq!(root.history_len().unwrap(), 3);
}
