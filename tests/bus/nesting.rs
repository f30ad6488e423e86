use nestbus::MessageBus;

use crate::support::{drain, is_text, text, Msg};

#[tokio::test]
async fn subscription_can_be_filtered_again() {
    let root = MessageBus::new();
    let ints = root
        .subscribe(|m: &Msg| matches!(m, Msg::Int(_)), false)
        .unwrap();
    let negatives = ints
        .subscribe(|m: &Msg| matches!(m, Msg::Int(n) if *n < 0), false)
        .unwrap();

    root.send_batch([Msg::Int(3), Msg::Int(-1), text("x"), Msg::Int(-7)])
        .unwrap();

    assert_eq!(drain(&negatives), vec![Msg::Int(-1), Msg::Int(-7)]);
    // The intermediate bus keeps what its own consumer did not claim.
    assert_eq!(drain(&ints), vec![Msg::Int(3)]);
    assert_eq!(drain(&root), vec![text("x")]);
}

#[tokio::test]
async fn delivery_bus_keeps_its_own_history() {
    let root = MessageBus::new();
    let strings = root.subscribe(is_text, false).unwrap();

    root.send_batch([text("a"), Msg::Int(1), text("b")]).unwrap();

    // A late replaying observer of the delivery bus sees what it received.
    let replay = strings.observe(true).unwrap();
    assert_eq!(drain(&replay), vec![text("a"), text("b")]);
    assert_eq!(strings.history().unwrap(), vec![text("a"), text("b")]);
}

#[tokio::test]
async fn modifier_output_can_be_captured_downstream() {
    let root = MessageBus::new();
    let doubled = root.modify(|n: &i64| Some(n * 2), false).unwrap();
    let big = doubled.capture(|n: &i64| (*n >= 100).then_some(*n)).unwrap();

    root.send_batch([1, 50, 7]).unwrap();

    assert_eq!(drain(&big), vec![100]);
    assert_eq!(drain(&doubled), vec![2, 14]);
}

#[tokio::test]
async fn nested_names_follow_the_consumer_tree() {
    let root = MessageBus::<()>::named("app").unwrap();
    let a = root.observe(false).unwrap();
    let b = root.observe(false).unwrap();
    let a0 = a.observe(false).unwrap();
    let a0x = a0.capture(|_: &()| None::<()>).unwrap();

    assert_eq!(a.name(), "app/0");
    assert_eq!(b.name(), "app/1");
    assert_eq!(a0.name(), "app/0/0");
    assert_eq!(a0x.name(), "app/0/0/0");
}
