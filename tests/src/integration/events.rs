//! # Event Scenarios
//!
//! Named events in both directions, once listeners, and listener removal.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{json, Value};

    use iof_channel::{Delivery, DropReason, EventChannel};

    use crate::harness::{Recorder, Session};

    /// Arbitrary JSON: scalars (`null` included) nested in arrays and objects.
    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            (-1.0e9f64..1.0e9).prop_map(Value::from),
            ".{0,12}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                proptest::collection::btree_map("[a-z_]{1,6}", inner, 0..4)
                    .prop_map(|fields| Value::Object(fields.into_iter().collect())),
            ]
        })
    }

    fn arb_event_name() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_:.@-]{1,24}".prop_filter("built-in handshake", |name| name != "handshake")
    }

    #[test]
    fn test_payload_arrives_unchanged_both_ways() {
        let session = Session::open_connected();
        let at_frame: Recorder<Option<Value>> = Recorder::new();
        let at_host: Recorder<Option<Value>> = Recorder::new();

        let sink = at_frame.clone();
        session.frame.on("save", move |payload, _| sink.push(payload));
        let sink = at_host.clone();
        session.host.on("saved", move |payload, _| sink.push(payload));

        let doc = json!({ "id": 7, "blocks": [{ "type": "text", "value": "hi" }] });
        session.host.emit("save", Some(doc.clone())).unwrap();
        session.frame.emit("saved", Some(json!(true))).unwrap();
        session.pump();

        assert_eq!(at_frame.snapshot(), vec![Some(doc)]);
        assert_eq!(at_host.snapshot(), vec![Some(json!(true))]);
    }

    #[test]
    fn test_null_payload_is_not_absent() {
        let session = Session::open_connected();
        let received: Recorder<Option<Value>> = Recorder::new();
        let sink = received.clone();
        session.frame.on("e", move |payload, _| sink.push(payload));

        session.host.emit("e", Some(Value::Null)).unwrap();
        session.host.emit("e", None).unwrap();
        session.pump();

        assert_eq!(received.snapshot(), vec![Some(Value::Null), None]);
    }

    #[test]
    fn test_once_and_persistent_for_same_name() {
        let session = Session::open_connected();
        let log: Recorder<&'static str> = Recorder::new();

        let sink = log.clone();
        session.frame.on("select", move |_, _| sink.push("on"));
        let sink = log.clone();
        session.frame.once("select", move |_, _| sink.push("once"));

        session.host.emit("select", None).unwrap();
        session.pump();
        session.host.emit("select", None).unwrap();
        session.pump();

        assert_eq!(log.snapshot(), vec!["once", "on", "on"]);
    }

    #[test]
    fn test_off_then_emit_is_harmless() {
        let session = Session::open_connected();
        let log: Recorder<()> = Recorder::new();
        let sink = log.clone();
        session.frame.on("select", move |_, _| sink.push(()));

        session.frame.off("select");
        session.host.emit("select", None).unwrap();

        assert_eq!(
            session.hub.deliver_all(session.frame_id, &session.frame),
            vec![Ok(Delivery::Dropped(DropReason::NoListener))]
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_remove_listeners_with_completion() {
        let session = Session::open_connected();
        let log: Recorder<&'static str> = Recorder::new();
        let sink = log.clone();
        session.frame.on("a", move |_, _| sink.push("a"));
        let sink = log.clone();
        session.frame.once("b", move |_, _| sink.push("b"));

        let done = log.clone();
        session.frame.remove_listeners_with(move || done.push("done"));

        session.host.emit("a", None).unwrap().emit("b", None).unwrap();
        session.pump();
        assert_eq!(log.snapshot(), vec!["done"]);
    }

    proptest! {
        /// Any event name and payload reaches the other side exactly as sent.
        #[test]
        fn prop_payload_round_trip(
            event in arb_event_name(),
            to_frame in proptest::option::of(arb_json()),
            to_host in proptest::option::of(arb_json()),
        ) {
            let session = Session::open_connected();
            let at_frame: Recorder<Option<Value>> = Recorder::new();
            let at_host: Recorder<Option<Value>> = Recorder::new();

            let sink = at_frame.clone();
            session.frame.on(&event, move |payload, _| sink.push(payload));
            let sink = at_host.clone();
            session.host.on(&event, move |payload, _| sink.push(payload));

            session.host.emit(&event, to_frame.clone()).unwrap();
            session.frame.emit(&event, to_host.clone()).unwrap();
            session.pump();

            prop_assert_eq!(at_frame.snapshot(), vec![to_frame]);
            prop_assert_eq!(at_host.snapshot(), vec![to_host]);
        }

        /// Whatever sequence of events is emitted, a persistent listener sees
        /// every occurrence in order and a once listener only the first.
        #[test]
        fn prop_listener_counts(sequence in proptest::collection::vec(0u8..3, 1..20)) {
            let session = Session::open_connected();
            let persistent: Recorder<u8> = Recorder::new();
            let once: Recorder<u8> = Recorder::new();

            for n in 0u8..3 {
                let event = format!("e{n}");
                let sink = persistent.clone();
                session.frame.on(&event, move |_, _| sink.push(n));
                let sink = once.clone();
                session.frame.once(&event, move |_, _| sink.push(n));
            }

            for n in &sequence {
                session.host.emit(&format!("e{n}"), None).unwrap();
            }
            session.pump();

            prop_assert_eq!(persistent.snapshot(), sequence.clone());

            let mut first_seen = Vec::new();
            for n in &sequence {
                if !first_seen.contains(n) {
                    first_seen.push(*n);
                }
            }
            prop_assert_eq!(once.snapshot(), first_seen);
        }
    }
}
