//! # Request/Reply Scenarios
//!
//! ```text
//! host                                         frame
//!  │ ── {_event:"sum", payload, cid:C} ──────→  │  on("sum") gets a Replier
//!  │ ←── {_event:"sum--C--@callback",           │
//!  │       payload:{error:false, args:[5]}} ──  │
//!  │  callback(Ok([5]))                         │
//! ```

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;
    use serde_json::json;

    use iof_channel::adapters::HubEndpoint;
    use iof_channel::{EventChannel, ReplyError, ReplyResult, Responder};

    use crate::harness::{Recorder, Session};

    fn serve_sum(frame: &Responder<HubEndpoint>) {
        frame.on("sum", |payload, reply| {
            let p = payload.unwrap_or_default();
            let total = p["a"].as_i64().unwrap_or(0) + p["b"].as_i64().unwrap_or(0);
            if let Some(reply) = reply {
                reply.send(None, vec![json!(total)]).unwrap();
            }
        });
    }

    #[test]
    fn test_sum_round_trip() {
        let session = Session::open_connected();
        serve_sum(&session.frame);
        let replies: Recorder<ReplyResult> = Recorder::new();

        let sink = replies.clone();
        session
            .host
            .emit_with_reply("sum", Some(json!({ "a": 2, "b": 3 })), move |r| {
                sink.push(r)
            })
            .unwrap();
        session.pump();

        assert_eq!(replies.snapshot(), vec![Ok(vec![json!(5)])]);
        assert_eq!(session.host.pending_replies(), 0);
    }

    #[test]
    fn test_frame_can_ask_host() {
        let session = Session::open_connected();
        session.host.on("getSelection", |_, reply| {
            reply
                .unwrap()
                .ok(vec![json!("block-3"), json!({ "start": 0, "end": 4 })])
                .unwrap();
        });

        let replies: Recorder<ReplyResult> = Recorder::new();
        let sink = replies.clone();
        session
            .frame
            .emit_with_reply("getSelection", None, move |r| sink.push(r))
            .unwrap();
        session.pump();

        assert_eq!(
            replies.snapshot(),
            vec![Ok(vec![json!("block-3"), json!({ "start": 0, "end": 4 })])]
        );
    }

    #[test]
    fn test_remote_failure() {
        let session = Session::open_connected();
        session.frame.on("load", |_, reply| {
            reply.unwrap().fail("not found").unwrap();
        });

        let replies: Recorder<ReplyResult> = Recorder::new();
        let sink = replies.clone();
        session
            .host
            .emit_with_reply("load", Some(json!("doc-1")), move |r| sink.push(r))
            .unwrap();
        session.pump();

        assert_eq!(
            replies.snapshot(),
            vec![Err(ReplyError::Remote {
                message: "not found".to_string(),
                args: vec![],
            })]
        );
    }

    #[test]
    fn test_concurrent_requests_resolve_independently() {
        let session = Session::open_connected();
        serve_sum(&session.frame);
        let replies: Recorder<(i64, ReplyResult)> = Recorder::new();

        for a in 0..5 {
            let sink = replies.clone();
            session
                .host
                .emit_with_reply("sum", Some(json!({ "a": a, "b": 10 })), move |r| {
                    sink.push((a, r))
                })
                .unwrap();
        }
        assert_eq!(session.host.pending_replies(), 5);
        session.pump();

        let replies = replies.snapshot();
        assert_eq!(replies.len(), 5);
        for (a, result) in replies {
            assert_eq!(result, Ok(vec![json!(a + 10)]));
        }
    }

    #[test]
    fn test_unanswered_request_times_out() {
        let session = Session::open_connected();
        // Listener exists but never replies.
        session.frame.on("sum", |_, _| {});

        let replies: Recorder<ReplyResult> = Recorder::new();
        let sink = replies.clone();
        let cid = session
            .host
            .emit_with_reply("sum", None, move |r| sink.push(r))
            .unwrap();
        session.pump();

        session.clock.advance(Duration::from_secs(30));
        assert_eq!(session.host.expire_pending(), 1);

        assert_eq!(
            replies.snapshot(),
            vec![Err(ReplyError::TimedOut {
                event: "sum".to_string(),
                cid,
                after: Duration::from_secs(30),
            })]
        );
        assert_eq!(session.host.pending_replies(), 0);
    }

    #[test]
    fn test_late_reply_after_timeout_is_dropped() {
        let session = Session::open_connected();
        let held: Recorder<iof_channel::Replier> = Recorder::new();
        let sink = held.clone();
        session.frame.on("slow", move |_, reply| sink.push(reply.unwrap()));

        let replies: Recorder<ReplyResult> = Recorder::new();
        let sink = replies.clone();
        session
            .host
            .emit_with_reply("slow", None, move |r| sink.push(r))
            .unwrap();
        session.pump();

        session.clock.advance(Duration::from_secs(31));
        session.host.expire_pending();

        // The answer arrives after the deadline.
        held.snapshot()[0].ok(vec![json!("late")]).unwrap();
        session.pump();

        let replies = replies.snapshot();
        assert_eq!(replies.len(), 1);
        assert!(matches!(replies[0], Err(ReplyError::TimedOut { .. })));
    }

    #[tokio::test]
    async fn test_awaitable_reply() {
        let session = Session::open_connected();
        serve_sum(&session.frame);

        let reply = session
            .host
            .emit_awaitable("sum", Some(json!({ "a": 20, "b": 22 })))
            .unwrap();
        session.pump();

        assert_eq!(reply.await.unwrap(), Ok(vec![json!(42)]));
    }

    proptest! {
        /// Every request gets exactly the reply computed from its own payload.
        #[test]
        fn prop_replies_match_requests(
            pairs in proptest::collection::vec((-1000i64..1000, -1000i64..1000), 1..16)
        ) {
            let session = Session::open_connected();
            serve_sum(&session.frame);
            let replies: Recorder<(i64, ReplyResult)> = Recorder::new();

            for (a, b) in &pairs {
                let sink = replies.clone();
                let expected = a + b;
                session
                    .host
                    .emit_with_reply("sum", Some(json!({ "a": a, "b": b })), move |r| {
                        sink.push((expected, r))
                    })
                    .unwrap();
            }
            session.pump();

            let replies = replies.snapshot();
            prop_assert_eq!(replies.len(), pairs.len());
            for (expected, result) in replies {
                prop_assert_eq!(result, Ok(vec![json!(expected)]));
            }
        }
    }
}
