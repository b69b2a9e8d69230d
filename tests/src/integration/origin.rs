//! # Origin Enforcement
//!
//! The two roles react differently to strangers:
//!
//! - the frame (Responder) treats a foreign origin or source as an identity
//!   violation and reports it
//! - the host (Initiator) drops such messages without a word

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use iof_channel::{
        ChannelError, Delivery, DropReason, Envelope, ErrorKind, EventChannel, InboundMessage,
        MessageTransport,
    };

    use crate::harness::{Recorder, Session, EVIL_ORIGIN, FRAME_ORIGIN, HOST_ORIGIN};

    #[test]
    fn test_ping_from_host_then_from_stranger() {
        let session = Session::open_connected();
        let pings: Recorder<Option<Value>> = Recorder::new();
        let errors: Recorder<ChannelError> = Recorder::new();

        let sink = pings.clone();
        session.frame.on("ping", move |payload, _| sink.push(payload));
        let sink = errors.clone();
        session.frame.on_error(move |e| sink.push(e.clone()));

        session.hub.inject(
            session.frame_id,
            InboundMessage::new(
                session.host_id,
                HOST_ORIGIN,
                json!({ "_event": "ping", "payload": "hello" }),
            ),
        );
        let evil = session.hub.open_context(EVIL_ORIGIN);
        evil.post_message(&session.frame_id, FRAME_ORIGIN, &Envelope::new("ping"))
            .unwrap();

        let results = session.hub.deliver_all(session.frame_id, &session.frame);

        assert_eq!(pings.snapshot(), vec![Some(json!("hello"))]);
        assert_eq!(
            results,
            vec![
                Ok(Delivery::Dispatched {
                    event: "ping".to_string(),
                    listeners: 1,
                }),
                Err(ChannelError::OriginViolation {
                    expected: HOST_ORIGIN.to_string(),
                    actual: EVIL_ORIGIN.to_string(),
                }),
            ]
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.snapshot()[0].kind(), ErrorKind::IdentityViolation);
    }

    #[test]
    fn test_host_ignores_stranger() {
        let session = Session::open_connected();
        let pings: Recorder<Option<Value>> = Recorder::new();
        let errors: Recorder<ChannelError> = Recorder::new();

        let sink = pings.clone();
        session.host.on("ping", move |payload, _| sink.push(payload));
        let sink = errors.clone();
        session.host.on_error(move |e| sink.push(e.clone()));

        let evil = session.hub.open_context(EVIL_ORIGIN);
        evil.post_message(&session.host_id, HOST_ORIGIN, &Envelope::new("ping"))
            .unwrap();

        assert_eq!(
            session.hub.deliver_all(session.host_id, &session.host),
            vec![Ok(Delivery::Dropped(DropReason::UnexpectedPeer))]
        );
        assert!(pings.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_sibling_frame_with_same_origin_is_rejected() {
        let session = Session::open_connected();
        let sibling = session.hub.open_context(HOST_ORIGIN);
        sibling
            .post_message(&session.frame_id, FRAME_ORIGIN, &Envelope::new("ping"))
            .unwrap();

        assert_eq!(
            session.hub.deliver_all(session.frame_id, &session.frame),
            vec![Err(ChannelError::SourceViolation {
                origin: HOST_ORIGIN.to_string(),
            })]
        );
    }

    #[test]
    fn test_stranger_cannot_claim_unconnected_frame() {
        let session = Session::open(Default::default());
        let evil = session.hub.open_context(EVIL_ORIGIN);
        evil.post_message(&session.frame_id, FRAME_ORIGIN, &Envelope::handshake())
            .unwrap();

        session.pump();

        // The stranger's handshake is queued behind the host's; the host
        // handshake pins first, the stranger's is rejected.
        assert!(session.frame.is_connected());
        assert_eq!(session.frame.counterpart_origin().as_deref(), Some(HOST_ORIGIN));
        assert_eq!(session.hub.queued(evil.id()), 0);
    }

    #[test]
    fn test_misaddressed_messages_never_arrive() {
        let session = Session::open_connected();
        let pings: Recorder<Option<Value>> = Recorder::new();
        let sink = pings.clone();
        session.frame.on("ping", move |payload, _| sink.push(payload));

        // Host posts with the wrong target origin; the transport discards it.
        let host_side = session.hub.open_context(HOST_ORIGIN);
        host_side
            .post_message(&session.frame_id, EVIL_ORIGIN, &Envelope::new("ping"))
            .unwrap();
        session.pump();

        assert!(pings.is_empty());
        assert_eq!(session.hub.filtered(), 1);
    }
}
