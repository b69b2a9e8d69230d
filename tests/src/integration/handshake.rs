//! # Handshake Scenarios
//!
//! ```text
//! host (Initiator)                 frame (Responder)
//!     │ ── handshake ──────────────────→ │  pin host, Connected, "connect"
//!     │ ←────────────────── handshake ── │
//!     │  Connected, "connect"            │
//! ```
//!
//! A lost message in either direction leaves that side short of `Connected`
//! forever; nothing is retried.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use iof_channel::{
        ChannelConfig, ChannelError, ConnectionState, ErrorKind, EventChannel, InboundPort,
        CONNECT_EVENT,
    };

    use crate::harness::{Recorder, Session, HOST_ORIGIN};

    fn connect_log(session: &Session) -> Recorder<&'static str> {
        let log = Recorder::new();
        let host_log = log.clone();
        session
            .host
            .on(CONNECT_EVENT, move |_, _| host_log.push("host"));
        let frame_log = log.clone();
        session
            .frame
            .on(CONNECT_EVENT, move |_, _| frame_log.push("frame"));
        log
    }

    #[test]
    fn test_delivered_handshake_connects_both() {
        let session = Session::open(ChannelConfig::default());
        let log = connect_log(&session);

        session.pump();

        // The frame connects on receipt, the host on the answer.
        assert_eq!(log.snapshot(), vec!["frame", "host"]);
        assert_eq!(session.host.state(), ConnectionState::Connected);
        assert_eq!(session.frame.state(), ConnectionState::Connected);
        assert_eq!(
            session.frame.counterpart_origin().as_deref(),
            Some(HOST_ORIGIN)
        );
    }

    #[test]
    fn test_dropped_handshake_connects_nobody() {
        let session = Session::open(ChannelConfig::default());
        let log = connect_log(&session);

        // The handshake was posted during construction; lose it.
        assert!(session.hub.next_message(session.frame_id).is_some());
        session.pump();
        session.clock.advance(Duration::from_secs(3_600));
        session.host.expire_pending();
        session.pump();

        assert!(log.is_empty());
        assert_eq!(session.host.state(), ConnectionState::Connecting);
        assert_eq!(session.frame.state(), ConnectionState::Connecting);
        assert_eq!(session.hub.queued(session.frame_id), 0);
        assert!(session.host.emit("ping", None).is_err());
    }

    #[test]
    fn test_dropped_answer_leaves_host_waiting() {
        let session = Session::open(ChannelConfig::default());
        let log = connect_log(&session);

        let handshake = session.hub.next_message(session.frame_id).unwrap();
        session.hub.drop_next(1);
        session.frame.receive(handshake).unwrap();
        session.pump();

        assert_eq!(log.snapshot(), vec!["frame"]);
        assert!(!session.host.is_connected());
        assert_eq!(session.hub.dropped(), 1);
    }

    #[test]
    fn test_handshake_timeout_notice() {
        let session = Session::open(
            ChannelConfig::default().with_handshake_timeout(Some(Duration::from_secs(2))),
        );
        let errors: Recorder<ChannelError> = Recorder::new();
        let sink = errors.clone();
        session.host.on_error(move |e| sink.push(e.clone()));

        session.hub.next_message(session.frame_id);
        session.clock.advance(Duration::from_secs(2));
        session.host.expire_pending();
        session.host.expire_pending();

        let errors = errors.snapshot();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::Timeout);
        assert_eq!(
            errors[0],
            ChannelError::HandshakeTimeout {
                after: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn test_no_timeout_notice_once_connected() {
        let session = Session::open(
            ChannelConfig::default().with_handshake_timeout(Some(Duration::from_secs(2))),
        );
        let errors: Recorder<ChannelError> = Recorder::new();
        let sink = errors.clone();
        session.frame.on_error(move |e| sink.push(e.clone()));

        session.pump();
        session.clock.advance(Duration::from_secs(60));
        session.frame.expire_pending();
        assert!(errors.is_empty());
    }
}
