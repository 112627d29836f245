//! Exercises the connection/session open-and-close trace against a mock peer
//! driven directly over an in-memory duplex pipe, without a real broker.

use amqp1::{
    connection::{Connection, OpenError},
    frames::amqp::{Frame, FrameBody},
    session::Session,
    transport::Transport,
    types::{
        definitions::{ConnectionError, Error as AmqpError},
        performatives::{Begin, Close, Open},
    },
};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const AMQP_HEADER: [u8; 8] = [b'A', b'M', b'Q', b'P', 0, 1, 0, 0];

fn peer_open(container_id: &str) -> Open {
    Open {
        container_id: container_id.to_string(),
        hostname: None,
        max_frame_size: Default::default(),
        channel_max: Default::default(),
        idle_time_out: None,
        outgoing_locales: None,
        incoming_locales: None,
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    }
}

/// Drives the server half of the duplex pipe through header exchange, `Open`,
/// `Begin`, and a `Close` carrying a `connection:forced` error.
async fn run_mock_peer(io: tokio::io::DuplexStream) {
    let (mut reader, mut writer) = tokio::io::split(io);

    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, AMQP_HEADER);
    writer.write_all(&AMQP_HEADER).await.unwrap();

    let io = reader.unsplit(writer);
    let mut transport = Transport::<_, Frame>::bind(io, 512, None);

    match transport.next().await.unwrap().unwrap().body {
        FrameBody::Open(_) => {}
        other => panic!("expected Open, got {:?}", other),
    }
    transport
        .send(Frame::new(0u16, FrameBody::Open(peer_open("mock-peer"))))
        .await
        .unwrap();

    match transport.next().await.unwrap().unwrap().body {
        FrameBody::Begin(_) => {}
        other => panic!("expected Begin, got {:?}", other),
    }
    let begin = Begin {
        remote_channel: Some(0),
        next_outgoing_id: 0,
        incoming_window: 2048,
        outgoing_window: 2048,
        handle_max: Default::default(),
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    };
    transport
        .send(Frame::new(1u16, FrameBody::Begin(begin)))
        .await
        .unwrap();

    let close = Close::new(Some(AmqpError::new(
        ConnectionError::ConnectionForced,
        Some("shutting down for maintenance".to_string()),
        None,
    )));
    transport
        .send(Frame::new(0u16, FrameBody::Close(close)))
        .await
        .unwrap();
}

#[tokio::test]
async fn open_begin_close_roundtrip() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let peer = tokio::spawn(run_mock_peer(server_io));

    let mut connection = Connection::builder()
        .container_id("test-client")
        .open_with_stream(client_io)
        .await
        .expect("connection should open against the mock peer");

    let mut session = Session::begin(&mut connection)
        .await
        .expect("session should begin against the mock peer");

    // The mock peer closes the connection with an error right after Begin;
    // waiting on the session/connection handles should surface it.
    let _ = session.on_end().await;
    let result = connection.on_close().await;
    assert!(result.is_err(), "connection should report the peer-initiated close");

    peer.await.unwrap();
}

#[tokio::test]
async fn malformed_protocol_header_is_rejected() {
    let (client_io, server_io) = tokio::io::duplex(64);

    let peer = tokio::spawn(async move {
        let (mut reader, mut writer) = tokio::io::split(server_io);
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf).await.unwrap();
        writer.write_all(b"BOGUS_HE").await.unwrap();
    });

    let result = Connection::builder()
        .container_id("test-client")
        .open_with_stream(client_io)
        .await;

    match result {
        Err(OpenError::NotImplemented(_)) => {}
        other => panic!("expected NotImplemented from a header mismatch, got {:?}", other),
    }

    peer.await.unwrap();
}
