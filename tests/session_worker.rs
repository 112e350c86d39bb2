//! End-to-end tests: a scripted game server talks to a `SessionWorker` over an
//! in-memory duplex stream.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use bytes::Bytes;
use common::{connect, disconnect, fixture, fixture_with, key_offer, GameServer, Reply, CLAIRE};
use futures::{SinkExt, StreamExt};
use q2admind::core::{FrameCodec, ServerCommand};
use q2admind::error::AdminError;
use q2admind::service::{EventKind, SessionWorker};
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

type Wire = Framed<DuplexStream, FrameCodec>;

fn spawn_worker(ctx: std::sync::Arc<q2admind::AdminContext>) -> (Wire, JoinHandle<q2admind::Result<()>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let worker = SessionWorker::new(server, ctx).with_peer("test");
    let handle = tokio::spawn(worker.run());
    (Framed::new(client, FrameCodec::new(64 * 1024)), handle)
}

async fn exchange(wire: &mut Wire, server: &mut GameServer, frame: Vec<u8>) -> Vec<Reply> {
    wire.send(Bytes::from(frame)).await.unwrap();
    let reply = wire.next().await.unwrap().unwrap();
    server.open(&reply)
}

#[tokio::test]
async fn test_plaintext_session() {
    let fx = fixture(None);
    let (mut wire, handle) = spawn_worker(fx.ctx.clone());
    let mut server = GameServer::new();

    let greeting = exchange(&mut wire, &mut server, GameServer::hello(1234, false)).await;
    assert_eq!(greeting, vec![Reply::HelloAck(7)]);
    assert_eq!(fx.ctx.live_sessions(), 1);

    let ping = server.ping();
    let pong = exchange(&mut wire, &mut server, ping).await;
    assert_eq!(pong, vec![Reply::Pong]);

    // a connect produces no reply; pair it with a ping to get one back
    let frame = server.frame(|m| {
        connect(m, 1, CLAIRE);
        m.write_byte(ServerCommand::Ping as u8);
    });
    let replies = exchange(&mut wire, &mut server, frame).await;
    assert_eq!(replies, vec![Reply::Pong]);
    assert_eq!(fx.events.of_kind(EventKind::Join).len(), 1);

    let goodbye = server.frame(|m| {
        disconnect(m, 1);
        m.write_byte(ServerCommand::Quit as u8);
    });
    wire.send(Bytes::from(goodbye)).await.unwrap();

    handle.await.unwrap().unwrap();
    assert_eq!(fx.events.of_kind(EventKind::Part).len(), 1);
    assert_eq!(fx.ctx.live_sessions(), 0);
}

#[tokio::test]
async fn test_encrypted_session_rotates() {
    let mut server = GameServer::new();
    let fx = fixture(Some(server.public_hex()));
    let (mut wire, handle) = spawn_worker(fx.ctx.clone());

    let greeting = exchange(&mut wire, &mut server, GameServer::hello(1234, true)).await;
    assert_eq!(greeting[0], Reply::HelloAck(7));
    let epoch = key_offer(&greeting).unwrap();

    // the acknowledgement itself gets no reply, so follow it with a ping
    wire.send(Bytes::from(server.ack(epoch))).await.unwrap();

    let mut rotations = Vec::new();
    for n in 1..=130u32 {
        let ping = server.ping();
        let replies = exchange(&mut wire, &mut server, ping).await;
        assert!(replies.contains(&Reply::Pong));
        if let Some(next) = key_offer(&replies) {
            rotations.push(n);
            wire.send(Bytes::from(server.ack(next))).await.unwrap();
        }
    }
    assert_eq!(rotations, vec![64, 128]);

    let snapshot = fx.ctx.metrics().snapshot();
    assert_eq!(snapshot.handshakes_success, 1);
    assert_eq!(snapshot.rotations, 2);

    drop(wire);
    handle.await.unwrap().unwrap();
    assert_eq!(fx.ctx.live_sessions(), 0);
}

#[tokio::test]
async fn test_unknown_server_refused() {
    let fx = fixture(None);
    let (mut wire, handle) = spawn_worker(fx.ctx.clone());
    let mut server = GameServer::new();

    let replies = exchange(&mut wire, &mut server, GameServer::hello(4321, false)).await;
    assert!(matches!(replies.as_slice(), [Reply::Error(reason)] if reason.contains("4321")));
    assert!(matches!(
        handle.await.unwrap(),
        Err(AdminError::UnknownServer(4321))
    ));
    assert_eq!(fx.ctx.live_sessions(), 0);
}

#[tokio::test]
async fn test_first_frame_must_be_hello() {
    let fx = fixture(None);
    let (mut wire, handle) = spawn_worker(fx.ctx.clone());
    let mut server = GameServer::new();

    wire.send(Bytes::from(server.ping())).await.unwrap();
    assert!(matches!(
        handle.await.unwrap(),
        Err(AdminError::Handshake(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_key_times_out() {
    let mut server = GameServer::new();
    let fx = fixture(Some(server.public_hex()));
    let (mut wire, handle) = spawn_worker(fx.ctx.clone());

    let greeting = exchange(&mut wire, &mut server, GameServer::hello(1234, true)).await;
    assert!(key_offer(&greeting).is_some());

    // never acknowledge
    let result = handle.await.unwrap();
    assert!(matches!(result, Err(AdminError::HandshakeTimeout)));
    assert_eq!(fx.ctx.live_sessions(), 0);
    drop(wire);
}

#[tokio::test(start_paused = true)]
async fn test_silent_server_times_out() {
    let fx = fixture_with(None, |c| {
        c.daemon.idle_timeout = Duration::from_secs(30);
    });
    let (mut wire, handle) = spawn_worker(fx.ctx.clone());
    let mut server = GameServer::new();

    exchange(&mut wire, &mut server, GameServer::hello(1234, false)).await;
    assert!(matches!(handle.await.unwrap(), Err(AdminError::Timeout)));
    drop(wire);
}

#[tokio::test(start_paused = true)]
async fn test_silent_connection_never_greets() {
    let fx = fixture(None);
    let (wire, handle) = spawn_worker(fx.ctx.clone());
    assert!(matches!(
        handle.await.unwrap(),
        Err(AdminError::HandshakeTimeout)
    ));
    assert_eq!(fx.ctx.live_sessions(), 0);
    drop(wire);
}

#[tokio::test]
async fn test_tampered_frame_forces_rekey() {
    let mut server = GameServer::new();
    let fx = fixture(Some(server.public_hex()));
    let (mut wire, handle) = spawn_worker(fx.ctx.clone());

    let greeting = exchange(&mut wire, &mut server, GameServer::hello(1234, true)).await;
    let ack = server.ack(key_offer(&greeting).unwrap());
    wire.send(Bytes::from(ack)).await.unwrap();
    let ping = server.ping();
    let replies = exchange(&mut wire, &mut server, ping).await;
    assert_eq!(replies, vec![Reply::Pong]);

    let mut forged = server.ping();
    let last = forged.len() - 1;
    forged[last] ^= 0x55;
    let replies = exchange(&mut wire, &mut server, forged).await;
    let epoch = key_offer(&replies).expect("fresh key offer");

    // the session survives if the server re-keys
    server.sending = Some(epoch);
    let rekey = server.seal(&[
        ServerCommand::KeyAck as u8,
        epoch,
        ServerCommand::Ping as u8,
    ]);
    let replies = exchange(&mut wire, &mut server, rekey).await;
    assert_eq!(replies, vec![Reply::Pong]);
    assert_eq!(fx.ctx.metrics().snapshot().auth_failures, 1);

    drop(wire);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_oversized_frame_ends_session() {
    let fx = fixture_with(None, |c| c.daemon.max_frame_size = 1024);
    let (client, server_end) = tokio::io::duplex(64 * 1024);
    let handle = tokio::spawn(SessionWorker::new(server_end, fx.ctx.clone()).run());
    let mut wire = Framed::new(client, FrameCodec::new(64 * 1024));
    let mut server = GameServer::new();

    let greeting = exchange(&mut wire, &mut server, GameServer::hello(1234, false)).await;
    assert_eq!(greeting, vec![Reply::HelloAck(7)]);

    wire.send(Bytes::from(vec![0u8; 4096])).await.unwrap();
    assert!(matches!(
        handle.await.unwrap(),
        Err(AdminError::OversizedFrame(4096))
    ));
}
