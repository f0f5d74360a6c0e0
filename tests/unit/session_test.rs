mod test_support;

use futures::{SinkExt, StreamExt};
use getmymsg::checksum::digest_of;
use getmymsg::context::AppContext;
use getmymsg::control::handler::{run_session, SessionEnd};
use getmymsg::error::CommandError;
use std::net::SocketAddr;
use std::time::Duration;
use test_support::*;
use tokio::io::DuplexStream;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;

type Client = Framed<DuplexStream, LinesCodec>;

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

/// Run a session over an in-memory pipe; returns the client end and the session task.
fn start_session(
    peer_addr: SocketAddr,
    shutdown: CancellationToken,
) -> (Client, JoinHandle<SessionEnd>) {
    let ctx = AppContext::new(default_config());
    let (client, server) = tokio::io::duplex(4096);
    let task = tokio::spawn(async move {
        run_session(server, peer_addr, &ctx, &shutdown).await.unwrap()
    });
    (Framed::new(client, LinesCodec::new()), task)
}

async fn roundtrip(client: &mut Client, line: &str) -> String {
    client.send(line.to_string()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("reply timed out")
        .expect("stream ended")
        .unwrap()
}

async fn assert_closed(client: &mut Client) {
    let next = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("close timed out");
    assert!(next.is_none(), "expected EOF, got {:?}", next);
}

#[tokio::test]
async fn test_full_conversation() {
    let (mut client, task) = start_session(peer(), CancellationToken::new());
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();

    assert_eq!(roundtrip(&mut client, "helloiam alice").await, "ok");
    assert_eq!(roundtrip(&mut client, "msglen").await, "ok 10");
    assert_eq!(
        roundtrip(&mut client, &format!("givememsg {}", port)).await,
        "ok"
    );

    let mut buf = [0u8; 1024];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf[..n], b"c2VjcmV0ZGF0YQ==");

    let chk = format!("chkmsg {}", digest_of("secretdata"));
    assert_eq!(roundtrip(&mut client, &chk).await, "ok");
    assert_eq!(roundtrip(&mut client, "bye").await, "ok bye");
    assert_closed(&mut client).await;
    assert!(matches!(task.await.unwrap(), SessionEnd::Terminated));
}

#[tokio::test]
async fn test_msglen_before_auth_is_fatal() {
    let (mut client, task) = start_session(peer(), CancellationToken::new());
    assert_eq!(roundtrip(&mut client, "msglen").await, "error unvalidated user");
    assert_closed(&mut client).await;
    assert!(matches!(
        task.await.unwrap(),
        SessionEnd::Failed(CommandError::UnvalidatedUser)
    ));
}

#[tokio::test]
async fn test_unknown_command_is_fatal() {
    let (mut client, task) = start_session(peer(), CancellationToken::new());
    assert_eq!(roundtrip(&mut client, "HELLOIAM alice").await, "error invalid command");
    assert_closed(&mut client).await;
    assert!(matches!(
        task.await.unwrap(),
        SessionEnd::Failed(CommandError::InvalidCommand)
    ));
}

#[tokio::test]
async fn test_empty_line_is_invalid_command() {
    let (mut client, _task) = start_session(peer(), CancellationToken::new());
    assert_eq!(roundtrip(&mut client, "").await, "error invalid command");
    assert_closed(&mut client).await;
}

#[tokio::test]
async fn test_wrong_source_address() {
    let other: SocketAddr = "127.0.0.2:40000".parse().unwrap();
    let (mut client, _task) = start_session(other, CancellationToken::new());
    assert_eq!(roundtrip(&mut client, "helloiam alice").await, "error invalid src ip");
    assert_closed(&mut client).await;
}

#[tokio::test]
async fn test_unknown_user() {
    let (mut client, _task) = start_session(peer(), CancellationToken::new());
    assert_eq!(
        roundtrip(&mut client, "helloiam mallory").await,
        "error invalid user name"
    );
    assert_closed(&mut client).await;
}

#[tokio::test]
async fn test_bad_checksum_format() {
    let (mut client, _task) = start_session(peer(), CancellationToken::new());
    assert_eq!(roundtrip(&mut client, "helloiam alice").await, "ok");
    assert_eq!(
        roundtrip(&mut client, "chkmsg XYZ").await,
        "error invalid checksum format"
    );
    assert_closed(&mut client).await;
}

#[tokio::test]
async fn test_checksum_mismatch() {
    let (mut client, _task) = start_session(peer(), CancellationToken::new());
    assert_eq!(roundtrip(&mut client, "helloiam alice").await, "ok");
    let chk = format!("chkmsg {}", digest_of("somethingelse"));
    assert_eq!(roundtrip(&mut client, &chk).await, "error bad checksum");
    assert_closed(&mut client).await;
}

#[tokio::test]
async fn test_givememsg_without_port() {
    let (mut client, _task) = start_session(peer(), CancellationToken::new());
    assert_eq!(roundtrip(&mut client, "helloiam alice").await, "ok");
    assert_eq!(
        roundtrip(&mut client, "givememsg").await,
        "error invalid udp port"
    );
    assert_closed(&mut client).await;
}

#[tokio::test]
async fn test_reauth_switches_user() {
    let cfg = config_with_users(vec![
        user_config("alice", LOOPBACK, "secretdata"),
        user_config("carol", LOOPBACK, "hi"),
    ]);
    let ctx = AppContext::new(cfg);
    let (client, server) = tokio::io::duplex(4096);
    let shutdown = CancellationToken::new();
    let task =
        tokio::spawn(async move { run_session(server, peer(), &ctx, &shutdown).await.unwrap() });
    let mut client = Framed::new(client, LinesCodec::new());

    assert_eq!(roundtrip(&mut client, "helloiam alice").await, "ok");
    assert_eq!(roundtrip(&mut client, "msglen").await, "ok 10");
    assert_eq!(roundtrip(&mut client, "helloiam carol").await, "ok");
    assert_eq!(roundtrip(&mut client, "msglen").await, "ok 2");
    assert_eq!(roundtrip(&mut client, "bye").await, "ok bye");
    assert!(matches!(task.await.unwrap(), SessionEnd::Terminated));
}

#[tokio::test]
async fn test_idle_session_survives_read_windows() {
    let (mut client, _task) = start_session(peer(), CancellationToken::new());
    // Several 100ms read windows pass without input.
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(roundtrip(&mut client, "helloiam alice").await, "ok");
}

#[tokio::test]
async fn test_client_eof_ends_session() {
    let (client, task) = start_session(peer(), CancellationToken::new());
    drop(client);
    let end = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(end, SessionEnd::Disconnected));
}

#[tokio::test]
async fn test_shutdown_between_commands() {
    let shutdown = CancellationToken::new();
    let (mut client, task) = start_session(peer(), shutdown.clone());
    assert_eq!(roundtrip(&mut client, "helloiam alice").await, "ok");
    shutdown.cancel();
    assert_closed(&mut client).await;
    assert!(matches!(task.await.unwrap(), SessionEnd::ShuttingDown));
}

#[tokio::test]
async fn test_overlong_line_is_invalid_command() {
    let (mut client, _task) = start_session(peer(), CancellationToken::new());
    let long = format!("helloiam {}", "a".repeat(2000));
    assert_eq!(roundtrip(&mut client, &long).await, "error invalid command");
    assert_closed(&mut client).await;
}
