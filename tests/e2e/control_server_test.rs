#[allow(dead_code)]
mod helpers;

use getmymsg::checksum::digest_of;
use helpers::*;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Duration};

const CLOSE_WAIT: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Authentication must come first
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_commands_before_auth_are_rejected() {
    let server = start_server(4).await;

    for line in ["msglen", "givememsg 5000", "chkmsg d41d8cd98f00b204e9800998ecf8427e"] {
        let mut client = LineClient::connect(server.local_addr()).await;
        assert_eq!(client.request(line).await, "error unvalidated user", "{}", line);
        assert!(client.is_closed(CLOSE_WAIT).await, "{} left the session open", line);
    }
}

#[tokio::test]
async fn test_bye_without_auth_is_allowed() {
    let server = start_server(4).await;
    let mut client = LineClient::connect(server.local_addr()).await;
    assert_eq!(client.request("bye").await, "ok bye");
    assert!(client.is_closed(CLOSE_WAIT).await);
}

// ---------------------------------------------------------------------------
// Directory lookups
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_unknown_user_rejected() {
    let server = start_server(4).await;
    let mut client = LineClient::connect(server.local_addr()).await;
    assert_eq!(
        client.request("helloiam mallory").await,
        "error invalid user name"
    );
    assert!(client.is_closed(CLOSE_WAIT).await);
}

#[tokio::test]
async fn test_helloiam_without_name_rejected() {
    let server = start_server(4).await;
    let mut client = LineClient::connect(server.local_addr()).await;
    assert_eq!(client.request("helloiam").await, "error invalid user name");
    assert!(client.is_closed(CLOSE_WAIT).await);
}

#[tokio::test]
async fn test_source_address_mismatch_rejected() {
    let server = start_server(4).await;
    let mut client = LineClient::connect(server.local_addr()).await;
    // bob is bound to 10.1.2.3; this client comes from 127.0.0.1
    assert_eq!(client.request("helloiam bob").await, "error invalid src ip");
    assert!(client.is_closed(CLOSE_WAIT).await);
}

// ---------------------------------------------------------------------------
// Checksum confirmation
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_malformed_digests_rejected_by_format() {
    let server = start_server(4).await;
    let upper = digest_of(SECRET).to_uppercase();
    let short = digest_of(SECRET)[..31].to_string();
    let candidates = ["", "xyz", upper.as_str(), short.as_str()];

    for candidate in candidates {
        let mut client = LineClient::connect(server.local_addr()).await;
        assert_eq!(client.request("helloiam alice").await, "ok");
        let line = format!("chkmsg {}", candidate);
        assert_eq!(
            client.request(line.trim_end()).await,
            "error invalid checksum format",
            "candidate {:?}",
            candidate
        );
        assert!(client.is_closed(CLOSE_WAIT).await);
    }
}

#[tokio::test]
async fn test_digest_of_stored_message_accepted() {
    let server = start_server(4).await;
    let mut client = LineClient::connect(server.local_addr()).await;
    assert_eq!(client.request("helloiam alice").await, "ok");
    let line = format!("chkmsg {}", digest_of(SECRET));
    assert_eq!(client.request(&line).await, "ok");
    assert_eq!(client.request("bye").await, "ok bye");
}

#[tokio::test]
async fn test_well_formed_wrong_digest_rejected() {
    let server = start_server(4).await;
    let mut client = LineClient::connect(server.local_addr()).await;
    assert_eq!(client.request("helloiam alice").await, "ok");
    let line = format!("chkmsg {}", digest_of("secretdatb"));
    assert_eq!(client.request(&line).await, "error bad checksum");
    assert!(client.is_closed(CLOSE_WAIT).await);
}

// ---------------------------------------------------------------------------
// Delivery over the datagram channel
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_givememsg_sends_base64_datagram() {
    let server = start_server(4).await;
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();

    let mut client = LineClient::connect(server.local_addr()).await;
    assert_eq!(client.request("helloiam alice").await, "ok");
    assert_eq!(client.request("msglen").await, "ok 10");
    assert_eq!(client.request(&format!("givememsg {}", port)).await, "ok");

    let mut buf = [0u8; 2048];
    let (n, _) = timeout(Duration::from_secs(3), receiver.recv_from(&mut buf))
        .await
        .expect("no datagram")
        .unwrap();
    assert_eq!(&buf[..n], b"c2VjcmV0ZGF0YQ==");
}

#[tokio::test]
async fn test_givememsg_bad_port_rejected() {
    let server = start_server(4).await;
    for arg in ["0", "70000", "abc"] {
        let mut client = LineClient::connect(server.local_addr()).await;
        assert_eq!(client.request("helloiam alice").await, "ok");
        assert_eq!(
            client.request(&format!("givememsg {}", arg)).await,
            "error invalid udp port"
        );
        assert!(client.is_closed(CLOSE_WAIT).await);
    }
}

// ---------------------------------------------------------------------------
// Unknown commands end the session
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_unknown_command_closes_connection() {
    let server = start_server(4).await;
    let mut client = LineClient::connect(server.local_addr()).await;
    assert_eq!(client.request("gimme").await, "error invalid command");
    assert!(client.is_closed(CLOSE_WAIT).await);

    // The peer is gone: writes start failing once the reset comes back.
    let mut write_failed = false;
    for _ in 0..20 {
        if client.send_raw(b"msglen\n").await.is_err() {
            write_failed = true;
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    assert!(write_failed, "writes kept succeeding on a closed session");
}

#[tokio::test]
async fn test_crlf_line_endings_accepted() {
    let server = start_server(4).await;
    let mut client = LineClient::connect(server.local_addr()).await;
    client.send_raw(b"helloiam alice\r\n").await.unwrap();
    assert_eq!(client.read_line(CLOSE_WAIT).await.as_deref(), Some("ok"));
}

// ---------------------------------------------------------------------------
// Concurrency limit
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_connection_over_limit_waits_for_a_slot() {
    let server = start_server(1).await;

    let mut first = LineClient::connect(server.local_addr()).await;
    assert_eq!(first.request("helloiam alice").await, "ok");

    // The second connection sits in the backlog: no reply while the slot is held.
    let mut second = LineClient::connect(server.local_addr()).await;
    second.send("helloiam alice").await;
    let early = timeout(Duration::from_millis(600), second.read_line(CLOSE_WAIT)).await;
    assert!(early.is_err(), "second session was served while the slot was held");

    assert_eq!(first.request("bye").await, "ok bye");

    let reply = second.read_line(CLOSE_WAIT).await;
    assert_eq!(reply.as_deref(), Some("ok"));
    assert_eq!(second.request("msglen").await, "ok 10");
}

#[tokio::test]
async fn test_sessions_within_limit_run_concurrently() {
    let server = start_server(3).await;
    let mut clients = Vec::new();
    for _ in 0..3 {
        let mut c = LineClient::connect(server.local_addr()).await;
        assert_eq!(c.request("helloiam alice").await, "ok");
        clients.push(c);
    }
    for c in clients.iter_mut() {
        assert_eq!(c.request("msglen").await, "ok 10");
    }
    for c in clients.iter_mut() {
        assert_eq!(c.request("bye").await, "ok bye");
    }
}
