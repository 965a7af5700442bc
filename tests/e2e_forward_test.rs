//! End-to-end forwarding tests with mock backends

use grace::endpoint::{Endpoint, unix_endpoint};
use futures::FutureExt;
use grace::forward::Forwarder;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Start a backend that greets with `name` and then echoes
async fn start_backend(socket_path: &Path, name: &'static str) -> Endpoint {
    let listener = UnixListener::bind(socket_path).unwrap();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };

            tokio::spawn(async move {
                if stream.write_all(name.as_bytes()).await.is_err() {
                    return;
                }
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });

    unix_endpoint(socket_path)
}

/// Connect through the forwarder and check which backend answered
async fn open_client(src: &Path, expected_backend: &str) -> UnixStream {
    let mut stream = UnixStream::connect(src).await.unwrap();

    let mut greeting = vec![0u8; expected_backend.len()];
    tokio::time::timeout(TIMEOUT, stream.read_exact(&mut greeting))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(greeting, expected_backend.as_bytes());

    stream.write_all(b"ping").await.unwrap();
    let mut echo = [0u8; 4];
    tokio::time::timeout(TIMEOUT, stream.read_exact(&mut echo))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&echo, b"ping");

    stream
}

fn conns(forwarder: &Forwarder, endpoint: &Endpoint) -> Option<(usize, bool)> {
    forwarder
        .list()
        .into_iter()
        .find(|s| &s.endpoint == endpoint)
        .map(|s| (s.conns, s.current))
}

/// Poll until a relay has released its connection
async fn until_conns(forwarder: &Forwarder, endpoint: &Endpoint, expected: Option<(usize, bool)>) {
    tokio::time::timeout(TIMEOUT, async {
        while conns(forwarder, endpoint) != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_switch_drains_old_backend_after_last_connection_closes() {
    let temp = TempDir::new().unwrap();
    let a = start_backend(&temp.path().join("a.sock"), "A").await;
    let b = start_backend(&temp.path().join("b.sock"), "B").await;
    let src_path = temp.path().join("front.sock");

    let forwarder = Forwarder::bind(unix_endpoint(&src_path), a.clone())
        .await
        .unwrap();

    let client = open_client(&src_path, "A").await;
    assert_eq!(conns(&forwarder, &a), Some((1, true)));

    let drained = forwarder.switch(b.clone());
    assert!(drained.clone().now_or_never().is_none());
    assert_eq!(conns(&forwarder, &a), Some((1, false)));
    assert_eq!(conns(&forwarder, &b), Some((0, true)));

    // New connections go to B while A keeps serving the old one
    let second = open_client(&src_path, "B").await;
    assert_eq!(conns(&forwarder, &b), Some((1, true)));

    drop(client);
    let endpoint = tokio::time::timeout(TIMEOUT, drained).await.unwrap();
    assert_eq!(endpoint, a);
    tokio::time::timeout(TIMEOUT, forwarder.wait()).await.unwrap();

    assert_eq!(conns(&forwarder, &a), None);
    assert_eq!(conns(&forwarder, &b), Some((1, true)));

    drop(second);
    forwarder.close().await;
}

#[tokio::test]
async fn test_switch_away_from_idle_backend_drains_immediately() {
    let temp = TempDir::new().unwrap();
    let a = start_backend(&temp.path().join("a.sock"), "A").await;
    let b = start_backend(&temp.path().join("b.sock"), "B").await;
    let src_path = temp.path().join("front.sock");

    let forwarder = Forwarder::bind(unix_endpoint(&src_path), a.clone())
        .await
        .unwrap();

    let drained = forwarder.switch(b.clone());
    assert_eq!(drained.now_or_never(), Some(a));

    let listing = forwarder.list();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].endpoint, b);

    forwarder.close().await;
}

#[tokio::test]
async fn test_switch_back_while_draining_keeps_same_drain() {
    let temp = TempDir::new().unwrap();
    let a = start_backend(&temp.path().join("a.sock"), "A").await;
    let b = start_backend(&temp.path().join("b.sock"), "B").await;
    let src_path = temp.path().join("front.sock");

    let forwarder = Forwarder::bind(unix_endpoint(&src_path), a.clone())
        .await
        .unwrap();
    let on_a = open_client(&src_path, "A").await;

    let a_drain = forwarder.switch(b.clone());
    let on_b = open_client(&src_path, "B").await;
    let b_drain = forwarder.switch(a.clone());

    // A is current again, so closing its connection must not drain it
    drop(on_a);
    until_conns(&forwarder, &a, Some((0, true))).await;
    assert!(a_drain.clone().now_or_never().is_none());

    drop(on_b);
    assert_eq!(tokio::time::timeout(TIMEOUT, b_drain).await.unwrap(), b);

    // A later switch away from A hands out the original drain again
    let again = forwarder.switch(b.clone());
    assert!(again.same_as(&a_drain));
    assert_eq!(tokio::time::timeout(TIMEOUT, a_drain).await.unwrap(), a);

    forwarder.close().await;
}

#[tokio::test]
async fn test_unreachable_destination_releases_connection() {
    let temp = TempDir::new().unwrap();
    let missing = unix_endpoint(&temp.path().join("missing.sock"));
    let b = start_backend(&temp.path().join("b.sock"), "B").await;
    let src_path = temp.path().join("front.sock");

    let forwarder = Forwarder::bind(unix_endpoint(&src_path), missing.clone())
        .await
        .unwrap();

    let mut stream = UnixStream::connect(&src_path).await.unwrap();
    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(TIMEOUT, stream.read(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);

    until_conns(&forwarder, &missing, Some((0, true))).await;

    let drained = forwarder.switch(b);
    assert_eq!(tokio::time::timeout(TIMEOUT, drained).await.unwrap(), missing);

    forwarder.close().await;
}

#[tokio::test]
async fn test_wait_is_not_held_up_by_later_switches() {
    let temp = TempDir::new().unwrap();
    let a = start_backend(&temp.path().join("a.sock"), "A").await;
    let b = start_backend(&temp.path().join("b.sock"), "B").await;
    let c = start_backend(&temp.path().join("c.sock"), "C").await;
    let src_path = temp.path().join("front.sock");

    let forwarder = Forwarder::bind(unix_endpoint(&src_path), a.clone())
        .await
        .unwrap();
    let on_a = open_client(&src_path, "A").await;
    forwarder.switch(b.clone());
    let _on_b = open_client(&src_path, "B").await;

    let waiting = forwarder.wait();
    forwarder.switch(c.clone());
    drop(on_a);

    let drained = tokio::time::timeout(TIMEOUT, waiting).await.unwrap();
    assert_eq!(drained, vec![a]);
    assert_eq!(conns(&forwarder, &b), Some((1, false)));

    forwarder.close().await;
}
