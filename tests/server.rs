use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use uuid::Uuid;

use mockredis::codec::FrameCodec;
use mockredis::config::Config;
use mockredis::connection::CLOSING_MESSAGE;
use mockredis::frame::Frame;
use mockredis::server::Server;

type Client = Framed<TcpStream, FrameCodec>;

async fn start(max_connections: usize) -> SocketAddr {
    let config = Config {
        port: 0,
        max_connections,
        ..Config::default()
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();

    tokio::spawn(server.run());

    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let stream = TcpStream::connect(addr).await.unwrap();
    Framed::new(stream, FrameCodec::default())
}

fn command(parts: &[&str]) -> Frame {
    Frame::Array(
        parts
            .iter()
            .map(|part| Frame::Bulk(Bytes::copy_from_slice(part.as_bytes())))
            .collect(),
    )
}

/// The next reply, `None` once the server closed the connection.
async fn next(client: &mut Client) -> Option<Frame> {
    timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for a reply")
        .map(|frame| frame.unwrap())
}

async fn request(client: &mut Client, parts: &[&str]) -> Frame {
    client.send(command(parts)).await.unwrap();
    next(client).await.expect("connection closed")
}

fn bulk(s: &str) -> Frame {
    Frame::Bulk(Bytes::copy_from_slice(s.as_bytes()))
}

fn ok() -> Frame {
    Frame::Simple("OK".to_string())
}

fn names(frame: Frame) -> HashSet<String> {
    match frame {
        Frame::Bulk(bytes) => std::str::from_utf8(&bytes)
            .unwrap()
            .split('|')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        frame => panic!("expected a bulk string, got {frame:?}"),
    }
}

#[tokio::test]
async fn test_set_get_del() {
    let addr = start(10).await;
    let mut client = connect(addr).await;

    assert_eq!(request(&mut client, &["SET", "a", "1"]).await, ok());
    assert_eq!(request(&mut client, &["GET", "a"]).await, bulk("1"));
    assert_eq!(request(&mut client, &["DEL", "a"]).await, ok());
    assert_eq!(
        request(&mut client, &["GET", "a"]).await,
        Frame::Simple("key not found".to_string())
    );
}

#[tokio::test]
async fn test_values_are_shared_between_clients() {
    let addr = start(10).await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;

    assert_eq!(request(&mut first, &["set", "shared", "value"]).await, ok());
    assert_eq!(request(&mut second, &["get", "shared"]).await, bulk("value"));
}

#[tokio::test]
async fn test_keys() {
    let addr = start(10).await;
    let mut client = connect(addr).await;

    request(&mut client, &["SET", "a", "1"]).await;
    request(&mut client, &["SET", "b", "2"]).await;

    let keys = match request(&mut client, &["KEYS"]).await {
        Frame::Bulk(bytes) => String::from_utf8(bytes.to_vec()).unwrap(),
        frame => panic!("expected a bulk string, got {frame:?}"),
    };
    let keys: HashSet<&str> = keys.split(',').collect();

    assert_eq!(keys, HashSet::from(["a", "b"]));
}

#[tokio::test]
async fn test_client_names() {
    let addr = start(10).await;
    let mut client = connect(addr).await;

    let default_name = match request(&mut client, &["CLIENT", "GETNAME"]).await {
        Frame::Bulk(bytes) => String::from_utf8(bytes.to_vec()).unwrap(),
        frame => panic!("expected a bulk string, got {frame:?}"),
    };
    assert!(Uuid::parse_str(&default_name).is_ok());

    assert_eq!(
        request(&mut client, &["CLIENT", "SETNAME", "conn-1"]).await,
        ok()
    );
    assert_eq!(
        request(&mut client, &["CLIENT", "GETNAME"]).await,
        bulk("conn-1")
    );
    assert_eq!(
        names(request(&mut client, &["client", "list"]).await),
        HashSet::from(["conn-1".to_string()])
    );
}

#[tokio::test]
async fn test_errors_keep_the_connection_open() {
    let addr = start(10).await;
    let mut client = connect(addr).await;

    assert_eq!(
        request(&mut client, &["PING"]).await,
        Frame::Error("ERR unsupported command 'PING' or 'PING' received".to_string())
    );
    assert_eq!(
        request(&mut client, &["GET"]).await,
        Frame::Error("ERR wrong number of arguments for 'GET' command".to_string())
    );

    client
        .send(Frame::Simple("GET a".to_string()))
        .await
        .unwrap();
    assert_eq!(
        next(&mut client).await,
        Some(Frame::Error(
            "ERR unsupported data type - simple string received; only array format is supported"
                .to_string()
        ))
    );

    assert_eq!(request(&mut client, &["SET", "a", "1"]).await, ok());
}

#[tokio::test]
async fn test_hello() {
    let addr = start(10).await;
    let mut client = connect(addr).await;

    assert_eq!(
        request(&mut client, &["HELLO", "3"]).await,
        Frame::Map(vec![
            (bulk("server"), bulk("redis")),
            (bulk("version"), bulk("3.0.0")),
            (bulk("proto"), bulk("3")),
        ])
    );
}

#[tokio::test]
async fn test_pipelined_replies_keep_order() {
    let addr = start(10).await;
    let mut client = connect(addr).await;

    client.feed(command(&["SET", "k", "v1"])).await.unwrap();
    client.feed(command(&["GET", "k"])).await.unwrap();
    client.feed(command(&["SET", "k", "v2"])).await.unwrap();
    client.feed(command(&["GET", "k"])).await.unwrap();
    client.feed(command(&["NOPE"])).await.unwrap();
    client.feed(command(&["DEL", "k"])).await.unwrap();
    SinkExt::<Frame>::flush(&mut client).await.unwrap();

    assert_eq!(next(&mut client).await, Some(ok()));
    assert_eq!(next(&mut client).await, Some(bulk("v1")));
    assert_eq!(next(&mut client).await, Some(ok()));
    assert_eq!(next(&mut client).await, Some(bulk("v2")));
    assert!(matches!(next(&mut client).await, Some(Frame::Error(_))));
    assert_eq!(next(&mut client).await, Some(ok()));
}

#[tokio::test]
async fn test_quit() {
    let addr = start(10).await;
    let mut leaving = connect(addr).await;
    let mut staying = connect(addr).await;

    request(&mut leaving, &["CLIENT", "SETNAME", "leaving"]).await;
    request(&mut staying, &["CLIENT", "SETNAME", "staying"]).await;

    assert_eq!(
        request(&mut leaving, &["QUIT"]).await,
        Frame::Simple(CLOSING_MESSAGE.to_string())
    );
    assert_eq!(next(&mut leaving).await, None);

    assert_eq!(
        names(request(&mut staying, &["CLIENT", "LIST"]).await),
        HashSet::from(["staying".to_string()])
    );
}

#[tokio::test]
async fn test_disconnected_client_is_removed() {
    let addr = start(10).await;
    let mut leaving = connect(addr).await;
    let mut staying = connect(addr).await;

    request(&mut leaving, &["CLIENT", "SETNAME", "leaving"]).await;
    request(&mut staying, &["CLIENT", "SETNAME", "staying"]).await;

    drop(leaving);

    let mut remaining = HashSet::new();
    for _ in 0..50 {
        remaining = names(request(&mut staying, &["CLIENT", "LIST"]).await);
        if remaining.len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(remaining, HashSet::from(["staying".to_string()]));
}

#[tokio::test]
async fn test_connection_limit() {
    let addr = start(1).await;
    let mut admitted = connect(addr).await;
    request(&mut admitted, &["CLIENT", "SETNAME", "admitted"]).await;

    let mut rejected = connect(addr).await;
    assert_eq!(
        next(&mut rejected).await,
        Some(Frame::Error(
            "ERR maximum connections 1 reached; cannot accept new connections".to_string()
        ))
    );
    assert_eq!(
        next(&mut rejected).await,
        Some(Frame::Simple(CLOSING_MESSAGE.to_string()))
    );
    assert_eq!(next(&mut rejected).await, None);

    assert_eq!(
        names(request(&mut admitted, &["CLIENT", "LIST"]).await),
        HashSet::from(["admitted".to_string()])
    );
}

#[tokio::test]
async fn test_reset_client_does_not_stop_the_server() {
    let addr = start(10).await;
    let mut staying = connect(addr).await;
    request(&mut staying, &["CLIENT", "SETNAME", "staying"]).await;

    let mut requests = Vec::new();
    for i in 0..200 {
        requests.extend(command(&["SET", &format!("key-{i}"), "value"]).serialize());
        requests.extend(command(&["GET", &format!("key-{i}")]).serialize());
    }

    let mut resetting = TcpStream::connect(addr).await.unwrap();
    resetting.set_linger(Some(Duration::ZERO)).unwrap();
    resetting.write_all(&requests).await.unwrap();
    // Closing with a zero linger resets the connection, so replies still in flight fail to write.
    drop(resetting);

    assert_eq!(request(&mut staying, &["SET", "after", "reset"]).await, ok());
    assert_eq!(request(&mut staying, &["GET", "after"]).await, bulk("reset"));

    let mut remaining = HashSet::new();
    for _ in 0..50 {
        remaining = names(request(&mut staying, &["CLIENT", "LIST"]).await);
        if remaining.len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, HashSet::from(["staying".to_string()]));
}
