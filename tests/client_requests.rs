mod common;

use std::sync::Arc;
use std::time::Duration;

use coap_dtls::transport::TransportError;
use coap_dtls::{ClientError, EncodingError, Method, Request, RequestError};
use coap_lite::{CoapOption, MessageClass, MessageType, RequestType, ResponseType};

use common::{connect, config};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn get_returns_code_and_body() {
    let (client, _conn, peer) = connect(config());

    let server = tokio::spawn(async move {
        let req = peer.recv().await;
        assert_eq!(req.header.get_type(), MessageType::Confirmable);
        assert_eq!(common::method(&req), Some(RequestType::Get));
        assert_eq!(common::path(&req), "/hello");
        assert_eq!(req.get_token().len(), 8);
        peer.reply(&req, ResponseType::Content, b"world").await;
        peer
    });

    let res = client.get("/hello", WAIT).await.unwrap();
    assert_eq!(res.code, "2.05");
    assert_eq!(res.body, b"world".to_vec());
    assert!(res.is_success());
    server.await.unwrap();
}

#[tokio::test]
async fn unregistered_response_code_completes_the_request() {
    let (client, _conn, peer) = connect(config());

    let server = tokio::spawn(async move {
        let req = peer.recv().await;
        let mut res = common::piggybacked(&req, ResponseType::Content, b"odd");
        res.header.code = MessageClass::from(0x4a);
        peer.send(&res).await;
        assert!(peer.try_recv_within(Duration::from_millis(100)).await.is_none());
        peer
    });

    let res = client.get("/odd", WAIT).await.unwrap();
    assert_eq!(res.code, "2.10");
    assert_eq!(res.body, b"odd".to_vec());
    server.await.unwrap();
}

#[tokio::test]
async fn put_sends_content_format_and_payload() {
    let (client, _conn, peer) = connect(config());

    let server = tokio::spawn(async move {
        let req = peer.recv().await;
        assert_eq!(common::method(&req), Some(RequestType::Put));
        assert_eq!(common::path(&req), "/.u/desired");
        assert_eq!(common::uint_option(&req, CoapOption::ContentFormat), Some(50));
        assert_eq!(req.payload, br#"{"on":true}"#.to_vec());
        peer.reply(&req, ResponseType::Changed, b"").await;
        peer
    });

    let res = client
        .put("/.u/desired", "application/json", br#"{"on":true}"#.to_vec(), WAIT)
        .await
        .unwrap();
    assert_eq!(res.code, "2.04");
    assert!(res.body.is_empty());
    server.await.unwrap();
}

#[tokio::test]
async fn post_splits_path_and_query() {
    let (client, _conn, peer) = connect(config());

    let server = tokio::spawn(async move {
        let req = peer.recv().await;
        assert_eq!(common::method(&req), Some(RequestType::Post));
        assert_eq!(common::path(&req), "/.s");
        assert_eq!(common::queries(&req), vec!["x=1", "y=2"]);
        assert_eq!(common::uint_option(&req, CoapOption::ContentFormat), Some(0));
        peer.reply(&req, ResponseType::Created, b"ok").await;
        peer
    });

    let res = client
        .post("/.s?x=1&y=2", " Text/Plain ", "hi", WAIT)
        .await
        .unwrap();
    assert_eq!(res.code, "2.01");
    assert_eq!(res.body, b"ok".to_vec());
    server.await.unwrap();
}

#[tokio::test]
async fn delete_reports_deleted() {
    let (client, _conn, peer) = connect(config());

    let server = tokio::spawn(async move {
        let req = peer.recv().await;
        assert_eq!(common::method(&req), Some(RequestType::Delete));
        assert!(req.payload.is_empty());
        peer.reply(&req, ResponseType::Deleted, b"").await;
        peer
    });

    let res = client.delete("/things/1", WAIT).await.unwrap();
    assert_eq!(res.code, "2.02");
    server.await.unwrap();
}

#[tokio::test]
async fn error_response_keeps_code_and_diagnostic_body() {
    let (client, _conn, peer) = connect(config());

    let server = tokio::spawn(async move {
        let req = peer.recv().await;
        peer.reply(&req, ResponseType::NotFound, b"no such resource").await;
        peer
    });

    let res = client.get("/missing", WAIT).await.unwrap();
    assert_eq!(res.code, "4.04");
    assert!(!res.is_success());
    assert_eq!(res.body, b"no such resource".to_vec());
    server.await.unwrap();
}

#[tokio::test]
async fn unknown_media_type_sends_nothing() {
    let (client, _conn, peer) = connect(config());

    let err = client
        .post("/.s", "application/x-made-up", "{}", WAIT)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Encoding(EncodingError::UnknownMediaType(ref name)) if name == "application/x-made-up"
    ));

    assert!(peer.try_recv_within(Duration::from_millis(50)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn request_times_out_when_server_is_silent() {
    let (client, _conn, peer) = connect(config());

    let err = client.get("/slow", Duration::from_secs(2)).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Request(RequestError::Timeout(d)) if d == Duration::from_secs(2)
    ));

    // the request was sent once and never retried
    assert!(peer.try_recv_within(Duration::ZERO).await.is_some());
    assert!(peer.try_recv_within(Duration::from_secs(10)).await.is_none());
}

#[tokio::test]
async fn reset_fails_the_request() {
    let (client, _conn, peer) = connect(config());

    let server = tokio::spawn(async move {
        let req = peer.recv().await;
        peer.send(&common::empty(MessageType::Reset, req.header.message_id))
            .await;
        peer
    });

    let err = client.get("/hello", WAIT).await.unwrap_err();
    assert!(matches!(err, ClientError::Request(RequestError::Reset)));
    server.await.unwrap();
}

#[tokio::test]
async fn separate_response_is_matched_by_token_and_acknowledged() {
    let (client, _conn, peer) = connect(config());

    let server = tokio::spawn(async move {
        let req = peer.recv().await;
        peer.send(&common::empty(
            MessageType::Acknowledgement,
            req.header.message_id,
        ))
        .await;

        let mut later = common::piggybacked(&req, ResponseType::Content, b"eventually");
        later.header.set_type(MessageType::Confirmable);
        later.header.message_id = req.header.message_id.wrapping_add(1000);
        peer.send(&later).await;

        let ack = peer.recv().await;
        assert_eq!(ack.header.get_type(), MessageType::Acknowledgement);
        assert_eq!(ack.header.message_id, later.header.message_id);
        peer
    });

    let res = client.get("/slow", WAIT).await.unwrap();
    assert_eq!(res.body, b"eventually".to_vec());
    server.await.unwrap();
}

#[tokio::test]
async fn concurrent_requests_answered_out_of_order() {
    let (client, _conn, peer) = connect(config());
    let client = Arc::new(client);

    let server = tokio::spawn(async move {
        let first = peer.recv().await;
        let second = peer.recv().await;
        for req in [&second, &first] {
            let body = common::path(req).into_bytes();
            peer.reply(req, ResponseType::Content, &body).await;
        }
        peer
    });

    let a = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.get("/a", WAIT).await })
    };
    let b = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.get("/b", WAIT).await })
    };

    assert_eq!(a.await.unwrap().unwrap().body, b"/a".to_vec());
    assert_eq!(b.await.unwrap().unwrap().body, b"/b".to_vec());
    server.await.unwrap();
}

#[tokio::test]
async fn request_value_carries_everything() {
    let (client, _conn, peer) = connect(config());

    let server = tokio::spawn(async move {
        let req = peer.recv().await;
        assert_eq!(common::uint_option(&req, CoapOption::ContentFormat), Some(60));
        assert_eq!(req.payload, vec![0xa1, 0x01, 0x02]);
        peer.reply(&req, ResponseType::Changed, b"").await;
        peer
    });

    let request = Request::new(Method::Put, "/cbor", WAIT)
        .with_payload("application/cbor", vec![0xa1, 0x01, 0x02]);
    let res = client.request(request).await.unwrap();
    assert_eq!(res.code, "2.04");
    server.await.unwrap();
}

#[tokio::test]
async fn unsolicited_confirmable_response_is_reset() {
    let (client, _conn, peer) = connect(config());

    let stray = common::notification(b"deadbeef", MessageType::Confirmable, 77, 5, b"?");
    peer.send(&stray).await;

    let rst = peer.recv().await;
    assert_eq!(rst.header.get_type(), MessageType::Reset);
    assert_eq!(rst.header.message_id, 77);
    drop(client);
}

#[tokio::test]
async fn requests_fail_once_the_connection_is_gone() {
    let (client, _conn, peer) = connect(config());
    drop(peer);

    let err = client.get("/hello", WAIT).await.unwrap_err();
    assert!(matches!(err, ClientError::Io(_)));
}

#[tokio::test]
async fn requests_after_close_fail_with_closed() {
    let (client, conn, _peer) = connect(config());
    client.close().await.unwrap();

    assert!(conn.is_closed());
    assert!(matches!(
        client.get("/hello", WAIT).await.unwrap_err(),
        ClientError::Closed
    ));
    assert!(matches!(
        client.post("/.s", "unknown/type", "x", WAIT).await.unwrap_err(),
        ClientError::Closed
    ));
}

#[tokio::test]
async fn pending_request_fails_when_client_closes() {
    let (client, _conn, peer) = connect(config());
    let client = Arc::new(client);

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.get("/never", WAIT).await })
    };
    // the request is on the wire before close starts
    let _req = peer.recv().await;

    client.close().await.unwrap();
    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::Io(TransportError::Closed)));
}
