//! Device link tests against a loopback fake reader.
//!
//! Tests:
//! - Version handshake (accepted, rejected, timed out)
//! - Command frames reaching the reader
//! - Reader task forwarding responses and link failures
//! - Command writes bounded when the reader stops draining its socket

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use rfidhub_devices::{
    CodecError, DeviceCommand, DeviceError, DeviceEvent, DeviceLink, DeviceResponse, DeviceWriter,
};

const SHORT: Duration = Duration::from_millis(500);

/// Helper to start a fake reader; returns its address and the accepted stream.
async fn fake_reader() -> (String, tokio::task::JoinHandle<BufReader<TcpStream>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let accept = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        BufReader::new(stream)
    });
    (addr, accept)
}

/// Helper to read one CR-terminated request on the fake reader side.
async fn read_request(stream: &mut BufReader<TcpStream>) -> String {
    let mut buf = Vec::new();
    stream.read_until(b'\r', &mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn test_handshake_and_scan_events() {
    let (addr, accept) = fake_reader().await;

    let device = tokio::spawn(async move {
        let mut stream = accept.await.unwrap();
        assert_eq!(read_request(&mut stream).await, "VER2.00\r");
        stream.get_mut().write_all(b"OK\r").await.unwrap();

        assert_eq!(read_request(&mut stream).await, "BEG\r");
        stream.get_mut().write_all(b"OK\r").await.unwrap();
        stream.get_mut().write_all(b"OK|10A1|E004\r").await.unwrap();

        assert_eq!(read_request(&mut stream).await, "ACT|E004\r");
        stream
    });

    let (mut writer, reader) = DeviceLink::connect(&addr, SHORT, SHORT).await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let reader_task = reader.spawn(tx);

    writer.send(&DeviceCommand::BeginScan).await.unwrap();
    match rx.recv().await.unwrap() {
        DeviceEvent::Response(resp) => assert_eq!(resp, DeviceResponse::ok()),
        other => panic!("unexpected event: {:?}", other),
    }
    match rx.recv().await.unwrap() {
        DeviceEvent::Response(resp) => {
            assert_eq!(resp, DeviceResponse::scan(true, "10A1", Some("E004")))
        }
        other => panic!("unexpected event: {:?}", other),
    }

    writer
        .send(&DeviceCommand::AlarmOn {
            tag: Some("E004".to_string()),
        })
        .await
        .unwrap();

    // Closing the reader side surfaces as a link failure
    drop(device.await.unwrap());
    match rx.recv().await.unwrap() {
        DeviceEvent::LinkFailed(DeviceError::Closed) => {}
        other => panic!("unexpected event: {:?}", other),
    }
    reader_task.await.unwrap();
}

#[tokio::test]
async fn test_handshake_rejected() {
    let (addr, accept) = fake_reader().await;
    tokio::spawn(async move {
        let mut stream = accept.await.unwrap();
        read_request(&mut stream).await;
        stream.get_mut().write_all(b"NOK\r").await.unwrap();
        // Keep the socket open until the client gives up
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let result = DeviceLink::connect(&addr, SHORT, SHORT).await;
    assert!(matches!(result, Err(DeviceError::HandshakeRejected)));
}

#[tokio::test]
async fn test_handshake_timeout() {
    let (addr, accept) = fake_reader().await;
    tokio::spawn(async move {
        let _stream = accept.await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let result = DeviceLink::connect(&addr, SHORT, Duration::from_millis(100)).await;
    assert!(matches!(result, Err(DeviceError::HandshakeTimeout)));
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let result = DeviceLink::connect(&addr, SHORT, SHORT).await;
    assert!(matches!(
        result,
        Err(DeviceError::Connect { .. }) | Err(DeviceError::ConnectTimeout(_))
    ));
}

#[tokio::test]
async fn test_malformed_frame_fails_link() {
    let (addr, accept) = fake_reader().await;
    tokio::spawn(async move {
        let mut stream = accept.await.unwrap();
        read_request(&mut stream).await;
        stream.get_mut().write_all(b"OK\r").await.unwrap();
        stream.get_mut().write_all(b"GARBAGE\r").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let (_writer, reader) = DeviceLink::connect(&addr, SHORT, SHORT).await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    reader.spawn(tx);

    match rx.recv().await.unwrap() {
        DeviceEvent::LinkFailed(DeviceError::Malformed(CodecError::UnknownStatus(status))) => {
            assert_eq!(status, "GARBAGE")
        }
        other => panic!("unexpected event: {:?}", other),
    }
    // Nothing follows a link failure
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_stalled_reader_times_out_write() {
    let (addr, accept) = fake_reader().await;
    tokio::spawn(async move {
        let mut stream = accept.await.unwrap();
        read_request(&mut stream).await;
        stream.get_mut().write_all(b"OK\r").await.unwrap();
        // Stop reading so the socket buffers fill up
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let (mut writer, _reader) = DeviceLink::connect(&addr, SHORT, Duration::from_millis(300))
        .await
        .unwrap();

    // Larger than any loopback socket buffer
    let command = DeviceCommand::Write {
        barcode: "x".repeat(64 * 1024 * 1024),
    };
    let result = tokio::time::timeout(Duration::from_secs(3), writer.send(&command))
        .await
        .expect("write gave up before the outer deadline");
    assert!(matches!(result, Err(DeviceError::WriteTimeout(_))));
}
