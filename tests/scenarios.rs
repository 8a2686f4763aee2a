//! The six concrete end-to-end scenarios: real UDP/TCP sockets feeding a
//! running `Server`, asserting on what the capturing sink receives.

mod common;

use std::time::Duration;

use common::{send_tcp, send_udp, start_server, value_of, wait_for_batch};

#[tokio::test]
async fn counter_aggregation_over_udp() {
    let (server, _handle, batches) =
        start_server(&[19125], &[], Duration::from_millis(200)).await;

    for _ in 0..3 {
        send_udp(19125, "event:1|c").await;
    }

    let batch = wait_for_batch(&batches, Duration::from_secs(2))
        .await
        .expect("expected at least one non-empty flush");
    assert_eq!(value_of(&batch, "event"), Some(3.0));

    server.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn timer_five_way_expansion_over_udp() {
    let (server, _handle, batches) =
        start_server(&[19126], &[], Duration::from_millis(200)).await;

    for v in [101, 102, 103] {
        send_udp(19126, &format!("process:{v}|ms")).await;
    }

    let batch = wait_for_batch(&batches, Duration::from_secs(2)).await.unwrap();
    assert_eq!(value_of(&batch, "process.count"), Some(3.0));
    assert_eq!(value_of(&batch, "process.min"), Some(101.0));
    assert_eq!(value_of(&batch, "process.max"), Some(103.0));
    assert_eq!(value_of(&batch, "process.mean"), Some(102.0));
    assert_eq!(value_of(&batch, "process.median"), Some(102.0));

    server.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn mixed_udp_and_tcp_combine_into_one_flush() {
    let (server, _handle, batches) =
        start_server(&[19127], &[19128], Duration::from_millis(300)).await;

    send_udp(19127, "event:1|c").await;
    send_udp(19127, "event:1|c").await;
    send_udp(19127, "process:85|ms").await;
    send_udp(19127, "process:98|ms").await;

    send_tcp(19128, "event:1|c\nevent:1|c\nprocess:87|ms\nquery:2|ms").await;

    let batch = wait_for_batch(&batches, Duration::from_secs(2)).await.unwrap();
    assert_eq!(value_of(&batch, "event"), Some(4.0));
    assert_eq!(value_of(&batch, "process.count"), Some(3.0));
    assert_eq!(value_of(&batch, "process.min"), Some(85.0));
    assert_eq!(value_of(&batch, "process.max"), Some(98.0));
    assert_eq!(value_of(&batch, "process.mean"), Some(90.0));
    assert_eq!(value_of(&batch, "process.median"), Some(87.0));
    assert_eq!(value_of(&batch, "query.count"), Some(1.0));
    assert_eq!(value_of(&batch, "query.min"), Some(2.0));
    assert_eq!(value_of(&batch, "query.max"), Some(2.0));
    assert_eq!(value_of(&batch, "query.mean"), Some(2.0));
    assert_eq!(value_of(&batch, "query.median"), Some(2.0));

    server.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn gauge_delta_then_absolute_over_udp() {
    let (server, _handle, batches) =
        start_server(&[19129], &[], Duration::from_millis(200)).await;

    for line in ["temp:+5|g", "temp:+3|g", "temp:20|g", "temp:-4|g"] {
        send_udp(19129, line).await;
    }

    let batch = wait_for_batch(&batches, Duration::from_secs(2)).await.unwrap();
    assert_eq!(value_of(&batch, "temp"), Some(16.0));

    server.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn set_cardinality_over_udp() {
    let (server, _handle, batches) =
        start_server(&[19130], &[], Duration::from_millis(200)).await;

    for member in ["alice", "bob", "alice"] {
        send_udp(19130, &format!("users:{member}|s")).await;
    }

    let batch = wait_for_batch(&batches, Duration::from_secs(2)).await.unwrap();
    assert_eq!(value_of(&batch, "users"), Some(2.0));

    server.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn tcp_long_line_framing_with_trailing_residual() {
    let (server, _handle, batches) =
        start_server(&[], &[19131], Duration::from_millis(300)).await;

    let mut payload = "m:1|c\n".repeat(500);
    payload.push_str("query:2|ms"); // no trailing newline

    send_tcp(19131, &payload).await;

    let batch = wait_for_batch(&batches, Duration::from_secs(2)).await.unwrap();
    assert_eq!(value_of(&batch, "m"), Some(500.0));
    assert_eq!(value_of(&batch, "query.count"), Some(1.0));

    server.shutdown(Duration::from_secs(5)).await.unwrap();
}
