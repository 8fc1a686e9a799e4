use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use cqlmux::errors::{NewClusterError, RequestError};
use cqlmux::frame::request::query::Query;
use cqlmux::frame::response::{result, Response};
use cqlmux::policies::reconnection::ConstantReconnectionPolicy;
use cqlmux::{Cluster, ClusterBuilder};
use futures::future::join_all;

use crate::utils::{eventually, setup_tracing, FakeNode, DATA_CENTER, DISCONNECT_QUERY};

fn query(cql: &str) -> Query<'static> {
    Query {
        contents: cql.to_owned().into(),
        parameters: Default::default(),
    }
}

async fn connect(node: &FakeNode) -> Cluster {
    ClusterBuilder::new()
        .known_node("127.0.0.1")
        .port(node.port)
        .connection_timeout(Duration::from_secs(2))
        .reconnection_policy(Arc::new(ConstantReconnectionPolicy::new(
            Duration::from_millis(50),
        )))
        .connect()
        .await
        .unwrap()
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn connects_over_tcp() {
    setup_tracing();
    let node = FakeNode::start().await;
    let cluster = connect(&node).await;

    let channel = cluster.pool().select().unwrap();
    assert_eq!(channel.host(), "127.0.0.1");
    assert_eq!(channel.port(), node.port);
    assert_eq!(channel.host_id(), Some(node.host_id));
    assert_eq!(channel.data_center().as_deref(), Some(DATA_CENTER));

    let response = cluster.submit(&query("SELECT now() FROM ks.t")).await;
    assert_matches!(response, Ok(Response::Result(_)));
    cluster.close();
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn more_requests_than_stream_ids() {
    setup_tracing();
    let node = FakeNode::start().await;
    let cluster = connect(&node).await;

    let statement = query("INSERT INTO ks.t (a) VALUES (1)");
    let responses = join_all((0..300).map(|_| cluster.submit(&statement))).await;
    assert_eq!(responses.len(), 300);
    for response in responses {
        assert_matches!(response, Ok(Response::Result(result::Result::Void)));
    }

    let channel = cluster.pool().select().unwrap();
    assert_eq!(channel.free_stream_ids(), 128);
    assert_eq!(channel.queued_requests(), 0);
    cluster.close();
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn lost_connection_is_restored() {
    setup_tracing();
    let node = FakeNode::start().await;
    let cluster = connect(&node).await;
    let lost = cluster.pool().select().unwrap();

    let response = cluster.submit(&query(DISCONNECT_QUERY)).await;
    assert_matches!(response, Err(RequestError::Connection(_)));
    let _ = lost.closed().await;

    eventually(|| node.accepted_connections() >= 2 && cluster.pool().len() == 1).await;
    assert!(!cluster.pool().select().unwrap().is_closed());
    assert_matches!(
        cluster.submit(&query("SELECT * FROM ks.t")).await,
        Ok(Response::Result(_))
    );
    cluster.close();
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn nothing_listening_fails_to_connect() {
    setup_tracing();
    let node = FakeNode::start().await;
    let port = node.port;
    drop(node);
    // Let the aborted listener release the port.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = ClusterBuilder::new()
        .known_node("127.0.0.1")
        .port(port)
        .connect()
        .await;
    assert_matches!(result, Err(NewClusterError::Connect(_)));
}
