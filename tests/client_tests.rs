use std::net::Ipv4Addr;
use std::time::Duration;

use lan_miner_scan::client::{ClientOptions, MinerClient, MinerEndpoint};
use lan_miner_scan::ApiError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// In-process miner: answers each accepted connection with the next canned
/// reply and returns the requests it saw.
async fn fake_miner(replies: Vec<Vec<u8>>) -> (u16, JoinHandle<Vec<serde_json::Value>>) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for reply in replies {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            // The request has no terminator; read until it parses.
            let request = loop {
                let n = sock.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending a command");
                buf.extend_from_slice(&chunk[..n]);
                if let Ok(v) = serde_json::from_slice::<serde_json::Value>(&buf) {
                    break v;
                }
            };
            seen.push(request);
            sock.write_all(&reply).await.unwrap();
        }
        seen
    });
    (port, handle)
}

fn framed(json: &str) -> Vec<u8> {
    let mut v = json.as_bytes().to_vec();
    v.push(0);
    v
}

fn client(port: u16) -> MinerClient {
    MinerClient::with_options(
        MinerEndpoint::new("127.0.0.1", port),
        ClientOptions {
            connect_timeout: Duration::from_millis(500),
            read_timeout: Duration::from_millis(500),
        },
    )
}

const OK_STATUS: &str = r#"[{"STATUS":"S","When":1532052885,"Code":11,"Msg":"Summary","Description":"sgminer 4.4.2"}]"#;

#[tokio::test]
async fn summary_round_trip() {
    let reply = format!(
        r#"{{"STATUS":{OK_STATUS},"SUMMARY":[{{"Elapsed":100,"MHS av":1234.5,"Found Blocks":2,"Accepted":5,"Rejected":1}}],"id":1}}"#
    );
    let (port, miner) = fake_miner(vec![framed(&reply)]).await;

    let summary = client(port).summary().await.unwrap();
    assert_eq!(summary.accepted, 5);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.found_blocks, 2);
    assert_eq!(summary.mhs_av, 1234.5);

    let seen = miner.await.unwrap();
    assert_eq!(seen, vec![serde_json::json!({"command": "summary"})]);
}

#[tokio::test]
async fn each_call_uses_a_new_connection() {
    let devs = format!(
        r#"{{"STATUS":{OK_STATUS},"DEVS":[{{"GPU":0,"Temperature":61.5,"Enabled":"Y"}},{{"GPU":1,"Temperature":58.0}}],"id":1}}"#
    );
    let pools = format!(
        r#"{{"STATUS":{OK_STATUS},"POOLS":[{{"POOL":0,"URL":"stratum+tcp://pool.example:3333","User":"rig1","Status":"Alive"}}],"id":1}}"#
    );
    let (port, miner) = fake_miner(vec![framed(&devs), framed(&pools)]).await;
    let c = client(port);

    let d = c.devices().await.unwrap();
    assert_eq!(d.len(), 2);
    assert_eq!(d[0].temperature, 61.5);
    assert_eq!(d[1].gpu, 1);

    let p = c.pools().await.unwrap();
    assert_eq!(p.len(), 1);
    assert_eq!(p[0].url, "stratum+tcp://pool.example:3333");

    let seen = miner.await.unwrap();
    assert_eq!(seen[0], serde_json::json!({"command": "devs"}));
    assert_eq!(seen[1], serde_json::json!({"command": "pools"}));
}

#[tokio::test]
async fn add_pool_rejection_carries_code_and_description() {
    let reply = r#"{"STATUS":[{"STATUS":"E","When":1,"Code":25,"Msg":"","Description":"Invalid URL"}],"id":1}"#;
    let (port, miner) = fake_miner(vec![framed(reply)]).await;

    let err = client(port)
        .add_pool("stratum+tcp://p:3333", "worker", "x")
        .await
        .unwrap_err();
    match err {
        ApiError::Rejected { code, description } => {
            assert_eq!(code, 25);
            assert_eq!(description, "Invalid URL");
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    let seen = miner.await.unwrap();
    assert_eq!(
        seen[0],
        serde_json::json!({"command": "addpool", "parameter": "stratum+tcp://p:3333,worker,x"})
    );
}

#[tokio::test]
async fn add_pool_success() {
    let reply = r#"{"STATUS":[{"STATUS":"S","When":1,"Code":55,"Msg":"Added pool 2","Description":"cgminer"}],"id":1}"#;
    let (port, _miner) = fake_miner(vec![framed(reply)]).await;
    client(port).add_pool("u", "w", "p").await.unwrap();
}

#[tokio::test]
async fn pool_commands_send_the_pool_id() {
    let ack = framed(r#"{"STATUS":[{"STATUS":"S","Code":47,"Description":"ok","When":1}],"id":1}"#);
    let (port, miner) = fake_miner(vec![ack.clone(), ack.clone(), ack.clone(), ack.clone(), ack.clone(), ack]).await;
    let c = client(port);

    c.enable_pool(2).await.unwrap();
    c.disable_pool(2).await.unwrap();
    c.remove_pool(3).await.unwrap();
    c.switch_pool(0).await.unwrap();
    c.restart().await.unwrap();
    c.quit().await.unwrap();

    let seen = miner.await.unwrap();
    assert_eq!(
        seen,
        vec![
            serde_json::json!({"command": "enablepool", "parameter": "2"}),
            serde_json::json!({"command": "disablepool", "parameter": "2"}),
            serde_json::json!({"command": "removepool", "parameter": "3"}),
            serde_json::json!({"command": "switchpool", "parameter": "0"}),
            serde_json::json!({"command": "restart"}),
            serde_json::json!({"command": "quit"}),
        ]
    );
}

#[tokio::test]
async fn reply_without_terminator_is_read_to_eof() {
    let reply = r#"{"STATUS":[{"STATUS":"S","Code":33,"Description":"ok","When":1}],"CONFIG":[{"GPU Count":0,"ASC Count":4,"Pool Count":2,"Strategy":"Failover","OS":"Linux","Failover-Only":true}],"id":1}"#;
    let (port, _miner) = fake_miner(vec![reply.as_bytes().to_vec()]).await;

    let config = client(port).config().await.unwrap();
    assert_eq!(config.asc_count, 4);
    assert_eq!(config.strategy, "Failover");
    assert!(config.failover_only);
}

#[tokio::test]
async fn version_is_a_singleton() {
    let reply = r#"{"STATUS":[{"STATUS":"S","Code":22,"Description":"sgminer 4.4.2","When":1}],"VERSION":[{"CGMiner":"4.4.2","API":"3.4"}],"id":1}"#;
    let (port, _miner) = fake_miner(vec![framed(reply)]).await;
    let v = client(port).version().await.unwrap();
    assert_eq!(v.api, "3.4");
}

#[tokio::test]
async fn garbage_reply_is_decode_error() {
    let (port, _miner) = fake_miner(vec![framed("this is not json")]).await;
    let err = client(port).summary().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn closed_port_is_connect_error() {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = client(port).summary().await.unwrap_err();
    assert!(matches!(err, ApiError::Connect { .. }), "{err:?}");
}

#[tokio::test]
async fn silent_miner_times_out() {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let hold = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(sock);
    });

    let err = client(port).pools().await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout { .. }), "{err:?}");
    hold.abort();
}

#[tokio::test]
async fn empty_parameter_is_omitted() {
    let reply = framed(&format!(r#"{{"STATUS":{OK_STATUS},"SUMMARY":[{{}}],"id":1}}"#));
    let (port, miner) = fake_miner(vec![reply]).await;
    client(port).raw("summary", Some("")).await.unwrap();
    let seen = miner.await.unwrap();
    assert_eq!(seen, vec![serde_json::json!({"command": "summary"})]);
}

#[tokio::test]
async fn rig_without_devices_lists_none() {
    let reply = framed(&format!(r#"{{"STATUS":{OK_STATUS},"id":1}}"#));
    let (port, _miner) = fake_miner(vec![reply]).await;
    let devices = client(port).devices().await.unwrap();
    assert!(devices.is_empty());
}
