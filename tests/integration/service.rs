use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use serde_json::json;

use fsgraph::graph::{NodeId, Variant};
use fsgraph::net;
use fsgraph::service::{self, handle, Request, Response};
use fsgraph::watcher::ChangeEvent;

use crate::helpers::{node_at, TestTree};

/// Test 1: Calls through the service loop reach the graph.
#[test]
fn test_call_through_service() {
    let tree = TestTree::scenario();
    let fs = Arc::new(tree.mount());
    let (svc, thread) = service::spawn(fs.clone(), 8).unwrap();

    let response = svc
        .call(Request::Call {
            node: fs.root(),
            method: "CreateDirectory".to_string(),
            args: vec![Variant::String("sub".to_string())],
        })
        .unwrap();
    assert!(response.is_good(), "{:?}", response);
    let outputs = response.outputs().unwrap();
    assert_eq!(outputs[0], Variant::Boolean(true));
    assert_eq!(outputs[1], Variant::NodeId(node_at(&fs, "sub")));

    svc.shutdown();
    thread.join().unwrap();
    assert!(svc.call(Request::Status).is_err());
}

/// Test 2: Failed structural calls carry a false success flag and a status code.
#[test]
fn test_structural_failure_reports_false() {
    let tree = TestTree::scenario();
    let fs = tree.mount();

    let response = handle(
        &fs,
        Request::Call {
            node: fs.root(),
            method: "Delete".to_string(),
            args: vec![Variant::String("missing".to_string())],
        },
    );
    assert_eq!(response.status, "BadNotFound");
    assert_eq!(response.outputs().unwrap(), vec![Variant::Boolean(false)]);

    let response = handle(
        &fs,
        Request::Call {
            node: fs.root(),
            method: "CreateDirectory".to_string(),
            args: vec![Variant::String("docs".to_string())],
        },
    );
    assert!(!response.is_good());
    assert_eq!(response.outputs().unwrap(), vec![Variant::Boolean(false)]);
}

/// Test 3: Methods that do not belong to a node are refused by status.
#[test]
fn test_method_not_on_node() {
    let tree = TestTree::scenario();
    let fs = tree.mount();
    let docs = node_at(&fs, "docs");

    let response = handle(
        &fs,
        Request::Call {
            node: docs,
            method: "Open".to_string(),
            args: vec![Variant::Byte(1)],
        },
    );
    assert_eq!(response.status, "BadMethodInvalid");
    assert!(response.outputs().unwrap().is_empty());

    let response = handle(
        &fs,
        Request::Browse {
            node: NodeId::new(2, 424_242),
        },
    );
    assert_eq!(response.status, "BadNotFound");
}

/// Test 4: Requests decode from their JSON wire form.
#[test]
fn test_request_wire_format() {
    let request: Request = serde_json::from_value(json!({
        "op": "call",
        "node": "ns=2;i=1001",
        "method": "Read",
        "args": [
            { "type": "UInt32", "value": 3 },
            { "type": "Int32", "value": 16 }
        ]
    }))
    .unwrap();
    match request {
        Request::Call { node, method, args } => {
            assert_eq!(node, NodeId::new(2, 1001));
            assert_eq!(method, "Read");
            assert_eq!(args, vec![Variant::UInt32(3), Variant::Int32(16)]);
        }
        other => panic!("decoded as {:?}", other),
    }

    let request: Request = serde_json::from_value(json!({ "op": "status" })).unwrap();
    assert!(matches!(request, Request::Status));
    assert!(serde_json::from_value::<Request>(json!({ "op": "browse", "node": "bogus" })).is_err());
}

/// Test 5: Change events and calls share one queue and are applied in order.
#[test]
fn test_events_applied_before_later_calls() {
    let tree = TestTree::scenario();
    let fs = Arc::new(tree.mount());
    let (svc, thread) = service::spawn(fs.clone(), 4).unwrap();

    for i in 0..10 {
        let name = format!("f{}.txt", i);
        tree.write(&format!("empty/{}", name), "x");
        svc.notify(ChangeEvent::Created(fs.root_dir.join("empty").join(&name)))
            .unwrap();
    }
    let response = svc
        .call(Request::Translate {
            path: "empty/f9.txt".to_string(),
        })
        .unwrap();
    assert!(response.is_good());
    assert_eq!(fs.space.children(node_at(&fs, "empty")).len(), 10);

    svc.shutdown();
    thread.join().unwrap();
}

/// Test 6: The TCP front end answers one JSON line per request line.
#[test]
fn test_tcp_round_trip() {
    let tree = TestTree::scenario();
    let fs = Arc::new(tree.mount());
    let (svc, _thread) = service::spawn(fs.clone(), 8).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || net::serve(listener, svc));

    let stream = TcpStream::connect(addr).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;
    let mut exchange = |line: &str| -> Response {
        writer.write_all(line.as_bytes()).unwrap();
        writer.write_all(b"\n").unwrap();
        let mut reply = String::new();
        reader.read_line(&mut reply).unwrap();
        serde_json::from_str(&reply).unwrap()
    };

    let response = exchange(r#"{"op":"translate","path":"docs"}"#);
    assert!(response.is_good());
    let docs: NodeId = serde_json::from_value(response.result["node"].clone()).unwrap();
    assert_eq!(docs, node_at(&fs, "docs"));

    let response = exchange(&format!(r#"{{"op":"browse","node":"{}"}}"#, docs));
    assert!(response.is_good());
    assert_eq!(response.result[0]["name"], "readme.txt");
    assert_eq!(response.result[0]["size"], 5);

    let response = exchange("not json");
    assert_eq!(response.status, "BadDecodingError");

    let response = exchange(r#"{"op":"status"}"#);
    assert!(response.is_good());
    assert_eq!(response.result["root_node"], fs.root().to_string());
}

/// Test 7: Outputs are only decoded from call results.
#[test]
fn test_outputs_decode_error() {
    let tree = TestTree::scenario();
    let fs = tree.mount();

    let response = handle(&fs, Request::Status);
    assert!(response.is_good());
    assert!(response.outputs().is_err());
}
