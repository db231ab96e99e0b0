use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{FsError, Result};
use crate::fs::FileSystem;
use crate::graph::{Method, NodeId, Variant};
use crate::watcher::ChangeEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Browse {
        node: NodeId,
    },
    Translate {
        path: String,
    },
    Call {
        node: NodeId,
        method: String,
        #[serde(default)]
        args: Vec<Variant>,
    },
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Value,
}

impl Response {
    pub fn good(result: Value) -> Self {
        Self {
            status: "Good".to_string(),
            message: None,
            result,
        }
    }

    pub fn error(err: &FsError, result: Value) -> Self {
        Self {
            status: err.status_code().to_string(),
            message: Some(err.to_string()),
            result,
        }
    }

    pub fn bad_request(message: String) -> Self {
        Self {
            status: "BadDecodingError".to_string(),
            message: Some(message),
            result: Value::Null,
        }
    }

    pub fn is_good(&self) -> bool {
        self.status == "Good"
    }

    /// Method outputs of a `call` response.
    pub fn outputs(&self) -> serde_json::Result<Vec<Variant>> {
        serde_json::from_value(self.result.clone())
    }
}

pub enum Message {
    Call {
        request: Request,
        reply: mpsc::Sender<Response>,
    },
    Change(ChangeEvent),
    Shutdown,
}

/// Cloneable entry point into the service loop.
#[derive(Clone)]
pub struct ServiceHandle {
    tx: SyncSender<Message>,
}

impl ServiceHandle {
    /// Submit `request` and wait for its response.
    pub fn call(&self, request: Request) -> Result<Response> {
        let (reply, rx) = mpsc::channel();
        self.tx
            .send(Message::Call { request, reply })
            .map_err(|_| FsError::ServiceStopped)?;
        rx.recv().map_err(|_| FsError::ServiceStopped)
    }

    /// Queue a change event. Blocks while the queue is full.
    pub fn notify(&self, event: ChangeEvent) -> Result<()> {
        self.tx
            .send(Message::Change(event))
            .map_err(|_| FsError::ServiceStopped)
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
    }
}

/// Start the service loop over `fs` with a queue of `capacity` messages.
/// Remote calls and watcher events share the queue and are applied in order
/// on one thread.
pub fn spawn(fs: Arc<FileSystem>, capacity: usize) -> Result<(ServiceHandle, JoinHandle<()>)> {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let thread = std::thread::Builder::new()
        .name("fsgraph-service".to_string())
        .spawn(move || run(&fs, rx))
        .map_err(|e| FsError::Config(format!("failed to spawn service thread: {}", e)))?;
    Ok((ServiceHandle { tx }, thread))
}

fn run(fs: &FileSystem, rx: Receiver<Message>) {
    info!("service loop started");
    for message in rx {
        match message {
            Message::Call { request, reply } => {
                let response = handle(fs, request);
                if reply.send(response).is_err() {
                    debug!("caller went away before its response was ready");
                }
            }
            Message::Change(event) => {
                if let Err(e) = fs.reconcile(&event) {
                    warn!("failed to reconcile {:?}: {}", event, e);
                }
            }
            Message::Shutdown => break,
        }
    }
    info!("service loop stopped");
}

/// Execute one request against `fs`.
pub fn handle(fs: &FileSystem, request: Request) -> Response {
    match request {
        Request::Browse { node } => match fs.browse(node) {
            Ok(entries) => Response::good(json!(entries)),
            Err(e) => Response::error(&e, Value::Null),
        },
        Request::Translate { path } => match fs.translate(&path) {
            Ok(node) => Response::good(json!({ "node": node })),
            Err(e) => Response::error(&e, Value::Null),
        },
        Request::Call { node, method, args } => match fs.call(node, &method, &args) {
            Ok(outputs) => Response::good(json!(outputs)),
            Err(e) => {
                warn!("{} on {} failed: {}", method, node, e);
                let flagged = method
                    .parse::<Method>()
                    .is_ok_and(|m| m.reports_success());
                let outputs = if flagged {
                    vec![Variant::Boolean(false)]
                } else {
                    Vec::new()
                };
                Response::error(&e, json!(outputs))
            }
        },
        Request::Status => Response::good(json!(fs.status())),
    }
}
