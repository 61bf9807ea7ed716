use std::{
    net::TcpListener,
    sync::{Arc, Mutex, MutexGuard},
    thread,
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::Sender;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info, warn};
use tungstenite::{Error as WsError, Message, accept};

use crate::{
    graph::Edge,
    protocol::{
        AddNodePayload, ConnectPayload, DisconnectPayload, ErrorPayload, GRAPH_ERROR,
        MoveNodePayload, NodeIdPayload, NodeUpdatePayload, PARSE_ERROR, SetValuePayload,
        WSMessage,
    },
    shader::uniform_bindings,
    snapshot::{Snapshot, Viewport},
    store::TextureGraph,
};

pub type SharedGraph = Arc<Mutex<TextureGraph>>;

const SERVER_PING_INTERVAL: Duration = Duration::from_secs(5);

fn spawn_server_ping_loop(hub: WsHub) {
    thread::spawn(move || {
        loop {
            if let Ok(text) = encode::<Value>("ping", None, None) {
                hub.broadcast(text);
            }
            thread::sleep(SERVER_PING_INTERVAL);
        }
    });
}

#[derive(Clone, Default)]
pub struct WsHub {
    clients: Arc<Mutex<Vec<Sender<String>>>>,
}

impl WsHub {
    pub fn broadcast(&self, text: String) {
        let Ok(mut clients) = self.clients.lock() else {
            return;
        };
        clients.retain(|tx| tx.send(text.clone()).is_ok());
    }

    fn register_client(&self, tx: Sender<String>) {
        if let Ok(mut clients) = self.clients.lock() {
            clients.push(tx);
        }
    }
}

/// Messages produced by one inbound message: `reply` goes back to the sender
/// only, `broadcast` to every connected client (sender included).
#[derive(Debug, Default)]
pub struct Outgoing {
    pub reply: Vec<String>,
    pub broadcast: Vec<String>,
}

impl Outgoing {
    fn reply(text: String) -> Self {
        Self {
            reply: vec![text],
            broadcast: Vec::new(),
        }
    }
}

pub fn spawn_ws_server(
    addr: &str,
    state: SharedGraph,
    hub: WsHub,
) -> Result<thread::JoinHandle<()>> {
    let addr_str = addr.to_string();
    let server =
        TcpListener::bind(addr).with_context(|| format!("failed to bind ws server at {addr}"))?;

    spawn_server_ping_loop(hub.clone());

    Ok(thread::spawn(move || {
        if let Err(e) = run_ws_server(server, &addr_str, state, hub) {
            warn!(error = ?e, "ws server failed");
        }
    }))
}

fn run_ws_server(server: TcpListener, addr: &str, state: SharedGraph, hub: WsHub) -> Result<()> {
    info!("listening on ws://{addr}");

    for stream in server.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "accept tcp failed");
                continue;
            }
        };

        let state = state.clone();
        let hub = hub.clone();

        thread::spawn(move || {
            if let Err(e) = handle_client(stream, state, hub) {
                debug!(error = ?e, "client ended");
            }
        });
    }

    Ok(())
}

fn handle_client(stream: std::net::TcpStream, state: SharedGraph, hub: WsHub) -> Result<()> {
    // Handshake is easier with a blocking socket, switch to non-blocking afterwards.
    let mut ws = accept(stream).context("websocket handshake failed")?;
    ws.get_mut()
        .set_nonblocking(true)
        .context("failed to set tcp non-blocking")?;

    let (client_tx, client_rx) = crossbeam_channel::unbounded::<String>();
    hub.register_client(client_tx);

    loop {
        while let Ok(text) = client_rx.try_recv() {
            let _ = ws.send(Message::Text(text));
        }

        match ws.read() {
            Ok(Message::Text(text)) => match handle_text_message(&state, &text) {
                Ok(out) => {
                    for text in out.reply {
                        let _ = ws.send(Message::Text(text));
                    }
                    for text in out.broadcast {
                        hub.broadcast(text);
                    }
                }
                Err(e) => warn!(error = ?e, "handle message error"),
            },
            Ok(Message::Binary(_)) => {}
            Ok(Message::Ping(payload)) => {
                let _ = ws.send(Message::Pong(payload));
            }
            Ok(Message::Pong(_)) => {}
            Ok(Message::Frame(_)) => {}
            Ok(Message::Close(_)) => break,
            Err(WsError::Io(ref io)) if io.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(WsError::AlreadyClosed) | Err(WsError::ConnectionClosed) => break,
            Err(e) => return Err(e).context("websocket read failed"),
        }

        thread::sleep(Duration::from_millis(5));
    }

    Ok(())
}

/// Apply one client message to the shared graph.
pub fn handle_text_message(state: &SharedGraph, text: &str) -> Result<Outgoing> {
    let msg: WSMessage<Value> = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            return Ok(Outgoing::reply(error_message(
                None,
                PARSE_ERROR,
                &format!("invalid json: {e}"),
            )?));
        }
    };
    let request_id = msg.request_id.clone();

    match msg.msg_type.as_str() {
        "ping" => Ok(Outgoing::reply(encode::<Value>("pong", request_id, None)?)),
        "pong" => Ok(Outgoing::default()),
        "snapshot_request" => {
            let snapshot = lock(state)?.snapshot();
            Ok(Outgoing::reply(encode("snapshot", request_id, Some(snapshot))?))
        }
        "snapshot_load" => {
            let snapshot: Snapshot = match payload(&msg) {
                Ok(s) => s,
                Err(out) => return Ok(out),
            };
            let mut graph = lock(state)?;
            let previous: Vec<String> = graph
                .graph()
                .nodes()
                .iter()
                .map(|n| n.id.clone())
                .collect();
            match graph.load_snapshot(&snapshot) {
                Ok(touched) => {
                    let dropped: Vec<String> = previous
                        .into_iter()
                        .filter(|id| !graph.graph().contains_node(id))
                        .collect();
                    let mut out = node_removals(&dropped)?;
                    out.broadcast.extend(node_updates(&graph, &touched)?.broadcast);
                    Ok(out)
                }
                Err(e) => Ok(Outgoing::reply(error_message(
                    request_id,
                    GRAPH_ERROR,
                    &format!("{e:#}"),
                )?)),
            }
        }
        "add_node" => {
            let p: AddNodePayload = match payload(&msg) {
                Ok(p) => p,
                Err(out) => return Ok(out),
            };
            let mut graph = lock(state)?;
            let id = p.id.unwrap_or_else(|| graph.allocate_node_id());
            let result = graph.add_node(&id, &p.node_type, p.position);
            mutation_result(&graph, request_id, result)
        }
        "remove_node" => {
            let p: NodeIdPayload = match payload(&msg) {
                Ok(p) => p,
                Err(out) => return Ok(out),
            };
            let mut graph = lock(state)?;
            match graph.remove_node(&p.id) {
                Ok(touched) => {
                    let mut out = node_removals(std::slice::from_ref(&p.id))?;
                    out.broadcast.extend(node_updates(&graph, &touched)?.broadcast);
                    Ok(out)
                }
                Err(e) => Ok(Outgoing::reply(error_message(
                    request_id,
                    GRAPH_ERROR,
                    &e.to_string(),
                )?)),
            }
        }
        "move_node" => {
            let p: MoveNodePayload = match payload(&msg) {
                Ok(p) => p,
                Err(out) => return Ok(out),
            };
            let mut graph = lock(state)?;
            match graph.move_node(&p.id, p.position) {
                Ok(()) => Ok(Outgoing {
                    reply: Vec::new(),
                    broadcast: vec![encode("node_moved", None, Some(p))?],
                }),
                Err(e) => Ok(Outgoing::reply(error_message(
                    request_id,
                    GRAPH_ERROR,
                    &e.to_string(),
                )?)),
            }
        }
        "set_viewport" => {
            let viewport: Viewport = match payload(&msg) {
                Ok(v) => v,
                Err(out) => return Ok(out),
            };
            lock(state)?.set_viewport(viewport);
            Ok(Outgoing::default())
        }
        "connect" => {
            let p: ConnectPayload = match payload(&msg) {
                Ok(p) => p,
                Err(out) => return Ok(out),
            };
            let mut edge = Edge::new(p.source, p.source_handle, p.target, p.target_handle);
            if let Some(id) = p.id {
                edge.id = id;
            }
            let mut graph = lock(state)?;
            let result = graph.connect(edge);
            mutation_result(&graph, request_id, result)
        }
        "disconnect" => {
            let p: DisconnectPayload = match payload(&msg) {
                Ok(p) => p,
                Err(out) => return Ok(out),
            };
            let mut graph = lock(state)?;
            let result = graph.disconnect(&p.edge_id);
            mutation_result(&graph, request_id, result)
        }
        "set_value" => {
            let p: SetValuePayload = match payload(&msg) {
                Ok(p) => p,
                Err(out) => return Ok(out),
            };
            let mut graph = lock(state)?;
            let result = graph.set_value(&p.node_id, p.index, p.value);
            mutation_result(&graph, request_id, result)
        }
        "node_request" => {
            let p: NodeIdPayload = match payload(&msg) {
                Ok(p) => p,
                Err(out) => return Ok(out),
            };
            let graph = lock(state)?;
            if !graph.graph().contains_node(&p.id) {
                return Ok(Outgoing::reply(error_message(
                    request_id,
                    GRAPH_ERROR,
                    &format!("node `{}` does not exist", p.id),
                )?));
            }
            Ok(Outgoing::reply(encode(
                "node_update",
                request_id,
                Some(node_update(&graph, &p.id)),
            )?))
        }
        other => Ok(Outgoing::reply(error_message(
            request_id,
            PARSE_ERROR,
            &format!("unknown message type: {other}"),
        )?)),
    }
}

fn lock(state: &SharedGraph) -> Result<MutexGuard<'_, TextureGraph>> {
    state.lock().map_err(|_| anyhow!("graph state lock poisoned"))
}

/// Decode the payload, or the error reply to send instead.
fn payload<T: DeserializeOwned>(msg: &WSMessage<Value>) -> std::result::Result<T, Outgoing> {
    let reject = |message: String| {
        match error_message(msg.request_id.clone(), PARSE_ERROR, &message) {
            Ok(text) => Outgoing::reply(text),
            Err(_) => Outgoing::default(),
        }
    };
    let Some(raw) = msg.payload.clone() else {
        return Err(reject(format!("`{}` is missing its payload", msg.msg_type)));
    };
    serde_json::from_value(raw)
        .map_err(|e| reject(format!("invalid `{}` payload: {e}", msg.msg_type)))
}

fn mutation_result<E: std::fmt::Display>(
    graph: &TextureGraph,
    request_id: Option<String>,
    result: std::result::Result<Vec<String>, E>,
) -> Result<Outgoing> {
    match result {
        Ok(touched) => node_updates(graph, &touched),
        Err(e) => Ok(Outgoing::reply(error_message(
            request_id,
            GRAPH_ERROR,
            &e.to_string(),
        )?)),
    }
}

fn node_updates(graph: &TextureGraph, touched: &[String]) -> Result<Outgoing> {
    let broadcast = touched
        .iter()
        .filter(|id| graph.graph().contains_node(id))
        .map(|id| encode("node_update", None, Some(node_update(graph, id))))
        .collect::<Result<Vec<_>>>()?;
    Ok(Outgoing {
        reply: Vec::new(),
        broadcast,
    })
}

fn node_removals(ids: &[String]) -> Result<Outgoing> {
    let broadcast = ids
        .iter()
        .map(|id| encode("node_removed", None, Some(NodeIdPayload { id: id.clone() })))
        .collect::<Result<Vec<_>>>()?;
    Ok(Outgoing {
        reply: Vec::new(),
        broadcast,
    })
}

pub fn node_update(graph: &TextureGraph, id: &str) -> NodeUpdatePayload {
    let definitions = graph.parameter_definitions(id).map(<[_]>::to_vec);
    let values = graph.values(id).ok().flatten();
    let uniforms = match (&definitions, &values) {
        (Some(defs), Some(values)) => match uniform_bindings(defs, values) {
            Ok(bindings) => Some(bindings),
            Err(e) => {
                warn!(node = %id, error = %e, "cannot bind uniforms");
                None
            }
        },
        _ => None,
    };
    NodeUpdatePayload {
        id: id.to_string(),
        template: graph.template(id).map(str::to_string),
        parameter_definitions: definitions,
        values,
        fragment_shader: graph.fragment_shader(id),
        uniforms,
    }
}

fn encode<T: Serialize>(
    msg_type: &str,
    request_id: Option<String>,
    payload: Option<T>,
) -> Result<String> {
    serde_json::to_string(&WSMessage::new(msg_type, request_id, payload))
        .with_context(|| format!("failed to encode `{msg_type}` message"))
}

fn error_message(request_id: Option<String>, code: &str, message: &str) -> Result<String> {
    encode(
        "error",
        request_id,
        Some(ErrorPayload {
            code: code.to_string(),
            message: message.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::catalog::load_default_catalog;

    fn state() -> SharedGraph {
        Arc::new(Mutex::new(TextureGraph::new(Arc::new(
            load_default_catalog().unwrap(),
        ))))
    }

    fn send(state: &SharedGraph, msg: Value) -> Outgoing {
        handle_text_message(state, &msg.to_string()).unwrap()
    }

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn ping_gets_pong_with_request_id() {
        let out = send(&state(), json!({"type": "ping", "timestamp": 0, "requestId": "r1"}));
        let reply = parse(&out.reply[0]);
        assert_eq!(reply["type"], "pong");
        assert_eq!(reply["requestId"], "r1");
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let out = handle_text_message(&state(), "{nope").unwrap();
        let reply = parse(&out.reply[0]);
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["payload"]["code"], PARSE_ERROR);
    }

    #[test]
    fn mutations_broadcast_node_updates() {
        let s = state();
        let out = send(
            &s,
            json!({"type": "add_node", "timestamp": 0, "payload": {"nodeType": "simplex"}}),
        );
        let update = parse(&out.broadcast[0]);
        assert_eq!(update["type"], "node_update");
        assert_eq!(update["payload"]["id"], "n1");
        assert!(update["payload"]["fragmentShader"].as_str().unwrap().contains("n1_seed"));

        send(
            &s,
            json!({"type": "add_node", "timestamp": 0, "payload": {"id": "inv", "nodeType": "invert"}}),
        );
        let out = send(
            &s,
            json!({"type": "connect", "timestamp": 0, "payload": {"source": "n1", "target": "inv", "targetHandle": "in"}}),
        );
        let update = parse(&out.broadcast[0]);
        assert_eq!(update["payload"]["id"], "inv");
        assert_eq!(update["payload"]["parameterDefinitions"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn graph_errors_are_reported_to_sender() {
        let s = state();
        let out = send(
            &s,
            json!({"type": "set_value", "timestamp": 0, "requestId": "x",
                   "payload": {"nodeId": "ghost", "index": 0, "value": {"type": "number", "value": 1}}}),
        );
        assert!(out.broadcast.is_empty());
        let reply = parse(&out.reply[0]);
        assert_eq!(reply["payload"]["code"], GRAPH_ERROR);
        assert_eq!(reply["requestId"], "x");
    }

    #[test]
    fn removed_nodes_are_announced() {
        let s = state();
        send(
            &s,
            json!({"type": "add_node", "timestamp": 0, "payload": {"id": "src", "nodeType": "simplex"}}),
        );
        send(
            &s,
            json!({"type": "add_node", "timestamp": 0, "payload": {"id": "inv", "nodeType": "invert"}}),
        );
        send(
            &s,
            json!({"type": "connect", "timestamp": 0, "payload": {"source": "src", "target": "inv", "targetHandle": "in"}}),
        );

        let out = send(
            &s,
            json!({"type": "remove_node", "timestamp": 0, "payload": {"id": "src"}}),
        );
        let messages: Vec<Value> = out.broadcast.iter().map(|t| parse(t)).collect();
        assert_eq!(messages[0]["type"], "node_removed");
        assert_eq!(messages[0]["payload"]["id"], "src");
        let inv = messages
            .iter()
            .find(|m| m["type"] == "node_update" && m["payload"]["id"] == "inv")
            .unwrap();
        assert!(inv["payload"].get("template").is_none());
    }

    #[test]
    fn snapshot_load_announces_dropped_nodes() {
        let s = state();
        send(
            &s,
            json!({"type": "add_node", "timestamp": 0, "payload": {"id": "old", "nodeType": "simplex"}}),
        );
        let out = send(
            &s,
            json!({"type": "snapshot_load", "timestamp": 0, "payload": {
                "nodes": [{"id": "fresh", "position": {"x": 0, "y": 0}}],
                "edges": [],
                "viewport": {"x": 0, "y": 0, "zoom": 1},
                "ownValues": [],
                "types": [["fresh", "solid_color"]]
            }}),
        );
        let messages: Vec<Value> = out.broadcast.iter().map(|t| parse(t)).collect();
        assert_eq!(messages[0]["type"], "node_removed");
        assert_eq!(messages[0]["payload"]["id"], "old");
        assert_eq!(messages[1]["type"], "node_update");
        assert_eq!(messages[1]["payload"]["id"], "fresh");
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn moves_and_viewport_show_up_in_snapshots() {
        let s = state();
        send(
            &s,
            json!({"type": "add_node", "timestamp": 0, "payload": {"id": "a", "nodeType": "simplex"}}),
        );
        let out = send(
            &s,
            json!({"type": "move_node", "timestamp": 0, "payload": {"id": "a", "position": {"x": 42.0, "y": -7.5}}}),
        );
        let moved = parse(&out.broadcast[0]);
        assert_eq!(moved["type"], "node_moved");
        assert_eq!(moved["payload"]["position"]["x"], 42.0);

        let out = send(
            &s,
            json!({"type": "set_viewport", "timestamp": 0, "payload": {"x": 5.0, "y": 6.0, "zoom": 2.0}}),
        );
        assert!(out.reply.is_empty() && out.broadcast.is_empty());

        let out = send(&s, json!({"type": "snapshot_request", "timestamp": 0}));
        let snapshot = parse(&out.reply[0]);
        assert_eq!(snapshot["payload"]["nodes"][0]["position"], json!({"x": 42.0, "y": -7.5}));
        assert_eq!(snapshot["payload"]["viewport"], json!({"x": 5.0, "y": 6.0, "zoom": 2.0}));

        let out = send(
            &s,
            json!({"type": "move_node", "timestamp": 0, "requestId": "m", "payload": {"id": "ghost", "position": {"x": 0, "y": 0}}}),
        );
        let reply = parse(&out.reply[0]);
        assert_eq!(reply["payload"]["code"], GRAPH_ERROR);
        assert!(out.broadcast.is_empty());
    }

    #[test]
    fn missing_payload_is_a_parse_error() {
        let out = send(&state(), json!({"type": "remove_node", "timestamp": 0}));
        let reply = parse(&out.reply[0]);
        assert_eq!(reply["payload"]["code"], PARSE_ERROR);
    }
}
