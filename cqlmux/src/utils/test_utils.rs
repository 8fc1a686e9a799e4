//! In-memory transports and a scripted cluster for unit tests.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use cqlmux_cql::frame::compression::{Compressor, Lz4Compressor, SnappyCompressor};
use cqlmux_cql::frame::request::options::{COMPRESSION, CQL_VERSION};
use cqlmux_cql::frame::request::{Request, RequestOpcode};
use cqlmux_cql::frame::response::ResponseOpcode;
use cqlmux_cql::frame::types;
use cqlmux_cql::frame::{FrameDecoder, FrameHeader, ProtocolVersion};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::cluster::discovery::PEERS_QUERY;
use crate::errors::TransportError;
use crate::network::handshake::LOCAL_QUERY;
use crate::network::reactor::{Reactor, Transport, TransportEvent, TransportHandle};

pub(crate) fn setup_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(tracing_subscriber::fmt::TestWriter::new())
        .try_init();
}

const TEXT: u16 = 0x000D;
const UUID: u16 = 0x000C;
const INET: u16 = 0x0010;

pub(crate) fn frame(
    version: ProtocolVersion,
    stream: i8,
    opcode: ResponseOpcode,
    body: &[u8],
) -> Vec<u8> {
    let mut data = Vec::with_capacity(8 + body.len());
    FrameHeader {
        version,
        is_response: true,
        flags: 0,
        stream,
        opcode: opcode as u8,
        length: body.len() as u32,
    }
    .write(&mut data);
    data.extend_from_slice(body);
    data
}

pub(crate) fn response_frame(stream: i8, opcode: ResponseOpcode, body: &[u8]) -> Vec<u8> {
    frame(ProtocolVersion::V2, stream, opcode, body)
}

pub(crate) fn void_body() -> Vec<u8> {
    let mut body = Vec::new();
    types::write_int(0x0001, &mut body);
    body
}

pub(crate) fn set_keyspace_body(keyspace: &str) -> Vec<u8> {
    let mut body = Vec::new();
    types::write_int(0x0003, &mut body);
    types::write_string(keyspace, &mut body).unwrap();
    body
}

pub(crate) fn error_body(code: i32, message: &str) -> Vec<u8> {
    let mut body = Vec::new();
    types::write_int(code, &mut body);
    types::write_string(message, &mut body).unwrap();
    body
}

pub(crate) fn event_body(event_type: &str, change: &str, addr: SocketAddr) -> Vec<u8> {
    let mut body = Vec::new();
    types::write_string(event_type, &mut body).unwrap();
    types::write_string(change, &mut body).unwrap();
    types::write_inet(addr, &mut body);
    body
}

pub(crate) fn event_body_status_up(addr: SocketAddr) -> Vec<u8> {
    event_body("STATUS_CHANGE", "UP", addr)
}

pub(crate) fn supported_body(compression: &[String]) -> Vec<u8> {
    let options = HashMap::from([
        (CQL_VERSION.to_owned(), vec!["3.0.0".to_owned()]),
        (COMPRESSION.to_owned(), compression.to_vec()),
    ]);
    let mut body = Vec::new();
    types::write_string_multimap(&options, &mut body).unwrap();
    body
}

fn token_body(token: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    types::write_bytes_opt(Some(token), &mut body).unwrap();
    body
}

pub(crate) fn authenticate_body(class: &str) -> Vec<u8> {
    let mut body = Vec::new();
    types::write_string(class, &mut body).unwrap();
    body
}

/// A ROWS result of `table` with the given columns, every cell present.
pub(crate) fn rows_body(table: &str, columns: &[(&str, u16)], rows: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let mut body = Vec::new();
    types::write_int(0x0002, &mut body);
    types::write_int(0x0001, &mut body);
    types::write_int(columns.len() as i32, &mut body);
    types::write_string("system", &mut body).unwrap();
    types::write_string(table, &mut body).unwrap();
    for (name, typ) in columns {
        types::write_string(name, &mut body).unwrap();
        types::write_short(*typ, &mut body);
    }
    types::write_int(rows.len() as i32, &mut body);
    for row in rows {
        for cell in row {
            types::write_bytes(cell, &mut body).unwrap();
        }
    }
    body
}

fn inet_cell(addr: IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(addr) => addr.octets().to_vec(),
        IpAddr::V6(addr) => addr.octets().to_vec(),
    }
}

pub(crate) fn local_body(data_center: &str, host_id: Uuid) -> Vec<u8> {
    rows_body(
        "local",
        &[("data_center", TEXT), ("host_id", UUID)],
        &[vec![data_center.as_bytes().to_vec(), host_id.as_bytes().to_vec()]],
    )
}

pub(crate) fn peers_body(peers: &[MockPeer]) -> Vec<u8> {
    let rows: Vec<_> = peers
        .iter()
        .map(|peer| {
            vec![
                inet_cell(peer.peer),
                peer.data_center.as_bytes().to_vec(),
                peer.host_id.as_bytes().to_vec(),
                inet_cell(peer.rpc_address),
            ]
        })
        .collect();
    rows_body(
        "peers",
        &[
            ("peer", INET),
            ("data_center", TEXT),
            ("host_id", UUID),
            ("rpc_address", INET),
        ],
        &rows,
    )
}

/// Transport that keeps everything written to it.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    written: Mutex<Vec<Bytes>>,
    closed: AtomicBool,
}

impl RecordingTransport {
    pub(crate) fn written(&self) -> Vec<Bytes> {
        self.written.lock().unwrap().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    fn write(&self, data: Bytes) {
        self.written.lock().unwrap().push(data);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// One row of a node's `system.peers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MockPeer {
    pub(crate) peer: IpAddr,
    pub(crate) data_center: String,
    pub(crate) host_id: Uuid,
    pub(crate) rpc_address: IpAddr,
}

#[derive(Debug, Clone)]
pub(crate) struct MockAuthentication {
    pub(crate) class: String,
    pub(crate) username: String,
    pub(crate) password: String,
    /// Scripted SASL exchange; the password is checked instead when empty.
    pub(crate) rounds: Vec<MockAuthRound>,
}

/// One AUTH_RESPONSE the node expects and how it answers it.
#[derive(Debug, Clone)]
pub(crate) struct MockAuthRound {
    pub(crate) expect: Vec<u8>,
    pub(crate) reply: MockAuthReply,
}

#[derive(Debug, Clone)]
pub(crate) enum MockAuthReply {
    Challenge(Vec<u8>),
    Success(Vec<u8>),
    Error(i32, String),
}

/// A scripted node. Hosts are IP addresses.
#[derive(Debug, Clone)]
pub(crate) struct MockNode {
    pub(crate) host: String,
    pub(crate) host_id: Uuid,
    pub(crate) data_center: String,
    /// Rows of `system.peers`; derived from the other nodes of the reactor when `None`.
    pub(crate) peers: Option<Vec<MockPeer>>,
    pub(crate) authentication: Option<MockAuthentication>,
    pub(crate) compression: Vec<String>,
    pub(crate) fail_peers_query: bool,
}

impl MockNode {
    pub(crate) fn new(host: &str, data_center: &str) -> Self {
        Self {
            host: host.to_owned(),
            host_id: Uuid::new_v4(),
            data_center: data_center.to_owned(),
            peers: None,
            authentication: None,
            compression: vec!["lz4".to_owned(), "snappy".to_owned()],
            fail_peers_query: false,
        }
    }

    pub(crate) fn with_peers(mut self, peers: Vec<MockPeer>) -> Self {
        self.peers = Some(peers);
        self
    }

    pub(crate) fn with_password_authentication(mut self, username: &str, password: &str) -> Self {
        self.authentication = Some(MockAuthentication {
            class: "org.apache.cassandra.auth.PasswordAuthenticator".to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
            rounds: Vec::new(),
        });
        self
    }

    pub(crate) fn with_sasl_exchange(mut self, class: &str, rounds: Vec<MockAuthRound>) -> Self {
        self.authentication = Some(MockAuthentication {
            class: class.to_owned(),
            username: String::new(),
            password: String::new(),
            rounds,
        });
        self
    }

    pub(crate) fn with_compression(mut self, compression: &[&str]) -> Self {
        self.compression = compression.iter().map(|&alg| alg.to_owned()).collect();
        self
    }

    fn as_peer(&self) -> MockPeer {
        let addr: IpAddr = self.host.parse().unwrap();
        MockPeer {
            peer: addr,
            data_center: self.data_center.clone(),
            host_id: self.host_id,
            rpc_address: addr,
        }
    }
}

#[derive(Debug)]
struct NodeEntry {
    node: MockNode,
    up: bool,
}

#[derive(Debug, Default)]
struct ClusterState {
    nodes: HashMap<String, NodeEntry>,
    connections: Vec<Arc<MockConnection>>,
    attempts: Vec<String>,
    startups: Vec<HashMap<String, String>>,
    queries: Vec<String>,
}

/// [`Reactor`] that connects to scripted in-memory nodes.
#[derive(Debug, Default)]
pub(crate) struct MockReactor {
    state: Arc<Mutex<ClusterState>>,
}

impl MockReactor {
    pub(crate) fn new(nodes: impl IntoIterator<Item = MockNode>) -> Arc<Self> {
        let reactor = Self::default();
        for node in nodes {
            reactor.add_node(node);
        }
        Arc::new(reactor)
    }

    pub(crate) fn add_node(&self, node: MockNode) {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(node.host.clone(), NodeEntry { node, up: true });
    }

    pub(crate) fn update_node(&self, host: &str, f: impl FnOnce(&mut MockNode)) {
        if let Some(entry) = self.state.lock().unwrap().nodes.get_mut(host) {
            f(&mut entry.node);
        }
    }

    /// Refuses new connections to `host` and breaks the open ones.
    pub(crate) fn set_down(&self, host: &str) {
        if let Some(entry) = self.state.lock().unwrap().nodes.get_mut(host) {
            entry.up = false;
        }
        self.kill_connections(host);
    }

    pub(crate) fn set_up(&self, host: &str) {
        if let Some(entry) = self.state.lock().unwrap().nodes.get_mut(host) {
            entry.up = true;
        }
    }

    /// Breaks every open connection to `host`, as a reset would.
    pub(crate) fn kill_connections(&self, host: &str) {
        let connections: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .connections
            .iter()
            .filter(|connection| connection.host == host)
            .cloned()
            .collect();
        for connection in connections {
            connection.kill();
        }
    }

    /// Pushes an EVENT frame on every open connection registered for events.
    /// Returns how many connections got it.
    pub(crate) fn push_event(&self, event_type: &str, change: &str, addr: SocketAddr) -> usize {
        let connections: Vec<_> = self.state.lock().unwrap().connections.clone();
        let body = event_body(event_type, change, addr);
        connections
            .iter()
            .filter(|connection| connection.push(ResponseOpcode::Event, &body))
            .count()
    }

    pub(crate) fn connection_attempts(&self, host: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .attempts
            .iter()
            .filter(|attempt| *attempt == host)
            .count()
    }

    pub(crate) fn open_connections(&self, host: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .connections
            .iter()
            .filter(|connection| connection.host == host && connection.is_open())
            .count()
    }

    /// Open connections to `host` that sent REGISTER.
    pub(crate) fn registered_connections(&self, host: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .connections
            .iter()
            .filter(|connection| connection.host == host && connection.is_registered())
            .count()
    }

    /// Options of every STARTUP received so far.
    pub(crate) fn startups(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().unwrap().startups.clone()
    }

    /// Every QUERY received so far, on any node.
    pub(crate) fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }
}

#[async_trait]
impl Reactor for MockReactor {
    async fn connect(
        &self,
        host: &str,
        _port: u16,
        _timeout: Duration,
    ) -> Result<TransportHandle, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.attempts.push(host.to_owned());
        if !state.nodes.get(host).is_some_and(|entry| entry.up) {
            return Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into());
        }

        let (events_sender, events) = mpsc::unbounded_channel();
        let connection = Arc::new(MockConnection {
            host: host.to_owned(),
            cluster: Arc::downgrade(&self.state),
            events: events_sender,
            state: Mutex::new(MockConnectionState {
                buffer: BytesMut::new(),
                decoder: FrameDecoder::for_requests(),
                version: None,
                compressor: None,
                registered: false,
                closed: false,
                auth_round: 0,
            }),
        });
        state.connections.push(connection.clone());

        Ok(TransportHandle {
            transport: connection,
            events,
        })
    }
}

struct MockConnectionState {
    buffer: BytesMut,
    decoder: FrameDecoder,
    version: Option<ProtocolVersion>,
    compressor: Option<Arc<dyn Compressor>>,
    registered: bool,
    closed: bool,
    auth_round: usize,
}

impl std::fmt::Debug for MockConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnectionState")
            .field("registered", &self.registered)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct MockConnection {
    host: String,
    cluster: std::sync::Weak<Mutex<ClusterState>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    state: Mutex<MockConnectionState>,
}

impl MockConnection {
    fn is_open(&self) -> bool {
        !self.state.lock().unwrap().closed
    }

    fn is_registered(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.registered && !state.closed
    }

    fn kill(&self) {
        let mut state = self.state.lock().unwrap();
        if std::mem::replace(&mut state.closed, true) {
            return;
        }
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        let _ = self.events.send(TransportEvent::Closed(Some(reset.into())));
    }

    fn push(&self, opcode: ResponseOpcode, body: &[u8]) -> bool {
        let state = self.state.lock().unwrap();
        if state.closed || !state.registered {
            return false;
        }
        let version = state.version.unwrap_or_default();
        let data = frame(version, -1, opcode, body);
        self.events.send(TransportEvent::Data(data.into())).is_ok()
    }

    fn node(&self) -> Option<(MockNode, Vec<MockPeer>)> {
        let cluster = self.cluster.upgrade()?;
        let cluster = cluster.lock().unwrap();
        let node = cluster.nodes.get(&self.host)?.node.clone();
        let peers = match &node.peers {
            Some(peers) => peers.clone(),
            None => cluster
                .nodes
                .values()
                .filter(|entry| entry.node.host != node.host)
                .map(|entry| entry.node.as_peer())
                .collect(),
        };
        Some((node, peers))
    }

    fn record(&self, f: impl FnOnce(&mut ClusterState)) {
        if let Some(cluster) = self.cluster.upgrade() {
            f(&mut cluster.lock().unwrap());
        }
    }

    fn respond(
        &self,
        state: &mut MockConnectionState,
        request: Request,
    ) -> (ResponseOpcode, Vec<u8>) {
        let Some((node, peers)) = self.node() else {
            return (ResponseOpcode::Error, error_body(0x0000, "Node is gone"));
        };
        let bad_credentials = || {
            (
                ResponseOpcode::Error,
                error_body(0x0100, "Username and/or password are incorrect"),
            )
        };

        match request {
            Request::Options(_) => (ResponseOpcode::Supported, supported_body(&node.compression)),
            Request::Startup(startup) => {
                let options: HashMap<String, String> = startup
                    .options
                    .into_iter()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                state.compressor = match options.get(COMPRESSION).map(String::as_str) {
                    Some("lz4") => Some(Arc::new(Lz4Compressor)),
                    Some("snappy") => Some(Arc::new(SnappyCompressor)),
                    _ => None,
                };
                self.record(|cluster| cluster.startups.push(options));
                match &node.authentication {
                    Some(auth) => (ResponseOpcode::Authenticate, authenticate_body(&auth.class)),
                    None => (ResponseOpcode::Ready, Vec::new()),
                }
            }
            Request::Credentials(credentials) => match &node.authentication {
                Some(auth)
                    if credentials.credentials.get("username") == Some(&auth.username)
                        && credentials.credentials.get("password") == Some(&auth.password) =>
                {
                    (ResponseOpcode::Ready, Vec::new())
                }
                _ => bad_credentials(),
            },
            Request::AuthResponse(response) => match &node.authentication {
                Some(auth) if !auth.rounds.is_empty() => {
                    let round = auth.rounds.get(state.auth_round);
                    state.auth_round += 1;
                    match round {
                        Some(round) if response.response.as_deref() == Some(&round.expect[..]) => {
                            match &round.reply {
                                MockAuthReply::Challenge(token) => {
                                    (ResponseOpcode::AuthChallenge, token_body(token))
                                }
                                MockAuthReply::Success(token) => {
                                    (ResponseOpcode::AuthSuccess, token_body(token))
                                }
                                MockAuthReply::Error(code, message) => {
                                    (ResponseOpcode::Error, error_body(*code, message))
                                }
                            }
                        }
                        _ => bad_credentials(),
                    }
                }
                Some(auth)
                    if response.response.as_deref()
                        == Some(format!("\0{}\0{}", auth.username, auth.password).as_bytes()) =>
                {
                    let mut body = Vec::new();
                    types::write_bytes_opt(None::<&[u8]>, &mut body).unwrap();
                    (ResponseOpcode::AuthSuccess, body)
                }
                _ => bad_credentials(),
            },
            Request::Register(_) => {
                state.registered = true;
                (ResponseOpcode::Ready, Vec::new())
            }
            Request::Query(query) => {
                let cql = query.contents.into_owned();
                self.record(|cluster| cluster.queries.push(cql.clone()));
                if cql == LOCAL_QUERY {
                    (ResponseOpcode::Result, local_body(&node.data_center, node.host_id))
                } else if cql == PEERS_QUERY {
                    if node.fail_peers_query {
                        (ResponseOpcode::Error, error_body(0x1001, "Overloaded"))
                    } else {
                        (ResponseOpcode::Result, peers_body(&peers))
                    }
                } else if let Some(keyspace) = cql.strip_prefix("USE ") {
                    (
                        ResponseOpcode::Result,
                        set_keyspace_body(keyspace.trim_matches('"')),
                    )
                } else {
                    (ResponseOpcode::Result, void_body())
                }
            }
            other => (
                ResponseOpcode::Error,
                error_body(0x000A, &format!("Unsupported request {other:?}")),
            ),
        }
    }
}

impl Transport for MockConnection {
    fn write(&self, data: Bytes) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if state.closed {
            return;
        }
        state.buffer.extend_from_slice(&data);
        while let Some(raw) = state.decoder.decode_raw(&mut state.buffer).unwrap() {
            let header = raw.header;
            state.version = Some(header.version);
            let body = raw.decompressed_body(state.compressor.as_deref()).unwrap();
            let opcode = RequestOpcode::try_from(header.opcode).unwrap();
            let request = Request::deserialize(header.version, opcode, &mut &body[..]).unwrap();
            let (opcode, body) = self.respond(state, request);
            let response = frame(header.version, header.stream, opcode, &body);
            let _ = self.events.send(TransportEvent::Data(response.into()));
        }
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap();
        if std::mem::replace(&mut state.closed, true) {
            return;
        }
        let _ = self.events.send(TransportEvent::Closed(None));
    }
}
