use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use cqlmux::frame::request::{Request, RequestOpcode};
use cqlmux::frame::response::ResponseOpcode;
use cqlmux::frame::types;
use cqlmux::frame::{FrameDecoder, FrameHeader, ProtocolVersion};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub(crate) const DATA_CENTER: &str = "datacenter1";

/// Query that makes the fake node drop the connection instead of answering.
pub(crate) const DISCONNECT_QUERY: &str = "DISCONNECT";

pub(crate) fn setup_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(tracing_subscriber::fmt::TestWriter::new())
        .try_init();
}

pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    while !condition() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A single node listening on a local port, answering the handshake,
/// `system.local`, `system.peers` (no peers) and any other QUERY with a
/// void result.
pub(crate) struct FakeNode {
    pub(crate) port: u16,
    pub(crate) host_id: Uuid,
    accepted: Arc<AtomicUsize>,
    listener: JoinHandle<()>,
}

impl FakeNode {
    pub(crate) async fn start() -> FakeNode {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let host_id = Uuid::new_v4();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        let listener = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, host_id));
            }
        });

        FakeNode {
            port,
            host_id,
            accepted,
            listener,
        }
    }

    pub(crate) fn accepted_connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for FakeNode {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn serve(mut socket: TcpStream, host_id: Uuid) -> std::io::Result<()> {
    let mut decoder = FrameDecoder::for_requests();
    let mut buffer = BytesMut::new();
    loop {
        if socket.read_buf(&mut buffer).await? == 0 {
            return Ok(());
        }

        let mut out = Vec::new();
        while let Some(raw) = decoder.decode_raw(&mut buffer).unwrap() {
            let header = raw.header;
            let opcode = RequestOpcode::try_from(header.opcode).unwrap();
            let request = Request::deserialize(header.version, opcode, &mut &raw.body[..]).unwrap();
            let (opcode, body) = match request {
                Request::Options(_) => (ResponseOpcode::Supported, supported_body()),
                Request::Startup(_) | Request::Register(_) => (ResponseOpcode::Ready, Vec::new()),
                Request::Query(query) if query.contents == DISCONNECT_QUERY => return Ok(()),
                Request::Query(query) if query.contents.contains("system.local") => {
                    (ResponseOpcode::Result, local_body(host_id))
                }
                Request::Query(query) if query.contents.contains("system.peers") => {
                    (ResponseOpcode::Result, no_peers_body())
                }
                Request::Query(_) => {
                    let mut body = Vec::new();
                    types::write_int(0x0001, &mut body);
                    (ResponseOpcode::Result, body)
                }
                other => panic!("Unexpected request {other:?}"),
            };
            write_frame(&mut out, header.version, header.stream, opcode, &body);
        }
        socket.write_all(&out).await?;
    }
}

fn write_frame(
    out: &mut Vec<u8>,
    version: ProtocolVersion,
    stream: i8,
    opcode: ResponseOpcode,
    body: &[u8],
) {
    FrameHeader {
        version,
        is_response: true,
        flags: 0,
        stream,
        opcode: opcode as u8,
        length: body.len() as u32,
    }
    .write(out);
    out.extend_from_slice(body);
}

fn supported_body() -> Vec<u8> {
    let options = HashMap::from([
        ("CQL_VERSION".to_owned(), vec!["3.0.0".to_owned()]),
        ("COMPRESSION".to_owned(), Vec::new()),
    ]);
    let mut body = Vec::new();
    types::write_string_multimap(&options, &mut body).unwrap();
    body
}

fn rows_header(body: &mut Vec<u8>, table: &str, columns: &[(&str, u16)]) {
    types::write_int(0x0002, body);
    types::write_int(0x0001, body);
    types::write_int(columns.len() as i32, body);
    types::write_string("system", body).unwrap();
    types::write_string(table, body).unwrap();
    for (name, typ) in columns {
        types::write_string(name, body).unwrap();
        types::write_short(*typ, body);
    }
}

fn local_body(host_id: Uuid) -> Vec<u8> {
    let mut body = Vec::new();
    rows_header(&mut body, "local", &[("data_center", 0x000D), ("host_id", 0x000C)]);
    types::write_int(1, &mut body);
    types::write_bytes(DATA_CENTER.as_bytes(), &mut body).unwrap();
    types::write_bytes(host_id.as_bytes(), &mut body).unwrap();
    body
}

fn no_peers_body() -> Vec<u8> {
    let mut body = Vec::new();
    rows_header(
        &mut body,
        "peers",
        &[
            ("peer", 0x0010),
            ("data_center", 0x000D),
            ("host_id", 0x000C),
            ("rpc_address", 0x0010),
        ],
    );
    types::write_int(0, &mut body);
    body
}
