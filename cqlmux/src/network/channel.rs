//! Stream-id multiplexing over one transport.
//!
//! A [`Channel`] owns 128 stream ids. Every request in flight holds one id
//! until its response arrives; requests submitted while all ids are taken wait
//! in FIFO order and are dispatched as ids are freed. Responses are matched to
//! their callers by stream id only, so they may arrive in any order.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use cqlmux_cql::frame::compression::Compressor;
use cqlmux_cql::frame::request::query::{Query, QueryParameters};
use cqlmux_cql::frame::request::{Register, RequestOpcode, SerializableRequest};
use cqlmux_cql::frame::response::event::Event;
use cqlmux_cql::frame::response::{result, NonErrorResponse, Response};
use cqlmux_cql::frame::server_event_type::EventType;
use cqlmux_cql::frame::{
    FrameCodec, FrameDecoder, ProtocolVersion, ResponseFrame, SerializedRequest, STREAM_ID_COUNT,
};
use cqlmux_cql::Consistency;
use smallvec::SmallVec;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::reactor::{Transport, TransportEvent, TransportHandle};
use crate::errors::{
    BadKeyspaceName, ConnectionError, NotConnectedError, RequestError, ServerError,
    TransportError, UseKeyspaceError,
};

/// Settings of a single channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    pub protocol_version: ProtocolVersion,
    /// Close the channel when a request finds no free stream id while at
    /// least this many ids are held by timed out requests.
    pub max_timed_out_streams: Option<usize>,
}

/// What is known about the node at the other end of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMetadata {
    pub host_id: Option<Uuid>,
    pub data_center: Option<String>,
    /// Keyspace the connection is switched to, as reported by the server.
    pub keyspace: Option<String>,
    /// `CQL_VERSION` values the server listed in SUPPORTED.
    pub cql_versions: Vec<String>,
    /// `COMPRESSION` values the server listed in SUPPORTED.
    pub compression: Vec<String>,
    /// Ids of the statements prepared on this connection.
    pub prepared: HashSet<Bytes>,
}

/// A response together with the tracing id the server attached to it.
#[derive(Debug)]
pub struct QueryResponse {
    pub response: Response,
    pub tracing_id: Option<Uuid>,
}

type ResponseResult = Result<QueryResponse, RequestError>;

type CloseHook = Box<dyn FnOnce(&Channel, &Result<(), ConnectionError>) + Send>;

struct PendingRequest {
    response_sender: oneshot::Sender<ResponseResult>,
    timed_out: Arc<AtomicBool>,
    kind: RequestOpcode,
}

impl PendingRequest {
    fn is_timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Acquire)
    }

    // Timed out or dropped by its caller.
    fn is_abandoned(&self) -> bool {
        self.is_timed_out() || self.response_sender.is_closed()
    }

    fn deliver(self, result: ResponseResult) {
        if self.is_timed_out() {
            trace!(kind = %self.kind, "Dropping response to a timed out request");
            return;
        }
        // Ignore sending error, request was dropped
        let _ = self.response_sender.send(result);
    }
}

struct QueuedRequest {
    pending: PendingRequest,
    frame: SerializedRequest,
}

struct ChannelState {
    slots: Vec<Option<PendingRequest>>,
    free_ids: Vec<i8>,
    // Submitted while no stream id was free.
    not_dispatched: VecDeque<QueuedRequest>,
    // Older than everything in `not_dispatched`; dispatched first.
    dispatch_ready: VecDeque<QueuedRequest>,
    metadata: ChannelMetadata,
    event_listeners: Vec<mpsc::UnboundedSender<Event>>,
    close_hooks: Vec<CloseHook>,
    close_result: Option<Result<(), ConnectionError>>,
}

fn all_stream_ids() -> Vec<i8> {
    // Popped from the back, so id 0 is handed out first.
    (0..STREAM_ID_COUNT).rev().map(|id| id as i8).collect()
}

impl ChannelState {
    fn new() -> Self {
        Self {
            slots: (0..STREAM_ID_COUNT).map(|_| None).collect(),
            free_ids: all_stream_ids(),
            not_dispatched: VecDeque::new(),
            dispatch_ready: VecDeque::new(),
            metadata: ChannelMetadata::default(),
            event_listeners: Vec::new(),
            close_hooks: Vec::new(),
            close_result: None,
        }
    }

    fn is_closed(&self) -> bool {
        self.close_result.is_some()
    }

    fn bind(&mut self, pending: PendingRequest) -> Result<i8, PendingRequest> {
        match self.free_ids.pop() {
            Some(id) => {
                self.slots[id as usize] = Some(pending);
                Ok(id)
            }
            None => Err(pending),
        }
    }

    // Frees the id only if it was bound.
    fn take_slot(&mut self, stream: i8) -> Option<PendingRequest> {
        if stream < 0 {
            return None;
        }
        let pending = self.slots.get_mut(stream as usize)?.take()?;
        self.free_ids.push(stream);
        Some(pending)
    }

    fn timed_out_streams(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|pending| pending.is_timed_out())
            .count()
    }

    fn queued(&self) -> usize {
        self.not_dispatched.len() + self.dispatch_ready.len()
    }

    /// Binds queued requests to free ids, oldest first. Returns the frames to write.
    fn flush(&mut self, writes: &mut SmallVec<[Bytes; 4]>) {
        while !self.free_ids.is_empty() {
            if self.dispatch_ready.is_empty() {
                std::mem::swap(&mut self.dispatch_ready, &mut self.not_dispatched);
            }
            let Some(QueuedRequest { pending, mut frame }) = self.dispatch_ready.pop_front()
            else {
                break;
            };
            if pending.is_abandoned() {
                continue;
            }
            if let Ok(id) = self.bind(pending) {
                frame.set_stream(id);
                writes.push(frame.into_bytes());
            }
        }
    }
}

struct DecoderState {
    buffer: BytesMut,
    decoder: FrameDecoder,
}

/// One multiplexed connection to a node.
pub struct Channel {
    host: String,
    port: u16,
    transport: Arc<dyn Transport>,
    codec: RwLock<FrameCodec>,
    state: Mutex<ChannelState>,
    decoder: Mutex<DecoderState>,
    closed_sender: watch::Sender<Option<Result<(), ConnectionError>>>,
    max_timed_out_streams: Option<usize>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Wraps an open transport. The events of the transport are consumed by a
    /// task that lives as long as the channel.
    pub fn new(host: String, port: u16, handle: TransportHandle, config: ChannelConfig) -> Arc<Self> {
        let (closed_sender, _) = watch::channel(None);
        let channel = Arc::new(Channel {
            host,
            port,
            transport: handle.transport,
            codec: RwLock::new(FrameCodec::new(config.protocol_version)),
            state: Mutex::new(ChannelState::new()),
            decoder: Mutex::new(DecoderState {
                buffer: BytesMut::new(),
                decoder: FrameDecoder::new(),
            }),
            closed_sender,
            max_timed_out_streams: config.max_timed_out_streams,
        });

        tokio::spawn(Self::pump(Arc::downgrade(&channel), handle.events));

        channel
    }

    async fn pump(channel: Weak<Channel>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            let Some(channel) = channel.upgrade() else {
                return;
            };
            match event {
                TransportEvent::Data(data) => channel.on_data_received(&data),
                TransportEvent::Closed(cause) => {
                    channel.shutdown(cause.map(ConnectionError::from));
                    return;
                }
            }
        }
        if let Some(channel) = channel.upgrade() {
            channel.shutdown(Some(TransportError::Closed.into()));
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.codec.read().unwrap().version()
    }

    /// Sends `request` and resolves to its response.
    ///
    /// The request is registered immediately: it gets a stream id and is
    /// written now if one is free, otherwise it is queued. Dropping the
    /// returned future does not cancel it. With a `timeout`, the future
    /// fails with [`RequestError::Timeout`] once the deadline passes; the
    /// stream id stays taken until the response arrives anyway.
    pub fn submit<R: SerializableRequest>(
        &self,
        request: &R,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Response, RequestError>> + Send + 'static {
        let response = self.send_request(request, false, timeout);
        async move { response.await.map(|r| r.response) }
    }

    /// Like [`submit`](Self::submit), with the tracing flag set on the request.
    pub fn submit_traced<R: SerializableRequest>(
        &self,
        request: &R,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<QueryResponse, RequestError>> + Send + 'static {
        self.send_request(request, true, timeout)
    }

    fn send_request<R: SerializableRequest>(
        &self,
        request: &R,
        tracing: bool,
        timeout: Option<Duration>,
    ) -> impl Future<Output = ResponseResult> + Send + 'static {
        let deadline = timeout.map(|timeout| (Instant::now() + timeout, timeout));
        let registration = self.register(request, tracing);

        async move {
            let (receiver, timed_out) = registration?;
            let received = match deadline {
                Some((deadline, timeout)) => {
                    match tokio::time::timeout_at(deadline, receiver).await {
                        Ok(received) => received,
                        Err(_) => {
                            timed_out.store(true, Ordering::Release);
                            return Err(RequestError::Timeout(timeout));
                        }
                    }
                }
                None => receiver.await,
            };
            // The sender is only dropped without sending when the channel went away.
            received.unwrap_or_else(|_| {
                Err(RequestError::Connection(TransportError::Closed.into()))
            })
        }
    }

    #[allow(clippy::type_complexity)]
    fn register<R: SerializableRequest>(
        &self,
        request: &R,
        tracing: bool,
    ) -> Result<(oneshot::Receiver<ResponseResult>, Arc<AtomicBool>), RequestError> {
        if self.is_closed() {
            return Err(NotConnectedError.into());
        }

        // Encoded once; the stream id is patched in when one is bound.
        let mut frame = self
            .codec
            .read()
            .unwrap()
            .encode(request, 0, tracing)
            .map_err(RequestError::Serialization)?;

        let (response_sender, receiver) = oneshot::channel();
        let timed_out = Arc::new(AtomicBool::new(false));
        let pending = PendingRequest {
            response_sender,
            timed_out: timed_out.clone(),
            kind: R::OPCODE,
        };

        let mut state = self.state.lock().unwrap();
        if state.is_closed() {
            return Err(NotConnectedError.into());
        }
        match state.bind(pending) {
            Ok(id) => {
                drop(state);
                trace!(stream = id, kind = %R::OPCODE, "Sending request");
                frame.set_stream(id);
                self.transport.write(frame.into_bytes());
            }
            Err(pending) => {
                if let Some(max) = self.max_timed_out_streams {
                    let count = state.timed_out_streams();
                    if count >= max {
                        drop(state);
                        let error = ConnectionError::TooManyTimedOutStreams { count };
                        warn!(
                            "Closing connection to {}:{}: {}",
                            self.host, self.port, error
                        );
                        self.shutdown(Some(error.clone()));
                        return Err(error.into());
                    }
                }
                trace!(kind = %R::OPCODE, "No free stream id, queueing request");
                state.not_dispatched.push_back(QueuedRequest { pending, frame });
            }
        }

        Ok((receiver, timed_out))
    }

    /// Submits `request` and splits server errors off the response.
    pub async fn execute<R: SerializableRequest>(
        &self,
        request: &R,
        timeout: Option<Duration>,
    ) -> Result<NonErrorResponse, RequestError> {
        let cql = request.cql().map(ToOwned::to_owned);
        let response = self.submit(request, timeout).await?;
        response
            .into_non_error_response()
            .map_err(|err| ServerError::new(err, cql).into())
    }

    /// Runs a QUERY without bound values and expects a RESULT back.
    pub async fn query(
        &self,
        cql: &str,
        consistency: Consistency,
        timeout: Option<Duration>,
    ) -> Result<result::Result, RequestError> {
        let query = Query {
            contents: cql.into(),
            parameters: QueryParameters {
                consistency,
                ..Default::default()
            },
        };
        match self.execute(&query, timeout).await? {
            NonErrorResponse::Result(result) => Ok(result),
            other => Err(RequestError::UnexpectedResponse {
                request: RequestOpcode::Query.name(),
                response: other.kind(),
            }),
        }
    }

    /// Subscribes the connection to server events.
    pub async fn register_for_events(
        &self,
        event_types_to_register_for: Vec<EventType>,
        timeout: Option<Duration>,
    ) -> Result<(), RequestError> {
        let register = Register {
            event_types_to_register_for,
        };
        match self.execute(&register, timeout).await? {
            NonErrorResponse::Ready => Ok(()),
            other => Err(RequestError::UnexpectedResponse {
                request: RequestOpcode::Register.name(),
                response: other.kind(),
            }),
        }
    }

    pub async fn use_keyspace(
        &self,
        keyspace_name: &VerifiedKeyspaceName,
        timeout: Option<Duration>,
    ) -> Result<(), UseKeyspaceError> {
        // Trying to pass keyspace_name as bound value doesn't work
        // We have to send "USE " + keyspace_name
        let cql = match keyspace_name.is_case_sensitive {
            true => format!("USE \"{}\"", keyspace_name.as_str()),
            false => format!("USE {}", keyspace_name.as_str()),
        };

        match self.query(&cql, Consistency::One, timeout).await? {
            result::Result::SetKeyspace(set_keyspace) => {
                if !set_keyspace
                    .keyspace_name
                    .eq_ignore_ascii_case(keyspace_name.as_str())
                {
                    return Err(UseKeyspaceError::KeyspaceNameMismatch {
                        expected_keyspace_name_lowercase: keyspace_name.as_str().to_lowercase(),
                        result_keyspace_name_lowercase: set_keyspace.keyspace_name.to_lowercase(),
                    });
                }
                Ok(())
            }
            _ => Err(UseKeyspaceError::Request(RequestError::UnexpectedResponse {
                request: RequestOpcode::Query.name(),
                response: "RESULT",
            })),
        }
    }

    /// Feeds bytes read from the transport.
    ///
    /// Every complete frame is decoded; events go to the listeners and
    /// responses to the requests that hold their stream ids. Freed ids are
    /// handed to queued requests before the responses are delivered.
    pub fn on_data_received(&self, data: &[u8]) {
        let compressor = self.codec.read().unwrap().compressor().cloned();

        let mut frames: SmallVec<[ResponseFrame; 4]> = SmallVec::new();
        let mut decode_error = None;
        {
            let mut guard = self.decoder.lock().unwrap();
            let DecoderState { buffer, decoder } = &mut *guard;
            buffer.extend_from_slice(data);
            loop {
                match decoder.decode(buffer, compressor.as_deref()) {
                    Ok(Some(frame)) => frames.push(frame),
                    Ok(None) => break,
                    Err(err) => {
                        decode_error = Some(err);
                        break;
                    }
                }
            }
        }

        let mut deliveries: SmallVec<[(PendingRequest, QueryResponse); 4]> = SmallVec::new();
        let mut writes: SmallVec<[Bytes; 4]> = SmallVec::new();
        {
            let mut state = self.state.lock().unwrap();
            for frame in frames {
                if frame.is_event() {
                    match frame.response {
                        Response::Event(event) => {
                            state
                                .event_listeners
                                .retain(|listener| listener.send(event.clone()).is_ok());
                        }
                        other => warn!(
                            "Received {} response on the event stream, ignoring",
                            other.kind()
                        ),
                    }
                    continue;
                }

                let stream = frame.stream();
                let Some(pending) = state.take_slot(stream) else {
                    debug!(
                        "Received {} response for unused stream id {}, ignoring",
                        frame.response.kind(),
                        stream
                    );
                    continue;
                };
                if let Response::Result(result::Result::SetKeyspace(set_keyspace)) =
                    &frame.response
                {
                    state.metadata.keyspace = Some(set_keyspace.keyspace_name.clone());
                }
                deliveries.push((
                    pending,
                    QueryResponse {
                        response: frame.response,
                        tracing_id: frame.trace_id,
                    },
                ));
            }
            state.flush(&mut writes);
        }

        for frame in writes {
            self.transport.write(frame);
        }
        for (pending, response) in deliveries {
            pending.deliver(Ok(response));
        }

        if let Some(err) = decode_error {
            self.shutdown(Some(ConnectionError::ProtocolDecoding(err)));
        }
    }

    /// Closes the channel cleanly. Calling it again does nothing.
    pub fn close(&self) {
        self.shutdown(None);
    }

    /// Fails everything pending and queued with `cause`, then notifies
    /// close hooks and waiters. Only the first call has any effect.
    pub(crate) fn shutdown(&self, cause: Option<ConnectionError>) {
        let result = match &cause {
            None => Ok(()),
            Some(cause) => Err(cause.clone()),
        };

        let (pending, queued, hooks) = {
            let mut state = self.state.lock().unwrap();
            if state.is_closed() {
                return;
            }
            state.close_result = Some(result.clone());
            let pending: Vec<PendingRequest> =
                state.slots.iter_mut().filter_map(Option::take).collect();
            let mut queued: Vec<QueuedRequest> = state.dispatch_ready.drain(..).collect();
            queued.extend(state.not_dispatched.drain(..));
            state.free_ids = all_stream_ids();
            state.event_listeners.clear();
            (pending, queued, std::mem::take(&mut state.close_hooks))
        };

        self.transport.close();

        let error = RequestError::Connection(cause.unwrap_or(TransportError::Closed.into()));
        for request in pending
            .into_iter()
            .chain(queued.into_iter().map(|queued| queued.pending))
        {
            request.deliver(Err(error.clone()));
        }

        for hook in hooks {
            hook(self, &result);
        }
        self.closed_sender.send_replace(Some(result));
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().is_closed()
    }

    /// Resolves once the channel is closed: `Ok` if it was closed cleanly,
    /// the cause otherwise.
    pub async fn closed(&self) -> Result<(), ConnectionError> {
        let mut receiver = self.closed_sender.subscribe();
        loop {
            let current = receiver.borrow_and_update().clone();
            if let Some(result) = current {
                return result;
            }
            if receiver.changed().await.is_err() {
                return Err(TransportError::Closed.into());
            }
        }
    }

    /// Registers a hook to run when the channel closes. Runs it right away
    /// if the channel is already closed.
    pub fn on_closed(
        &self,
        hook: impl FnOnce(&Channel, &Result<(), ConnectionError>) + Send + 'static,
    ) {
        let mut state = self.state.lock().unwrap();
        match state.close_result.clone() {
            None => state.close_hooks.push(Box::new(hook)),
            Some(result) => {
                drop(state);
                hook(self, &result);
            }
        }
    }

    /// A receiver of every event the server pushes on this channel.
    ///
    /// Dropping the receiver unsubscribes. On a closed channel the
    /// receiver is already finished.
    pub fn on_event(&self) -> mpsc::UnboundedReceiver<Event> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        if !state.is_closed() {
            state.event_listeners.push(sender);
        }
        receiver
    }

    /// Starts compressing request bodies and accepting compressed responses.
    pub fn enable_compression(&self, compressor: Arc<dyn Compressor>) {
        self.codec.write().unwrap().set_compressor(Some(compressor));
    }

    pub fn compression(&self) -> Option<&'static str> {
        self.codec
            .read()
            .unwrap()
            .compressor()
            .map(|compressor| compressor.algorithm())
    }

    pub fn metadata(&self) -> ChannelMetadata {
        self.state.lock().unwrap().metadata.clone()
    }

    pub fn update_metadata(&self, f: impl FnOnce(&mut ChannelMetadata)) {
        f(&mut self.state.lock().unwrap().metadata);
    }

    pub fn host_id(&self) -> Option<Uuid> {
        self.state.lock().unwrap().metadata.host_id
    }

    pub fn set_host_id(&self, host_id: Uuid) {
        self.update_metadata(|metadata| metadata.host_id = Some(host_id));
    }

    pub fn data_center(&self) -> Option<String> {
        self.state.lock().unwrap().metadata.data_center.clone()
    }

    pub fn set_data_center(&self, data_center: String) {
        self.update_metadata(|metadata| metadata.data_center = Some(data_center));
    }

    pub fn keyspace(&self) -> Option<String> {
        self.state.lock().unwrap().metadata.keyspace.clone()
    }

    pub fn set_keyspace(&self, keyspace: Option<String>) {
        self.update_metadata(|metadata| metadata.keyspace = keyspace);
    }

    pub fn mark_prepared(&self, id: Bytes) {
        self.update_metadata(|metadata| {
            metadata.prepared.insert(id);
        });
    }

    pub fn is_prepared(&self, id: &[u8]) -> bool {
        self.state.lock().unwrap().metadata.prepared.contains(id)
    }

    /// Number of stream ids not bound to a request.
    pub fn free_stream_ids(&self) -> usize {
        self.state.lock().unwrap().free_ids.len()
    }

    /// Number of requests waiting for a stream id.
    pub fn queued_requests(&self) -> usize {
        self.state.lock().unwrap().queued()
    }

    /// `host_id at host:port in data center dc`, as used in log messages.
    pub(crate) fn describe(&self) -> String {
        let metadata = self.metadata();
        format!(
            "{} at {}:{} in data center {}",
            metadata
                .host_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "<unknown>".to_owned()),
            self.host,
            self.port,
            metadata.data_center.as_deref().unwrap_or("<unknown>"),
        )
    }
}

/// This type can only hold a valid keyspace name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VerifiedKeyspaceName {
    name: Arc<String>,
    pub is_case_sensitive: bool,
}

impl VerifiedKeyspaceName {
    pub fn new(keyspace_name: String, case_sensitive: bool) -> Result<Self, BadKeyspaceName> {
        Self::verify_keyspace_name_is_valid(&keyspace_name)?;

        Ok(VerifiedKeyspaceName {
            name: Arc::new(keyspace_name),
            is_case_sensitive: case_sensitive,
        })
    }

    /// Parses a keyspace name as written in CQL: double quotes make it case sensitive.
    pub fn parse(keyspace_name: &str) -> Result<Self, BadKeyspaceName> {
        match keyspace_name
            .strip_prefix('"')
            .and_then(|name| name.strip_suffix('"'))
        {
            Some(quoted) => Self::new(quoted.to_owned(), true),
            None => Self::new(keyspace_name.to_owned(), false),
        }
    }

    pub fn as_str(&self) -> &str {
        self.name.as_str()
    }

    // Up to 48 alphanumeric characters or underscores.
    fn verify_keyspace_name_is_valid(keyspace_name: &str) -> Result<(), BadKeyspaceName> {
        if keyspace_name.is_empty() {
            return Err(BadKeyspaceName::Empty);
        }

        // Verify that length <= 48
        let keyspace_name_len: usize = keyspace_name.chars().count(); // Only ascii allowed so it's equal to .len()
        if keyspace_name_len > 48 {
            return Err(BadKeyspaceName::TooLong(
                keyspace_name.to_string(),
                keyspace_name_len,
            ));
        }

        // Verify all chars are alphanumeric or underscore
        for character in keyspace_name.chars() {
            match character {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => {}
                _ => {
                    return Err(BadKeyspaceName::IllegalCharacter(
                        keyspace_name.to_string(),
                        character,
                    ));
                }
            };
        }

        Ok(())
    }

    /// Whether a keyspace name reported by the server denotes this keyspace.
    pub(crate) fn matches(&self, keyspace: &str) -> bool {
        match self.is_case_sensitive {
            true => keyspace == self.as_str(),
            false => keyspace.eq_ignore_ascii_case(self.as_str()),
        }
    }
}
