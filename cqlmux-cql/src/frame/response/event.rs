//! CQL protocol-level representation of an `EVENT` response.

use crate::frame::frame_errors::ParseError;
use crate::frame::server_event_type::EventType;
use crate::frame::types;
use std::net::SocketAddr;

/// Event that the server notified the client about.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum Event {
    /// Topology changed.
    TopologyChange(TopologyChangeEvent),
    /// Status of a node changed.
    StatusChange(StatusChangeEvent),
    /// Schema changed.
    SchemaChange(SchemaChangeEvent),
}

/// Event that notifies about changes in the cluster topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyChangeEvent {
    /// A new node was added to the cluster.
    NewNode(SocketAddr),
    /// A node was removed from the cluster.
    RemovedNode(SocketAddr),
}

/// Event that notifies about changes in the nodes' status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChangeEvent {
    /// A node went up.
    Up(SocketAddr),
    /// A node went down.
    Down(SocketAddr),
}

/// A schema change, as carried both by EVENT and by a RESULT of a schema altering query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChangeEvent {
    pub change_type: SchemaChangeType,
    pub keyspace_name: String,
    /// `None` when the keyspace itself changed.
    pub table_name: Option<String>,
}

/// Type of change that was made to the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaChangeType {
    /// The affected schema item was created.
    Created,

    /// The affected schema item was updated.
    Updated,

    /// The affected schema item was dropped.
    Dropped,

    /// A placeholder for an invalid schema change type.
    Invalid,
}

impl Event {
    /// Deserialize an event from the provided buffer.
    pub fn deserialize(buf: &mut &[u8]) -> Result<Self, ParseError> {
        let event_type: EventType = types::read_string(buf)?.parse()?;
        match event_type {
            EventType::TopologyChange => Ok(Self::TopologyChange(
                TopologyChangeEvent::deserialize(buf)?,
            )),
            EventType::StatusChange => {
                Ok(Self::StatusChange(StatusChangeEvent::deserialize(buf)?))
            }
            EventType::SchemaChange => Ok(Self::SchemaChange(SchemaChangeEvent::deserialize(buf)?)),
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Event::TopologyChange(_) => EventType::TopologyChange,
            Event::StatusChange(_) => EventType::StatusChange,
            Event::SchemaChange(_) => EventType::SchemaChange,
        }
    }
}

impl SchemaChangeEvent {
    /// Deserialize a schema change from the provided buffer.
    ///
    /// Protocol v1 and v2 send `<change><keyspace><table>`, with an empty
    /// table for keyspace changes.
    pub fn deserialize(buf: &mut &[u8]) -> Result<Self, ParseError> {
        let change_type = match types::read_string(buf)? {
            "CREATED" => SchemaChangeType::Created,
            "UPDATED" => SchemaChangeType::Updated,
            "DROPPED" => SchemaChangeType::Dropped,
            _ => SchemaChangeType::Invalid,
        };

        let keyspace_name = types::read_string(buf)?.to_string();
        let table_name = Some(types::read_string(buf)?)
            .filter(|table| !table.is_empty())
            .map(ToOwned::to_owned);

        Ok(Self {
            change_type,
            keyspace_name,
            table_name,
        })
    }
}

impl TopologyChangeEvent {
    /// Deserialize a topology change event from the provided buffer.
    pub fn deserialize(buf: &mut &[u8]) -> Result<Self, ParseError> {
        let type_of_change = types::read_string(buf)?;
        let addr = types::read_inet(buf)?;

        match type_of_change {
            "NEW_NODE" => Ok(Self::NewNode(addr)),
            "REMOVED_NODE" => Ok(Self::RemovedNode(addr)),
            _ => Err(ParseError::UnknownClusterChange {
                event_type: "TOPOLOGY_CHANGE",
                change: type_of_change.to_string(),
            }),
        }
    }
}

impl StatusChangeEvent {
    /// Deserialize a status change event from the provided buffer.
    pub fn deserialize(buf: &mut &[u8]) -> Result<Self, ParseError> {
        let type_of_change = types::read_string(buf)?;
        let addr = types::read_inet(buf)?;

        match type_of_change {
            "UP" => Ok(Self::Up(addr)),
            "DOWN" => Ok(Self::Down(addr)),
            _ => Err(ParseError::UnknownClusterChange {
                event_type: "STATUS_CHANGE",
                change: type_of_change.to_string(),
            }),
        }
    }
}
