use crate::frame::frame_errors::{RequestDeserializationError, RequestSerializationError};
use crate::frame::request::{DeserializableRequest, RequestOpcode, SerializableRequest};
use crate::frame::server_event_type::EventType;
use crate::frame::{types, ProtocolVersion};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    pub event_types_to_register_for: Vec<EventType>,
}

impl SerializableRequest for Register {
    const OPCODE: RequestOpcode = RequestOpcode::Register;

    fn serialize(
        &self,
        _version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), RequestSerializationError> {
        let event_types_list = self
            .event_types_to_register_for
            .iter()
            .map(|event| event.to_string())
            .collect::<Vec<_>>();

        types::write_string_list(&event_types_list, buf)?;
        Ok(())
    }
}

impl DeserializableRequest for Register {
    fn deserialize(
        _version: ProtocolVersion,
        buf: &mut &[u8],
    ) -> Result<Self, RequestDeserializationError> {
        let event_types_to_register_for = types::read_string_list(buf)?
            .into_iter()
            .map(|event| {
                event
                    .parse()
                    .map_err(|_| RequestDeserializationError::UnknownEventType(event))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            event_types_to_register_for,
        })
    }
}
