//! CQL protocol-level representation of a `SUPPORTED` response.

use crate::frame::frame_errors::ParseError;
use crate::frame::request::options;
use crate::frame::types;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
/// The CQL protocol-level representation of a `SUPPORTED` response,
/// used to present the server's supported options.
pub struct Supported {
    /// A map of option names to their supported values.
    pub options: HashMap<String, Vec<String>>,
}

impl Supported {
    /// Deserializes a `SUPPORTED` response from the provided byte buffer.
    pub fn deserialize(buf: &mut &[u8]) -> Result<Self, ParseError> {
        let options = types::read_string_multimap(buf)?;

        Ok(Supported { options })
    }

    pub fn cql_versions(&self) -> &[String] {
        self.option(options::CQL_VERSION)
    }

    pub fn compression(&self) -> &[String] {
        self.option(options::COMPRESSION)
    }

    fn option(&self, name: &str) -> &[String] {
        self.options.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}
