//! Body of a RESULT response.
//!
//! Rows are decoded into [`CqlValue`]s for the native types of protocol v1 and v2;
//! values the client has no use for (decimal, varint, custom types) are kept raw.

use crate::frame::frame_errors::{LowLevelDeserializationError, ParseError};
use crate::frame::response::event::SchemaChangeEvent;
use crate::frame::types;
use crate::frame::ProtocolVersion;
use bytes::Bytes;
use itertools::Itertools;
use std::net::IpAddr;
use std::result::Result as StdResult;
use std::str;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetKeyspace {
    pub keyspace_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub id: Bytes,
    /// Metadata of the bound variables.
    pub prepared_metadata: ResultMetadata,
    /// Metadata of the rows the statement returns. Protocol v2 only.
    pub result_metadata: Option<ResultMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChange {
    pub event: SchemaChangeEvent,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableSpec {
    pub ks_name: String,
    pub table_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Custom(String),
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Timestamp,
    Uuid,
    /// `text` and `varchar`.
    Text,
    Varint,
    Timeuuid,
    Inet,
    List(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Set(Box<ColumnType>),
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Custom(class) => write!(f, "'{class}'"),
            ColumnType::Ascii => f.write_str("ascii"),
            ColumnType::BigInt => f.write_str("bigint"),
            ColumnType::Blob => f.write_str("blob"),
            ColumnType::Boolean => f.write_str("boolean"),
            ColumnType::Counter => f.write_str("counter"),
            ColumnType::Decimal => f.write_str("decimal"),
            ColumnType::Double => f.write_str("double"),
            ColumnType::Float => f.write_str("float"),
            ColumnType::Int => f.write_str("int"),
            ColumnType::Timestamp => f.write_str("timestamp"),
            ColumnType::Uuid => f.write_str("uuid"),
            ColumnType::Text => f.write_str("text"),
            ColumnType::Varint => f.write_str("varint"),
            ColumnType::Timeuuid => f.write_str("timeuuid"),
            ColumnType::Inet => f.write_str("inet"),
            ColumnType::List(elem) => write!(f, "list<{elem}>"),
            ColumnType::Map(key, value) => write!(f, "map<{key}, {value}>"),
            ColumnType::Set(elem) => write!(f, "set<{elem}>"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CqlValue {
    Ascii(String),
    Boolean(bool),
    Blob(Vec<u8>),
    Counter(i64),
    Double(f64),
    /// Empty value of a non-string type.
    Empty,
    Float(f32),
    Int(i32),
    BigInt(i64),
    Text(String),
    /// Milliseconds since the epoch.
    Timestamp(i64),
    Inet(IpAddr),
    List(Vec<CqlValue>),
    Map(Vec<(CqlValue, CqlValue)>),
    Set(Vec<CqlValue>),
    Timeuuid(Uuid),
    Uuid(Uuid),
    /// Bytes of a type that is not decoded (decimal, varint, custom).
    Raw(Vec<u8>),
}

impl CqlValue {
    pub fn as_text(&self) -> Option<&String> {
        match self {
            Self::Text(s) | Self::Ascii(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Self::Text(s) | Self::Ascii(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(u) | Self::Timeuuid(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_inet(&self) -> Option<IpAddr> {
        match self {
            Self::Inet(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            Self::BigInt(i) | Self::Counter(i) | Self::Timestamp(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Vec<u8>> {
        match self {
            Self::Blob(v) | Self::Raw(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<CqlValue>> {
        match self {
            Self::List(s) | Self::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Vec<(CqlValue, CqlValue)>> {
        match self {
            Self::Map(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub table_spec: TableSpec,
    pub name: String,
    pub typ: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultMetadata {
    pub col_count: usize,
    pub global_table_spec: Option<TableSpec>,
    /// Present when more pages are available.
    pub paging_state: Option<Bytes>,
    /// Empty when the server was asked to skip the metadata.
    pub col_specs: Vec<ColumnSpec>,
}

impl std::fmt::Display for ResultMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}]",
            self.col_specs
                .iter()
                .map(|spec| format!("{} {}", spec.name, spec.typ))
                .join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub columns: Vec<Option<CqlValue>>,
}

impl Row {
    pub fn get(&self, index: usize) -> Option<&CqlValue> {
        self.columns.get(index).and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rows {
    pub metadata: ResultMetadata,
    pub rows: Vec<Row>,
}

impl Rows {
    /// Position of the column called `name`, if the metadata has one.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.metadata
            .col_specs
            .iter()
            .position(|spec| spec.name == name)
    }

    /// Value of column `name` in `row`; `None` for missing columns and nulls.
    pub fn value<'a>(&self, row: &'a Row, name: &str) -> Option<&'a CqlValue> {
        self.column_index(name).and_then(|index| row.get(index))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Result {
    Void,
    Rows(Rows),
    SetKeyspace(SetKeyspace),
    Prepared(Prepared),
    SchemaChange(SchemaChange),
}

fn deser_type(buf: &mut &[u8]) -> StdResult<ColumnType, ParseError> {
    use ColumnType::*;
    let id = types::read_short(buf)?;
    Ok(match id {
        0x0000 => Custom(types::read_string(buf)?.to_owned()),
        0x0001 => Ascii,
        0x0002 => BigInt,
        0x0003 => Blob,
        0x0004 => Boolean,
        0x0005 => Counter,
        0x0006 => Decimal,
        0x0007 => Double,
        0x0008 => Float,
        0x0009 => Int,
        0x000A => Text,
        0x000B => Timestamp,
        0x000C => Uuid,
        0x000D => Text,
        0x000E => Varint,
        0x000F => Timeuuid,
        0x0010 => Inet,
        0x0020 => List(Box::new(deser_type(buf)?)),
        0x0021 => Map(Box::new(deser_type(buf)?), Box::new(deser_type(buf)?)),
        0x0022 => Set(Box::new(deser_type(buf)?)),
        id => return Err(ParseError::UnknownColumnType(id)),
    })
}

fn deser_table_spec(buf: &mut &[u8]) -> StdResult<TableSpec, ParseError> {
    let ks_name = types::read_string(buf)?.to_owned();
    let table_name = types::read_string(buf)?.to_owned();
    Ok(TableSpec {
        ks_name,
        table_name,
    })
}

fn deser_col_specs(
    buf: &mut &[u8],
    global_table_spec: &Option<TableSpec>,
    col_count: usize,
) -> StdResult<Vec<ColumnSpec>, ParseError> {
    let mut col_specs = Vec::with_capacity(col_count);
    for _ in 0..col_count {
        let table_spec = match global_table_spec {
            Some(spec) => spec.clone(),
            None => deser_table_spec(buf)?,
        };
        let name = types::read_string(buf)?.to_owned();
        let typ = deser_type(buf)?;
        col_specs.push(ColumnSpec {
            table_spec,
            name,
            typ,
        });
    }
    Ok(col_specs)
}

fn deser_result_metadata(buf: &mut &[u8]) -> StdResult<ResultMetadata, ParseError> {
    let flags = types::read_int(buf)?;
    let global_tables_spec = flags & 0x0001 != 0;
    let has_more_pages = flags & 0x0002 != 0;
    let no_metadata = flags & 0x0004 != 0;

    let col_count = types::read_int_length(buf)?;

    let paging_state = has_more_pages
        .then(|| types::read_bytes(buf).map(Bytes::copy_from_slice))
        .transpose()?;

    if no_metadata {
        return Ok(ResultMetadata {
            col_count,
            global_table_spec: None,
            paging_state,
            col_specs: vec![],
        });
    }

    let global_table_spec = global_tables_spec
        .then(|| deser_table_spec(buf))
        .transpose()?;
    let col_specs = deser_col_specs(buf, &global_table_spec, col_count)?;

    Ok(ResultMetadata {
        col_count,
        global_table_spec,
        paging_state,
        col_specs,
    })
}

fn exact<const N: usize>(buf: &[u8]) -> StdResult<[u8; N], LowLevelDeserializationError> {
    buf.try_into()
        .map_err(|_| LowLevelDeserializationError::InvalidValueLength(buf.len() as i32))
}

fn deser_collection(
    elem: &ColumnType,
    buf: &mut &[u8],
) -> StdResult<Vec<CqlValue>, LowLevelDeserializationError> {
    let count = types::read_short(buf)?;
    (0..count)
        .map(|_| deser_cql_value(elem, &mut types::read_short_bytes(buf)?))
        .collect()
}

/// Decodes one cell of type `typ`.
pub fn deser_cql_value(
    typ: &ColumnType,
    buf: &mut &[u8],
) -> StdResult<CqlValue, LowLevelDeserializationError> {
    use ColumnType::*;

    if buf.is_empty() {
        match typ {
            Ascii | Blob | Text | Custom(_) | Decimal | Varint => {
                // can't be empty
            }
            _ => return Ok(CqlValue::Empty),
        }
    }

    let value = match typ {
        Ascii => CqlValue::Ascii(str::from_utf8(buf)?.to_owned()),
        Text => CqlValue::Text(str::from_utf8(buf)?.to_owned()),
        Blob => CqlValue::Blob(buf.to_vec()),
        Custom(_) | Decimal | Varint => CqlValue::Raw(buf.to_vec()),
        Boolean => CqlValue::Boolean(exact::<1>(buf)?[0] != 0),
        Int => CqlValue::Int(i32::from_be_bytes(exact(buf)?)),
        BigInt => CqlValue::BigInt(i64::from_be_bytes(exact(buf)?)),
        Counter => CqlValue::Counter(i64::from_be_bytes(exact(buf)?)),
        Timestamp => CqlValue::Timestamp(i64::from_be_bytes(exact(buf)?)),
        Double => CqlValue::Double(f64::from_be_bytes(exact(buf)?)),
        Float => CqlValue::Float(f32::from_be_bytes(exact(buf)?)),
        Uuid => CqlValue::Uuid(uuid::Uuid::from_bytes(exact(buf)?)),
        Timeuuid => CqlValue::Timeuuid(uuid::Uuid::from_bytes(exact(buf)?)),
        Inet => CqlValue::Inet(types::read_ip_addr(buf.len(), &mut &**buf)?),
        List(elem) => CqlValue::List(deser_collection(elem, &mut &**buf)?),
        Set(elem) => CqlValue::Set(deser_collection(elem, &mut &**buf)?),
        Map(key_type, value_type) => {
            let mut entries = &**buf;
            let count = types::read_short(&mut entries)?;
            let pairs = (0..count)
                .map(|_| {
                    let key = deser_cql_value(key_type, &mut types::read_short_bytes(&mut entries)?)?;
                    let value =
                        deser_cql_value(value_type, &mut types::read_short_bytes(&mut entries)?)?;
                    Ok((key, value))
                })
                .collect::<StdResult<_, LowLevelDeserializationError>>()?;
            CqlValue::Map(pairs)
        }
    };
    *buf = &buf[buf.len()..];

    Ok(value)
}

fn deser_rows(buf: &mut &[u8]) -> StdResult<Rows, ParseError> {
    let metadata = deser_result_metadata(buf)?;

    let rows_count = types::read_int_length(buf)?;
    let mut rows = Vec::with_capacity(rows_count);
    for _ in 0..rows_count {
        let mut columns = Vec::with_capacity(metadata.col_count);
        for col_idx in 0..metadata.col_count {
            let raw = types::read_bytes_opt(buf)?;
            let value = match (raw, metadata.col_specs.get(col_idx)) {
                (None, _) => None,
                (Some(mut raw), Some(spec)) => Some(deser_cql_value(&spec.typ, &mut raw).map_err(
                    |err| ParseError::MalformedColumnValue {
                        column: spec.name.clone(),
                        err,
                    },
                )?),
                // Metadata was skipped, there is nothing to decode the value with.
                (Some(raw), None) => Some(CqlValue::Raw(raw.to_vec())),
            };
            columns.push(value);
        }
        rows.push(Row { columns });
    }

    Ok(Rows { metadata, rows })
}

fn deser_set_keyspace(buf: &mut &[u8]) -> StdResult<SetKeyspace, ParseError> {
    let keyspace_name = types::read_string(buf)?.to_string();

    Ok(SetKeyspace { keyspace_name })
}

fn deser_prepared(version: ProtocolVersion, buf: &mut &[u8]) -> StdResult<Prepared, ParseError> {
    let id = Bytes::copy_from_slice(types::read_short_bytes(buf)?);
    let prepared_metadata = deser_result_metadata(buf)?;
    let result_metadata = match version {
        ProtocolVersion::V1 => None,
        ProtocolVersion::V2 => Some(deser_result_metadata(buf)?),
    };

    Ok(Prepared {
        id,
        prepared_metadata,
        result_metadata,
    })
}

fn deser_schema_change(buf: &mut &[u8]) -> StdResult<SchemaChange, ParseError> {
    Ok(SchemaChange {
        event: SchemaChangeEvent::deserialize(buf)?,
    })
}

pub fn deserialize(version: ProtocolVersion, buf: &mut &[u8]) -> StdResult<Result, ParseError> {
    use self::Result::*;
    Ok(match types::read_int(buf)? {
        0x0001 => Void,
        0x0002 => Rows(deser_rows(buf)?),
        0x0003 => SetKeyspace(deser_set_keyspace(buf)?),
        0x0004 => Prepared(deser_prepared(version, buf)?),
        0x0005 => SchemaChange(deser_schema_change(buf)?),
        kind => return Err(ParseError::UnknownResultKind(kind)),
    })
}
