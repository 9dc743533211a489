//! Codec context: the schema, the adapter registry and the public entry points.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    bits::{BitReader, BitWriter},
    errors::{Error, ErrorKind},
    marshal::Marshaller,
    node::{BinaryNumberRep, Node, SimpleType},
    schema::Schema,
    unmarshal::Unmarshaller,
    value::{Info, Value},
};

/// Custom wire representation for a schema type.
///
/// Adapters are consulted before the native rules. A decode returning `Some` or an
/// encode returning `true` replaces native processing for that node entirely.
/// Decoded adapter values, leaf or composite, are not tested against the node's
/// discriminators; explicit length padding still applies to composites.
pub trait Adapter: Send + Sync {
    fn decode(&self, node: &Node, reader: &mut BitReader<'_>) -> Result<Option<Value>, ErrorKind> {
        let _ = (node, reader);
        Ok(None)
    }

    fn encode(&self, node: &Node, value: &Value, writer: &mut BitWriter) -> Result<bool, ErrorKind> {
        let _ = (node, value, writer);
        Ok(false)
    }

    /// Overrides the declared binary number representation of a simple type.
    fn binary_number_rep(&self, simple: &SimpleType) -> Option<BinaryNumberRep> {
        let _ = simple;
        None
    }
}

/// Immutable codec configuration shared by every marshal and unmarshal call.
pub struct Context {
    schema: Schema,
    adapters: HashMap<String, Box<dyn Adapter>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("schema", &self.schema)
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Context {
    pub fn new(schema: Schema) -> Self {
        Context {
            schema,
            adapters: HashMap::new(),
        }
    }

    /// Registers an adapter for the type named `type_name`.
    pub fn with_adapter(mut self, type_name: impl Into<String>, adapter: impl Adapter + 'static) -> Self {
        self.adapters.insert(type_name.into(), Box::new(adapter));
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn try_decode(
        &self,
        node: &Node,
        reader: &mut BitReader<'_>,
    ) -> Result<Option<Value>, ErrorKind> {
        match self.adapters.get(node.name()) {
            Some(adapter) => adapter.decode(node, reader),
            None => Ok(None),
        }
    }

    pub(crate) fn try_encode(
        &self,
        node: &Node,
        value: &Value,
        writer: &mut BitWriter,
    ) -> Result<bool, ErrorKind> {
        match self.adapters.get(node.name()) {
            Some(adapter) => adapter.encode(node, value, writer),
            None => Ok(false),
        }
    }

    pub(crate) fn binary_number_rep(&self, simple: &SimpleType) -> BinaryNumberRep {
        self.adapters
            .get(&simple.name)
            .and_then(|adapter| adapter.binary_number_rep(simple))
            .unwrap_or(simple.binary_number_rep)
    }

    /// Decodes a whole buffer as `T::TYPE_NAME`.
    pub fn unmarshal<T: Info>(&self, bytes: &[u8]) -> Result<T, Error> {
        self.unmarshal_range(bytes, 0, bytes.len())
    }

    /// Decodes `length` bytes starting at byte `offset` as `T::TYPE_NAME`.
    pub fn unmarshal_range<T: Info>(&self, bytes: &[u8], offset: usize, length: usize) -> Result<T, Error> {
        let value = self.unmarshal_value_range(bytes, offset, length, T::TYPE_NAME)?;
        T::from_value(value).map_err(|kind| Error::from(kind).at(T::TYPE_NAME))
    }

    pub fn unmarshal_value(&self, bytes: &[u8], type_name: &str) -> Result<Value, Error> {
        self.unmarshal_value_range(bytes, 0, bytes.len(), type_name)
    }

    pub fn unmarshal_value_range(
        &self,
        bytes: &[u8],
        offset: usize,
        length: usize,
        type_name: &str,
    ) -> Result<Value, Error> {
        debug!(type_name, offset, length, "unmarshal");

        let mut reader = BitReader::with_range(bytes, offset, length)
            .map_err(|e| Error::from(e).at(type_name))?;
        Unmarshaller::new(self)
            .unmarshal(type_name, &mut reader)
            .map_err(|e| e.at(type_name))
    }

    pub fn marshal<T: Info>(&self, info: &T) -> Result<Vec<u8>, Error> {
        self.marshal_value(&info.to_value(), T::TYPE_NAME)
    }

    pub fn marshal_value(&self, value: &Value, type_name: &str) -> Result<Vec<u8>, Error> {
        debug!(type_name, "marshal");

        let mut writer = BitWriter::new();
        Marshaller::new(self)
            .marshal(value, type_name, &mut writer)
            .map_err(|e| e.at(type_name))?;
        Ok(writer.finish())
    }
}
