//! Schema: the registry of named nodes the codec resolves type references against.

use std::collections::BTreeMap;

use crate::{
    errors::{ErrorKind, SchemaError},
    node::Node,
};

/// Immutable set of named [Node]s. Build it once, then share it through a
/// [crate::context::Context].
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: BTreeMap<String, Node>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from a list of nodes. Fails on duplicate type names.
    pub fn compile<I, N>(nodes: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        let mut schema = Schema::new();
        for node in nodes {
            schema.add(node)?;
        }

        Ok(schema)
    }

    pub fn add(&mut self, node: impl Into<Node>) -> Result<(), SchemaError> {
        let node = node.into();
        let name = node.name().to_string();

        if self.types.contains_key(&name) {
            return Err(SchemaError::DuplicateType(name));
        }

        self.types.insert(name, node);
        Ok(())
    }

    /// Builder-style [Schema::add].
    pub fn with(mut self, node: impl Into<Node>) -> Result<Self, SchemaError> {
        self.add(node)?;
        Ok(self)
    }

    pub fn get_type(&self, name: &str) -> Result<&Node, ErrorKind> {
        self.types
            .get(name)
            .ok_or_else(|| ErrorKind::UnknownType(name.to_string()))
    }

    pub fn types(&self) -> impl Iterator<Item = &Node> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Parses a JSON [crate::serde::SchemaDef] document and builds the schema.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let def: crate::serde::SchemaDef =
            serde_json::from_str(json).map_err(|e| SchemaError::Json(e.to_string()))?;
        def.try_into()
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::SchemaDef> for Schema {
    type Error = SchemaError;

    fn try_from(value: crate::serde::SchemaDef) -> Result<Self, Self::Error> {
        let nodes = value
            .types
            .into_iter()
            .map(Node::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Schema::compile(nodes)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        field::SequenceElement,
        node::{Sequence, SimpleType},
    };

    use super::*;

    #[test]
    fn test_compile_empty() {
        let schema = Schema::compile(Vec::<Node>::new()).unwrap();
        assert!(schema.is_empty());
    }

    #[test]
    fn test_compile_and_lookup() {
        let schema = Schema::compile([
            Node::from(SimpleType::unsigned("u8", 8)),
            Node::from(Sequence::new(
                "Header",
                vec![SequenceElement::new("id", "u8")],
            )),
        ])
        .unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get_type("Header").unwrap().name(), "Header");
        assert_eq!(
            schema.get_type("Missing").unwrap_err(),
            ErrorKind::UnknownType("Missing".into())
        );
    }

    #[test]
    fn test_duplicate_type() {
        let result = Schema::new()
            .with(SimpleType::unsigned("u8", 8))
            .and_then(|s| s.with(SimpleType::unsigned("u8", 16)));

        assert_eq!(result.unwrap_err(), SchemaError::DuplicateType("u8".into()));
    }
}
