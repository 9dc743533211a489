//! Field descriptors: the members of sequences and choices.

use crate::{expr::Expr, node::Discriminator, text::Encoding};

/// A named reference to a schema type, as a member of a composite node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Field name; becomes the key in the decoded record.
    pub name: String,
    /// Name of the referenced [crate::node::Node].
    pub type_name: String,
    /// Overrides the type's length for text, text-number and opaque leaves.
    pub length: Option<Expr>,
    /// Overrides the type's character encoding.
    pub encoding: Option<Encoding>,
    pub discriminator: Option<Discriminator>,
}

impl Element {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            type_name: type_name.into(),
            length: None,
            encoding: None,
            discriminator: None,
        }
    }

    pub fn with_length(mut self, length: Expr) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }
}

/// How the number of items of a list field is determined when decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccursCountKind {
    /// Exactly as many items as the expression evaluates to.
    Expression(Expr),
    /// Items are decoded until one fails to decode.
    Parsed,
    /// Items are decoded until the end of the enclosing length-bounded node.
    EndOfParent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Optional,
    List(OccursCountKind),
}

/// A field of a [crate::node::Sequence] or [crate::node::TaggedSequence].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceElement {
    pub element: Element,
    pub cardinality: Cardinality,
    /// Encode-time expression that replaces any caller-supplied value.
    pub output_value_calc: Option<Expr>,
}

impl SequenceElement {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Element::new(name, type_name).into()
    }

    pub fn optional(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let mut element = Self::new(name, type_name);
        element.cardinality = Cardinality::Optional;
        element
    }

    pub fn list(
        name: impl Into<String>,
        type_name: impl Into<String>,
        occurs_count_kind: OccursCountKind,
    ) -> Self {
        let mut element = Self::new(name, type_name);
        element.cardinality = Cardinality::List(occurs_count_kind);
        element
    }

    pub fn name(&self) -> &str {
        &self.element.name
    }

    pub fn with_output_value_calc(mut self, expr: Expr) -> Self {
        self.output_value_calc = Some(expr);
        self
    }

    pub fn with_length(mut self, length: Expr) -> Self {
        self.element.length = Some(length);
        self
    }

    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.element.discriminator = Some(discriminator);
        self
    }
}

impl From<Element> for SequenceElement {
    fn from(element: Element) -> Self {
        SequenceElement {
            element,
            cardinality: Cardinality::Single,
            output_value_calc: None,
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::ElementDef> for Element {
    type Error = crate::errors::SchemaError;

    fn try_from(value: crate::serde::ElementDef) -> Result<Self, Self::Error> {
        let encoding = value
            .encoding
            .map(|name| Encoding::from_name(&name).ok_or(crate::errors::SchemaError::UnknownEncoding(name)))
            .transpose()?;

        Ok(Element {
            name: value.name,
            type_name: value.type_name,
            length: value.length.map(Into::into),
            encoding,
            discriminator: value.discriminator.map(Into::into),
        })
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::SequenceElementDef> for SequenceElement {
    type Error = crate::errors::SchemaError;

    fn try_from(value: crate::serde::SequenceElementDef) -> Result<Self, Self::Error> {
        use crate::{errors::SchemaError, serde::OccursCountKindDef};

        let name = value.element.name.clone();
        let is_list = match (value.min_occurs, value.max_occurs) {
            (0 | 1, Some(1)) => false,
            (min, Some(max)) if max == 0 || min > max => {
                return Err(SchemaError::InvalidOccurs(name));
            }
            _ => true,
        };

        let cardinality = if !is_list {
            match value.min_occurs {
                0 => Cardinality::Optional,
                _ => Cardinality::Single,
            }
        } else {
            let count = value.occurs_count.map(Expr::from);
            let kind = match (value.occurs_count_kind, count) {
                (Some(OccursCountKindDef::Expression) | None, Some(count)) => {
                    OccursCountKind::Expression(count)
                }
                (Some(OccursCountKindDef::Expression), None) => {
                    return Err(SchemaError::MissingOccursCount(name));
                }
                (Some(OccursCountKindDef::EndOfParent), _) => OccursCountKind::EndOfParent,
                (Some(OccursCountKindDef::Parsed) | None, _) => OccursCountKind::Parsed,
            };
            Cardinality::List(kind)
        };

        Ok(SequenceElement {
            element: value.element.try_into()?,
            cardinality,
            output_value_calc: value.output_value_calc.map(Into::into),
        })
    }
}
