//! Schema nodes: the closed set of type kinds a schema is built from.
//!
//! Leaves ([SimpleType], [Enumeration]) describe how one scalar is laid out on the
//! wire. Composites ([Sequence], [TaggedSequence], [Choice]) list their fields in
//! decode/encode order.

use crate::{
    expr::Expr,
    field::{Element, SequenceElement},
    text::{Encoding, Justification},
    value::Value,
};

/// What a leaf holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentType {
    #[default]
    Integer,
    Text,
    Opaque,
}

/// How an integer is represented: as bits or as decimal text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Representation {
    #[default]
    Binary,
    Text,
}

/// Encoding of a binary integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BinaryNumberRep {
    /// Two's complement or unsigned, most significant bit first.
    #[default]
    Binary,
    /// One decimal digit per nibble.
    Bcd,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthKind {
    /// Length given by the `length` expression.
    Explicit,
    #[default]
    Implicit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthUnit {
    Bit,
    #[default]
    Byte,
}

impl LengthUnit {
    pub fn bits(&self) -> u64 {
        match self {
            LengthUnit::Bit => 1,
            LengthUnit::Byte => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TestKind {
    #[default]
    Expression,
    /// Regular expression over the raw data. Not supported by the codec.
    Pattern,
}

/// Boolean test that must hold after a value is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminator {
    pub test: Expr,
    pub test_kind: TestKind,
    /// Message reported when the test fails. Defaults to a description of the test.
    pub message: Option<String>,
}

impl Discriminator {
    pub fn new(test: Expr) -> Self {
        Discriminator {
            test,
            test_kind: TestKind::Expression,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Length and acceptance attributes shared by every node kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub length_kind: LengthKind,
    pub length: Option<Expr>,
    pub length_unit: LengthUnit,
    /// Lower bound on the node's size; shorter content is padded, longer content is kept.
    pub min_length: Option<Expr>,
    pub discriminator: Option<Discriminator>,
}

impl Layout {
    pub fn explicit(length: Expr, length_unit: LengthUnit) -> Self {
        Layout {
            length_kind: LengthKind::Explicit,
            length: Some(length),
            length_unit,
            ..Default::default()
        }
    }
}

/// Leaf scalar descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleType {
    pub name: String,
    pub content_type: ContentType,
    pub representation: Representation,
    pub binary_number_rep: BinaryNumberRep,
    pub unsigned: bool,
    pub layout: Layout,
    pub encoding: Encoding,
    pub justification: Justification,
    /// Pad string written once per padded position of a text number.
    pub pad_character: String,
}

impl SimpleType {
    fn new(name: impl Into<String>, content_type: ContentType, layout: Layout) -> Self {
        SimpleType {
            name: name.into(),
            content_type,
            representation: Representation::Binary,
            binary_number_rep: BinaryNumberRep::Binary,
            unsigned: false,
            layout,
            encoding: Encoding::Utf8,
            justification: Justification::Left,
            pad_character: " ".to_string(),
        }
    }

    /// Unsigned binary integer of `bits` bits.
    pub fn unsigned(name: impl Into<String>, bits: u32) -> Self {
        let mut simple = Self::signed(name, bits);
        simple.unsigned = true;
        simple
    }

    /// Two's complement binary integer of `bits` bits.
    pub fn signed(name: impl Into<String>, bits: u32) -> Self {
        Self::new(
            name,
            ContentType::Integer,
            Layout::explicit(Expr::Int(bits.into()), LengthUnit::Bit),
        )
    }

    /// Non-negative BCD integer of `bits / 4` digits.
    pub fn bcd(name: impl Into<String>, bits: u32) -> Self {
        let mut simple = Self::unsigned(name, bits);
        simple.binary_number_rep = BinaryNumberRep::Bcd;
        simple
    }

    /// Decimal integer written as `bytes` characters, left justified with spaces.
    pub fn text_number(name: impl Into<String>, bytes: u32) -> Self {
        let mut simple = Self::new(
            name,
            ContentType::Integer,
            Layout::explicit(Expr::Int(bytes.into()), LengthUnit::Byte),
        );
        simple.representation = Representation::Text;
        simple
    }

    /// Fixed-length text of `bytes` bytes.
    pub fn text(name: impl Into<String>, bytes: u32) -> Self {
        Self::new(
            name,
            ContentType::Text,
            Layout::explicit(Expr::Int(bytes.into()), LengthUnit::Byte),
        )
    }

    /// Fixed-length raw bytes.
    pub fn opaque(name: impl Into<String>, bytes: u32) -> Self {
        Self::new(
            name,
            ContentType::Opaque,
            Layout::explicit(Expr::Int(bytes.into()), LengthUnit::Byte),
        )
    }

    pub fn justified(mut self, justification: Justification, pad_character: impl Into<String>) -> Self {
        self.justification = justification;
        self.pad_character = pad_character.into();
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Replaces the literal length with a computed one, keeping the unit.
    pub fn with_length(mut self, length: Expr) -> Self {
        self.layout.length_kind = LengthKind::Explicit;
        self.layout.length = Some(length);
        self
    }

    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.layout.discriminator = Some(discriminator);
        self
    }
}

/// A named constant of an [Enumeration] and its raw wire value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    /// Integer or text, matching the enumeration's content type.
    pub raw: Value,
}

/// Leaf whose raw scalar maps onto a closed set of named constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumeration {
    /// Wire layout of the raw scalar; its name is the enumeration's name.
    pub base: SimpleType,
    pub values: Vec<EnumValue>,
}

impl Enumeration {
    pub fn new(base: SimpleType) -> Self {
        Enumeration {
            base,
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, raw: impl Into<Value>) -> Self {
        self.values.push(EnumValue {
            name: name.into(),
            raw: raw.into(),
        });
        self
    }

    /// Constant whose raw value equals `raw`.
    pub fn constant_for(&self, raw: &Value) -> Option<&EnumValue> {
        self.values.iter().find(|v| match (&v.raw, raw) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (a, b) => a.as_i128().is_some() && a.as_i128() == b.as_i128(),
        })
    }

    pub fn raw_for(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|v| v.name == name).map(|v| &v.raw)
    }
}

/// Fixed marker written before the body of a [TaggedSequence].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Simple type the marker is read and written with.
    pub type_name: String,
    pub value: u64,
}

impl Tag {
    pub fn new(type_name: impl Into<String>, value: u64) -> Self {
        Tag {
            type_name: type_name.into(),
            value,
        }
    }
}

/// Leaf holding the byte length of the rest of a [TaggedSequence].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthField {
    pub type_name: String,
}

/// Ordered list of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub name: String,
    pub layout: Layout,
    pub elements: Vec<SequenceElement>,
}

impl Sequence {
    pub fn new(name: impl Into<String>, elements: Vec<SequenceElement>) -> Self {
        Sequence {
            name: name.into(),
            layout: Layout::default(),
            elements,
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }
}

/// A [Sequence] guarded by an optional tag and an optional length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSequence {
    pub name: String,
    pub layout: Layout,
    pub tag: Option<Tag>,
    pub length_field: Option<LengthField>,
    pub elements: Vec<SequenceElement>,
}

impl TaggedSequence {
    pub fn new(name: impl Into<String>, elements: Vec<SequenceElement>) -> Self {
        TaggedSequence {
            name: name.into(),
            layout: Layout::default(),
            tag: None,
            length_field: None,
            elements,
        }
    }

    pub fn with_tag(mut self, type_name: impl Into<String>, value: u64) -> Self {
        self.tag = Some(Tag::new(type_name, value));
        self
    }

    pub fn with_length_field(mut self, type_name: impl Into<String>) -> Self {
        self.length_field = Some(LengthField {
            type_name: type_name.into(),
        });
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }
}

/// Ordered alternatives of which exactly one is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub name: String,
    pub layout: Layout,
    pub elements: Vec<Element>,
}

impl Choice {
    pub fn new(name: impl Into<String>, elements: Vec<Element>) -> Self {
        Choice {
            name: name.into(),
            layout: Layout::default(),
            elements,
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }
}

/// Any schema type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Simple(SimpleType),
    Enumeration(Enumeration),
    Sequence(Sequence),
    TaggedSequence(TaggedSequence),
    Choice(Choice),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Simple(s) => &s.name,
            Node::Enumeration(e) => &e.base.name,
            Node::Sequence(s) => &s.name,
            Node::TaggedSequence(s) => &s.name,
            Node::Choice(c) => &c.name,
        }
    }

    pub fn layout(&self) -> &Layout {
        match self {
            Node::Simple(s) => &s.layout,
            Node::Enumeration(e) => &e.base.layout,
            Node::Sequence(s) => &s.layout,
            Node::TaggedSequence(s) => &s.layout,
            Node::Choice(c) => &c.layout,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Simple(_) | Node::Enumeration(_))
    }
}

impl From<SimpleType> for Node {
    fn from(value: SimpleType) -> Self {
        Node::Simple(value)
    }
}

impl From<Enumeration> for Node {
    fn from(value: Enumeration) -> Self {
        Node::Enumeration(value)
    }
}

impl From<Sequence> for Node {
    fn from(value: Sequence) -> Self {
        Node::Sequence(value)
    }
}

impl From<TaggedSequence> for Node {
    fn from(value: TaggedSequence) -> Self {
        Node::TaggedSequence(value)
    }
}

impl From<Choice> for Node {
    fn from(value: Choice) -> Self {
        Node::Choice(value)
    }
}

#[cfg(feature = "serde")]
impl From<crate::serde::ContentTypeDef> for ContentType {
    fn from(value: crate::serde::ContentTypeDef) -> Self {
        match value {
            crate::serde::ContentTypeDef::Integer => ContentType::Integer,
            crate::serde::ContentTypeDef::Text => ContentType::Text,
            crate::serde::ContentTypeDef::Opaque => ContentType::Opaque,
        }
    }
}

#[cfg(feature = "serde")]
impl From<crate::serde::RepresentationDef> for Representation {
    fn from(value: crate::serde::RepresentationDef) -> Self {
        match value {
            crate::serde::RepresentationDef::Binary => Representation::Binary,
            crate::serde::RepresentationDef::Text => Representation::Text,
        }
    }
}

#[cfg(feature = "serde")]
impl From<crate::serde::BinaryNumberRepDef> for BinaryNumberRep {
    fn from(value: crate::serde::BinaryNumberRepDef) -> Self {
        match value {
            crate::serde::BinaryNumberRepDef::Binary => BinaryNumberRep::Binary,
            crate::serde::BinaryNumberRepDef::Bcd => BinaryNumberRep::Bcd,
        }
    }
}

#[cfg(feature = "serde")]
impl From<crate::serde::LengthUnitDef> for LengthUnit {
    fn from(value: crate::serde::LengthUnitDef) -> Self {
        match value {
            crate::serde::LengthUnitDef::Bit => LengthUnit::Bit,
            crate::serde::LengthUnitDef::Byte => LengthUnit::Byte,
        }
    }
}

#[cfg(feature = "serde")]
impl From<crate::serde::DiscriminatorDef> for Discriminator {
    fn from(value: crate::serde::DiscriminatorDef) -> Self {
        Discriminator {
            test: value.test.into(),
            test_kind: match value.test_kind {
                crate::serde::TestKindDef::Expression => TestKind::Expression,
                crate::serde::TestKindDef::Pattern => TestKind::Pattern,
            },
            message: value.message,
        }
    }
}

#[cfg(feature = "serde")]
impl From<crate::serde::LayoutDef> for Layout {
    fn from(value: crate::serde::LayoutDef) -> Self {
        let length_kind = match value.length_kind {
            Some(crate::serde::LengthKindDef::Explicit) => LengthKind::Explicit,
            Some(crate::serde::LengthKindDef::Implicit) => LengthKind::Implicit,
            None if value.length.is_some() => LengthKind::Explicit,
            None => LengthKind::Implicit,
        };

        Layout {
            length_kind,
            length: value.length.map(Into::into),
            length_unit: value.length_unit.into(),
            min_length: value.min_length.map(Into::into),
            discriminator: value.discriminator.map(Into::into),
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::SimpleTypeDef> for SimpleType {
    type Error = crate::errors::SchemaError;

    fn try_from(value: crate::serde::SimpleTypeDef) -> Result<Self, Self::Error> {
        let encoding = value
            .encoding
            .map(|name| Encoding::from_name(&name).ok_or(crate::errors::SchemaError::UnknownEncoding(name)))
            .transpose()?
            .unwrap_or_default();

        Ok(SimpleType {
            name: value.name,
            content_type: value.content_type.into(),
            representation: value.representation.into(),
            binary_number_rep: value.binary_number_rep.into(),
            unsigned: value.unsigned,
            layout: value.layout.into(),
            encoding,
            justification: match value.justification {
                crate::serde::JustificationDef::Left => Justification::Left,
                crate::serde::JustificationDef::Right => Justification::Right,
                crate::serde::JustificationDef::Center => Justification::Center,
            },
            pad_character: value.pad_character.unwrap_or_else(|| " ".to_string()),
        })
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::TagDef> for Tag {
    type Error = crate::errors::SchemaError;

    fn try_from(value: crate::serde::TagDef) -> Result<Self, Self::Error> {
        let digits = value
            .value
            .strip_prefix("0x")
            .or_else(|| value.value.strip_prefix("0X"))
            .unwrap_or(&value.value);

        let parsed = u64::from_str_radix(digits, 16)
            .map_err(|_| crate::errors::SchemaError::InvalidTag(value.value.clone()))?;

        Ok(Tag::new(value.type_name, parsed))
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::TypeDef> for Node {
    type Error = crate::errors::SchemaError;

    fn try_from(value: crate::serde::TypeDef) -> Result<Self, Self::Error> {
        use crate::serde::{RawDef, TypeDef};

        let node = match value {
            TypeDef::Simple(simple) => Node::Simple(simple.try_into()?),
            TypeDef::Enumeration { base, values } => Node::Enumeration(Enumeration {
                base: base.try_into()?,
                values: values
                    .into_iter()
                    .map(|v| EnumValue {
                        name: v.name,
                        raw: match v.raw {
                            RawDef::Int(i) => Value::I64(i),
                            RawDef::Text(s) => Value::Text(s),
                        },
                    })
                    .collect(),
            }),
            TypeDef::Sequence {
                name,
                layout,
                elements,
            } => Node::Sequence(Sequence {
                name,
                layout: layout.into(),
                elements: elements
                    .into_iter()
                    .map(TryInto::try_into)
                    .collect::<Result<_, _>>()?,
            }),
            TypeDef::TaggedSequence {
                name,
                layout,
                tag,
                length_field,
                elements,
            } => Node::TaggedSequence(TaggedSequence {
                name,
                layout: layout.into(),
                tag: tag.map(TryInto::try_into).transpose()?,
                length_field: length_field.map(|type_name| LengthField { type_name }),
                elements: elements
                    .into_iter()
                    .map(TryInto::try_into)
                    .collect::<Result<_, _>>()?,
            }),
            TypeDef::Choice {
                name,
                layout,
                elements,
            } => Node::Choice(Choice {
                name,
                layout: layout.into(),
                elements: elements
                    .into_iter()
                    .map(TryInto::try_into)
                    .collect::<Result<_, _>>()?,
            }),
        };

        Ok(node)
    }
}
