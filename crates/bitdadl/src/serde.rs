//! JSON-deserializable schema description.
//!
//! These types mirror the schema nodes of [crate::node] and [crate::field] in a
//! form that is convenient to write by hand, e.g. in a schema file shipped with
//! your application. Convert a [SchemaDef] with `Schema::try_from`, or call
//! `Schema::from_json` directly.
//!
//! ```
//! use bitdadl::schema::Schema;
//!
//! let schema = Schema::from_json(r#"{
//!     "types": [
//!         { "kind": "Simple", "name": "u8", "unsigned": true, "length": 8, "length_unit": "Bit" },
//!         { "kind": "Sequence", "name": "Header", "elements": [
//!             { "name": "version", "type": "u8" },
//!             { "name": "flags", "type": "u8", "min_occurs": 0 }
//!         ] }
//!     ]
//! }"#).unwrap();
//! assert_eq!(schema.len(), 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// Top-level schema definition: every named type of the format.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchemaDef {
    pub types: Vec<TypeDef>,
}

/// A schema node, tagged by `kind`.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "kind")]
pub enum TypeDef {
    Simple(SimpleTypeDef),
    Enumeration {
        #[serde(flatten)]
        base: SimpleTypeDef,
        values: Vec<EnumValueDef>,
    },
    Sequence {
        name: String,
        #[serde(flatten)]
        layout: LayoutDef,
        elements: Vec<SequenceElementDef>,
    },
    TaggedSequence {
        name: String,
        #[serde(flatten)]
        layout: LayoutDef,
        #[serde(default)]
        tag: Option<TagDef>,
        /// Name of the simple type holding the body length in bytes.
        #[serde(default)]
        length_field: Option<String>,
        elements: Vec<SequenceElementDef>,
    },
    Choice {
        name: String,
        #[serde(flatten)]
        layout: LayoutDef,
        elements: Vec<ElementDef>,
    },
}

/// Either an integer literal or a full expression tree.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum ExprDef {
    Int(i64),
    Expr(Expr),
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy)]
pub enum ContentTypeDef {
    #[default]
    Integer,
    Text,
    Opaque,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy)]
pub enum RepresentationDef {
    #[default]
    Binary,
    Text,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy)]
pub enum BinaryNumberRepDef {
    #[default]
    Binary,
    Bcd,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub enum LengthKindDef {
    Explicit,
    Implicit,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy)]
pub enum LengthUnitDef {
    Bit,
    #[default]
    Byte,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy)]
pub enum JustificationDef {
    #[default]
    Left,
    Right,
    Center,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy)]
pub enum TestKindDef {
    #[default]
    Expression,
    Pattern,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DiscriminatorDef {
    pub test: ExprDef,
    #[serde(default)]
    pub test_kind: TestKindDef,
    #[serde(default)]
    pub message: Option<String>,
}

/// Length attributes shared by every node kind.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct LayoutDef {
    /// Defaults to `Explicit` when `length` is given, `Implicit` otherwise.
    #[serde(default)]
    pub length_kind: Option<LengthKindDef>,
    #[serde(default)]
    pub length: Option<ExprDef>,
    #[serde(default)]
    pub length_unit: LengthUnitDef,
    #[serde(default)]
    pub min_length: Option<ExprDef>,
    #[serde(default)]
    pub discriminator: Option<DiscriminatorDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimpleTypeDef {
    pub name: String,
    #[serde(default)]
    pub content_type: ContentTypeDef,
    #[serde(default)]
    pub representation: RepresentationDef,
    #[serde(default)]
    pub binary_number_rep: BinaryNumberRepDef,
    #[serde(default)]
    pub unsigned: bool,
    #[serde(flatten)]
    pub layout: LayoutDef,
    /// IANA character set name, e.g. `UTF-8` or `ISO-8859-1`.
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub justification: JustificationDef,
    #[serde(default)]
    pub pad_character: Option<String>,
}

/// Raw wire value of an enumeration constant.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum RawDef {
    Int(i64),
    Text(String),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EnumValueDef {
    pub name: String,
    pub raw: RawDef,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TagDef {
    #[serde(rename = "type")]
    pub type_name: String,
    /// Expected marker value as a hexadecimal literal, with or without `0x`.
    pub value: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub enum OccursCountKindDef {
    Expression,
    Parsed,
    EndOfParent,
}

/// A member of a choice.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ElementDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub length: Option<ExprDef>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub discriminator: Option<DiscriminatorDef>,
}

fn one() -> u64 {
    1
}

fn some_one() -> Option<u64> {
    Some(1)
}

/// A member of a sequence or tagged sequence.
///
/// `min_occurs = 1, max_occurs = 1` is a required field, `min_occurs = 0,
/// max_occurs = 1` an optional one; anything else (`max_occurs = null` for
/// unbounded) is a list.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SequenceElementDef {
    #[serde(flatten)]
    pub element: ElementDef,
    #[serde(default = "one")]
    pub min_occurs: u64,
    #[serde(default = "some_one")]
    pub max_occurs: Option<u64>,
    /// Defaults to `Expression` when `occurs_count` is given, `Parsed` otherwise.
    #[serde(default)]
    pub occurs_count_kind: Option<OccursCountKindDef>,
    #[serde(default)]
    pub occurs_count: Option<ExprDef>,
    #[serde(default)]
    pub output_value_calc: Option<ExprDef>,
}
