//! # bitdadl
//!
//! A schema-driven binary codec for protocol and legacy record formats.
//!
//! Describe a format as a [Schema](schema::Schema) of named types: bit-exact
//! integers, BCD digits, justified text numbers, text and opaque blobs, and the
//! composites built from them (sequences, tagged and length-prefixed sequences,
//! discriminated choices). A [Context](context::Context) then decodes bytes into a
//! [Value](value::Value) tree and encodes it back, bit for bit.
//!
//! ## Example
//!
//! ```
//! use bitdadl::context::Context;
//! use bitdadl::expr::Expr;
//! use bitdadl::field::{OccursCountKind, SequenceElement};
//! use bitdadl::node::{Node, Sequence, SimpleType};
//! use bitdadl::schema::Schema;
//! use bitdadl::value::{Record, Value};
//!
//! let schema = Schema::compile([
//!     Node::from(SimpleType::unsigned("u8", 8)),
//!     Node::from(SimpleType::bcd("digits", 8)),
//!     Node::from(Sequence::new(
//!         "Packet",
//!         vec![
//!             SequenceElement::new("count", "u8")
//!                 .with_output_value_calc(Expr::field("items").len()),
//!             SequenceElement::list(
//!                 "items",
//!                 "digits",
//!                 OccursCountKind::Expression(Expr::field("count")),
//!             ),
//!         ],
//!     )),
//! ])
//! .unwrap();
//!
//! let context = Context::new(schema);
//! let packet = Record::new().with("items", vec![Value::U64(12), Value::U64(34)]);
//!
//! let bytes = context.marshal_value(&packet.into(), "Packet").unwrap();
//! assert_eq!(bytes, vec![0x02, 0x12, 0x34]);
//!
//! let decoded = context.unmarshal_value(&bytes, "Packet").unwrap();
//! assert_eq!(
//!     decoded.as_record().and_then(|r| r.get("items")),
//!     Some(&Value::Array(vec![Value::U64(12), Value::U64(34)]))
//! );
//! ```

pub mod bits;
pub mod context;
pub mod errors;
pub mod evaluator;
pub mod expr;
pub mod field;
pub mod marshal;
pub mod node;
pub mod reader;
pub mod schema;
pub mod text;
pub mod unmarshal;
pub mod value;
pub mod writer;

#[cfg(feature = "serde")]
pub mod serde;

pub use context::{Adapter, Context};
pub use errors::{Error, ErrorKind};
pub use schema::Schema;
pub use value::{FromValue, Info, Record, ToValue, Value};
