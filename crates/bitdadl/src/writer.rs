//! Leaf encoding, the inverse of [crate::reader].

use tracing::trace;

use crate::{
    bits::{BitWriter, NIBBLE_SIZE},
    context::Context,
    errors::{BitError, ErrorKind},
    evaluator::Evaluator,
    field::Element,
    node::{BinaryNumberRep, ContentType, Node, Representation, SimpleType},
    reader::{binary_width, byte_length, declared_byte_length, encoding, to_usize},
    value::Value,
};

/// Encodes one leaf value per call.
pub struct SimpleTypeWriter<'c> {
    context: &'c Context,
}

impl<'c> SimpleTypeWriter<'c> {
    pub fn new(context: &'c Context) -> Self {
        Self { context }
    }

    /// Encodes `value` as a leaf node of type `node` for `element`.
    ///
    /// An adapter registered for the type takes precedence over the native rules.
    pub fn write(
        &self,
        node: &Node,
        element: Option<&Element>,
        value: &Value,
        evaluator: &mut Evaluator,
        writer: &mut BitWriter,
    ) -> Result<(), ErrorKind> {
        evaluator.set_self(value.clone());

        if self.context.try_encode(node, value, writer)? {
            trace!(type_name = node.name(), "value written by adapter");
            return Ok(());
        }

        trace!(type_name = node.name(), ?value, "write simple value");

        match node {
            Node::Simple(simple) => self.write_simple(simple, element, value, evaluator, writer),
            Node::Enumeration(enumeration) => {
                let name = value
                    .as_str()
                    .ok_or_else(|| ErrorKind::shape("enumeration constant", value))?;
                let raw = enumeration.raw_for(name).ok_or_else(|| {
                    ErrorKind::UnknownEnumConstant {
                        enumeration: enumeration.base.name.clone(),
                        name: name.to_string(),
                    }
                })?;

                self.write_simple(&enumeration.base, element, raw, evaluator, writer)
            }
            other => Err(ErrorKind::Unsupported(format!(
                "`{}` is not a simple type",
                other.name()
            ))),
        }
    }

    fn write_simple(
        &self,
        simple: &SimpleType,
        element: Option<&Element>,
        value: &Value,
        evaluator: &Evaluator,
        writer: &mut BitWriter,
    ) -> Result<(), ErrorKind> {
        match (simple.content_type, simple.representation) {
            (ContentType::Integer, Representation::Binary) => {
                let number = value
                    .as_i128()
                    .ok_or_else(|| ErrorKind::shape("integer", value))?;
                let bits = binary_width(simple, evaluator)?;

                match self.context.binary_number_rep(simple) {
                    BinaryNumberRep::Binary => write_standard(simple.unsigned, number, bits, writer),
                    BinaryNumberRep::Bcd => write_bcd(number, bits, writer),
                }
            }
            (ContentType::Integer, Representation::Text) => {
                let number = value
                    .as_i128()
                    .ok_or_else(|| ErrorKind::shape("integer", value))?;
                let width = byte_length(simple, element, evaluator)?;

                write_text_number(simple, element, number, width, writer)
            }
            (ContentType::Text, _) => {
                let Value::Text(text) = value else {
                    return Err(ErrorKind::shape("text", value));
                };

                let bytes = encoding(simple, element).encode(text)?;
                verify_length(simple, element, evaluator, bytes.len())?;
                Ok(writer.write_bytes(&bytes)?)
            }
            (ContentType::Opaque, _) => {
                let Value::Bytes(bytes) = value else {
                    return Err(ErrorKind::shape("bytes", value));
                };

                verify_length(simple, element, evaluator, bytes.len())?;
                Ok(writer.write_bytes(bytes)?)
            }
        }
    }
}

fn verify_length(
    simple: &SimpleType,
    element: Option<&Element>,
    evaluator: &Evaluator,
    actual: usize,
) -> Result<(), ErrorKind> {
    let Some(expected) = declared_byte_length(simple, element, evaluator)? else {
        return Ok(());
    };

    let actual = actual as u64;
    if expected != actual {
        return Err(ErrorKind::LengthMismatch { expected, actual });
    }

    Ok(())
}

fn fits(value: i128, bits: u64, unsigned: bool) -> bool {
    if bits == 0 {
        return value == 0;
    }

    if unsigned {
        value >= 0 && value < (1i128 << bits)
    } else {
        let half = 1i128 << (bits - 1);
        value >= -half && value < half
    }
}

fn write_standard(unsigned: bool, value: i128, bits: u64, writer: &mut BitWriter) -> Result<(), ErrorKind> {
    if bits > 64 {
        return Err(BitError::TooManyBits.into());
    }

    if !fits(value, bits, unsigned) {
        return Err(ErrorKind::ValueOutOfRange { value, bits });
    }

    // Two's complement truncation keeps exactly the low `bits` bits.
    writer.write_bits(value as u64, to_usize(bits)?)?;
    Ok(())
}

fn write_bcd(value: i128, bits: u64, writer: &mut BitWriter) -> Result<(), ErrorKind> {
    if bits % NIBBLE_SIZE as u64 != 0 {
        return Err(ErrorKind::BcdBitLength(bits));
    }

    if value < 0 {
        return Err(ErrorKind::ValueOutOfRange { value, bits });
    }

    let slots = bits / NIBBLE_SIZE as u64;
    let digits = value.to_string();
    let padding = slots
        .checked_sub(digits.len() as u64)
        .ok_or(ErrorKind::ValueTooLarge { value, width: slots })?;

    for _ in 0..padding {
        writer.write_bits(0, NIBBLE_SIZE)?;
    }

    for digit in digits.bytes() {
        writer.write_bits(u64::from(digit - b'0'), NIBBLE_SIZE)?;
    }

    Ok(())
}

fn write_text_number(
    simple: &SimpleType,
    element: Option<&Element>,
    value: i128,
    width: u64,
    writer: &mut BitWriter,
) -> Result<(), ErrorKind> {
    let encoding = encoding(simple, element);
    let text = encoding.encode(&value.to_string())?;
    if text.len() as u64 > width {
        return Err(ErrorKind::ValueTooLarge { value, width });
    }

    // Width and padding are counted in bytes, one pad byte per position.
    let (left, right) = simple.justification.padding(to_usize(width)?, text.len());
    let pad = encoding.encode(&simple.pad_character)?;
    if left + right > 0 && pad.len() != 1 {
        return Err(ErrorKind::Unsupported(format!(
            "pad character {:?} of `{}` is not a single byte in {}",
            simple.pad_character,
            simple.name,
            encoding.name()
        )));
    }

    for _ in 0..left {
        writer.write_bytes(&pad)?;
    }

    writer.write_bytes(&text)?;

    for _ in 0..right {
        writer.write_bytes(&pad)?;
    }

    Ok(())
}
