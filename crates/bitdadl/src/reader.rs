//! Leaf decoding: integers, text numbers, text, opaque bytes and enumerations.

use tracing::trace;

use crate::{
    bits::{BYTE_SIZE, BitReader, NIBBLE_SIZE},
    context::Context,
    errors::{BitError, ErrorKind},
    evaluator::Evaluator,
    field::Element,
    node::{BinaryNumberRep, ContentType, Enumeration, LengthKind, Node, Representation, SimpleType},
    value::Value,
};

/// Decodes one leaf value per call.
pub struct SimpleTypeReader<'c> {
    context: &'c Context,
}

impl<'c> SimpleTypeReader<'c> {
    pub fn new(context: &'c Context) -> Self {
        Self { context }
    }

    /// Decodes a leaf node as the value of `element`, publishes it as `self` and
    /// checks the discriminators of the type and the element.
    ///
    /// A value produced by an adapter is returned as is.
    pub fn read(
        &self,
        node: &Node,
        element: Option<&Element>,
        evaluator: &mut Evaluator,
        reader: &mut BitReader<'_>,
    ) -> Result<Value, ErrorKind> {
        if let Some(value) = self.context.try_decode(node, reader)? {
            trace!(type_name = node.name(), "value produced by adapter");
            evaluator.set_self(value.clone());
            return Ok(value);
        }

        let value = match node {
            Node::Simple(simple) => self.read_simple(simple, element, evaluator, reader)?,
            Node::Enumeration(enumeration) => {
                self.read_enumeration(enumeration, element, evaluator, reader)?
            }
            other => {
                return Err(ErrorKind::Unsupported(format!(
                    "`{}` is not a simple type",
                    other.name()
                )));
            }
        };

        trace!(type_name = node.name(), ?value, "read simple value");

        evaluator.set_self(value.clone());
        check_discriminators(evaluator, node, element)?;

        Ok(value)
    }

    fn read_simple(
        &self,
        simple: &SimpleType,
        element: Option<&Element>,
        evaluator: &Evaluator,
        reader: &mut BitReader<'_>,
    ) -> Result<Value, ErrorKind> {
        match (simple.content_type, simple.representation) {
            (ContentType::Integer, Representation::Binary) => {
                let bits = binary_width(simple, evaluator)?;
                match self.context.binary_number_rep(simple) {
                    BinaryNumberRep::Binary => read_standard(simple.unsigned, bits, reader),
                    BinaryNumberRep::Bcd => read_bcd(bits, reader),
                }
            }
            (ContentType::Integer, Representation::Text) => {
                let bytes = read_field_bytes(simple, element, evaluator, reader)?;
                parse_text_number(simple, element, bytes)
            }
            (ContentType::Text, _) => {
                let bytes = read_field_bytes(simple, element, evaluator, reader)?;
                let text = encoding(simple, element).decode(bytes)?;
                Ok(Value::Text(text))
            }
            (ContentType::Opaque, _) => {
                let bytes = read_field_bytes(simple, element, evaluator, reader)?;
                Ok(Value::Bytes(bytes))
            }
        }
    }

    fn read_enumeration(
        &self,
        enumeration: &Enumeration,
        element: Option<&Element>,
        evaluator: &Evaluator,
        reader: &mut BitReader<'_>,
    ) -> Result<Value, ErrorKind> {
        if enumeration.base.content_type == ContentType::Opaque {
            return Err(ErrorKind::Unsupported(format!(
                "enumeration `{}` has opaque content",
                enumeration.base.name
            )));
        }

        let raw = self.read_simple(&enumeration.base, element, evaluator, reader)?;

        enumeration
            .constant_for(&raw)
            .map(|constant| Value::Enum(constant.name.clone()))
            .ok_or_else(|| ErrorKind::UnknownEnumValue {
                enumeration: enumeration.base.name.clone(),
                raw: describe(&raw),
            })
    }
}

/// Checks the discriminator of `node` and then that of `element` against the current `self`.
pub(crate) fn check_discriminators(
    evaluator: &Evaluator,
    node: &Node,
    element: Option<&Element>,
) -> Result<(), ErrorKind> {
    if let Some(discriminator) = &node.layout().discriminator {
        evaluator.check_discriminator(discriminator, node.name())?;
    }

    if let Some(element) = element {
        if let Some(discriminator) = &element.discriminator {
            evaluator.check_discriminator(discriminator, &element.name)?;
        }
    }

    Ok(())
}

pub(crate) fn to_usize(bits: u64) -> Result<usize, ErrorKind> {
    usize::try_from(bits).map_err(|_| ErrorKind::Bits(BitError::OutOfBounds))
}

/// Width in bits of a binary integer.
pub(crate) fn binary_width(simple: &SimpleType, evaluator: &Evaluator) -> Result<u64, ErrorKind> {
    let length = evaluator
        .compute_length(simple.layout.length.as_ref())?
        .ok_or_else(|| ErrorKind::Unsupported(format!("`{}` has no length", simple.name)))?;

    length
        .checked_mul(simple.layout.length_unit.bits())
        .ok_or_else(|| ErrorKind::Evaluation(format!("length of `{}` overflows", simple.name)))
}

/// Declared byte length of a text, text number or opaque field, if any.
///
/// The element's length takes precedence over the type's explicit length.
pub(crate) fn declared_byte_length(
    simple: &SimpleType,
    element: Option<&Element>,
    evaluator: &Evaluator,
) -> Result<Option<u64>, ErrorKind> {
    let declared = match simple.layout.length_kind {
        LengthKind::Explicit => simple.layout.length.as_ref(),
        LengthKind::Implicit => None,
    };
    let length = element.and_then(|e| e.length.as_ref()).or(declared);

    let Some(units) = evaluator.compute_length(length)? else {
        return Ok(None);
    };
    let bits = units.saturating_mul(simple.layout.length_unit.bits());

    if bits % BYTE_SIZE as u64 != 0 {
        return Err(ErrorKind::Unsupported(format!(
            "length of `{}` is not a whole number of bytes",
            simple.name
        )));
    }

    Ok(Some(bits / BYTE_SIZE as u64))
}

/// Like [declared_byte_length], for fields that only support explicit lengths.
pub(crate) fn byte_length(
    simple: &SimpleType,
    element: Option<&Element>,
    evaluator: &Evaluator,
) -> Result<u64, ErrorKind> {
    declared_byte_length(simple, element, evaluator)?.ok_or_else(|| {
        ErrorKind::Unsupported(format!("`{}` requires an explicit length", simple.name))
    })
}

pub(crate) fn encoding(simple: &SimpleType, element: Option<&Element>) -> crate::text::Encoding {
    element
        .and_then(|e| e.encoding)
        .unwrap_or(simple.encoding)
}

fn read_field_bytes(
    simple: &SimpleType,
    element: Option<&Element>,
    evaluator: &Evaluator,
    reader: &mut BitReader<'_>,
) -> Result<Vec<u8>, ErrorKind> {
    let len = to_usize(byte_length(simple, element, evaluator)?)?;
    if len > reader.remaining_bits() / BYTE_SIZE {
        return Err(BitError::OutOfBounds.into());
    }

    let mut bytes = vec![0u8; len];
    reader.read_bytes(&mut bytes)?;

    Ok(bytes)
}

fn read_standard(unsigned: bool, bits: u64, reader: &mut BitReader<'_>) -> Result<Value, ErrorKind> {
    let n = to_usize(bits)?;

    if unsigned {
        Ok(Value::U64(reader.read_bits(n)?))
    } else {
        Ok(Value::I64(reader.read_signed_bits(n)?))
    }
}

fn read_bcd(bits: u64, reader: &mut BitReader<'_>) -> Result<Value, ErrorKind> {
    if bits % NIBBLE_SIZE as u64 != 0 {
        return Err(ErrorKind::BcdBitLength(bits));
    }

    let digits = bits / NIBBLE_SIZE as u64;
    let mut value = 0u64;

    for _ in 0..digits {
        let digit = reader.read_bits(NIBBLE_SIZE)?;
        if digit > 9 {
            return Err(ErrorKind::IllegalBcdDigit(digit));
        }

        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit))
            .ok_or(ErrorKind::ValueOutOfRange {
                value: i128::from(value),
                bits,
            })?;
    }

    Ok(Value::U64(value))
}

// A digit pad is part of the number, so only non-digit padding is stripped.
fn parse_text_number(
    simple: &SimpleType,
    element: Option<&Element>,
    bytes: Vec<u8>,
) -> Result<Value, ErrorKind> {
    let text = encoding(simple, element).decode(bytes)?;

    let pad = simple.pad_character.as_str();
    let digits = if pad.bytes().all(|b| b.is_ascii_digit()) {
        text.as_str()
    } else {
        simple.justification.strip(&text, pad)
    };

    digits
        .parse::<i64>()
        .map(Value::I64)
        .map_err(|_| ErrorKind::InvalidTextNumber(text.clone()))
}

fn describe(raw: &Value) -> String {
    match raw {
        Value::Text(s) => format!("{s:?}"),
        other => other
            .as_i128()
            .map(|v| v.to_string())
            .unwrap_or_else(|| other.kind_name().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        expr::Expr,
        node::{Discriminator, TestKind},
        schema::Schema,
        text::Justification,
    };

    use super::*;

    fn read(context: &Context, node: impl Into<Node>, data: &[u8]) -> Result<Value, ErrorKind> {
        read_element(context, node, None, data)
    }

    fn read_element(
        context: &Context,
        node: impl Into<Node>,
        element: Option<&Element>,
        data: &[u8],
    ) -> Result<Value, ErrorKind> {
        let node = node.into();
        let mut evaluator = Evaluator::new();
        let mut reader = BitReader::new(data);
        SimpleTypeReader::new(context).read(&node, element, &mut evaluator, &mut reader)
    }

    fn context() -> Context {
        Context::new(Schema::new())
    }

    #[test]
    fn test_standard_binary() {
        let context = context();
        assert_eq!(
            read(&context, SimpleType::unsigned("u8", 8), &[0x2A]).unwrap(),
            Value::U64(42)
        );
        assert_eq!(
            read(&context, SimpleType::signed("i8", 8), &[0xFF]).unwrap(),
            Value::I64(-1)
        );
        assert_eq!(
            read(&context, SimpleType::unsigned("u12", 12), &[0xAB, 0xC0]).unwrap(),
            Value::U64(0xABC)
        );
    }

    #[test]
    fn test_byte_unit() {
        let mut simple = SimpleType::unsigned("u16", 2);
        simple.layout.length_unit = crate::node::LengthUnit::Byte;
        assert_eq!(
            read(&context(), simple, &[0x01, 0x02]).unwrap(),
            Value::U64(0x0102)
        );
    }

    #[test]
    fn test_out_of_bounds() {
        assert_eq!(
            read(&context(), SimpleType::unsigned("u16", 16), &[0x01]).unwrap_err(),
            ErrorKind::Bits(BitError::OutOfBounds)
        );
    }

    #[test]
    fn test_bcd() {
        let context = context();
        assert_eq!(
            read(&context, SimpleType::bcd("bcd", 8), &[0x42]).unwrap(),
            Value::U64(42)
        );
        assert_eq!(
            read(&context, SimpleType::bcd("bcd", 16), &[0x09, 0x87]).unwrap(),
            Value::U64(987)
        );
        assert_eq!(
            read(&context, SimpleType::bcd("bcd", 8), &[0x4A]).unwrap_err(),
            ErrorKind::IllegalBcdDigit(10)
        );
        assert_eq!(
            read(&context, SimpleType::bcd("bcd", 6), &[0x42]).unwrap_err(),
            ErrorKind::BcdBitLength(6)
        );
    }

    #[test]
    fn test_text_number() {
        let context = context();
        let zero_padded = SimpleType::text_number("n", 4).justified(Justification::Right, "0");
        assert_eq!(
            read(&context, zero_padded.clone(), b"0007").unwrap(),
            Value::I64(7)
        );
        assert_eq!(read(&context, zero_padded, b"0000").unwrap(), Value::I64(0));

        let centered = SimpleType::text_number("n", 5).justified(Justification::Center, " ");
        assert_eq!(read(&context, centered, b"  12 ").unwrap(), Value::I64(12));

        let left = SimpleType::text_number("n", 4);
        assert_eq!(read(&context, left.clone(), b"-5  ").unwrap(), Value::I64(-5));
        assert_eq!(
            read(&context, left, b"ab  ").unwrap_err(),
            ErrorKind::InvalidTextNumber("ab  ".into())
        );
    }

    #[test]
    fn test_text_and_opaque() {
        let context = context();
        assert_eq!(
            read(&context, SimpleType::text("t", 5), b"Hello").unwrap(),
            Value::Text("Hello".into())
        );
        assert_eq!(
            read(&context, SimpleType::opaque("o", 2), &[0xDE, 0xAD]).unwrap(),
            Value::Bytes(vec![0xDE, 0xAD])
        );
    }

    #[test]
    fn test_element_overrides() {
        let element = Element::new("name", "t")
            .with_length(Expr::int(2))
            .with_encoding(crate::text::Encoding::Latin1);

        assert_eq!(
            read_element(&context(), SimpleType::text("t", 5), Some(&element), &[0x48, 0xE9]).unwrap(),
            Value::Text("Hé".into())
        );
    }

    #[test]
    fn test_implicit_text_unsupported() {
        let mut simple = SimpleType::text("t", 5);
        simple.layout.length_kind = LengthKind::Implicit;

        assert!(matches!(
            read(&context(), simple, b"Hello").unwrap_err(),
            ErrorKind::Unsupported(_)
        ));
    }

    #[test]
    fn test_enumeration() {
        let colour = Enumeration::new(SimpleType::unsigned("Colour", 8))
            .with_value("RED", 1u64)
            .with_value("GREEN", 2u64);

        let context = context();
        assert_eq!(
            read(&context, colour.clone(), &[0x02]).unwrap(),
            Value::Enum("GREEN".into())
        );
        assert_eq!(
            read(&context, colour, &[0x07]).unwrap_err(),
            ErrorKind::UnknownEnumValue {
                enumeration: "Colour".into(),
                raw: "7".into()
            }
        );
    }

    #[test]
    fn test_text_enumeration() {
        let currency = Enumeration::new(SimpleType::text("Currency", 3))
            .with_value("EURO", "EUR")
            .with_value("DOLLAR", "USD");

        assert_eq!(
            read(&context(), currency, b"USD").unwrap(),
            Value::Enum("DOLLAR".into())
        );
    }

    #[test]
    fn test_discriminators() {
        let context = context();
        let simple = SimpleType::unsigned("u8", 8)
            .with_discriminator(Discriminator::new(Expr::this().less_than(Expr::int(10))));
        assert!(read(&context, simple.clone(), &[0x09]).is_ok());
        assert!(matches!(
            read(&context, simple.clone(), &[0x0A]).unwrap_err(),
            ErrorKind::DiscriminatorNotSatisfied(_)
        ));

        let element = Element::new("kind", "u8")
            .with_discriminator(Discriminator::new(Expr::this().equals(Expr::int(3))));
        assert!(matches!(
            read_element(&context, simple, Some(&element), &[0x04]).unwrap_err(),
            ErrorKind::DiscriminatorNotSatisfied(_)
        ));

        let mut pattern = Discriminator::new(Expr::bool(true));
        pattern.test_kind = TestKind::Pattern;
        let simple = SimpleType::unsigned("u8", 8).with_discriminator(pattern);
        assert_eq!(
            read(&context, simple, &[0x01]).unwrap_err(),
            ErrorKind::PatternDiscriminator("u8".into())
        );
    }

    struct Fixed;

    impl crate::context::Adapter for Fixed {
        fn decode(&self, _node: &Node, reader: &mut BitReader<'_>) -> Result<Option<Value>, ErrorKind> {
            reader.skip_bits(8)?;
            Ok(Some(Value::Text("adapted".into())))
        }
    }

    #[test]
    fn test_adapter_wins() {
        let context = Context::new(Schema::new()).with_adapter("u8", Fixed);
        let simple = SimpleType::unsigned("u8", 8)
            .with_discriminator(Discriminator::new(Expr::bool(false)));

        assert_eq!(
            read(&context, simple, &[0x01]).unwrap(),
            Value::Text("adapted".into())
        );
    }

    struct AsBcd;

    impl crate::context::Adapter for AsBcd {
        fn binary_number_rep(&self, _simple: &SimpleType) -> Option<BinaryNumberRep> {
            Some(BinaryNumberRep::Bcd)
        }
    }

    #[test]
    fn test_binary_number_rep_override() {
        let context = Context::new(Schema::new()).with_adapter("u8", AsBcd);
        assert_eq!(
            read(&context, SimpleType::unsigned("u8", 8), &[0x42]).unwrap(),
            Value::U64(42)
        );
    }
}
