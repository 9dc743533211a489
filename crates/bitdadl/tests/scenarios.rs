use bitdadl::{
    bits::{BitReader, BitWriter},
    context::{Adapter, Context},
    errors::ErrorKind,
    evaluator::LENGTH_VAR,
    expr::Expr,
    field::{Element, OccursCountKind, SequenceElement},
    node::{Choice, Discriminator, Layout, LengthUnit, Node, Sequence, SimpleType, TaggedSequence},
    schema::Schema,
    text::Justification,
    value::{FromValue, Info, Record, ToValue, Value},
};

fn scalars() -> Vec<Node> {
    vec![
        SimpleType::unsigned("u4", 4).into(),
        SimpleType::unsigned("u8", 8).into(),
        SimpleType::unsigned("u16", 16).into(),
        SimpleType::unsigned("u24", 24).into(),
        SimpleType::bcd("bcd2", 8).into(),
    ]
}

fn context(nodes: impl IntoIterator<Item = Node>) -> Context {
    let schema = Schema::compile(scalars().into_iter().chain(nodes)).unwrap();
    Context::new(schema)
}

fn discriminated(test: Expr) -> Layout {
    Layout {
        discriminator: Some(Discriminator::new(test)),
        ..Default::default()
    }
}

#[test]
fn test_bcd_both_ways() {
    let context = context([]);

    assert_eq!(context.marshal_value(&Value::U64(42), "bcd2").unwrap(), vec![0x42]);
    assert_eq!(context.unmarshal_value(&[0x42], "bcd2").unwrap(), Value::U64(42));

    let err = context.unmarshal_value(&[0x4B], "bcd2").unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::IllegalBcdDigit(11));
    assert_eq!(err.path(), "bcd2");
}

#[test]
fn test_standard_binary_both_ways() {
    let context = context([]);

    assert_eq!(context.marshal_value(&Value::U64(42), "u8").unwrap(), vec![0x2A]);
    assert_eq!(context.unmarshal_value(&[0x2A], "u8").unwrap(), Value::U64(42));
}

#[test]
fn test_text_number_justification() {
    let context = context([
        SimpleType::text_number("right", 4)
            .justified(Justification::Right, "0")
            .into(),
        SimpleType::text_number("center", 5)
            .justified(Justification::Center, " ")
            .into(),
    ]);

    assert_eq!(context.marshal_value(&Value::I64(7), "right").unwrap(), b"0007");
    assert_eq!(context.marshal_value(&Value::I64(12), "center").unwrap(), b"  12 ");
    assert_eq!(context.unmarshal_value(b"  12 ", "center").unwrap(), Value::I64(12));
    assert_eq!(Justification::Center.padding(5, 2), (2, 1));
}

#[test]
fn test_choice_selects_second_branch() {
    let kind_is = |kind| discriminated(Expr::this().member("kind").equals(Expr::int(kind)));

    let context = context([
        Sequence::new(
            "A",
            vec![SequenceElement::new("kind", "u8"), SequenceElement::new("value", "u8")],
        )
        .with_layout(kind_is(1))
        .into(),
        Sequence::new(
            "B",
            vec![SequenceElement::new("kind", "u8"), SequenceElement::new("value", "u16")],
        )
        .with_layout(kind_is(2))
        .into(),
        Choice::new("Body", vec![Element::new("a", "A"), Element::new("b", "B")]).into(),
        Sequence::new(
            "Message",
            vec![SequenceElement::new("body", "Body"), SequenceElement::new("trailer", "u8")],
        )
        .into(),
    ]);

    let data = [0x02, 0x12, 0x34, 0xFF];
    let decoded = context.unmarshal_value(&data, "Message").unwrap();

    let expected = Record::new()
        .with(
            "body",
            Record::new().with("b", Record::new().with("kind", 2u64).with("value", 0x1234u64)),
        )
        .with("trailer", 0xFFu64);
    assert_eq!(decoded, Value::Record(expected));

    assert_eq!(context.marshal_value(&decoded, "Message").unwrap(), data.to_vec());
}

#[test]
fn test_explicit_length_skips_padding() {
    let context = context([
        Sequence::new(
            "Padded",
            vec![SequenceElement::new("a", "u4"), SequenceElement::new("b", "u8")],
        )
        .with_layout(Layout::explicit(Expr::int(16), LengthUnit::Bit))
        .into(),
        Sequence::new(
            "Message",
            vec![SequenceElement::new("header", "Padded"), SequenceElement::new("next", "u8")],
        )
        .into(),
    ]);

    let decoded = context
        .unmarshal_value(&[0x1A, 0xBF, 0x99], "Message")
        .unwrap();

    let expected = Record::new()
        .with("header", Record::new().with("a", 1u64).with("b", 0xABu64))
        .with("next", 0x99u64);
    assert_eq!(decoded, Value::Record(expected));

    assert_eq!(
        context.marshal_value(&decoded, "Message").unwrap(),
        vec![0x1A, 0xB0, 0x99]
    );
}

#[test]
fn test_explicit_length_exceeded() {
    let context = context([
        Sequence::new(
            "Padded",
            vec![SequenceElement::new("a", "u4"), SequenceElement::new("b", "u16")],
        )
        .with_layout(Layout::explicit(Expr::int(16), LengthUnit::Bit))
        .into(),
        Sequence::new("Message", vec![SequenceElement::new("header", "Padded")]).into(),
    ]);

    let err = context
        .unmarshal_value(&[0x12, 0x34, 0x56], "Message")
        .unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorKind::LengthExceeded {
            type_name: "Padded".into(),
            expected: 16,
            actual: 20
        }
    );
    assert_eq!(err.path(), "Message.header");
}

#[test]
fn test_end_of_parent_list() {
    let context = context([
        TaggedSequence::new(
            "Block",
            vec![SequenceElement::list("items", "u16", OccursCountKind::EndOfParent)],
        )
        .with_length_field("u8")
        .into(),
        Sequence::new(
            "Message",
            vec![SequenceElement::new("block", "Block"), SequenceElement::new("trailer", "u8")],
        )
        .into(),
    ]);

    let mut data = vec![10u8];
    data.extend_from_slice(&[0, 1, 0, 2, 0, 3, 0, 4, 0, 5]);
    data.push(0xEE);

    let decoded = context.unmarshal_value(&data, "Message").unwrap();
    let record = decoded.as_record().unwrap();
    let block = record.get("block").and_then(Value::as_record).unwrap();

    assert_eq!(
        block.get("items"),
        Some(&Value::Array((1..=5).map(Value::U64).collect()))
    );
    assert_eq!(record.get("trailer"), Some(&Value::U64(0xEE)));

    assert_eq!(context.marshal_value(&decoded, "Message").unwrap(), data);
}

#[test]
fn test_end_of_parent_discards_overrun() {
    let context = context([
        TaggedSequence::new(
            "Block",
            vec![
                SequenceElement::list("items", "u24", OccursCountKind::EndOfParent),
                SequenceElement::optional("tail", "u8"),
            ],
        )
        .with_length_field("u8")
        .into(),
        Sequence::new(
            "Message",
            vec![SequenceElement::new("block", "Block"), SequenceElement::new("trailer", "u16")],
        )
        .into(),
    ]);

    let mut data = vec![10u8];
    data.extend_from_slice(&[0, 0, 1, 0, 0, 2, 0, 0, 3, 0x77]);
    data.extend_from_slice(&[0xAB, 0xCD]);

    let decoded = context.unmarshal_value(&data, "Message").unwrap();
    let record = decoded.as_record().unwrap();
    let block = record.get("block").and_then(Value::as_record).unwrap();

    assert_eq!(block.get("items").and_then(Value::as_array).map(<[Value]>::len), Some(3));
    assert_eq!(block.get("tail"), Some(&Value::U64(0x77)));
    assert_eq!(record.get("trailer"), Some(&Value::U64(0xABCD)));
}

#[test]
fn test_error_path() {
    let context = context([
        Sequence::new(
            "Body",
            vec![
                SequenceElement::new("count", "u8"),
                SequenceElement::list(
                    "items",
                    "u8",
                    OccursCountKind::Expression(Expr::field("count")),
                ),
            ],
        )
        .into(),
        Sequence::new("Message", vec![SequenceElement::new("body", "Body")]).into(),
    ]);

    let err = context.unmarshal_value(&[3, 1, 2], "Message").unwrap_err();
    assert_eq!(err.path(), "Message.body.items[2]");
    assert_eq!(err.to_string(), "Message.body.items[2]: bit range out of bounds");
}

#[test]
fn test_top_level_tag_mismatch() {
    let context = context([TaggedSequence::new("Tagged", vec![SequenceElement::new("v", "u8")])
        .with_tag("u8", 0xA1)
        .into()]);

    let err = context.unmarshal_value(&[0x0F, 0x00], "Tagged").unwrap_err();
    assert_eq!(
        err.kind(),
        &ErrorKind::TagMismatch {
            expected: 0xA1,
            actual: 0x0F
        }
    );
}

#[test]
fn test_unknown_type() {
    let err = context([]).unmarshal_value(&[0x00], "Nope").unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::UnknownType("Nope".into()));
    assert_eq!(err.path(), "Nope");
}

#[derive(Debug, PartialEq)]
struct Header {
    version: u8,
    amount: i32,
    name: String,
}

impl FromValue for Header {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        let mut record = Record::from_value(value)?;
        Ok(Header {
            version: record.take("version")?,
            amount: record.take("amount")?,
            name: record.take("name")?,
        })
    }
}

impl ToValue for Header {
    fn to_value(&self) -> Value {
        Record::new()
            .with("version", self.version.to_value())
            .with("amount", self.amount.to_value())
            .with("name", self.name.to_value())
            .into()
    }
}

impl Info for Header {
    const TYPE_NAME: &'static str = "Header";
}

fn header_context() -> Context {
    context([
        SimpleType::text_number("amount", 6)
            .justified(Justification::Right, "0")
            .into(),
        SimpleType::text("name", 4).into(),
        Sequence::new(
            "Header",
            vec![
                SequenceElement::new("version", "u8"),
                SequenceElement::new("amount", "amount"),
                SequenceElement::new("name", "name"),
            ],
        )
        .into(),
    ])
}

#[test]
fn test_typed_shape() {
    let context = header_context();
    let header = Header {
        version: 1,
        amount: 42,
        name: "ABCD".into(),
    };

    let bytes = context.marshal(&header).unwrap();
    assert_eq!(bytes, b"\x01000042ABCD");
    assert_eq!(context.unmarshal::<Header>(&bytes).unwrap(), header);
}

#[test]
fn test_unmarshal_range() {
    let context = header_context();

    let data = b"\xEE\xEE\x02000100WXYZ\xEE";
    let header = context.unmarshal_range::<Header>(data, 2, 11).unwrap();
    assert_eq!(
        header,
        Header {
            version: 2,
            amount: 100,
            name: "WXYZ".into()
        }
    );

    let err = context.unmarshal_range::<Header>(data, 10, 11).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Bits(bitdadl::errors::BitError::OutOfBounds));
}

struct Seconds;

impl Adapter for Seconds {
    fn decode(&self, _node: &Node, reader: &mut BitReader<'_>) -> Result<Option<Value>, ErrorKind> {
        Ok(Some(Value::U64(reader.read_bits(32)?)))
    }

    fn encode(&self, _node: &Node, value: &Value, writer: &mut BitWriter) -> Result<bool, ErrorKind> {
        let Value::U64(seconds) = value else {
            return Ok(false);
        };
        writer.write_bits(*seconds, 32)?;
        Ok(true)
    }
}

#[test]
fn test_composite_adapter() {
    let schema = Schema::compile(scalars().into_iter().chain([
        Sequence::new(
            "Timestamp",
            vec![SequenceElement::new("hi", "u16"), SequenceElement::new("lo", "u16")],
        )
        .into(),
        Sequence::new(
            "Event",
            vec![SequenceElement::new("at", "Timestamp"), SequenceElement::new("code", "u8")],
        )
        .into(),
    ]))
    .unwrap();
    let context = Context::new(schema).with_adapter("Timestamp", Seconds);

    let data = [0x00, 0x01, 0x00, 0x00, 0x07];
    let decoded = context.unmarshal_value(&data, "Event").unwrap();
    assert_eq!(
        decoded,
        Value::Record(Record::new().with("at", 0x10000u64).with("code", 7u64))
    );
    assert_eq!(context.marshal_value(&decoded, "Event").unwrap(), data.to_vec());
}

fn framed_context() -> Context {
    context([
        SimpleType::opaque("blob", 1).into(),
        TaggedSequence::new(
            "Frame",
            vec![
                SequenceElement::new("kind", "u8"),
                SequenceElement::new("payload", "blob")
                    .with_length(Expr::var(LENGTH_VAR) - Expr::int(1)),
            ],
        )
        .with_length_field("u8")
        .into(),
        Sequence::new(
            "Stream",
            vec![SequenceElement::new("frame", "Frame"), SequenceElement::new("trailer", "u8")],
        )
        .into(),
    ])
}

#[test]
fn test_length_variable_round_trip() {
    let context = framed_context();
    let data = [0x03, 0x07, 0xAA, 0xBB, 0x5A];

    let decoded = context.unmarshal_value(&data, "Stream").unwrap();
    let expected = Record::new()
        .with(
            "frame",
            Record::new().with("kind", 7u64).with("payload", vec![0xAAu8, 0xBB]),
        )
        .with("trailer", 0x5Au64);
    assert_eq!(decoded, Value::Record(expected));

    assert_eq!(context.marshal_value(&decoded, "Stream").unwrap(), data.to_vec());
}

#[test]
fn test_length_field_bounds_body() {
    let context = context([
        TaggedSequence::new("Short", vec![SequenceElement::new("a", "u16")])
            .with_length_field("u8")
            .into(),
        TaggedSequence::new("Roomy", vec![SequenceElement::new("a", "u8")])
            .with_length_field("u8")
            .into(),
        Sequence::new(
            "Message",
            vec![SequenceElement::new("body", "Roomy"), SequenceElement::new("trailer", "u8")],
        )
        .into(),
    ]);

    let err = context.unmarshal_value(&[0x01, 0x12, 0x34], "Short").unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::BeyondEndOfParent { end: 16, actual: 24 });
    assert_eq!(err.path(), "Short");

    let decoded = context
        .unmarshal_value(&[0x02, 0x11, 0xEE, 0x22], "Message")
        .unwrap();
    let record = decoded.as_record().unwrap();
    assert_eq!(record.get("trailer"), Some(&Value::U64(0x22)));
}

#[test]
fn test_adapter_values_skip_discriminators() {
    let never = Discriminator::new(Expr::bool(false));

    let schema = Schema::compile(scalars().into_iter().chain([
        SimpleType::unsigned("stamp", 32).with_discriminator(never.clone()).into(),
        Sequence::new("Timestamp", vec![SequenceElement::new("hi", "u16")])
            .with_layout(Layout {
                discriminator: Some(never),
                ..Default::default()
            })
            .into(),
        Sequence::new(
            "Event",
            vec![SequenceElement::new("at", "Timestamp"), SequenceElement::new("raw", "stamp")],
        )
        .into(),
    ]))
    .unwrap();
    let context = Context::new(schema)
        .with_adapter("Timestamp", Seconds)
        .with_adapter("stamp", Seconds);

    let decoded = context
        .unmarshal_value(&[0, 0, 0, 1, 0, 0, 0, 2], "Event")
        .unwrap();
    assert_eq!(
        decoded,
        Value::Record(Record::new().with("at", 1u64).with("raw", 2u64))
    );
}
