#![cfg(feature = "serde")]

use bitdadl::{
    context::Context,
    errors::{ErrorKind, SchemaError},
    schema::Schema,
    value::{Record, Value},
};

const SCHEMA: &str = r#"{
    "types": [
        { "kind": "Simple", "name": "u8", "unsigned": true, "length": 8, "length_unit": "Bit" },
        { "kind": "Simple", "name": "bcd4", "unsigned": true, "binary_number_rep": "Bcd",
          "length": 16, "length_unit": "Bit" },
        { "kind": "Simple", "name": "amount", "representation": "Text", "length": 5,
          "justification": "Right", "pad_character": "0" },
        { "kind": "Simple", "name": "label", "content_type": "Text", "representation": "Text",
          "length": 3, "encoding": "US-ASCII" },
        { "kind": "Enumeration", "name": "status", "unsigned": true, "length": 8, "length_unit": "Bit",
          "values": [ { "name": "OK", "raw": 0 }, { "name": "FAILED", "raw": 1 } ] },
        { "kind": "TaggedSequence", "name": "Entry",
          "tag": { "type": "u8", "value": "0xE1" },
          "length_field": "u8",
          "elements": [
            { "name": "status", "type": "status" },
            { "name": "codes", "type": "bcd4", "min_occurs": 0, "max_occurs": null,
              "occurs_count_kind": "EndOfParent" }
          ] },
        { "kind": "Sequence", "name": "Batch", "elements": [
            { "name": "label", "type": "label" },
            { "name": "amount", "type": "amount" },
            { "name": "count", "type": "u8",
              "output_value_calc": { "Len": { "Field": "entries" } } },
            { "name": "entries", "type": "Entry", "min_occurs": 0, "max_occurs": null,
              "occurs_count": { "Field": "count" } }
        ] }
    ]
}"#;

fn batch_bytes() -> Vec<u8> {
    let mut bytes = b"ABC00042".to_vec();
    bytes.push(2);
    bytes.extend_from_slice(&[0xE1, 0x05, 0x00, 0x12, 0x34, 0x00, 0x99]);
    bytes.extend_from_slice(&[0xE1, 0x01, 0x01]);
    bytes
}

#[test]
fn test_json_schema_decode() {
    let context = Context::new(Schema::from_json(SCHEMA).unwrap());

    let decoded = context.unmarshal_value(&batch_bytes(), "Batch").unwrap();
    let batch = decoded.as_record().unwrap();

    assert_eq!(batch.get("label"), Some(&Value::Text("ABC".into())));
    assert_eq!(batch.get("amount"), Some(&Value::I64(42)));
    assert_eq!(batch.get("count"), Some(&Value::U64(2)));

    let entries = batch.get("entries").and_then(Value::as_array).unwrap();
    assert_eq!(
        entries[0],
        Value::Record(
            Record::new()
                .with("status", Value::Enum("OK".into()))
                .with("codes", vec![Value::U64(1234), Value::U64(99)])
        )
    );
    assert_eq!(
        entries[1],
        Value::Record(
            Record::new()
                .with("status", Value::Enum("FAILED".into()))
                .with("codes", Vec::<Value>::new())
        )
    );
}

#[test]
fn test_json_schema_encode() {
    let context = Context::new(Schema::from_json(SCHEMA).unwrap());

    let decoded = context.unmarshal_value(&batch_bytes(), "Batch").unwrap();
    assert_eq!(context.marshal_value(&decoded, "Batch").unwrap(), batch_bytes());
}

#[test]
fn test_json_schema_errors() {
    let err = Schema::from_json(r#"{ "types": [ { "kind": "Simple" } ] }"#).unwrap_err();
    assert!(matches!(err, SchemaError::Json(_)));

    let err = Schema::from_json(
        r#"{ "types": [ { "kind": "Simple", "name": "t", "length": 2, "encoding": "EBCDIC" } ] }"#,
    )
    .unwrap_err();
    assert_eq!(err, SchemaError::UnknownEncoding("EBCDIC".into()));

    let err = Schema::from_json(
        r#"{ "types": [ { "kind": "TaggedSequence", "name": "T", "elements": [],
             "tag": { "type": "u8", "value": "zz" } } ] }"#,
    )
    .unwrap_err();
    assert_eq!(err, SchemaError::InvalidTag("zz".into()));

    let err = Schema::from_json(
        r#"{ "types": [ { "kind": "Sequence", "name": "S", "elements": [
             { "name": "xs", "type": "u8", "max_occurs": null, "occurs_count_kind": "Expression" }
           ] } ] }"#,
    )
    .unwrap_err();
    assert_eq!(err, SchemaError::MissingOccursCount("xs".into()));
}

#[test]
fn test_unknown_enum_value_is_reported() {
    let context = Context::new(Schema::from_json(SCHEMA).unwrap());

    let err = context.unmarshal_value(&[0x07], "status").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnknownEnumValue { .. }));
}
