//! Structure encoding, the inverse of [crate::unmarshal]. Encoding never backtracks.

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::{
    bits::{BYTE_SIZE, BitWriter},
    context::Context,
    errors::{Error, ErrorKind},
    evaluator::{END_VAR, Evaluator, LENGTH_VAR},
    field::{Cardinality, Element, OccursCountKind, SequenceElement},
    node::{Choice, LengthKind, Node, Sequence, TaggedSequence},
    reader::to_usize,
    value::{Record, Value},
    writer::SimpleTypeWriter,
};

/// Encoder for one marshal call. Not reusable across calls.
pub struct Marshaller<'c> {
    context: &'c Context,
    evaluator: Evaluator,
    simple: SimpleTypeWriter<'c>,
}

impl<'c> Marshaller<'c> {
    pub fn new(context: &'c Context) -> Self {
        Self {
            context,
            evaluator: Evaluator::new(),
            simple: SimpleTypeWriter::new(context),
        }
    }

    /// Encodes `value` as the named type at the writer's current position.
    pub fn marshal(&mut self, value: &Value, type_name: &str, writer: &mut BitWriter) -> Result<(), Error> {
        let context = self.context;
        let node = context.schema().get_type(type_name)?;
        self.encode_element(node, None, value, writer)
    }

    fn encode_element(
        &mut self,
        node: &Node,
        element: Option<&Element>,
        value: &Value,
        writer: &mut BitWriter,
    ) -> Result<(), Error> {
        if node.is_leaf() {
            return Ok(self.simple.write(node, element, value, &mut self.evaluator, writer)?);
        }

        let start = writer.position();

        if self.context.try_encode(node, value, writer)? {
            trace!(type_name = node.name(), "value written by adapter");
            return self.pad(node, start, writer);
        }

        let record = value
            .as_record()
            .ok_or_else(|| ErrorKind::shape("record", value))?;

        self.scoped(record, |this| {
            match node {
                Node::Sequence(sequence) => this.encode_sequence(sequence, record, writer)?,
                Node::TaggedSequence(sequence) => this.encode_tagged_sequence(sequence, record, writer)?,
                Node::Choice(choice) => this.encode_choice(choice, record, writer)?,
                Node::Simple(_) | Node::Enumeration(_) => {
                    return Err(ErrorKind::Unsupported(format!(
                        "`{}` is not a composite type",
                        node.name()
                    ))
                    .into());
                }
            }

            this.pad(node, start, writer)
        })
    }

    /// Runs `f` in a scope that starts out with the fields of `record`.
    fn scoped(&mut self, record: &Record, f: impl FnOnce(&mut Self) -> Result<(), Error>) -> Result<(), Error> {
        self.evaluator.push_record(record.clone());
        let result = f(self);
        self.evaluator.pop_scope();

        result
    }

    fn pad(&mut self, node: &Node, start: usize, writer: &mut BitWriter) -> Result<(), Error> {
        let layout = node.layout();
        let exact = layout.length_kind == LengthKind::Explicit;
        let length = if exact {
            layout.length.as_ref()
        } else {
            layout.min_length.as_ref()
        };

        let Some(units) = self.evaluator.compute_length(length)? else {
            return Ok(());
        };

        let expected = units.saturating_mul(layout.length_unit.bits());
        let actual = (writer.position() - start) as u64;

        match actual.cmp(&expected) {
            Ordering::Equal => Ok(()),
            Ordering::Greater if layout.min_length.is_some() => Ok(()),
            Ordering::Greater => Err(ErrorKind::LengthExceeded {
                type_name: node.name().to_string(),
                expected,
                actual,
            }
            .into()),
            Ordering::Less => {
                writer.pad_bits(to_usize(expected - actual)?);
                Ok(())
            }
        }
    }

    fn encode_sequence(&mut self, sequence: &Sequence, record: &Record, writer: &mut BitWriter) -> Result<(), Error> {
        debug!(sequence = %sequence.name, "marshalling sequence");

        for element in &sequence.elements {
            self.encode_field(element, record, writer)?;
        }

        Ok(())
    }

    fn encode_tagged_sequence(
        &mut self,
        sequence: &TaggedSequence,
        record: &Record,
        writer: &mut BitWriter,
    ) -> Result<(), Error> {
        debug!(sequence = %sequence.name, "marshalling tagged sequence");

        if let Some(tag) = &sequence.tag {
            trace!(tag = tag.value, "marshalling tag");
            let node = self.scalar_type(&tag.type_name)?;
            self.simple
                .write(node, None, &Value::U64(tag.value), &mut self.evaluator, writer)?;
        }

        let Some(length_field) = &sequence.length_field else {
            return self.encode_body(sequence, record, writer);
        };
        let node = self.scalar_type(&length_field.type_name)?;

        // Size the body with `$length` and `$end` unknown; lengths that depend on
        // them are not verified in this pass.
        let checkpoint = self.evaluator.checkpoint();
        self.evaluator.defer_variable(LENGTH_VAR);
        self.evaluator.defer_variable(END_VAR);

        let mut sizing = BitWriter::new();
        self.encode_body(sequence, record, &mut sizing)?;
        self.evaluator.rollback(checkpoint);

        let bits = sizing.position();
        if bits % BYTE_SIZE != 0 {
            return Err(ErrorKind::Unsupported(format!(
                "body of `{}` is not a whole number of bytes",
                sequence.name
            ))
            .into());
        }

        let length = (bits / BYTE_SIZE) as u64;
        debug!(length, "marshalling length field");
        self.simple
            .write(node, None, &Value::U64(length), &mut self.evaluator, writer)?;

        let start = writer.position();
        self.evaluator.set_variable(LENGTH_VAR, Value::U64(length));
        self.evaluator.set_variable(END_VAR, Value::U64((start + bits) as u64));

        self.encode_body(sequence, record, writer)?;

        let actual = (writer.position() - start) as u64;
        if actual != bits as u64 {
            return Err(ErrorKind::LengthMismatch {
                expected: bits as u64,
                actual,
            }
            .into());
        }

        Ok(())
    }

    fn encode_body(&mut self, sequence: &TaggedSequence, record: &Record, writer: &mut BitWriter) -> Result<(), Error> {
        for element in &sequence.elements {
            self.encode_field(element, record, writer)?;
        }

        Ok(())
    }

    /// Resolves a tag or length field type, which must be a simple type.
    fn scalar_type(&self, type_name: &str) -> Result<&'c Node, Error> {
        let context = self.context;
        let node = context.schema().get_type(type_name)?;

        if !matches!(node, Node::Simple(_)) {
            return Err(ErrorKind::Unsupported(format!("`{type_name}` is not a simple type")).into());
        }

        Ok(node)
    }

    fn encode_field(&mut self, element: &SequenceElement, record: &Record, writer: &mut BitWriter) -> Result<(), Error> {
        let name = element.name();
        trace!(field = name, "marshalling sequence element");

        let context = self.context;
        let node = context
            .schema()
            .get_type(&element.element.type_name)
            .map_err(|e| Error::from(e).at(name))?;

        let computed;
        let value = match &element.output_value_calc {
            Some(expr) => {
                computed = self
                    .evaluator
                    .evaluate(expr)
                    .map_err(|e| Error::from(e).at(name))?;
                self.evaluator.set_field(name, computed.clone());
                Some(&computed)
            }
            None => record.get(name),
        };

        match &element.cardinality {
            Cardinality::Single => {
                let value = value.ok_or_else(|| Error::from(ErrorKind::MissingField(name.to_string())).at(name))?;
                self.encode_element(node, Some(&element.element), value, writer)
                    .map_err(|e| e.at(name))
            }
            Cardinality::Optional => match value {
                Some(value) => self
                    .encode_element(node, Some(&element.element), value, writer)
                    .map_err(|e| e.at(name)),
                None => Ok(()),
            },
            Cardinality::List(kind) => {
                let items = match value {
                    Some(value) => value
                        .as_array()
                        .ok_or_else(|| Error::from(ErrorKind::shape("list", value)).at(name))?,
                    None => &[],
                };

                if let OccursCountKind::Expression(count) = kind {
                    let expected = self
                        .evaluator
                        .compute_length(Some(count))
                        .map_err(|e| Error::from(e).at(name))?;
                    let actual = items.len() as u64;

                    if let Some(expected) = expected.filter(|&expected| expected != actual) {
                        return Err(Error::from(ErrorKind::OccursCountMismatch { expected, actual }).at(name));
                    }
                }

                for (i, item) in items.iter().enumerate() {
                    self.encode_element(node, Some(&element.element), item, writer)
                        .map_err(|e| e.at(format!("{name}[{i}]")))?;
                }

                Ok(())
            }
        }
    }

    fn encode_choice(&mut self, choice: &Choice, record: &Record, writer: &mut BitWriter) -> Result<(), Error> {
        debug!(choice = %choice.name, "marshalling choice");

        let context = self.context;
        for element in &choice.elements {
            let Some(value) = record.get(&element.name) else {
                continue;
            };

            debug!(branch = %element.name, "marshalling branch");
            let node = context
                .schema()
                .get_type(&element.type_name)
                .map_err(|e| Error::from(e).at(&element.name))?;

            return self
                .encode_element(node, Some(element), value, writer)
                .map_err(|e| e.at(&element.name));
        }

        Err(ErrorKind::NoBranchPresent(choice.name.clone()).into())
    }
}
