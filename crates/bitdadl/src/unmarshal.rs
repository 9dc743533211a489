//! Structure decoding: walks composite nodes and drives [SimpleTypeReader] for leaves.
//!
//! Optional fields, `Parsed` and `EndOfParent` list items and choice branches are
//! decoded speculatively. A recoverable error inside such an attempt rewinds the
//! stream and the scope stack to the state before the attempt; any other error
//! aborts the call.

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::{
    bits::{BYTE_SIZE, BitReader},
    context::Context,
    errors::{Error, ErrorKind},
    evaluator::{END_VAR, Evaluator, LENGTH_VAR},
    field::{Cardinality, Element, OccursCountKind, SequenceElement},
    node::{Choice, LengthKind, Node, Sequence, TaggedSequence},
    reader::{SimpleTypeReader, check_discriminators, to_usize},
    value::Value,
};

/// Decoder for one unmarshal call. Not reusable across calls.
pub struct Unmarshaller<'c> {
    context: &'c Context,
    evaluator: Evaluator,
    simple: SimpleTypeReader<'c>,
}

impl<'c> Unmarshaller<'c> {
    pub fn new(context: &'c Context) -> Self {
        Self {
            context,
            evaluator: Evaluator::new(),
            simple: SimpleTypeReader::new(context),
        }
    }

    /// Decodes one value of the named type from the reader's current position.
    pub fn unmarshal(&mut self, type_name: &str, reader: &mut BitReader<'_>) -> Result<Value, Error> {
        let context = self.context;
        let node = context.schema().get_type(type_name)?;
        self.decode_element(node, None, reader)
    }

    fn decode_element(
        &mut self,
        node: &Node,
        element: Option<&Element>,
        reader: &mut BitReader<'_>,
    ) -> Result<Value, Error> {
        if node.is_leaf() {
            return Ok(self.simple.read(node, element, &mut self.evaluator, reader)?);
        }

        let start = reader.position();

        // Adapter values are taken as is, like adapter-produced leaves.
        if let Some(value) = self.context.try_decode(node, reader)? {
            trace!(type_name = node.name(), "value produced by adapter");
            self.skip_padding(node, start, reader)?;
            self.evaluator.set_self(value.clone());
            return Ok(value);
        }

        let value = self.decode_composite(node, start, reader)?;

        self.evaluator.set_self(value.clone());
        check_discriminators(&self.evaluator, node, element)?;

        Ok(value)
    }

    fn decode_composite(&mut self, node: &Node, start: usize, reader: &mut BitReader<'_>) -> Result<Value, Error> {
        self.scoped(|this| {
            match node {
                Node::Sequence(sequence) => this.decode_sequence(sequence, reader)?,
                Node::TaggedSequence(sequence) => this.decode_tagged_sequence(sequence, reader)?,
                Node::Choice(choice) => this.decode_choice(choice, reader)?,
                Node::Simple(_) | Node::Enumeration(_) => {
                    return Err(ErrorKind::Unsupported(format!(
                        "`{}` is not a composite type",
                        node.name()
                    ))
                    .into());
                }
            }

            this.skip_padding(node, start, reader)
        })
    }

    /// Runs `f` in a fresh scope and returns the record built in it. The scope is
    /// popped whether or not `f` succeeds.
    fn scoped(&mut self, f: impl FnOnce(&mut Self) -> Result<(), Error>) -> Result<Value, Error> {
        self.evaluator.push_scope();
        let result = f(self);
        let record = self.evaluator.pop_scope();

        result.map(|()| Value::Record(record))
    }

    /// Runs `f` speculatively. On a recoverable error the stream position and the
    /// scope stack are restored and `None` is returned.
    fn attempt<'a, T>(
        &mut self,
        reader: &mut BitReader<'a>,
        f: impl FnOnce(&mut Self, &mut BitReader<'a>) -> Result<T, Error>,
    ) -> Result<Option<T>, Error> {
        let start = reader.position();
        let checkpoint = self.evaluator.checkpoint();

        match f(self, reader) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_recoverable() => {
                trace!(position = start, error = %err, "backtracking");
                reader.set_position(start);
                self.evaluator.rollback(checkpoint);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn skip_padding(&mut self, node: &Node, start: usize, reader: &mut BitReader<'_>) -> Result<(), Error> {
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
        let actual = (reader.position() - start) as u64;

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
                trace!(type_name = node.name(), bits = expected - actual, "skipping padding");
                reader.skip_bits(to_usize(expected - actual)?)?;
                Ok(())
            }
        }
    }

    fn decode_sequence(&mut self, sequence: &Sequence, reader: &mut BitReader<'_>) -> Result<(), Error> {
        debug!(sequence = %sequence.name, "unmarshalling sequence");

        for element in &sequence.elements {
            self.decode_field(element, reader)?;
        }

        Ok(())
    }

    fn decode_tagged_sequence(
        &mut self,
        sequence: &TaggedSequence,
        reader: &mut BitReader<'_>,
    ) -> Result<(), Error> {
        debug!(sequence = %sequence.name, "unmarshalling tagged sequence");

        if let Some(tag) = &sequence.tag {
            let actual = self.read_scalar(&tag.type_name, reader)?;
            let actual = actual.as_i128().map(|v| v as u64).ok_or_else(|| ErrorKind::shape("integer tag", &actual))?;
            trace!(expected = tag.value, actual, "unmarshalling tag");

            if actual != tag.value {
                return Err(ErrorKind::TagMismatch {
                    expected: tag.value,
                    actual,
                }
                .into());
            }
        }

        let end = match &sequence.length_field {
            Some(length_field) => {
                let value = self.read_scalar(&length_field.type_name, reader)?;
                let length = value
                    .as_i128()
                    .and_then(|v| u64::try_from(v).ok())
                    .ok_or_else(|| ErrorKind::Evaluation(format!("invalid length field value {value:?}")))?;

                let end = (reader.position() as u64).saturating_add(length.saturating_mul(BYTE_SIZE as u64));
                debug!(length, end, "unmarshalled length field");

                self.evaluator.set_variable(LENGTH_VAR, Value::U64(length));
                self.evaluator.set_variable(END_VAR, Value::U64(end));
                Some(end)
            }
            None => None,
        };

        for element in &sequence.elements {
            self.decode_field(element, reader)?;
        }

        // The body must end within the length-field window; bytes it left unread are skipped.
        if let Some(end) = end {
            let actual = reader.position() as u64;
            match actual.cmp(&end) {
                Ordering::Greater => return Err(ErrorKind::BeyondEndOfParent { end, actual }.into()),
                Ordering::Less => {
                    trace!(sequence = %sequence.name, bits = end - actual, "skipping rest of body");
                    reader.skip_bits(to_usize(end - actual)?)?;
                }
                Ordering::Equal => {}
            }
        }

        Ok(())
    }

    /// Reads a tag or length field, which must be of a simple type.
    fn read_scalar(&mut self, type_name: &str, reader: &mut BitReader<'_>) -> Result<Value, Error> {
        let context = self.context;
        let node = context.schema().get_type(type_name)?;

        if !matches!(node, Node::Simple(_)) {
            return Err(ErrorKind::Unsupported(format!("`{type_name}` is not a simple type")).into());
        }

        Ok(self.simple.read(node, None, &mut self.evaluator, reader)?)
    }

    fn end_bound(&self) -> Option<u64> {
        self.evaluator
            .get_variable(END_VAR)
            .and_then(Value::as_i128)
            .and_then(|end| u64::try_from(end).ok())
    }

    fn decode_field(&mut self, element: &SequenceElement, reader: &mut BitReader<'_>) -> Result<(), Error> {
        let end = self.end_bound();
        trace!(field = element.name(), ?end, "unmarshalling sequence element");

        let context = self.context;
        let node = context
            .schema()
            .get_type(&element.element.type_name)
            .map_err(|e| Error::from(e).at(element.name()))?;

        match &element.cardinality {
            Cardinality::Single => {
                let value = self
                    .decode_element(node, Some(&element.element), reader)
                    .map_err(|e| e.at(element.name()))?;
                self.evaluator.set_field(element.name(), value);
            }
            Cardinality::Optional => {
                if end.is_some_and(|end| reader.position() as u64 >= end) {
                    return Ok(());
                }

                let decoded = self
                    .attempt(reader, |this, reader| {
                        this.decode_element(node, Some(&element.element), reader)
                    })
                    .map_err(|e| e.at(element.name()))?;

                if let Some(value) = decoded {
                    self.evaluator.set_field(element.name(), value);
                }
            }
            Cardinality::List(kind) => {
                let items = self.decode_list(element, node, kind, reader)?;
                self.evaluator.set_field(element.name(), Value::Array(items));
            }
        }

        Ok(())
    }

    fn decode_list(
        &mut self,
        element: &SequenceElement,
        node: &Node,
        kind: &OccursCountKind,
        reader: &mut BitReader<'_>,
    ) -> Result<Vec<Value>, Error> {
        let name = element.name();
        let mut items = Vec::new();

        match kind {
            OccursCountKind::Expression(count) => {
                let count = self
                    .evaluator
                    .compute_length(Some(count))
                    .map_err(|e| Error::from(e).at(name))?
                    .unwrap_or_default();
                trace!(field = name, count, "decoding list by expression");

                for i in 0..count {
                    let item = self
                        .decode_element(node, Some(&element.element), reader)
                        .map_err(|e| e.at(format!("{name}[{i}]")))?;
                    items.push(item);
                }
            }
            OccursCountKind::Parsed => loop {
                let start = reader.position();
                let index = items.len();
                let item = self.attempt(reader, |this, reader| {
                    this.decode_element(node, Some(&element.element), reader)
                        .map_err(|e| e.at(format!("{name}[{index}]")))
                })?;

                let Some(item) = item else { break };
                items.push(item);

                if reader.position() == start {
                    break;
                }
            },
            OccursCountKind::EndOfParent => {
                let end = self.end_bound().unwrap_or(reader.len_bits() as u64);

                while (reader.position() as u64) < end {
                    let start = reader.position();
                    let index = items.len();
                    let item = self.attempt(reader, |this, reader| {
                        let value = this
                            .decode_element(node, Some(&element.element), reader)
                            .map_err(|e| e.at(format!("{name}[{index}]")))?;

                        let actual = reader.position() as u64;
                        if actual > end {
                            return Err(ErrorKind::BeyondEndOfParent { end, actual }.into());
                        }

                        Ok(value)
                    })?;

                    let Some(item) = item else { break };
                    items.push(item);

                    if reader.position() == start {
                        break;
                    }
                }
            }
        }

        Ok(items)
    }

    fn decode_choice(&mut self, choice: &Choice, reader: &mut BitReader<'_>) -> Result<(), Error> {
        debug!(choice = %choice.name, "unmarshalling choice");

        let context = self.context;
        for element in &choice.elements {
            trace!(branch = %element.name, "trying branch");

            let node = context
                .schema()
                .get_type(&element.type_name)
                .map_err(|e| Error::from(e).at(&element.name))?;

            let decoded = self.attempt(reader, |this, reader| {
                this.decode_element(node, Some(element), reader)
                    .map_err(|e| e.at(&element.name))
            })?;

            if let Some(value) = decoded {
                debug!(branch = %element.name, "branch matched");
                self.evaluator.set_field(element.name.clone(), value);
                return Ok(());
            }
        }

        Err(ErrorKind::NoBranchMatched(choice.name.clone()).into())
    }
}
