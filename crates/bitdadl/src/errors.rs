//! Error types for bit access, schema construction, marshalling and unmarshalling.
//!
//! Failures are split in two tiers. A *recoverable* [`ErrorKind`] is a soft
//! mismatch: inside a speculative attempt (optional field, parsed list element,
//! choice alternative) the engine rewinds and treats the attempt as absent.
//! Every other kind is fatal and aborts the whole call. Outside a speculative
//! attempt both tiers surface to the caller as an [`Error`].

use std::fmt;

use thiserror::Error;

/// Errors produced by [crate::bits::BitReader] and [crate::bits::BitWriter].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BitError {
    /// Requested bit range is beyond the end of the data.
    #[error("bit range out of bounds")]
    OutOfBounds,
    /// More than 64 bits were requested in a single read or write.
    #[error("more than 64 bits requested in a single access")]
    TooManyBits,
    /// Byte-level access at a position that is not on a byte boundary.
    #[error("byte access at unaligned bit position {0}")]
    Unaligned(usize),
}

/// Errors produced when building a [crate::schema::Schema].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two nodes share the same type name.
    #[error("duplicate type `{0}`")]
    DuplicateType(String),
    /// `min_occurs`/`max_occurs` do not describe a single, optional or list field.
    #[error("invalid occurrence bounds on `{0}`")]
    InvalidOccurs(String),
    /// A list field with `occurs_count_kind = expression` has no count expression.
    #[error("list field `{0}` has no occurs count expression")]
    MissingOccursCount(String),
    /// An encoding name is not one of the supported character sets.
    #[error("unknown encoding `{0}`")]
    UnknownEncoding(String),
    /// A tag literal is not a hexadecimal number.
    #[error("invalid tag literal `{0}`")]
    InvalidTag(String),
    /// The JSON document could not be read.
    #[error("invalid schema document: {0}")]
    Json(String),
}

/// Every way a single marshal or unmarshal step can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Bits(#[from] BitError),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    /// Node kind, content type or representation combination the codec cannot handle.
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("pattern discriminator on `{0}` is not supported")]
    PatternDiscriminator(String),
    #[error("{0}")]
    DiscriminatorNotSatisfied(String),
    #[error("tag mismatch: actual = {actual:X}, expected = {expected:X}")]
    TagMismatch { expected: u64, actual: u64 },
    #[error("BCD bit length must be divisible by 4, got {0}")]
    BcdBitLength(u64),
    #[error("illegal BCD digit: {0}")]
    IllegalBcdDigit(u64),
    #[error("invalid text number `{0}`")]
    InvalidTextNumber(String),
    #[error("bytes are not valid {0}")]
    InvalidText(String),
    #[error("raw value {raw} has no constant in enumeration `{enumeration}`")]
    UnknownEnumValue { enumeration: String, raw: String },
    #[error("enumeration `{enumeration}` has no constant `{name}`")]
    UnknownEnumConstant { enumeration: String, name: String },
    #[error("actual length of `{type_name}` ({actual} bits) exceeds explicit length of {expected} bits")]
    LengthExceeded {
        type_name: String,
        expected: u64,
        actual: u64,
    },
    #[error("element ends at bit {actual}, beyond the end of its parent at bit {end}")]
    BeyondEndOfParent { end: u64, actual: u64 },
    #[error("no branch matched on `{0}`")]
    NoBranchMatched(String),
    #[error("no branch of choice `{0}` is present")]
    NoBranchPresent(String),
    #[error("value {value} is not representable in {bits} bits")]
    ValueOutOfRange { value: i128, bits: u64 },
    #[error("{width} digits are not sufficient for value {value}")]
    ValueTooLarge { value: i128, width: u64 },
    #[error("computed length {expected} does not match actual length {actual}")]
    LengthMismatch { expected: u64, actual: u64 },
    #[error("missing value for field `{0}`")]
    MissingField(String),
    #[error("occurs count {expected} does not match {actual} list items")]
    OccursCountMismatch { expected: u64, actual: u64 },
    #[error("expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
    #[error("expression error: {0}")]
    Evaluation(String),
    #[error("variable `{0}` is not known yet")]
    DeferredVariable(String),
}

impl ErrorKind {
    /// Returns true for soft mismatches that trigger backtracking.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Bits(BitError::OutOfBounds)
                | ErrorKind::DiscriminatorNotSatisfied(_)
                | ErrorKind::TagMismatch { .. }
                | ErrorKind::IllegalBcdDigit(_)
                | ErrorKind::InvalidTextNumber(_)
                | ErrorKind::InvalidText(_)
                | ErrorKind::UnknownEnumValue { .. }
                | ErrorKind::LengthExceeded { .. }
                | ErrorKind::BeyondEndOfParent { .. }
                | ErrorKind::NoBranchMatched(_)
        )
    }

    pub(crate) fn shape(expected: impl Into<String>, actual: &crate::value::Value) -> Self {
        ErrorKind::ShapeMismatch {
            expected: expected.into(),
            actual: actual.kind_name().to_string(),
        }
    }
}

/// Terminal error of a marshal or unmarshal call: what went wrong and where.
///
/// The path names the type and the chain of fields leading to the failure,
/// e.g. `Message.body.items[2]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    path: Vec<String>,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Dotted path of the offending type and fields, outermost first.
    pub fn path(&self) -> String {
        self.path.join(".")
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }

    /// Prefixes the path with an enclosing field or type name.
    pub(crate) fn at(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            path: Vec::new(),
            kind,
        }
    }
}

impl From<BitError> for Error {
    fn from(value: BitError) -> Self {
        ErrorKind::Bits(value).into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.path(), self.kind)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
