//! Type signatures: the cache key of a specialization.
//!
//! A signature records, per argument, the element type and the exact shape
//! (for buffers) or the element type alone (for scalars). Two calls with
//! equal signatures share one compiled artifact; any difference in element
//! type, rank or extent produces a distinct specialization, because trip
//! counts are baked into the generated loops.

use std::fmt;
use std::str::FromStr;

pub use loopjit_ir::{ArgType, ArrayType};
use loopjit_ir::ElemType;
use smallvec::SmallVec;

use crate::buffer::Arg;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TypeSignature(SmallVec<[ArgType; 4]>);

impl TypeSignature {
    pub fn new(args: impl IntoIterator<Item = ArgType>) -> Self {
        TypeSignature(args.into_iter().collect())
    }

    /// Signature of a concrete argument list.
    pub fn derive(args: &[Arg<'_>]) -> Self {
        Self::new(args.iter().map(Arg::arg_type))
    }

    pub fn args(&self) -> &[ArgType] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureParseError {
    #[error("unknown element type `{text}` (expected i32, i64, f32 or f64)")]
    UnknownElem { text: String },
    #[error("malformed shape in `{text}` (expected e.g. f64[2x10])")]
    BadShape { text: String },
}

/// Parse one argument type: `f64`, `i32[8]`, `f64[2x10]`, `f32[]`.
pub fn parse_arg_type(text: &str) -> Result<ArgType, SignatureParseError> {
    let text = text.trim();
    let (elem, shape) = match text.split_once('[') {
        Some((elem, rest)) => {
            let dims = rest.strip_suffix(']').ok_or_else(|| SignatureParseError::BadShape {
                text: text.to_owned(),
            })?;
            (elem, Some(dims))
        }
        None => (text, None),
    };
    let elem = ElemType::from_short_name(elem.trim()).ok_or_else(|| SignatureParseError::UnknownElem {
        text: elem.trim().to_owned(),
    })?;
    let Some(dims) = shape else {
        return Ok(ArgType::Scalar(elem));
    };
    let dims = dims.trim();
    let shape = if dims.is_empty() {
        Vec::new()
    } else {
        dims.split('x')
            .map(|dim| dim.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| SignatureParseError::BadShape {
                text: text.to_owned(),
            })?
    };
    Ok(ArgType::Array(ArrayType::new(elem, &shape)))
}

impl FromStr for TypeSignature {
    type Err = SignatureParseError;

    /// Comma-separated argument types, as printed by `Display`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.trim().is_empty() {
            return Ok(TypeSignature::default());
        }
        text.split(',')
            .map(parse_arg_type)
            .collect::<Result<SmallVec<_>, _>>()
            .map(TypeSignature)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use super::*;
    use crate::buffer::{Buffer, Scalar};

    fn hash(sig: &TypeSignature) -> u64 {
        let mut hasher = DefaultHasher::new();
        sig.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn derived_from_arguments() {
        let mut a = Buffer::with_shape(&[2, 10], vec![0.0f64; 20]).unwrap();
        let args = [Arg::Array(&mut a), Arg::Scalar(Scalar::I64(3))];
        let sig = TypeSignature::derive(&args);
        assert_eq!(sig.to_string(), "f64[2x10], i64");
        assert_eq!(sig.len(), 2);
        let ArgType::Array(array) = &sig.args()[0] else {
            panic!("expected array");
        };
        assert_eq!(array.rank(), 2);
        assert_eq!(array.len(), 20);
    }

    #[test]
    fn equality_is_structural() {
        let a: TypeSignature = "f64[20]".parse().unwrap();
        let b: TypeSignature = "f64[20]".parse().unwrap();
        let reshaped: TypeSignature = "f64[2x10]".parse().unwrap();
        let retyped: TypeSignature = "f32[20]".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(hash(&a), hash(&b));
        assert_ne!(a, reshaped);
        assert_ne!(a, retyped);
    }

    #[test]
    fn parse_round_trips_display() {
        for text in ["f64[2x10], i64", "i32[0]", "f32[]", "i64", ""] {
            let sig: TypeSignature = text.parse().unwrap();
            assert_eq!(sig.to_string(), text);
        }
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            "u8[4]".parse::<TypeSignature>(),
            Err(SignatureParseError::UnknownElem { text: "u8".into() })
        );
        assert!(matches!(
            "f64[2x]".parse::<TypeSignature>(),
            Err(SignatureParseError::BadShape { .. })
        ));
        assert!(matches!(
            "f64[4".parse::<TypeSignature>(),
            Err(SignatureParseError::BadShape { .. })
        ));
    }
}
