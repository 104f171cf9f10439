use crate::KoreanLmError;
use tch::{Kind, Scalar};

/// Most negative finite value representable by `kind`. Used as a priority that no uniform draw
/// can reach, so ineligible positions sort last.
pub(crate) fn get_min_value(kind: Kind) -> Result<Scalar, KoreanLmError> {
    Ok(match kind {
        Kind::Half => Scalar::float(half::f16::MIN.into()),
        Kind::Float => Scalar::float(f32::MIN.into()),
        Kind::BFloat16 => Scalar::float(half::bf16::MIN.into()),
        Kind::Double => Scalar::float(f64::MIN),
        _ => {
            return Err(KoreanLmError::ValueError(format!(
                "Type not supported: attempted to get a minimum priority for {:?}",
                kind
            )))
        }
    })
}
