//! Binary cross-entropy on raw logits.

use candle_core::{Result, Tensor};

/// Mean binary cross-entropy between `logits` and `targets` in {0, 1}.
///
/// Uses `max(x, 0) - x*t + ln(1 + exp(-|x|))`, which never exponentiates a
/// positive number, so large logits stay finite.
pub fn bce_with_logits(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    if logits.dims() != targets.dims() {
        candle_core::bail!(
            "bce_with_logits: logits {:?} and targets {:?} differ in shape",
            logits.dims(),
            targets.dims()
        );
    }
    let positive = logits.relu()?;
    let cross = logits.mul(targets)?;
    let softplus_neg_abs = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    ((positive - cross)? + softplus_neg_abs)?.mean_all()
}
