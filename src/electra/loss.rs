use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// # Weights of the generator and discriminator losses
pub struct LossWeights {
    /// Weight of the masked language modeling loss
    pub gen_weight: f64,
    /// Weight of the replaced token detection loss
    pub disc_weight: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        LossWeights {
            gen_weight: 1.0,
            disc_weight: 50.0,
        }
    }
}

impl LossWeights {
    /// Weighted sum `gen_weight * mlm_loss + disc_weight * disc_loss`
    pub fn combine(&self, mlm_loss: &Tensor, disc_loss: &Tensor) -> Tensor {
        mlm_loss * self.gen_weight + disc_loss * self.disc_weight
    }
}

fn agreement(predictions: &Tensor, labels: &Tensor, positions: &Tensor) -> f64 {
    predictions
        .masked_select(positions)
        .eq_tensor(&labels.masked_select(positions).to_kind(predictions.kind()))
        .to_kind(Kind::Float)
        .mean(Kind::Float)
        .double_value(&[])
}

/// Share of masked positions where the generator argmax matches the label.
///
/// # Arguments
///
/// * `logits` - generator logits of shape (*batch size*, *sequence_length*, *vocab_size*)
/// * `labels` - generator labels of shape (*batch size*, *sequence_length*)
/// * `mask` - `Bool` tensor of masked positions
///
/// # Returns
///
/// * accuracy in [0, 1], `NaN` if no position is masked
pub fn generator_accuracy(logits: &Tensor, labels: &Tensor, mask: &Tensor) -> f64 {
    let predictions = logits.argmax(-1, false);
    agreement(&predictions, labels, mask)
}

/// Hard discriminator predictions: 1 for positive logits, 0 for negative logits.
pub fn discriminator_predictions(logits: &Tensor) -> Tensor {
    ((logits.sign() + 1.0) * 0.5).round()
}

/// Balanced accuracy of the discriminator: the mean of the accuracies measured on masked and
/// unmasked positions. Masked positions are a small minority of each batch, and a plain accuracy
/// would be dominated by the unmasked positions.
///
/// # Arguments
///
/// * `predictions` - output of `discriminator_predictions`
/// * `labels` - discriminator labels, 1 for replaced tokens
/// * `mask` - `Bool` tensor of masked positions
pub fn discriminator_accuracy(predictions: &Tensor, labels: &Tensor, mask: &Tensor) -> f64 {
    0.5 * agreement(predictions, labels, mask)
        + 0.5 * agreement(predictions, labels, &mask.logical_not())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_weights_favor_discriminator() {
        let weights = LossWeights::default();
        let total = weights.combine(&Tensor::from(2.0f64), &Tensor::from(0.1f64));
        assert!((total.double_value(&[]) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn predictions_follow_logit_sign() {
        let logits = Tensor::from_slice(&[-3.0f32, 0.5, 2.0, -0.1]);
        let predictions = Vec::<f32>::try_from(discriminator_predictions(&logits)).unwrap();
        assert_eq!(predictions, vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn balanced_accuracy_weights_both_classes_equally() {
        let mask = Tensor::from_slice(&[true, false, false, false]);
        let labels = Tensor::from_slice(&[1.0f32, 0.0, 0.0, 0.0]);
        // masked position wrong, all unmasked positions right
        let predictions = Tensor::from_slice(&[0.0f32, 0.0, 0.0, 0.0]);
        let accuracy = discriminator_accuracy(&predictions, &labels, &mask);
        assert!((accuracy - 0.5).abs() < 1e-9);
    }
}
