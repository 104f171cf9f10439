use crate::common::activations::{Activation, TensorFunction};
use crate::common::dropout::Dropout;
use crate::Config;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tch::nn::ModuleT;
use tch::{nn, Reduction, Tensor};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
/// # Configuration of the discriminator MRC head
pub struct DiscriminatorMRCConfig {
    /// Number of outputs per position (2 for start/end span logits)
    pub num_labels: i64,
    pub hidden_dropout_prob: f64,
    /// Activation applied between the two linear layers
    pub activation: Activation,
}

impl Config for DiscriminatorMRCConfig {}

impl Default for DiscriminatorMRCConfig {
    fn default() -> Self {
        DiscriminatorMRCConfig {
            num_labels: 2,
            hidden_dropout_prob: 0.1,
            activation: Activation::gelu,
        }
    }
}

/// # Discriminator MRC head
/// Span prediction head for machine reading comprehension on top of a pretrained discriminator.
/// It is made of the following blocks:
/// - `dense`: linear layer of dimension (*dim*, *4 x dim*)
/// - `activation`: activation function set in `DiscriminatorMRCConfig` (GeLU by default)
/// - `out_proj`: linear layer of dimension (*4 x dim*, *num_labels*)
/// - `dropout`: Dropout layer applied before both linear layers
#[derive(Debug)]
pub struct DiscriminatorMRCHead {
    dense: nn::Linear,
    dropout: Dropout,
    out_proj: nn::Linear,
    activation: TensorFunction,
}

impl DiscriminatorMRCHead {
    /// Build a new `DiscriminatorMRCHead`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the head
    /// * `dim` - hidden dimension of the discriminator output
    /// * `config` - `DiscriminatorMRCConfig` defining the number of labels, dropout and activation
    pub fn new<'p, P>(p: P, dim: i64, config: &DiscriminatorMRCConfig) -> DiscriminatorMRCHead
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let dense = nn::linear(p / "dense", dim, 4 * dim, Default::default());
        let out_proj = nn::linear(p / "out_proj", 4 * dim, config.num_labels, Default::default());
        let dropout = Dropout::new(config.hidden_dropout_prob);
        let activation = config.activation.get_function();

        DiscriminatorMRCHead {
            dense,
            dropout,
            out_proj,
            activation,
        }
    }

    /// Forward pass through the MRC head
    ///
    /// # Arguments
    ///
    /// * `hidden_states` - discriminator output of shape (*batch size*, *sequence_length*, *dim*)
    /// * `train` - boolean flag to turn on/off the dropout layers
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, *sequence_length*, *num_labels*)
    pub fn forward_t(&self, hidden_states: &Tensor, train: bool) -> Tensor {
        let output = hidden_states
            .apply_t(&self.dropout, train)
            .apply(&self.dense);
        let output = (self.activation.get_fn())(&output);
        output.apply_t(&self.dropout, train).apply(&self.out_proj)
    }
}

/// # Discriminator for machine reading comprehension
/// Pretrained discriminator backbone with a `DiscriminatorMRCHead` predicting answer span
/// start and end positions.
#[derive(Debug)]
pub struct DiscriminatorMRCModel {
    electra: Box<dyn ModuleT>,
    mrc_head: DiscriminatorMRCHead,
}

impl DiscriminatorMRCModel {
    /// Build a new `DiscriminatorMRCModel`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the MRC head
    /// * `discriminator` - backbone returning hidden states of shape (*batch size*, *sequence_length*, *dim*)
    /// * `dim` - hidden dimension of the backbone
    /// * `config` - `DiscriminatorMRCConfig` of the span prediction head. The span loss expects
    ///   `num_labels = 2`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use korean_lm::electra::{DiscriminatorMRCConfig, DiscriminatorMRCModel};
    /// use korean_lm::Activation;
    /// use tch::{nn, Device};
    ///
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let p = vs.root();
    /// let backbone = nn::embedding(&p / "electra", 22000, 256, Default::default());
    /// let config = DiscriminatorMRCConfig {
    ///     activation: Activation::gelu_new,
    ///     ..Default::default()
    /// };
    /// let mrc_model = DiscriminatorMRCModel::new(&p / "mrc_head", backbone, 256, &config);
    /// ```
    pub fn new<'p, P, M>(
        p: P,
        discriminator: M,
        dim: i64,
        config: &DiscriminatorMRCConfig,
    ) -> DiscriminatorMRCModel
    where
        P: Borrow<nn::Path<'p>>,
        M: ModuleT + 'static,
    {
        let mrc_head = DiscriminatorMRCHead::new(p, dim, config);
        DiscriminatorMRCModel {
            electra: Box::new(discriminator),
            mrc_head,
        }
    }

    /// Forward pass through the model
    ///
    /// # Arguments
    ///
    /// * `input_ids` - input tensor of shape (*batch size*, *sequence_length*)
    /// * `start_positions` - Optional answer start positions of shape (*batch size*)
    /// * `end_positions` - Optional answer end positions of shape (*batch size*)
    /// * `train` - boolean flag to turn on/off the dropout layers
    ///
    /// # Returns
    ///
    /// * `MRCOutput` containing:
    ///   - `start_logits` - `Tensor` of shape (*batch size*, *sequence_length*)
    ///   - `end_logits` - `Tensor` of shape (*batch size*, *sequence_length*)
    ///   - `loss` - mean of the start and end cross-entropy if both positions are given
    pub fn forward_t(
        &self,
        input_ids: &Tensor,
        start_positions: Option<&Tensor>,
        end_positions: Option<&Tensor>,
        train: bool,
    ) -> MRCOutput {
        let hidden_states = self.electra.forward_t(input_ids, train);
        let logits = self.mrc_head.forward_t(&hidden_states, train);
        let start_logits = logits.select(-1, 0);
        let end_logits = logits.select(-1, 1);

        let loss = match (start_positions, end_positions) {
            (Some(start_positions), Some(end_positions)) => {
                // positions outside of the sequence are clamped to an ignored index
                let ignored_index = start_logits.size()[1];
                let start_positions = start_positions.reshape([-1]).clamp(0, ignored_index);
                let end_positions = end_positions.reshape([-1]).clamp(0, ignored_index);
                let start_loss = start_logits.cross_entropy_loss::<Tensor>(
                    &start_positions,
                    None,
                    Reduction::Mean,
                    ignored_index,
                    0.0,
                );
                let end_loss = end_logits.cross_entropy_loss::<Tensor>(
                    &end_positions,
                    None,
                    Reduction::Mean,
                    ignored_index,
                    0.0,
                );
                Some((start_loss + end_loss) / 2.0)
            }
            _ => None,
        };

        MRCOutput {
            start_logits,
            end_logits,
            loss,
        }
    }
}

/// Container for the MRC model output.
pub struct MRCOutput {
    /// Logits for the answer start position
    pub start_logits: Tensor,
    /// Logits for the answer end position
    pub end_logits: Tensor,
    /// Span loss, available when start and end positions are provided
    pub loss: Option<Tensor>,
}
