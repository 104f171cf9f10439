use crate::electra::extractor::{HiddenLayerExtractor, LayerReference, LayeredModule};
use crate::KoreanLmError;
use std::borrow::Borrow;
use tch::nn::{Module, ModuleT};
use tch::{nn, Reduction, Tensor};

/// # Electra generator
/// Wraps a sequence model mapping token ids of shape (*batch size*, *sequence_length*) to
/// vocabulary logits of shape (*batch size*, *sequence_length*, *vocab_size*).
#[derive(Debug)]
pub struct Generator {
    model: Box<dyn ModuleT>,
}

impl Generator {
    /// Build a new `Generator`
    ///
    /// # Arguments
    ///
    /// * `model` - sequence model producing token logits
    ///
    /// # Example
    ///
    /// ```no_run
    /// use korean_lm::electra::Generator;
    /// use tch::{nn, Device};
    ///
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let p = vs.root();
    /// let model = nn::seq_t()
    ///     .add(nn::embedding(&p / "embeddings", 22000, 128, Default::default()))
    ///     .add(nn::linear(&p / "lm_head", 128, 22000, Default::default()));
    /// let generator = Generator::new(model);
    /// ```
    pub fn new<M: ModuleT + 'static>(model: M) -> Generator {
        Generator {
            model: Box::new(model),
        }
    }

    /// Forward pass through the generator
    ///
    /// # Arguments
    ///
    /// * `input_ids` - corrupted input tensor of shape (*batch size*, *sequence_length*)
    /// * `train` - boolean flag to turn on/off the dropout layers in the model
    ///
    /// # Returns
    ///
    /// * `logits` - `Tensor` of shape (*batch size*, *sequence_length*, *vocab_size*)
    pub fn forward_t(&self, input_ids: &Tensor, train: bool) -> Tensor {
        self.model.forward_t(input_ids, train)
    }

    /// Masked language modeling loss: mean cross-entropy over the positions of `labels` different
    /// from `ignore_index`.
    ///
    /// # Arguments
    ///
    /// * `logits` - `Tensor` of shape (*batch size*, *sequence_length*, *vocab_size*)
    /// * `labels` - `Tensor` of shape (*batch size*, *sequence_length*)
    /// * `ignore_index` - label value excluded from the loss (the padding token id)
    pub fn mlm_loss(logits: &Tensor, labels: &Tensor, ignore_index: i64) -> Tensor {
        let vocab_size = logits.size().last().copied().unwrap_or(0);
        logits
            .reshape([-1, vocab_size])
            .cross_entropy_loss::<Tensor>(
                &labels.reshape([-1]),
                None,
                Reduction::Mean,
                ignore_index,
                0.0,
            )
    }
}

#[derive(Debug)]
enum DiscriminatorModel {
    Direct(Box<dyn ModuleT>),
    Projected {
        extractor: HiddenLayerExtractor,
        projection: nn::Linear,
    },
}

/// # Electra discriminator
/// Wraps a sequence model predicting, for every position, whether the token was replaced by the
/// generator. The model either outputs one logit per position directly, or exposes a hidden state
/// of dimension `discr_dim` that is projected to a single logit by a linear layer.
#[derive(Debug)]
pub struct Discriminator {
    model: DiscriminatorModel,
}

impl Discriminator {
    /// Build a new `Discriminator` from a model returning one logit per position, with shape
    /// (*batch size*, *sequence_length*) or (*batch size*, *sequence_length*, 1).
    pub fn new<M: ModuleT + 'static>(model: M) -> Discriminator {
        Discriminator {
            model: DiscriminatorModel::Direct(Box::new(model)),
        }
    }

    /// Build a new `Discriminator` extracting a hidden state from `model` and projecting it.
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the projection layer
    /// * `model` - model exposing its ordered sub-components
    /// * `layer` - sub-component to read the hidden states from (`LayerReference::Final` for the model output)
    /// * `discr_dim` - dimension of the extracted hidden states
    ///
    /// # Errors
    ///
    /// * `InvalidConfigurationError` if `discr_dim` is not positive
    /// * `HiddenLayerError` if `layer` cannot be found in `model`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use korean_lm::electra::{Discriminator, LayerReference, NamedSequentialT};
    /// use tch::{nn, Device};
    ///
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let p = vs.root();
    /// let model = NamedSequentialT::new()
    ///     .add("embeddings", nn::embedding(&p / "embeddings", 22000, 256, Default::default()))
    ///     .add("encoder", nn::linear(&p / "encoder", 256, 256, Default::default()));
    /// let discriminator =
    ///     Discriminator::with_hidden_layer(&p / "discriminator", model, LayerReference::Final, 256)
    ///         .unwrap();
    /// ```
    pub fn with_hidden_layer<'p, P, M>(
        p: P,
        model: M,
        layer: LayerReference,
        discr_dim: i64,
    ) -> Result<Discriminator, KoreanLmError>
    where
        P: Borrow<nn::Path<'p>>,
        M: LayeredModule + 'static,
    {
        if discr_dim <= 0 {
            return Err(KoreanLmError::InvalidConfigurationError(format!(
                "discriminator dimension must be positive, got {}",
                discr_dim
            )));
        }
        let p = p.borrow();
        let extractor = HiddenLayerExtractor::new(model, layer)?;
        let projection = nn::linear(p / "projection", discr_dim, 1, Default::default());
        Ok(Discriminator {
            model: DiscriminatorModel::Projected {
                extractor,
                projection,
            },
        })
    }

    /// Forward pass through the discriminator
    ///
    /// # Arguments
    ///
    /// * `input_ids` - input tensor of shape (*batch size*, *sequence_length*) with generator samples
    /// * `train` - boolean flag to turn on/off the dropout layers in the model
    ///
    /// # Returns
    ///
    /// * `logits` - `Tensor` with one replaced-token logit per position
    pub fn forward_t(&self, input_ids: &Tensor, train: bool) -> Result<Tensor, KoreanLmError> {
        Ok(match &self.model {
            DiscriminatorModel::Direct(model) => model.forward_t(input_ids, train),
            DiscriminatorModel::Projected {
                extractor,
                projection,
            } => projection.forward(&extractor.forward_t(input_ids, train)?),
        })
    }

    /// Replaced token detection loss: binary cross-entropy with logits over non-padded positions.
    ///
    /// # Arguments
    ///
    /// * `logits` - discriminator logits of shape (*batch size*, *sequence_length*)
    /// * `labels` - `Float` labels of the same shape, 1 for replaced tokens
    /// * `non_padded` - `Bool` tensor of the same shape, `true` for positions to score
    pub fn replaced_token_loss(logits: &Tensor, labels: &Tensor, non_padded: &Tensor) -> Tensor {
        logits
            .masked_select(non_padded)
            .binary_cross_entropy_with_logits::<Tensor>(
                &labels.masked_select(non_padded).to_kind(logits.kind()),
                None,
                None,
                Reduction::Mean,
            )
    }
}
