// Copyright 2020 The Google Research Authors.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::electra::adapters::{Discriminator, Generator};
use crate::electra::loss::{
    discriminator_accuracy, discriminator_predictions, generator_accuracy, LossWeights,
};
use crate::electra::masking::{
    corrupt, generator_labels, get_mask_subset_with_prob, mask_with_tokens, prob_mask_like,
};
use crate::electra::sampling::gumbel_sample;
use crate::{Config, KoreanLmError};
use log::debug;
use serde::{Deserialize, Serialize};
use tch::{no_grad, Kind, Tensor};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
/// # Electra pretraining configuration
/// Defines the corruption procedure and the weighting of the generator and discriminator losses.
pub struct ElectraConfig {
    /// Vocabulary size, required to substitute random tokens
    pub num_tokens: Option<i64>,
    /// Share of eligible tokens selected for corruption
    pub mask_prob: f64,
    /// Share of selected tokens replaced by the mask token
    pub replace_prob: f64,
    /// Share of tokens substituted by a random vocabulary item before masking
    pub random_token_prob: f64,
    pub mask_token_id: i64,
    pub pad_token_id: i64,
    /// Token ids never selected for corruption (e.g. `[CLS]`, `[SEP]`). The padding id is always excluded.
    pub mask_ignore_token_ids: Vec<i64>,
    pub disc_weight: f64,
    pub gen_weight: f64,
    /// Temperature of the Gumbel sampling of generator outputs
    pub temperature: f64,
}

impl Config for ElectraConfig {}

impl Default for ElectraConfig {
    fn default() -> Self {
        ElectraConfig {
            num_tokens: None,
            mask_prob: 0.15,
            replace_prob: 0.85,
            random_token_prob: 0.0,
            mask_token_id: 4,
            pad_token_id: 0,
            mask_ignore_token_ids: vec![],
            disc_weight: 50.0,
            gen_weight: 1.0,
            temperature: 1.0,
        }
    }
}

impl ElectraConfig {
    /// Ignored token ids, including the padding token id
    pub fn ignored_token_ids(&self) -> Vec<i64> {
        let mut ignored = self.mask_ignore_token_ids.clone();
        if !ignored.contains(&self.pad_token_id) {
            ignored.push(self.pad_token_id);
        }
        ignored
    }

    pub fn loss_weights(&self) -> LossWeights {
        LossWeights {
            gen_weight: self.gen_weight,
            disc_weight: self.disc_weight,
        }
    }
}

/// # Electra pretraining model
/// Joint generator / discriminator objective of ELECTRA:
/// - a subset of the input tokens is selected and corrupted (`[MASK]`, kept or random tokens)
/// - the `generator` is trained to recover the original tokens (masked language modeling)
/// - tokens sampled from the generator replace the selected positions
/// - the `discriminator` is trained to detect the replaced tokens
pub struct Electra {
    generator: Generator,
    discriminator: Discriminator,
    config: ElectraConfig,
    ignored_token_ids: Vec<i64>,
}

impl Electra {
    /// Build a new `Electra`
    ///
    /// # Arguments
    ///
    /// * `generator` - `Generator` wrapping the masked language model
    /// * `discriminator` - `Discriminator` wrapping the replaced token detection model
    /// * `config` - `ElectraConfig` object defining the pretraining objective
    ///
    /// # Example
    ///
    /// ```no_run
    /// use korean_lm::electra::{Discriminator, Electra, ElectraConfig, Generator};
    /// use tch::{nn, Device};
    ///
    /// let vs = nn::VarStore::new(Device::cuda_if_available());
    /// let p = vs.root();
    /// let generator = Generator::new(
    ///     nn::seq_t()
    ///         .add(nn::embedding(&p / "gen_embeddings", 22000, 128, Default::default()))
    ///         .add(nn::linear(&p / "gen_lm_head", 128, 22000, Default::default())),
    /// );
    /// let discriminator = Discriminator::new(
    ///     nn::seq_t()
    ///         .add(nn::embedding(&p / "disc_embeddings", 22000, 256, Default::default()))
    ///         .add(nn::linear(&p / "disc_head", 256, 1, Default::default())),
    /// );
    /// let config = ElectraConfig {
    ///     mask_ignore_token_ids: vec![2, 3],
    ///     ..Default::default()
    /// };
    /// let electra = Electra::new(generator, discriminator, config);
    /// ```
    pub fn new(
        generator: Generator,
        discriminator: Discriminator,
        config: ElectraConfig,
    ) -> Electra {
        let ignored_token_ids = config.ignored_token_ids();
        Electra {
            generator,
            discriminator,
            config,
            ignored_token_ids,
        }
    }

    pub fn config(&self) -> &ElectraConfig {
        &self.config
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    /// Forward pass through the model
    ///
    /// # Arguments
    ///
    /// * `input_ids` - input tensor of shape (*batch size*, *sequence_length*) with the original token ids
    /// * `train` - boolean flag to turn on/off the dropout layers in the models. Should be set to false for evaluation.
    ///
    /// # Returns
    ///
    /// * `ElectraOutput` containing the weighted loss, both component losses and accuracy metrics
    ///
    /// # Errors
    ///
    /// * `InvalidConfigurationError` if random tokens are requested without `num_tokens`
    /// * `HiddenLayerError` if the discriminator hidden layer was not reached
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use korean_lm::electra::{Discriminator, Electra, ElectraConfig, Generator};
    /// # use tch::{nn, Device, Kind, Tensor};
    /// # let vs = nn::VarStore::new(Device::Cpu);
    /// # let p = vs.root();
    /// # let generator = Generator::new(nn::seq_t()
    /// #     .add(nn::embedding(&p / "gen_embeddings", 22000, 128, Default::default()))
    /// #     .add(nn::linear(&p / "gen_lm_head", 128, 22000, Default::default())));
    /// # let discriminator = Discriminator::new(nn::seq_t()
    /// #     .add(nn::embedding(&p / "disc_embeddings", 22000, 256, Default::default()))
    /// #     .add(nn::linear(&p / "disc_head", 256, 1, Default::default())));
    /// # let electra = Electra::new(generator, discriminator, ElectraConfig::default());
    /// let (batch_size, sequence_length) = (8, 128);
    /// let input_tensor = Tensor::randint(
    ///     22000,
    ///     [batch_size, sequence_length],
    ///     (Kind::Int64, Device::Cpu),
    /// );
    ///
    /// let output = electra.forward_t(&input_tensor, true).unwrap();
    /// output.loss.backward();
    /// ```
    pub fn forward_t(
        &self,
        input_ids: &Tensor,
        train: bool,
    ) -> Result<ElectraOutput, KoreanLmError> {
        let replace = prob_mask_like(input_ids, self.config.replace_prob);

        // [PAD] and the ignored special tokens are never masked
        let no_mask = mask_with_tokens(input_ids, &self.ignored_token_ids);
        let mask = get_mask_subset_with_prob(&no_mask.logical_not(), self.config.mask_prob)?;

        let masked_input = corrupt(
            input_ids,
            &mask,
            &replace,
            self.config.random_token_prob,
            self.config.mask_token_id,
            self.config.num_tokens,
            &self.ignored_token_ids,
        )?;
        let gen_labels = generator_labels(input_ids, &mask, self.config.pad_token_id);

        let logits = self.generator.forward_t(&masked_input, train);
        let mlm_loss = Generator::mlm_loss(&logits, &gen_labels, self.config.pad_token_id);

        let vocab_size = logits.size().last().copied().unwrap_or(0);
        let sample_logits = logits
            .masked_select(&mask.unsqueeze(-1))
            .view([-1, vocab_size]);
        let sampled = gumbel_sample(&sample_logits, self.config.temperature).detach();

        let disc_input = input_ids.masked_scatter(&mask, &sampled);
        let disc_labels = input_ids
            .ne_tensor(&disc_input)
            .to_kind(Kind::Float)
            .detach();
        let non_padded = input_ids.ne(self.config.pad_token_id);

        let disc_logits = self
            .discriminator
            .forward_t(&disc_input, train)?
            .reshape_as(&disc_labels);
        let disc_loss =
            Discriminator::replaced_token_loss(&disc_logits, &disc_labels, &non_padded);

        let (gen_accuracy, disc_accuracy, disc_predictions) = no_grad(|| {
            let disc_predictions = discriminator_predictions(&disc_logits);
            let gen_accuracy = generator_accuracy(&logits, &gen_labels, &mask);
            let disc_accuracy = discriminator_accuracy(&disc_predictions, &disc_labels, &mask);
            (gen_accuracy, disc_accuracy, disc_predictions)
        });

        debug!(
            "electra forward: {} masked tokens, {} replaced tokens",
            mask.sum(Kind::Int64).int64_value(&[]),
            disc_labels.sum(Kind::Float).double_value(&[])
        );

        let loss = self.config.loss_weights().combine(&mlm_loss, &disc_loss);
        Ok(ElectraOutput {
            loss,
            mlm_loss,
            disc_loss,
            gen_accuracy,
            disc_accuracy,
            disc_labels,
            disc_predictions,
        })
    }
}

/// Container for the Electra pretraining output.
pub struct ElectraOutput {
    /// Weighted sum of the generator and discriminator losses
    pub loss: Tensor,
    /// Masked language modeling loss of the generator
    pub mlm_loss: Tensor,
    /// Replaced token detection loss of the discriminator
    pub disc_loss: Tensor,
    /// Generator accuracy on the masked positions
    pub gen_accuracy: f64,
    /// Balanced discriminator accuracy over masked and unmasked positions
    pub disc_accuracy: f64,
    /// Discriminator labels of shape (*batch size*, *sequence_length*), 1 for replaced tokens
    pub disc_labels: Tensor,
    /// Discriminator predictions of shape (*batch size*, *sequence_length*)
    pub disc_predictions: Tensor,
}
