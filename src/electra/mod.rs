//! # Electra: Pre-training Text Encoders as Discriminators Rather Than Generators (Clark et al.)
//!
//! Pretraining objective of the Electra language model ([https://openreview.net/pdf?id=r1xMH1BtvB](https://openreview.net/pdf?id=r1xMH1BtvB) Clark, Luong, Le, Manning, 2020).
//! The objective is implemented in the `Electra` struct, which combines two sequence models:
//! - Generator (masked language model): `Generator`, trained with the masked language modeling loss
//! - Discriminator (replaced token detection): `Discriminator`, trained to spot tokens sampled from the generator
//!
//! The building blocks are available separately:
//! - Masking: `get_mask_subset_with_prob`, `mask_with_tokens`, `prob_mask_like`
//! - Corruption of the generator input: `corrupt`, `generator_labels`
//! - Gumbel-max sampling of the generator outputs: `gumbel_sample`
//! - Hidden state extraction for discriminators exposing intermediate layers: `HiddenLayerExtractor`
//! - Loss weighting and metrics: `LossWeights`, `generator_accuracy`, `discriminator_accuracy`
//!
//! A span prediction head for machine reading comprehension fine-tuning of the discriminator is
//! available as `DiscriminatorMRCModel`.
//!
//! # Model set-up
//!
//! The transformer backbones are provided by the caller as `tch::nn::ModuleT` implementations.
//! The generator must return logits of shape (*batch size*, *sequence_length*, *vocab_size*), the
//! discriminator one logit per token, or a hidden state that is projected when built with
//! `Discriminator::with_hidden_layer`.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use korean_lm::electra::{
//!     Discriminator, Electra, ElectraConfig, Generator, LayerReference, NamedSequentialT,
//! };
//! use korean_lm::Config;
//! use tch::{nn, Device, Kind, Tensor};
//!
//! let device = Device::cuda_if_available();
//! let vs = nn::VarStore::new(device);
//! let p = vs.root();
//! let config = ElectraConfig::from_file("path/to/electra_config.json")?;
//!
//! let generator = Generator::new(
//!     nn::seq_t()
//!         .add(nn::embedding(&p / "generator" / "embeddings", 22000, 128, Default::default()))
//!         .add(nn::linear(&p / "generator" / "lm_head", 128, 22000, Default::default())),
//! );
//! let discriminator_backbone = NamedSequentialT::new()
//!     .add(
//!         "embeddings",
//!         nn::embedding(&p / "discriminator" / "embeddings", 22000, 256, Default::default()),
//!     )
//!     .add(
//!         "encoder",
//!         nn::linear(&p / "discriminator" / "encoder", 256, 256, Default::default()),
//!     );
//! let discriminator = Discriminator::with_hidden_layer(
//!     &p / "discriminator",
//!     discriminator_backbone,
//!     LayerReference::Final,
//!     256,
//! )?;
//! let electra = Electra::new(generator, discriminator, config);
//!
//! let input_ids = Tensor::randint(22000, [8, 128], (Kind::Int64, device));
//! let output = electra.forward_t(&input_ids, true)?;
//! output.loss.backward();
//! # Ok(())
//! # }
//! ```

mod adapters;
mod electra_model;
mod extractor;
mod loss;
mod masking;
mod mrc;
mod sampling;

pub use adapters::{Discriminator, Generator};
pub use electra_model::{Electra, ElectraConfig, ElectraOutput};
pub use extractor::{HiddenLayerExtractor, LayerReference, LayeredModule, NamedSequentialT};
pub use loss::{
    discriminator_accuracy, discriminator_predictions, generator_accuracy, LossWeights,
};
pub use masking::{
    corrupt, generator_labels, get_mask_subset_with_prob, mask_with_tokens, prob_mask_like,
};
pub use mrc::{DiscriminatorMRCConfig, DiscriminatorMRCHead, DiscriminatorMRCModel, MRCOutput};
pub use sampling::{gumbel_noise, gumbel_sample};
