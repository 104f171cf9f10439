//! # Korean language model pretraining
//!
//! Rust implementation of the ELECTRA pretraining objective for Korean wordpiece vocabularies,
//! built on [tch-rs](https://github.com/LaurentMazare/tch-rs) and
//! [rust-tokenizers](https://github.com/guillaume-be/rust-tokenizers).
//!
//! The crate contains:
//! - `electra`: masking and corruption of token batches, generator / discriminator adapters,
//!   Gumbel sampling of replacement tokens, hidden layer extraction, loss weighting and metrics,
//!   and a machine reading comprehension head for the pretrained discriminator
//! - `pretraining`: training loop with logging, checkpointing and evaluation
//! - `generation`: top-k autoregressive text generation with a wordpiece tokenizer
//!
//! Transformer backbones are supplied by the caller as `tch::nn::ModuleT` implementations.
//! Configurations are JSON files deserialized through the `Config` trait, missing fields taking
//! their default value.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use korean_lm::electra::{Discriminator, Electra, ElectraConfig, Generator};
//! use korean_lm::pretraining::{split_batches, ElectraTrainer, TrainerConfig};
//! use korean_lm::Config;
//! use tch::{nn, Device, Kind, Tensor};
//!
//! let vs = nn::VarStore::new(Device::cuda_if_available());
//! let p = vs.root();
//! let electra_config = ElectraConfig::from_file("path/to/electra_config.json")?;
//! let trainer_config = TrainerConfig::from_file("path/to/trainer_config.json")?;
//!
//! let generator = Generator::new(
//!     nn::seq_t()
//!         .add(nn::embedding(&p / "gen_embeddings", 22000, 128, Default::default()))
//!         .add(nn::linear(&p / "gen_lm_head", 128, 22000, Default::default())),
//! );
//! let discriminator = Discriminator::new(
//!     nn::seq_t()
//!         .add(nn::embedding(&p / "disc_embeddings", 22000, 256, Default::default()))
//!         .add(nn::linear(&p / "disc_head", 256, 1, Default::default())),
//! );
//! let electra = Electra::new(generator, discriminator, electra_config);
//!
//! let batches = (0..64)
//!     .map(|_| Tensor::randint(22000, [8, 128], (Kind::Int64, Device::Cpu)))
//!     .collect::<Vec<_>>();
//! let (train, eval) = split_batches(batches, trainer_config.train_test_split)?;
//! let mut trainer = ElectraTrainer::new(electra, vs, trainer_config);
//! trainer.train(&train, &eval, None)?;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod electra;
pub mod generation;
pub mod pretraining;

pub use common::error::KoreanLmError;
pub use common::{resources, Activation, Config};
