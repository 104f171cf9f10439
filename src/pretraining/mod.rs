//! # Electra pretraining loop
//!
//! Optimization of an `Electra` model over pre-tokenized batches, with:
//! - periodic progress logs and loss history dumps (`TrainerConfig::log_steps`)
//! - checkpointing of the model parameters and trainer state (`TrainerConfig::ckpt_steps`), and
//!   resumption from an existing checkpoint directory
//! - evaluation after every epoch, reporting losses, accuracies and generator perplexity
//!
//! Batches are `Tensor`s of token ids of shape (*batch size*, *sequence_length*).
//! `split_batches` holds out a random share of them for evaluation.

mod checkpoint;
mod trainer;

pub use checkpoint::{read_loss_history, write_loss_history, Checkpoint, LossHistory, TrainerState};
pub use trainer::{split_batches, ElectraTrainer, EvaluationResult, TrainerConfig};
