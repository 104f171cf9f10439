use crate::electra::Electra;
use crate::pretraining::checkpoint::{write_loss_history, Checkpoint, LossHistory, TrainerState};
use crate::{Config, KoreanLmError};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tch::{nn, nn::OptimizerConfig, no_grad, Device, Kind, Tensor};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
/// # Configuration of the pretraining loop
pub struct TrainerConfig {
    /// Number of passes over the training batches
    pub epochs: u64,
    /// Learning rate of the Adam optimizer
    pub learning_rate: f64,
    /// Interval (in global steps) between two progress logs and loss history dumps
    pub log_steps: u64,
    /// Interval (in global steps) between two checkpoints
    pub ckpt_steps: u64,
    /// Number of batches accumulated before an optimizer step
    pub gradient_accumulation_steps: u64,
    /// Share of the batches held out for evaluation
    pub train_test_split: f64,
    /// Directory receiving the loss history and the evaluation results
    pub log_dir: Option<PathBuf>,
}

impl Config for TrainerConfig {}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            epochs: 3,
            learning_rate: 1e-4,
            log_steps: 100,
            ckpt_steps: 1000,
            gradient_accumulation_steps: 1,
            train_test_split: 0.1,
            log_dir: None,
        }
    }
}

/// Randomly splits `batches` into training and evaluation batches. The evaluation set receives
/// `floor(train_test_split * batches.len())` batches.
///
/// # Errors
///
/// * `InvalidConfigurationError` if `train_test_split` is not within `[0, 1]`
pub fn split_batches(
    batches: Vec<Tensor>,
    train_test_split: f64,
) -> Result<(Vec<Tensor>, Vec<Tensor>), KoreanLmError> {
    if !(0.0..=1.0).contains(&train_test_split) {
        return Err(KoreanLmError::InvalidConfigurationError(format!(
            "train_test_split must be within [0, 1], got {}",
            train_test_split
        )));
    }
    let eval_len = (batches.len() as f64 * train_test_split).floor() as usize;
    let permutation = Tensor::randperm(batches.len() as i64, (Kind::Int64, Device::Cpu));
    let permutation = Vec::<i64>::try_from(&permutation)
        .unwrap_or_else(|_| (0..batches.len() as i64).collect());

    let mut batches: Vec<Option<Tensor>> = batches.into_iter().map(Some).collect();
    let mut shuffled = permutation
        .into_iter()
        .filter_map(|index| batches[index as usize].take())
        .collect::<Vec<Tensor>>();
    let train = shuffled.split_off(eval_len.min(shuffled.len()));
    Ok((train, shuffled))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
/// # Averaged metrics over an evaluation set
pub struct EvaluationResult {
    pub loss: f64,
    pub mlm_loss: f64,
    pub disc_loss: f64,
    pub gen_accuracy: f64,
    pub disc_accuracy: f64,
    /// Mean of the per-batch generator perplexities `exp(mlm_loss)`
    pub perplexity: f64,
}

/// # Electra pretraining loop
/// Owns the `Electra` model and the `VarStore` holding the generator and discriminator
/// parameters. Runs Adam optimization over pre-tokenized batches of shape
/// (*batch size*, *sequence_length*), with periodic logging, checkpointing and evaluation.
pub struct ElectraTrainer {
    model: Electra,
    var_store: nn::VarStore,
    config: TrainerConfig,
    state: TrainerState,
    losses: LossHistory,
}

impl ElectraTrainer {
    /// Build a new `ElectraTrainer`
    ///
    /// # Arguments
    ///
    /// * `model` - `Electra` model whose parameters live in `var_store`
    /// * `var_store` - `VarStore` used to build the generator and discriminator
    /// * `config` - `TrainerConfig` defining the training loop
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() -> anyhow::Result<()> {
    /// use korean_lm::electra::{Discriminator, Electra, ElectraConfig, Generator};
    /// use korean_lm::pretraining::{split_batches, ElectraTrainer, TrainerConfig};
    /// use std::path::Path;
    /// use tch::{nn, Device, Kind, Tensor};
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
    /// let electra = Electra::new(generator, discriminator, ElectraConfig::default());
    /// let mut trainer = ElectraTrainer::new(electra, vs, TrainerConfig::default());
    ///
    /// let batches = (0..100)
    ///     .map(|_| Tensor::randint(22000, [8, 128], (Kind::Int64, Device::Cpu)))
    ///     .collect::<Vec<_>>();
    /// let (train, eval) = split_batches(batches, 0.1)?;
    /// trainer.train(&train, &eval, Some(Path::new("checkpoints")))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(model: Electra, var_store: nn::VarStore, config: TrainerConfig) -> ElectraTrainer {
        let state = TrainerState {
            global_step: 0,
            learning_rate: config.learning_rate,
        };
        ElectraTrainer {
            model,
            var_store,
            config,
            state,
            losses: LossHistory::new(),
        }
    }

    pub fn model(&self) -> &Electra {
        &self.model
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.var_store
    }

    pub fn state(&self) -> &TrainerState {
        &self.state
    }

    pub fn losses(&self) -> &LossHistory {
        &self.losses
    }

    /// Trains the model for `config.epochs` epochs.
    ///
    /// If `checkpoint_dir` holds a checkpoint, training resumes from it. Checkpoints are written
    /// every `ckpt_steps` global steps and at the end of training. The model is evaluated on
    /// `eval_batches` after every epoch.
    ///
    /// # Arguments
    ///
    /// * `train_batches` - training batches of token ids
    /// * `eval_batches` - evaluation batches of token ids
    /// * `checkpoint_dir` - Optional checkpoint directory
    ///
    /// # Returns
    ///
    /// * `LossHistory` of the run, keyed by global step
    pub fn train(
        &mut self,
        train_batches: &[Tensor],
        eval_batches: &[Tensor],
        checkpoint_dir: Option<&Path>,
    ) -> Result<LossHistory, KoreanLmError> {
        let checkpoint = checkpoint_dir.map(Checkpoint::new).transpose()?;
        if let Some(checkpoint) = &checkpoint {
            if checkpoint.exists() {
                info!("Continuing from checkpoint {}", checkpoint.directory().display());
                let (state, losses) = checkpoint.load(&mut self.var_store)?;
                self.state = state;
                self.losses = losses;
            } else {
                info!("No checkpoint was found in {}", checkpoint.directory().display());
            }
        }

        let mut optimizer = nn::Adam::default().build(&self.var_store, self.state.learning_rate)?;
        let accumulation_steps = self.config.gradient_accumulation_steps.max(1);
        let log_steps = self.config.log_steps.max(1);
        let ckpt_steps = self.config.ckpt_steps.max(1);

        info!(
            "Training on {} batches | evaluating on {} batches | device: {:?}",
            train_batches.len(),
            eval_batches.len(),
            self.var_store.device()
        );
        info!(
            "Epochs: {} | log_steps: {} | ckpt_steps: {} | gradient_accumulation_steps: {}",
            self.config.epochs, log_steps, ckpt_steps, accumulation_steps
        );

        let mut step_loss = 0f64;
        let mut local_steps = 0u64;
        optimizer.zero_grad();
        for epoch in 0..self.config.epochs {
            info!("Epoch: {}", epoch);
            for batch in train_batches {
                let batch = batch.to_device(self.var_store.device());
                let output = self.model.forward_t(&batch, true)?;
                output.loss.backward();

                let loss = output.loss.double_value(&[]);
                step_loss += loss;
                self.losses.insert(self.state.global_step, loss);
                local_steps += 1;
                self.state.global_step += 1;

                if self.state.global_step % accumulation_steps == 0 {
                    optimizer.step();
                    optimizer.zero_grad();
                }

                if self.state.global_step % log_steps == 0 {
                    info!(
                        "Train loss: {:.4} | gen acc: {:.4} | disc acc: {:.4} | steps: {}",
                        step_loss / local_steps as f64,
                        output.gen_accuracy,
                        output.disc_accuracy,
                        self.state.global_step
                    );
                    if let Some(log_dir) = &self.config.log_dir {
                        write_loss_history(log_dir.join(Checkpoint::LOSS_HISTORY_FILE), &self.losses)?;
                    }
                    step_loss = 0.0;
                    local_steps = 0;
                }

                if self.state.global_step % ckpt_steps == 0 {
                    if let Some(checkpoint) = &checkpoint {
                        checkpoint.save(&self.var_store, &self.state, &self.losses)?;
                        info!("Saved checkpoint to {}", checkpoint.directory().display());
                    }
                }
            }
            if !eval_batches.is_empty() {
                self.evaluate(eval_batches)?;
            }
        }

        if let Some(checkpoint) = &checkpoint {
            checkpoint.save(&self.var_store, &self.state, &self.losses)?;
            info!("Saved checkpoint to {}", checkpoint.directory().display());
        }
        Ok(self.losses.clone())
    }

    /// Evaluates the model on `batches` without gradient tracking.
    ///
    /// When a `log_dir` is configured, the result is appended to `electra_eval_results.txt`.
    pub fn evaluate(&self, batches: &[Tensor]) -> Result<EvaluationResult, KoreanLmError> {
        info!("Evaluating on {} batches", batches.len());
        let mut total = EvaluationResult::default();
        for batch in batches {
            let batch = batch.to_device(self.var_store.device());
            let output = no_grad(|| self.model.forward_t(&batch, false))?;
            let mlm_loss = output.mlm_loss.double_value(&[]);
            total.loss += output.loss.double_value(&[]);
            total.mlm_loss += mlm_loss;
            total.disc_loss += output.disc_loss.double_value(&[]);
            total.gen_accuracy += output.gen_accuracy;
            total.disc_accuracy += output.disc_accuracy;
            total.perplexity += mlm_loss.exp();
        }

        let steps = batches.len().max(1) as f64;
        let result = EvaluationResult {
            loss: total.loss / steps,
            mlm_loss: total.mlm_loss / steps,
            disc_loss: total.disc_loss / steps,
            gen_accuracy: total.gen_accuracy / steps,
            disc_accuracy: total.disc_accuracy / steps,
            perplexity: total.perplexity / steps,
        };
        info!(
            "Step: {} | Eval loss: {:.4} | Perplexity: {:.4} | gen acc: {:.4} | disc acc: {:.4}",
            self.state.global_step,
            result.loss,
            result.perplexity,
            result.gen_accuracy,
            result.disc_accuracy
        );

        if let Some(log_dir) = &self.config.log_dir {
            let mut results_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_dir.join("electra_eval_results.txt"))?;
            writeln!(
                results_file,
                "Step: {} | Eval Loss: {} | Perplexity: {}",
                self.state.global_step, result.loss, result.perplexity
            )?;
        }
        Ok(result)
    }
}
