use crate::KoreanLmError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tch::nn;

/// Training loss recorded at every global step.
pub type LossHistory = BTreeMap<u64, f64>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
/// # Progress of a training run
pub struct TrainerState {
    /// Number of optimization steps (batches) processed so far
    pub global_step: u64,
    /// Learning rate of the optimizer
    pub learning_rate: f64,
}

/// Writes the loss history as JSON, replacing the previous file.
pub fn write_loss_history<P: AsRef<Path>>(
    path: P,
    history: &LossHistory,
) -> Result<(), KoreanLmError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, history)?;
    Ok(())
}

pub fn read_loss_history<P: AsRef<Path>>(path: P) -> Result<LossHistory, KoreanLmError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// # Checkpoint directory
/// A checkpoint is made of three files:
/// - `electra_model.ot`: model parameters saved from the `VarStore`
/// - `electra_trainer_state.json`: `TrainerState` (global step and learning rate)
/// - `electra_train_results.json`: `LossHistory` keyed by global step
///
/// Optimizer moments are not persisted: a resumed run restarts the optimizer from the saved
/// learning rate.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    directory: PathBuf,
}

impl Checkpoint {
    pub const MODEL_FILE: &'static str = "electra_model.ot";
    pub const TRAINER_STATE_FILE: &'static str = "electra_trainer_state.json";
    pub const LOSS_HISTORY_FILE: &'static str = "electra_train_results.json";

    /// Build a new `Checkpoint` rooted at `directory`, creating it if needed.
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Checkpoint, KoreanLmError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Checkpoint { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn model_path(&self) -> PathBuf {
        self.directory.join(Self::MODEL_FILE)
    }

    pub fn trainer_state_path(&self) -> PathBuf {
        self.directory.join(Self::TRAINER_STATE_FILE)
    }

    pub fn loss_history_path(&self) -> PathBuf {
        self.directory.join(Self::LOSS_HISTORY_FILE)
    }

    /// `true` if model parameters were saved in this directory
    pub fn exists(&self) -> bool {
        self.model_path().is_file()
    }

    /// Saves the model parameters, the trainer state and the loss history.
    pub fn save(
        &self,
        var_store: &nn::VarStore,
        state: &TrainerState,
        history: &LossHistory,
    ) -> Result<(), KoreanLmError> {
        var_store.save(self.model_path())?;
        let writer = BufWriter::new(File::create(self.trainer_state_path())?);
        serde_json::to_writer_pretty(writer, state)?;
        write_loss_history(self.loss_history_path(), history)
    }

    /// Loads the model parameters into `var_store` and returns the saved trainer state and loss
    /// history. Missing state files yield default values.
    pub fn load(
        &self,
        var_store: &mut nn::VarStore,
    ) -> Result<(TrainerState, LossHistory), KoreanLmError> {
        var_store.load(self.model_path())?;
        let state = if self.trainer_state_path().is_file() {
            let reader = BufReader::new(File::open(self.trainer_state_path())?);
            serde_json::from_reader(reader)?
        } else {
            TrainerState::default()
        };
        let history = if self.loss_history_path().is_file() {
            read_loss_history(self.loss_history_path())?
        } else {
            LossHistory::new()
        };
        Ok((state, history))
    }
}
