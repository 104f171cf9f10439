use korean_lm::electra::{Discriminator, Electra, ElectraConfig, Generator};
use korean_lm::pretraining::{
    read_loss_history, split_batches, Checkpoint, ElectraTrainer, LossHistory, TrainerConfig,
    TrainerState,
};
use korean_lm::{Config, KoreanLmError};
use std::io::Write;
use tch::{nn, Device, Kind, Tensor};

const VOCAB_SIZE: i64 = 40;

fn build_trainer(config: TrainerConfig) -> ElectraTrainer {
    let vs = nn::VarStore::new(Device::Cpu);
    let p = vs.root();
    let generator = Generator::new(
        nn::seq_t()
            .add(nn::embedding(&p / "gen_embeddings", VOCAB_SIZE, 8, Default::default()))
            .add(nn::linear(&p / "gen_lm_head", 8, VOCAB_SIZE, Default::default())),
    );
    let discriminator = Discriminator::new(
        nn::seq_t()
            .add(nn::embedding(&p / "disc_embeddings", VOCAB_SIZE, 16, Default::default()))
            .add(nn::linear(&p / "disc_head", 16, 1, Default::default())),
    );
    let electra_config = ElectraConfig {
        num_tokens: Some(VOCAB_SIZE),
        mask_ignore_token_ids: vec![2, 3],
        ..Default::default()
    };
    let electra = Electra::new(generator, discriminator, electra_config);
    ElectraTrainer::new(electra, vs, config)
}

fn batches(count: usize) -> Vec<Tensor> {
    (0..count)
        .map(|_| Tensor::randint_low(5, VOCAB_SIZE, [2, 12], (Kind::Int64, Device::Cpu)))
        .collect()
}

#[test]
fn split_holds_out_evaluation_batches() -> anyhow::Result<()> {
    let (train, eval) = split_batches(batches(10), 0.2)?;
    assert_eq!(train.len(), 8);
    assert_eq!(eval.len(), 2);

    let (train, eval) = split_batches(batches(3), 0.1)?;
    assert_eq!(train.len(), 3);
    assert!(eval.is_empty());

    let (train, eval) = split_batches(batches(4), 1.0)?;
    assert!(train.is_empty());
    assert_eq!(eval.len(), 4);
    Ok(())
}

#[test]
fn split_rejects_invalid_ratio() -> anyhow::Result<()> {
    for train_test_split in [1.5, -0.1, f64::NAN] {
        assert!(matches!(
            split_batches(batches(4), train_test_split),
            Err(KoreanLmError::InvalidConfigurationError(_))
        ));
    }
    Ok(())
}

#[test]
fn training_writes_checkpoints_and_logs() -> anyhow::Result<()> {
    let checkpoint_dir = tempfile::tempdir()?;
    let log_dir = tempfile::tempdir()?;
    let config = TrainerConfig {
        epochs: 2,
        learning_rate: 1e-3,
        log_steps: 1,
        ckpt_steps: 3,
        log_dir: Some(log_dir.path().to_path_buf()),
        ..Default::default()
    };
    let mut trainer = build_trainer(config);

    let losses = trainer.train(&batches(4), &batches(2), Some(checkpoint_dir.path()))?;
    assert_eq!(losses.len(), 8);
    assert_eq!(losses.keys().copied().collect::<Vec<u64>>(), (0..8).collect::<Vec<u64>>());
    assert!(losses.values().all(|loss| loss.is_finite()));
    assert_eq!(trainer.state().global_step, 8);

    let checkpoint = Checkpoint::new(checkpoint_dir.path())?;
    assert!(checkpoint.exists());
    assert!(checkpoint.trainer_state_path().is_file());
    assert_eq!(read_loss_history(checkpoint.loss_history_path())?, losses);

    assert!(log_dir.path().join(Checkpoint::LOSS_HISTORY_FILE).is_file());
    let eval_results = std::fs::read_to_string(log_dir.path().join("electra_eval_results.txt"))?;
    assert_eq!(eval_results.lines().count(), 2);
    Ok(())
}

#[test]
fn training_resumes_from_checkpoint() -> anyhow::Result<()> {
    let checkpoint_dir = tempfile::tempdir()?;
    let config = TrainerConfig {
        epochs: 1,
        ckpt_steps: 100,
        ..Default::default()
    };

    let mut trainer = build_trainer(config.clone());
    trainer.train(&batches(3), &[], Some(checkpoint_dir.path()))?;
    assert_eq!(trainer.state().global_step, 3);

    let mut resumed = build_trainer(config);
    let losses = resumed.train(&batches(3), &[], Some(checkpoint_dir.path()))?;
    assert_eq!(resumed.state().global_step, 6);
    assert_eq!(losses.len(), 6);
    Ok(())
}

#[test]
fn evaluation_reports_perplexity() -> anyhow::Result<()> {
    let trainer = build_trainer(TrainerConfig::default());
    let result = trainer.evaluate(&batches(3))?;
    assert!(result.loss.is_finite());
    assert!(result.perplexity >= 1.0);
    assert!((0.0..=1.0).contains(&result.gen_accuracy));
    assert!((0.0..=1.0).contains(&result.disc_accuracy));
    Ok(())
}

#[test]
fn checkpoint_without_state_files() -> anyhow::Result<()> {
    let checkpoint_dir = tempfile::tempdir()?;
    let checkpoint = Checkpoint::new(checkpoint_dir.path().join("nested"))?;
    assert!(!checkpoint.exists());

    let mut vs = nn::VarStore::new(Device::Cpu);
    let _ = nn::linear(vs.root() / "layer", 4, 4, Default::default());
    let state = TrainerState {
        global_step: 12,
        learning_rate: 5e-4,
    };
    let mut history = LossHistory::new();
    history.insert(11, 0.5);
    checkpoint.save(&vs, &state, &history)?;
    assert!(checkpoint.exists());

    std::fs::remove_file(checkpoint.trainer_state_path())?;
    std::fs::remove_file(checkpoint.loss_history_path())?;
    let (state, history) = checkpoint.load(&mut vs)?;
    assert_eq!(state, TrainerState::default());
    assert!(history.is_empty());
    Ok(())
}

#[test]
fn trainer_config_from_file() -> anyhow::Result<()> {
    let mut config_file = tempfile::NamedTempFile::new()?;
    write!(config_file, r#"{{"epochs": 10, "log_dir": "logs"}}"#)?;
    let config = TrainerConfig::from_file(config_file.path())?;
    assert_eq!(config.epochs, 10);
    assert_eq!(config.log_dir, Some("logs".into()));
    assert_eq!(config.learning_rate, 1e-4);
    assert_eq!(config.gradient_accumulation_steps, 1);
    Ok(())
}
