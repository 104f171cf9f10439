use korean_lm::generation::{GenerateConfig, TextGenerator};
use korean_lm::resources::LocalResource;
use korean_lm::KoreanLmError;
use std::io::Write;
use tch::nn::ModuleT;
use tch::{Device, Kind, Tensor};

const VOCAB: [&str; 8] = [
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "안녕", "##하세요", "세계",
];

/// Language model stand-in always predicting the same token
#[derive(Debug)]
struct ConstantLanguageModel {
    predicted: i64,
}

impl ModuleT for ConstantLanguageModel {
    fn forward_t(&self, xs: &Tensor, _train: bool) -> Tensor {
        let (batch_size, sequence_length) = xs.size2().unwrap();
        Tensor::zeros(
            [batch_size, sequence_length, VOCAB.len() as i64],
            (Kind::Float, xs.device()),
        )
        .index_fill(-1, &Tensor::from_slice(&[self.predicted]), 10.0)
    }
}

fn vocab_file() -> anyhow::Result<tempfile::NamedTempFile> {
    let mut vocab_file = tempfile::NamedTempFile::new()?;
    for token in VOCAB {
        writeln!(vocab_file, "{token}")?;
    }
    Ok(vocab_file)
}

fn generator(predicted: i64, vocab: &LocalResource) -> anyhow::Result<TextGenerator> {
    let config = GenerateConfig {
        max_length: 8,
        top_k: 1,
        ..Default::default()
    };
    Ok(TextGenerator::new(
        ConstantLanguageModel { predicted },
        vocab,
        config,
        Device::Cpu,
    )?)
}

#[test]
fn generation_appends_words() -> anyhow::Result<()> {
    let vocab_file = vocab_file()?;
    let vocab = LocalResource::from(vocab_file.path().to_path_buf());
    let generator = generator(7, &vocab)?;

    assert_eq!(generator.next_token("안녕")?, "세계");
    assert_eq!(generator.generate("안녕", 3)?, "안녕 세계 세계 세계");
    Ok(())
}

#[test]
fn generation_merges_word_pieces() -> anyhow::Result<()> {
    let vocab_file = vocab_file()?;
    let vocab = LocalResource::from(vocab_file.path().to_path_buf());
    let generator = generator(6, &vocab)?;

    assert_eq!(generator.generate("안녕", 2)?, "안녕하세요하세요");
    Ok(())
}

#[test]
fn generation_stops_on_separator() -> anyhow::Result<()> {
    let vocab_file = vocab_file()?;
    let vocab = LocalResource::from(vocab_file.path().to_path_buf());
    let generator = generator(3, &vocab)?;

    assert_eq!(generator.generate("안녕 세계", 10)?, "안녕 세계");
    Ok(())
}

#[test]
fn generation_rejects_invalid_inputs() -> anyhow::Result<()> {
    let vocab_file = vocab_file()?;
    let vocab = LocalResource::from(vocab_file.path().to_path_buf());
    let config = GenerateConfig {
        max_length: 0,
        ..Default::default()
    };
    let result = TextGenerator::new(
        ConstantLanguageModel { predicted: 7 },
        &vocab,
        config,
        Device::Cpu,
    );
    assert!(matches!(
        result,
        Err(KoreanLmError::InvalidConfigurationError(_))
    ));

    let missing = LocalResource::from("path/to/missing/vocab.txt");
    let result = TextGenerator::new(
        ConstantLanguageModel { predicted: 7 },
        &missing,
        GenerateConfig::default(),
        Device::Cpu,
    );
    assert!(result.is_err());
    Ok(())
}
