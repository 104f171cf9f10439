//! # Autoregressive text generation
//!
//! Token by token continuation of a prompt with a causal language model over a wordpiece
//! vocabulary. At every step the text is re-tokenized, prefixed with `[CLS]`, padded to a
//! multiple of `GenerateConfig::max_length` and passed through the model. The next token is
//! sampled among the `top_k` most likely continuations of the last input token.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use korean_lm::generation::{GenerateConfig, TextGenerator};
//! use korean_lm::resources::LocalResource;
//! use tch::{nn, Device};
//!
//! let device = Device::Cpu;
//! let mut vs = nn::VarStore::new(device);
//! let p = vs.root();
//! let model = nn::seq_t()
//!     .add(nn::embedding(&p / "embeddings", 22000, 768, Default::default()))
//!     .add(nn::linear(&p / "lm_head", 768, 22000, Default::default()));
//! vs.load("path/to/autoregressive_model.ot")?;
//!
//! let vocab = LocalResource::from("path/to/wpm-vocab-all.txt");
//! let generator = TextGenerator::new(model, &vocab, GenerateConfig::default(), device)?;
//! let output = generator.generate("단순함을 얻기란 복잡함을 얻기보다 어렵습니다.", 32)?;
//! # Ok(())
//! # }
//! ```

use crate::common::resources::{LocalResource, ResourceProvider};
use crate::{Config, KoreanLmError};
use log::debug;
use rust_tokenizers::tokenizer::{BertTokenizer, Tokenizer};
use rust_tokenizers::vocab::Vocab;
use serde::{Deserialize, Serialize};
use tch::nn::ModuleT;
use tch::{no_grad, Device, Kind, Tensor};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
/// # Configuration for text generation
pub struct GenerateConfig {
    /// Input sequences are padded to a multiple of this length
    pub max_length: i64,
    /// Number of candidate tokens kept for sampling
    pub top_k: i64,
    pub cls_token: String,
    /// Generation stops when this token is sampled
    pub sep_token: String,
    pub pad_token_id: i64,
    /// Lower-case the input before tokenization
    pub lower_case: bool,
}

impl Config for GenerateConfig {}

impl Default for GenerateConfig {
    fn default() -> Self {
        GenerateConfig {
            max_length: 128,
            top_k: 9,
            cls_token: "[CLS]".to_string(),
            sep_token: "[SEP]".to_string(),
            pad_token_id: 0,
            lower_case: false,
        }
    }
}

/// Right-pads `token_ids` with `pad_token_id` up to the next multiple of `max_length`.
/// A sequence already aligned on `max_length` receives a full block of padding.
///
/// # Errors
///
/// * `InvalidConfigurationError` if `max_length` is 0
pub fn pad_to_max_length(
    token_ids: &[i64],
    max_length: usize,
    pad_token_id: i64,
) -> Result<Vec<i64>, KoreanLmError> {
    if max_length == 0 {
        return Err(KoreanLmError::InvalidConfigurationError(
            "max_length must be positive".to_string(),
        ));
    }
    let padding = max_length - token_ids.len() % max_length;
    let mut padded = Vec::with_capacity(token_ids.len() + padding);
    padded.extend_from_slice(token_ids);
    padded.extend(std::iter::repeat(pad_token_id).take(padding));
    Ok(padded)
}

/// Samples a token id from the softmax of the `k` highest `logits` (1-dimensional, *vocab_size*).
pub fn top_k_sample(logits: &Tensor, k: i64) -> i64 {
    let vocab_size = logits.size().last().copied().unwrap_or(1);
    let k = k.clamp(1, vocab_size.max(1));
    let (top_logits, top_indices) = logits.topk(k, -1, true, true);
    let probabilities = top_logits.softmax(-1, Kind::Float);
    let choice = probabilities.multinomial(1, false);
    top_indices.gather(-1, &choice, false).int64_value(&[0])
}

/// # Text generator
/// Wraps a causal language model returning logits of shape (*batch size*, *sequence_length*,
/// *vocab_size*) and the wordpiece tokenizer of its vocabulary.
pub struct TextGenerator {
    model: Box<dyn ModuleT>,
    tokenizer: BertTokenizer,
    config: GenerateConfig,
    device: Device,
    cls_token_id: i64,
}

impl TextGenerator {
    /// Build a new `TextGenerator`
    ///
    /// # Arguments
    ///
    /// * `model` - causal language model
    /// * `vocab` - wordpiece vocabulary file, one token per line
    /// * `config` - `GenerateConfig`
    /// * `device` - device the model parameters live on
    pub fn new<M>(
        model: M,
        vocab: &LocalResource,
        config: GenerateConfig,
        device: Device,
    ) -> Result<TextGenerator, KoreanLmError>
    where
        M: ModuleT + 'static,
    {
        if config.max_length <= 0 {
            return Err(KoreanLmError::InvalidConfigurationError(format!(
                "max_length must be positive, got {}",
                config.max_length
            )));
        }
        let vocab_path = vocab.get_local_path()?;
        let tokenizer = BertTokenizer::from_file(vocab_path, config.lower_case, false)?;
        let cls_token_id = tokenizer.vocab().token_to_id(&config.cls_token);
        Ok(TextGenerator {
            model: Box::new(model),
            tokenizer,
            config,
            device,
            cls_token_id,
        })
    }

    pub fn tokenizer(&self) -> &BertTokenizer {
        &self.tokenizer
    }

    pub fn config(&self) -> &GenerateConfig {
        &self.config
    }

    /// Samples the token following `text`.
    pub fn next_token(&self, text: &str) -> Result<String, KoreanLmError> {
        let tokens = self.tokenizer.tokenize(text);
        let token_ids = self.tokenizer.convert_tokens_to_ids(&tokens);
        // logits of the last input token, shifted by the leading [CLS]
        let position = token_ids.len() as i64;

        let mut input_ids = Vec::with_capacity(token_ids.len() + 1);
        input_ids.push(self.cls_token_id);
        input_ids.extend(token_ids);
        let input_ids = pad_to_max_length(
            &input_ids,
            self.config.max_length as usize,
            self.config.pad_token_id,
        )?;
        let input_tensor = Tensor::from_slice(&input_ids)
            .unsqueeze(0)
            .to(self.device);

        let logits = no_grad(|| self.model.forward_t(&input_tensor, false));
        let (_, sequence_length, _) = logits.size3()?;
        if position >= sequence_length {
            return Err(KoreanLmError::ValueError(format!(
                "model returned {sequence_length} positions for an input of {} tokens",
                input_ids.len()
            )));
        }
        let next_token_logits = logits.get(0).get(position).to_kind(Kind::Float);
        let next_token_id = top_k_sample(&next_token_logits, self.config.top_k);
        Ok(self.tokenizer.vocab().id_to_token(&next_token_id))
    }

    /// Continues `prompt` with at most `max_new_tokens` tokens, stopping early when the
    /// separator token is sampled. Wordpiece continuations (`##`) are merged into the previous
    /// word, other tokens are separated by a space.
    pub fn generate(&self, prompt: &str, max_new_tokens: usize) -> Result<String, KoreanLmError> {
        let mut text = prompt.to_string();
        for step in 0..max_new_tokens {
            let token = self.next_token(&text)?;
            debug!("generation step {}: {}", step, token);
            if token == self.config.sep_token {
                break;
            }
            match token.strip_prefix("##") {
                Some(word_piece) => text.push_str(word_piece),
                None => {
                    text.push(' ');
                    text.push_str(&token);
                }
            }
        }
        Ok(text)
    }
}
