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

use crate::common::kind::get_min_value;
use crate::KoreanLmError;
use tch::{Kind, Tensor};

/// Draws an independent Bernoulli(`prob`) sample for every element of `t`.
///
/// # Arguments
///
/// * `t` - reference tensor providing the shape and device of the output
/// * `prob` - probability for each position to be `true`
///
/// # Returns
///
/// * `Tensor` of kind `Bool` with the shape of `t`
pub fn prob_mask_like(t: &Tensor, prob: f64) -> Tensor {
    Tensor::rand(t.size(), (Kind::Float, t.device())).lt(prob)
}

/// Marks the positions of `t` holding any of `token_ids`.
///
/// # Arguments
///
/// * `t` - token ids tensor
/// * `token_ids` - ids to look up
///
/// # Returns
///
/// * `Tensor` of kind `Bool` with the shape of `t`, `true` where `t` holds one of `token_ids`
pub fn mask_with_tokens(t: &Tensor, token_ids: &[i64]) -> Tensor {
    let init_no_mask = Tensor::zeros(t.size(), (Kind::Bool, t.device()));
    token_ids
        .iter()
        .fold(init_no_mask, |acc, &token_id| acc.logical_or(&t.eq(token_id)))
}

/// Selects a random subset of the eligible positions of each sequence.
///
/// At most `max_masked = ceil(prob * sequence_length)` positions are selected per row. The cap is
/// shared by all rows, so rows with few eligible tokens are masked proportionally less than long
/// rows. In addition, the `k`-th ranked candidate is dropped when more than
/// `ceil(prob * eligible_count)` eligible tokens appear in the first `k + 1` columns of the row.
///
/// Ineligible positions receive the lowest finite priority and are removed by index after the
/// ranking, so they are never selected.
///
/// # Arguments
///
/// * `mask` - `Bool` tensor of shape (*batch size*, *sequence_length*) marking eligible positions
/// * `prob` - target masking probability
///
/// # Returns
///
/// * `Tensor` of kind `Bool` and shape (*batch size*, *sequence_length*), subset of `mask`
///
/// # Example
///
/// ```no_run
/// use korean_lm::electra::get_mask_subset_with_prob;
/// use tch::{Device, Kind, Tensor};
///
/// let eligible = Tensor::ones([2, 16], (Kind::Bool, Device::Cpu));
/// let mask = get_mask_subset_with_prob(&eligible, 0.15).unwrap();
/// ```
pub fn get_mask_subset_with_prob(mask: &Tensor, prob: f64) -> Result<Tensor, KoreanLmError> {
    let (batch_size, sequence_length) = mask.size2()?;
    let device = mask.device();
    let mask = mask.to_kind(Kind::Bool);
    let max_masked = ((prob * sequence_length as f64).ceil() as i64).clamp(0, sequence_length);

    let num_tokens = mask.sum_dim_intlist([-1].as_slice(), true, Kind::Float);
    let mask_excess = mask
        .cumsum(-1, Kind::Float)
        .gt_tensor(&(num_tokens * prob).ceil())
        .narrow(1, 0, max_masked);

    let rand = Tensor::rand([batch_size, sequence_length], (Kind::Float, device))
        .masked_fill(&mask.logical_not(), get_min_value(Kind::Float)?);
    let (_, sampled_indices) = rand.topk(max_masked, -1, true, true);
    let sampled_eligible = mask.gather(-1, &sampled_indices, false);

    // index 0 of the scatter target is a sink column for dropped candidates
    let sampled_indices = (sampled_indices + 1)
        .masked_fill(&mask_excess, 0)
        .masked_fill(&sampled_eligible.logical_not(), 0);

    let new_mask = Tensor::zeros([batch_size, sequence_length + 1], (Kind::Float, device))
        .scatter_value(-1, &sampled_indices, 1.0);
    Ok(new_mask.narrow(1, 1, sequence_length).to_kind(Kind::Bool))
}

/// Builds the generator input from the original tokens and the selected positions.
///
/// Random substitution (if enabled) happens first on the whole sequence, the `[MASK]` replacement
/// of `mask & replace` positions is applied last and overrides it. Masked positions outside of
/// `replace` keep their original token. The input tensor is left untouched.
///
/// # Arguments
///
/// * `input_ids` - original token ids of shape (*batch size*, *sequence_length*)
/// * `mask` - positions selected by `get_mask_subset_with_prob`
/// * `replace` - per-position Bernoulli draw deciding the `[MASK]` replacement
/// * `random_token_prob` - probability for any position to receive a random token
/// * `mask_token_id` - id of the `[MASK]` token
/// * `num_tokens` - vocabulary size, required when `random_token_prob > 0`
/// * `ignore_token_ids` - special token ids that are never overwritten nor sampled
///
/// # Returns
///
/// * `Tensor` of corrupted token ids with the shape of `input_ids`
pub fn corrupt(
    input_ids: &Tensor,
    mask: &Tensor,
    replace: &Tensor,
    random_token_prob: f64,
    mask_token_id: i64,
    num_tokens: Option<i64>,
    ignore_token_ids: &[i64],
) -> Result<Tensor, KoreanLmError> {
    let mut masked_input = input_ids.detach().copy();

    if random_token_prob > 0.0 {
        let num_tokens = num_tokens.ok_or_else(|| {
            KoreanLmError::InvalidConfigurationError(
                "Number of tokens (num_tokens) must be provided for randomizing tokens during masked language modeling".into(),
            )
        })?;
        let random_tokens =
            Tensor::randint(num_tokens, input_ids.size(), (Kind::Int64, input_ids.device()));
        let random_no_mask = mask_with_tokens(&random_tokens, ignore_token_ids)
            .logical_or(&mask_with_tokens(input_ids, ignore_token_ids));
        let random_positions =
            prob_mask_like(input_ids, random_token_prob).logical_and(&random_no_mask.logical_not());
        masked_input = random_tokens.where_self(&random_positions, &masked_input);
    }

    Ok(masked_input.masked_fill(&mask.logical_and(replace), mask_token_id))
}

/// Generator labels: the original tokens on masked positions, `pad_token_id` everywhere else.
pub fn generator_labels(input_ids: &Tensor, mask: &Tensor, pad_token_id: i64) -> Tensor {
    input_ids.masked_fill(&mask.logical_not(), pad_token_id)
}
