use tch::Tensor;

const LOG_EPS: f64 = 1e-9;

fn log(t: &Tensor) -> Tensor {
    (t + LOG_EPS).log()
}

/// Standard Gumbel noise with the shape of `t`: `-log(-log(U))` with `U ~ Uniform(0, 1)`.
pub fn gumbel_noise(t: &Tensor) -> Tensor {
    let noise = t.rand_like();
    log(&log(&noise).neg()).neg()
}

/// Samples one token per row of `logits` with the Gumbel-max trick.
///
/// `argmax(logits / temperature + gumbel_noise)` is a draw from `softmax(logits / temperature)`:
/// `temperature = 1` recovers categorical sampling and lower temperatures approach the hard
/// argmax. Draws come from the libtorch generator (`tch::manual_seed` makes them reproducible).
///
/// # Arguments
///
/// * `logits` - `Tensor` of shape (*N*, *vocab_size*)
/// * `temperature` - sampling temperature, must be positive
///
/// # Returns
///
/// * `Tensor` of kind `Int64` and shape (*N*) with the sampled token ids
///
/// # Example
///
/// ```no_run
/// use korean_lm::electra::gumbel_sample;
/// use tch::{Device, Kind, Tensor};
///
/// let logits = Tensor::randn([4, 32], (Kind::Float, Device::Cpu));
/// let sampled = gumbel_sample(&logits, 1.0);
/// ```
pub fn gumbel_sample(logits: &Tensor, temperature: f64) -> Tensor {
    ((logits / temperature) + gumbel_noise(logits)).argmax(-1, false)
}
