use crate::KoreanLmError;
use std::fmt;
use tch::nn::ModuleT;
use tch::Tensor;

/// # Reference to a sub-component of a `LayeredModule`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerReference {
    /// Sub-component registered under this name
    ByName(String),
    /// Position in the ordered sub-components, negative values count from the end
    ByIndex(i64),
    /// Output of the whole model, no extraction
    Final,
}

impl From<i64> for LayerReference {
    fn from(index: i64) -> Self {
        match index {
            -1 => LayerReference::Final,
            index => LayerReference::ByIndex(index),
        }
    }
}

impl From<&str> for LayerReference {
    fn from(name: &str) -> Self {
        LayerReference::ByName(name.to_string())
    }
}

impl fmt::Display for LayerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerReference::ByName(name) => write!(f, "{}", name),
            LayerReference::ByIndex(index) => write!(f, "{}", index),
            LayerReference::Final => write!(f, "final"),
        }
    }
}

/// # Model made of ordered, named sub-components
/// Exposes its intermediate outputs explicitly instead of through forward hooks: the hidden state
/// of the requested sub-component is returned next to the model output.
pub trait LayeredModule: ModuleT {
    /// Names of the sub-components, in execution order
    fn layer_names(&self) -> Vec<String>;

    /// Forward pass returning the model output and the output of the `layer_index`-th
    /// sub-component, or `None` if that sub-component did not run.
    fn forward_with_hidden_t(
        &self,
        xs: &Tensor,
        layer_index: usize,
        train: bool,
    ) -> (Tensor, Option<Tensor>);
}

/// # Sequence of named layers
/// Named counterpart of `tch::nn::SequentialT`, applying its layers in insertion order.
#[derive(Debug, Default)]
pub struct NamedSequentialT {
    layers: Vec<(String, Box<dyn ModuleT>)>,
}

impl NamedSequentialT {
    pub fn new() -> NamedSequentialT {
        NamedSequentialT { layers: vec![] }
    }

    /// Appends a layer registered under `name`.
    pub fn add<M: ModuleT + 'static>(mut self, name: &str, layer: M) -> Self {
        self.layers.push((name.to_string(), Box::new(layer)));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl ModuleT for NamedSequentialT {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.layers
            .iter()
            .fold(xs.shallow_clone(), |hidden, (_, layer)| {
                layer.forward_t(&hidden, train)
            })
    }
}

impl LayeredModule for NamedSequentialT {
    fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|(name, _)| name.clone()).collect()
    }

    fn forward_with_hidden_t(
        &self,
        xs: &Tensor,
        layer_index: usize,
        train: bool,
    ) -> (Tensor, Option<Tensor>) {
        let mut hidden = xs.shallow_clone();
        let mut captured = None;
        for (index, (_, layer)) in self.layers.iter().enumerate() {
            hidden = layer.forward_t(&hidden, train);
            if index == layer_index {
                captured = Some(hidden.shallow_clone());
            }
        }
        (hidden, captured)
    }
}

/// # Hidden layer extractor
/// Wraps a `LayeredModule` and returns the output of one of its sub-components instead of the
/// model output. The layer reference is resolved once, when the extractor is built.
#[derive(Debug)]
pub struct HiddenLayerExtractor {
    net: Box<dyn LayeredModule>,
    layer: LayerReference,
    layer_index: Option<usize>,
}

impl HiddenLayerExtractor {
    /// Build a new `HiddenLayerExtractor`
    ///
    /// # Arguments
    ///
    /// * `net` - model to extract the hidden states from
    /// * `layer` - `LayerReference` to the sub-component to extract. `LayerReference::Final` returns the model output.
    ///
    /// # Errors
    ///
    /// * `HiddenLayerError` if the reference does not match any sub-component of `net`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use korean_lm::electra::{HiddenLayerExtractor, LayerReference, NamedSequentialT};
    /// use tch::{nn, Device};
    ///
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let net = NamedSequentialT::new()
    ///     .add("embeddings", nn::embedding(vs.root() / "embeddings", 100, 16, Default::default()))
    ///     .add("output", nn::linear(vs.root() / "output", 16, 16, Default::default()));
    /// let extractor = HiddenLayerExtractor::new(net, LayerReference::from(-2)).unwrap();
    /// ```
    pub fn new<M: LayeredModule + 'static>(
        net: M,
        layer: LayerReference,
    ) -> Result<HiddenLayerExtractor, KoreanLmError> {
        let layer_index = Self::find_layer(&net, &layer)?;
        Ok(HiddenLayerExtractor {
            net: Box::new(net),
            layer,
            layer_index,
        })
    }

    fn find_layer(
        net: &dyn LayeredModule,
        layer: &LayerReference,
    ) -> Result<Option<usize>, KoreanLmError> {
        let names = net.layer_names();
        let index = match layer {
            LayerReference::Final => return Ok(None),
            LayerReference::ByName(name) => names.iter().position(|layer_name| layer_name == name),
            LayerReference::ByIndex(index) => {
                let index = if *index < 0 {
                    names.len() as i64 + index
                } else {
                    *index
                };
                if index >= 0 && (index as usize) < names.len() {
                    Some(index as usize)
                } else {
                    None
                }
            }
        };
        index.map(Some).ok_or_else(|| {
            KoreanLmError::HiddenLayerError(format!("hidden layer ({}) not found", layer))
        })
    }

    pub fn layer(&self) -> &LayerReference {
        &self.layer
    }

    /// Forward pass returning the hidden state of the configured layer.
    ///
    /// # Errors
    ///
    /// * `HiddenLayerError` if the configured layer was not reached during the forward pass
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor, KoreanLmError> {
        match self.layer_index {
            None => Ok(self.net.forward_t(xs, train)),
            Some(layer_index) => {
                let (_, hidden) = self.net.forward_with_hidden_t(xs, layer_index, train);
                hidden.ok_or_else(|| {
                    KoreanLmError::HiddenLayerError(format!(
                        "hidden layer {} never emitted an output",
                        self.layer
                    ))
                })
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn minus_one_refers_to_final_output() {
        assert_eq!(LayerReference::from(-1), LayerReference::Final);
        assert_eq!(LayerReference::from(-2), LayerReference::ByIndex(-2));
        assert_eq!(
            LayerReference::from("encoder"),
            LayerReference::ByName("encoder".to_string())
        );
    }
}
