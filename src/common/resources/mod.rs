//! # Resource definitions for model weights, vocabularies and configuration files
//!
//! Pretraining and generation read three kinds of files:
//! - model weights (`.ot` files written by `tch::nn::VarStore::save` or `convert-tensor`)
//! - configuration files (JSON, see `Config`)
//! - wordpiece vocabularies (`vocab.txt`)
//!
//! A `LocalResource` points to a local file. The local location of any resource is retrieved with
//! `get_local_path`, so that callers may later plug other providers behind `ResourceProvider`.

mod local;

use crate::common::error::KoreanLmError;
pub use local::LocalResource;
use std::path::PathBuf;

/// # Resource Trait that can provide the location of the model, configuration or vocabulary resources
pub trait ResourceProvider {
    /// Provides the local path for a resource.
    ///
    /// # Returns
    ///
    /// * `PathBuf` Local path for the resource
    ///
    /// # Example
    ///
    /// ```no_run
    /// use korean_lm::resources::{LocalResource, ResourceProvider};
    /// let vocab_resource = LocalResource::from("data/wpm-vocab-all.txt");
    /// let vocab_path = vocab_resource.get_local_path();
    /// ```
    fn get_local_path(&self) -> Result<PathBuf, KoreanLmError>;
}
