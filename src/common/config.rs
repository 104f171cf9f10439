// Copyright 2019 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::KoreanLmError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// # Utility to deserialize JSON config files
pub trait Config
where
    for<'de> Self: Deserialize<'de> + Serialize,
{
    /// Loads a `Config` object from a JSON file. The format is expected to be aligned with the fields
    /// of the implementing struct; missing fields fall back to their defaults when the struct uses
    /// `#[serde(default)]`.
    ///
    /// # Arguments
    ///
    /// * `path` - `Path` to the configuration JSON file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use korean_lm::electra::ElectraConfig;
    /// use korean_lm::Config;
    /// use std::path::Path;
    ///
    /// let config_path = Path::new("path/to/config.json");
    /// let config = ElectraConfig::from_file(config_path).unwrap();
    /// ```
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KoreanLmError> {
        let f = File::open(path)?;
        let br = BufReader::new(f);
        let config: Self = serde_json::from_reader(br)?;
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), KoreanLmError> {
        let f = File::create(path)?;
        let bw = BufWriter::new(f);
        serde_json::to_writer_pretty(bw, self)?;
        Ok(())
    }
}
