// Copyright 2019-present, Laurent Mazare.
// Copyright 2019-present Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Converts generator / discriminator weights exported as `.npz` into a `.ot` file loadable
//! with `VarStore::load`.

use korean_lm::KoreanLmError;
use log::info;

pub fn main() -> Result<(), KoreanLmError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Vec<_> = std::env::args().collect();
    if args.len() != 3 {
        return Err(KoreanLmError::ValueError(format!(
            "usage: {} source.npz destination.ot",
            args.first().map(String::as_str).unwrap_or("convert-tensor")
        )));
    }

    let source_file = &args[1];
    let destination_file = &args[2];
    let tensors = tch::Tensor::read_npz(source_file)?;
    info!("Read {} tensors from {}", tensors.len(), source_file);
    for (name, tensor) in tensors.iter() {
        info!("{}: {:?}", name, tensor.size());
    }
    tch::Tensor::save_multi(&tensors, destination_file)?;
    info!("Saved weights to {}", destination_file);

    Ok(())
}
