// Checkpoint adapter
//
// Drops the weights of layers whose shape changes between model variants
// (e.g. the 2x upsampler tail) so the rest can warm-start a 3x model.
//
// Inputs are PyTorch `.pth` archives or safetensors files; the output is
// always safetensors. Safetensors maps are flat, so a nested
// `{"params": {...}}` checkpoint shows up as a `params.` key prefix.

use anyhow::{anyhow, Context, Result};
use candle_core::pickle::PthTensors;
use candle_core::Tensor;
use safetensors::tensor::TensorView;
use safetensors::SafeTensors;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

pub const DEFAULT_EXCLUDE: &str = "feats.29";
pub const DEFAULT_PARAMS_KEY: &str = "params";

/// `torch.save` writes a zip archive.
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

#[derive(Debug, Clone)]
pub struct AdaptOptions {
    /// Keys containing any of these substrings are dropped.
    pub exclude: Vec<String>,
    pub params_key: String,
}

impl Default for AdaptOptions {
    fn default() -> Self {
        Self {
            exclude: vec![DEFAULT_EXCLUDE.to_string()],
            params_key: DEFAULT_PARAMS_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptSummary {
    /// Parameter names (without the wrapper prefix) written to the output.
    pub kept: Vec<String>,
    pub dropped: Vec<String>,
    /// Whether the input was wrapped under the params key.
    pub was_wrapped: bool,
}

impl AdaptOptions {
    fn is_excluded(&self, key: &str) -> bool {
        self.exclude.iter().any(|pattern| key.contains(pattern.as_str()))
    }

    fn prefix(&self) -> String {
        format!("{}.", self.params_key)
    }

    /// Split sorted parameter names into (kept, dropped).
    fn partition(&self, keys: Vec<String>) -> (Vec<String>, Vec<String>) {
        let mut kept = Vec::with_capacity(keys.len());
        let mut dropped = Vec::new();
        for key in keys {
            if self.is_excluded(&key) {
                tracing::info!("Dropped: {}", key);
                dropped.push(key);
            } else {
                tracing::info!("Copied: {}", key);
                kept.push(key);
            }
        }
        (kept, dropped)
    }
}

fn is_torch_archive(input: &Path) -> Result<bool> {
    let mut file = fs::File::open(input)
        .with_context(|| format!("Failed to read checkpoint {}", input.display()))?;
    let mut magic = [0u8; 4];
    Ok(file.read_exact(&mut magic).is_ok() && &magic == ZIP_MAGIC)
}

pub fn adapt_checkpoint(input: &Path, output: &Path, options: &AdaptOptions) -> Result<AdaptSummary> {
    let summary = if is_torch_archive(input)? {
        adapt_pth(input, output, options)?
    } else {
        adapt_safetensors(input, output, options)?
    };

    tracing::info!(
        "Saved adapted checkpoint with {} parameters to {}",
        summary.kept.len(),
        output.display()
    );

    Ok(summary)
}

fn adapt_pth(input: &Path, output: &Path, options: &AdaptOptions) -> Result<AdaptSummary> {
    // Same lookup as `ckpt['params'] if 'params' in ckpt else ckpt`
    let (tensors, was_wrapped) = match PthTensors::new(input, Some(options.params_key.as_str())) {
        Ok(tensors) => (tensors, true),
        Err(e) => {
            tracing::debug!(
                "No '{}' entry in {} ({}), reading top level",
                options.params_key,
                input.display(),
                e
            );
            let tensors = PthTensors::new(input, None)
                .with_context(|| format!("Failed to load checkpoint {}", input.display()))?;
            (tensors, false)
        }
    };

    let mut names: Vec<String> = tensors.tensor_infos().keys().cloned().collect();
    names.sort();
    let (kept, dropped) = options.partition(names);

    let prefix = options.prefix();
    let mut adapted: HashMap<String, Tensor> = HashMap::with_capacity(kept.len());
    for key in &kept {
        let tensor = tensors
            .get(key)
            .with_context(|| format!("Failed to read tensor {}", key))?
            .ok_or_else(|| anyhow!("Tensor {} is listed but has no data", key))?;
        adapted.insert(format!("{}{}", prefix, key), tensor);
    }

    candle_core::safetensors::save(&adapted, output)
        .with_context(|| format!("Failed to write checkpoint {}", output.display()))?;

    Ok(AdaptSummary {
        kept,
        dropped,
        was_wrapped,
    })
}

fn adapt_safetensors(input: &Path, output: &Path, options: &AdaptOptions) -> Result<AdaptSummary> {
    let buffer =
        fs::read(input).with_context(|| format!("Failed to read checkpoint {}", input.display()))?;
    let (_, metadata) = SafeTensors::read_metadata(&buffer)
        .with_context(|| format!("Invalid safetensors header in {}", input.display()))?;
    let tensors = SafeTensors::deserialize(&buffer)
        .with_context(|| format!("Failed to load checkpoint {}", input.display()))?;

    let prefix = options.prefix();
    let entries = tensors.tensors();
    let was_wrapped = entries.iter().any(|(name, _)| name.starts_with(&prefix));

    let mut views: HashMap<String, TensorView<'_>> = HashMap::with_capacity(entries.len());
    for (name, view) in entries {
        let key = if was_wrapped {
            match name.strip_prefix(&prefix) {
                Some(key) => key.to_string(),
                None => {
                    tracing::debug!("Ignoring entry outside {}: {}", options.params_key, name);
                    continue;
                }
            }
        } else {
            name
        };
        views.insert(key, view);
    }

    let mut names: Vec<String> = views.keys().cloned().collect();
    names.sort();
    let (kept, dropped) = options.partition(names);

    let adapted: Vec<(String, TensorView<'_>)> = kept
        .iter()
        .filter_map(|key| {
            views
                .remove(key)
                .map(|view| (format!("{}{}", prefix, key), view))
        })
        .collect();

    let bytes = safetensors::serialize(adapted, metadata.metadata())
        .context("Failed to serialize adapted checkpoint")?;
    fs::write(output, bytes)
        .with_context(|| format!("Failed to write checkpoint {}", output.display()))?;

    Ok(AdaptSummary {
        kept,
        dropped,
        was_wrapped,
    })
}
