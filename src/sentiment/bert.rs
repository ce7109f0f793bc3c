//! BERT sequence classifier (encoder + pooler + linear head) on candle.
//!
//! Expects a Hugging Face model directory with `config.json`,
//! `tokenizer.json` and either `model.safetensors` or `pytorch_model.bin`.

use anyhow::{anyhow, bail, Context, Result};
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tokenizers::{Tokenizer, TruncationParams};

use super::{Label, SentimentClassifier};

/// Fields of `config.json` the encoder config does not carry.
#[derive(Debug, Deserialize)]
struct HeadConfig {
    hidden_size: usize,
    #[serde(default)]
    max_position_embeddings: Option<usize>,
    #[serde(default)]
    id2label: HashMap<String, String>,
}

pub struct BertClassifier {
    model: BertModel,
    pooler: Linear,
    head: Linear,
    tokenizer: Tokenizer,
    labels: Vec<Label>,
    device: Device,
}

impl BertClassifier {
    pub fn load(dir: &Path) -> Result<Self> {
        let device = Device::Cpu;

        let raw = fs::read_to_string(dir.join("config.json"))
            .with_context(|| format!("reading {}/config.json", dir.display()))?;
        let config: BertConfig = serde_json::from_str(&raw).context("parsing bert config")?;
        let head_cfg: HeadConfig = serde_json::from_str(&raw).context("parsing head config")?;

        let labels = resolve_labels(&head_cfg.id2label)?;

        let mut tokenizer = Tokenizer::from_file(dir.join("tokenizer.json"))
            .map_err(|e| anyhow!("loading tokenizer.json: {e}"))?;
        let max_length = head_cfg.max_position_embeddings.unwrap_or(512).min(512);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("configuring truncation: {e}"))?;
        tokenizer.with_padding(None);

        let vb = load_weights(dir, &device)?;
        let model = BertModel::load(vb.pp("bert"), &config).context("loading bert encoder")?;
        let hidden = head_cfg.hidden_size;
        let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))
            .context("loading pooler")?;
        let head = candle_nn::linear(hidden, labels.len(), vb.pp("classifier"))
            .context("loading classification head")?;

        Ok(Self {
            model,
            pooler,
            head,
            tokenizer,
            labels,
            device,
        })
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Class probabilities in model order.
    pub fn probabilities(&self, text: &str) -> Result<Vec<f32>> {
        let enc = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("tokenizing: {e}"))?;
        let ids = Tensor::new(enc.get_ids(), &self.device)?.unsqueeze(0)?;
        let type_ids = Tensor::new(enc.get_type_ids(), &self.device)?.unsqueeze(0)?;
        let mask = Tensor::new(enc.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        let hidden = self.model.forward(&ids, &type_ids, Some(&mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.head.forward(&pooled)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?;
        Ok(probs)
    }
}

impl SentimentClassifier for BertClassifier {
    fn classify(&self, clean: &str) -> Result<Label> {
        if clean.trim().is_empty() {
            return Ok(Label::Neutral);
        }
        let probs = self.probabilities(clean)?;
        let idx = argmax(&probs).ok_or_else(|| anyhow!("model returned no logits"))?;
        self.labels
            .get(idx)
            .copied()
            .ok_or_else(|| anyhow!("class index {idx} outside label set"))
    }

    fn name(&self) -> &'static str {
        "bert"
    }
}

fn load_weights(dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let st = dir.join("model.safetensors");
    if st.exists() {
        // SAFETY: the file is memory-mapped read-only and not modified while loaded.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[st], DTYPE, device)? };
        return Ok(vb);
    }
    let pth = dir.join("pytorch_model.bin");
    if pth.exists() {
        return Ok(VarBuilder::from_pth(pth, DTYPE, device)?);
    }
    bail!(
        "no model.safetensors or pytorch_model.bin in {}",
        dir.display()
    )
}

/// Label per class index. Recognizable `id2label` names win; otherwise the
/// position decides (3 classes: negative/neutral/positive, 2: negative/positive).
fn resolve_labels(id2label: &HashMap<String, String>) -> Result<Vec<Label>> {
    let mut indexed: Vec<(usize, &str)> = id2label
        .iter()
        .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v.as_str())))
        .collect();
    indexed.sort_by_key(|(i, _)| *i);

    let n = if indexed.is_empty() { 3 } else { indexed.len() };
    let named: Option<Vec<Label>> = indexed
        .iter()
        .map(|(_, name)| Label::from_model_name(name))
        .collect();
    if let Some(named) = named.filter(|v| !v.is_empty()) {
        return Ok(named);
    }
    match n {
        3 => Ok(Label::ALL.to_vec()),
        2 => Ok(vec![Label::Negative, Label::Positive]),
        other => bail!("unsupported number of classes: {other}"),
    }
}

fn argmax(xs: &[f32]) -> Option<usize> {
    xs.iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn named_labels_follow_id_order() {
        let l = resolve_labels(&map(&[("1", "positive"), ("0", "negative")])).unwrap();
        assert_eq!(l, vec![Label::Negative, Label::Positive]);
    }

    #[test]
    fn generic_labels_use_position() {
        let l = resolve_labels(&map(&[("0", "LABEL_0"), ("1", "LABEL_1"), ("2", "LABEL_2")]))
            .unwrap();
        assert_eq!(l, Label::ALL.to_vec());
        assert_eq!(resolve_labels(&HashMap::new()).unwrap(), Label::ALL.to_vec());
    }

    #[test]
    fn unsupported_class_count() {
        let m = map(&[("0", "a"), ("1", "b"), ("2", "c"), ("3", "d")]);
        assert!(resolve_labels(&m).is_err());
    }

    #[test]
    fn argmax_picks_highest() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn missing_dir_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(BertClassifier::load(tmp.path()).is_err());
    }
}
