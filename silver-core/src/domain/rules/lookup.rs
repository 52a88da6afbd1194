// silver-core/src/domain/rules/lookup.rs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub const NOT_AVAILABLE: &str = "n/a";

fn default_sentinel() -> String {
    NOT_AVAILABLE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub codes: Vec<String>,
    pub label: String,
}

/// Closed-world code table: every input lands on a label or on the sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTable {
    pub entries: Vec<LookupEntry>,
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    /// Also accept the canonical labels themselves (case-insensitive).
    #[serde(default)]
    pub accept_labels: bool,
}

impl LookupTable {
    pub fn new(entries: &[(&[&str], &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(codes, label)| LookupEntry {
                    codes: codes.iter().map(|c| c.to_string()).collect(),
                    label: label.to_string(),
                })
                .collect(),
            sentinel: default_sentinel(),
            accept_labels: false,
        }
    }

    pub fn accepting_labels(mut self) -> Self {
        self.accept_labels = true;
        self
    }

    /// Every value the table can produce, sentinel included.
    pub fn domain(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .map(|e| e.label.clone())
            .chain(std::iter::once(self.sentinel.clone()))
            .collect()
    }

    /// Builds the normalized-code index. Fails when one code points at two labels.
    pub fn index(&self) -> Result<HashMap<String, String>, String> {
        let mut index: HashMap<String, String> = HashMap::new();
        let label_keys = self
            .entries
            .iter()
            .filter(|_| self.accept_labels)
            .map(|e| (e.label.as_str(), e.label.as_str()));
        let code_keys = self
            .entries
            .iter()
            .flat_map(|e| e.codes.iter().map(move |c| (c.as_str(), e.label.as_str())));

        for (code, label) in code_keys.chain(label_keys) {
            let key = normalize_code(code);
            if key.is_empty() {
                return Err(format!("blank code mapped to '{}'", label));
            }
            match index.get(&key) {
                Some(existing) if existing != label => {
                    return Err(format!(
                        "code '{}' maps to both '{}' and '{}'",
                        code, existing, label
                    ));
                }
                _ => {
                    index.insert(key, label.to_string());
                }
            }
        }
        Ok(index)
    }
}

pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}
