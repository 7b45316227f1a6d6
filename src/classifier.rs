use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;

lazy_static! {
    static ref TOKEN_PATTERN: Regex = Regex::new(r"[\p{L}\p{N}]{2,}").unwrap();
}

/// On-disk shape of a locale classifier model: an ordered category list
/// and per-keyword weight vectors, one weight per category.
#[derive(Debug, Clone, Deserialize)]
struct ModelData {
    #[serde(default)]
    locale: String,
    categories: Vec<String>,
    keywords: HashMap<String, Vec<f64>>,
}

/// Linear bag-of-words page classifier. Scores a page by summing the
/// weight vectors of every known keyword found in the visible text.
pub struct PageClassifier {
    locale: String,
    categories: Vec<String>,
    keywords: HashMap<String, Vec<f64>>,
}

impl PageClassifier {
    pub fn from_json(json: &str) -> Result<Self> {
        let data: ModelData = serde_json::from_str(json)?;

        if data.categories.is_empty() {
            return Err(anyhow!("classifier model has no categories"));
        }

        for (keyword, weights) in &data.keywords {
            if weights.len() != data.categories.len() {
                return Err(anyhow!(
                    "keyword \"{keyword}\" has {} weights for {} categories",
                    weights.len(),
                    data.categories.len()
                ));
            }
        }

        Ok(Self {
            locale: data.locale,
            categories: data.categories,
            keywords: data.keywords,
        })
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Scores a page, one entry per category.
    pub fn classify(&self, html: &str) -> Vec<f64> {
        let mut scores = vec![0.0; self.categories.len()];

        let text = strip_tags(html).to_lowercase();
        for token in TOKEN_PATTERN.find_iter(&text) {
            if let Some(weights) = self.keywords.get(token.as_str()) {
                for (score, weight) in scores.iter_mut().zip(weights) {
                    *score += weight;
                }
            }
        }

        scores
    }

    /// Category with the highest score. Ties resolve to the lowest index;
    /// an empty or mismatched score vector yields an empty string.
    pub fn winning_category(&self, scores: &[f64]) -> String {
        if scores.len() != self.categories.len() {
            log::warn!(
                "score vector has {} entries for {} categories",
                scores.len(),
                self.categories.len()
            );
            return String::new();
        }

        let mut winner = 0;
        for (i, score) in scores.iter().enumerate() {
            if *score > scores[winner] {
                winner = i;
            }
        }

        self.categories[winner].clone()
    }
}

/// Drops everything between `<` and `>`, replacing each tag with a space
/// so adjacent words do not fuse.
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text
}
