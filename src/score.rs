use std::collections::{HashMap, HashSet};

use anyhow::Context as _;
use serde::Serialize;

use crate::cli::ScoreArgs;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreTriple {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Set overlap between the whitespace tokens of `answer` and the gold values.
///
/// Gold values are compared whole: a multi-word value only counts when the
/// answer contains it as a single token.
pub fn score<'a>(answer: &str, gold_values: impl IntoIterator<Item = &'a str>) -> ScoreTriple {
    let answer_tokens = answer.split_whitespace().collect::<HashSet<_>>();
    let gold = gold_values.into_iter().collect::<HashSet<_>>();

    let true_positives = answer_tokens.intersection(&gold).count();
    let false_positives = answer_tokens.difference(&gold).count();
    let false_negatives = gold.difference(&answer_tokens).count();

    ScoreTriple {
        accuracy: ratio(
            true_positives,
            true_positives + false_positives + false_negatives,
        ),
        precision: ratio(true_positives, true_positives + false_positives),
        recall: ratio(true_positives, true_positives + false_negatives),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

pub fn run(args: ScoreArgs) -> anyhow::Result<()> {
    let answer = std::fs::read_to_string(&args.answer)
        .with_context(|| format!("read answer: {}", &args.answer))?;
    let gold_raw = std::fs::read_to_string(&args.gold)
        .with_context(|| format!("read gold standard: {}", &args.gold))?;
    let gold: HashMap<String, String> = serde_json::from_str(&gold_raw)
        .with_context(|| format!("parse gold standard json object: {}", &args.gold))?;

    let triple = score(&answer, gold.values().map(String::as_str));
    tracing::debug!(fields = gold.len(), ?triple, "scored answer");

    let out = serde_json::to_string_pretty(&triple).context("serialize score")?;
    println!("{out}");
    Ok(())
}
