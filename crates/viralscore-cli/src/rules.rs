//! Offline commands: the pure scoring rules, evaluated locally without a
//! database or any collaborator service.

use std::path::Path;

use anyhow::Context;
use serde_json::json;
use viralscore_core::{PlatformLink, PlatformPatterns, SubmissionStatus};
use viralscore_engine::{
    adjust_credits, fingerprint_key, plan_frame_timestamps, reward_for_score, should_showcase,
    validate_duration, validate_submission, SubmissionInput,
};

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn strategy(duration: f64) -> anyhow::Result<()> {
    let strategy = validate_duration(duration)?;
    let timestamps = plan_frame_timestamps(duration, strategy.total_extracted);
    print_json(&json!({
        "duration_seconds": duration,
        "strategy": strategy,
        "timestamps": timestamps,
    }))
}

pub(crate) fn fingerprint(title: &str, links: &[PlatformLink]) -> anyhow::Result<()> {
    let fingerprint = viralscore_engine::fingerprint(title, links);
    let key = fingerprint_key(&fingerprint);
    print_json(&json!({
        "fingerprint": fingerprint,
        "fingerprint_key": key,
    }))
}

/// Prints every rule violation, then fails if there was at least one.
pub(crate) fn validate(file: &Path, platforms: Option<&Path>) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let input: SubmissionInput = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a submission document", file.display()))?;
    let patterns = match platforms {
        Some(path) => viralscore_core::load_platform_patterns(path)?,
        None => PlatformPatterns::default(),
    };

    let issues = validate_submission(&input, &patterns);
    let messages: Vec<String> = issues.iter().map(ToString::to_string).collect();
    print_json(&json!({
        "valid": issues.is_empty(),
        "fingerprint": viralscore_engine::fingerprint(&input.title, &input.platform_links),
        "issues": issues,
        "messages": messages,
    }))?;

    if !issues.is_empty() {
        anyhow::bail!("submission violates {} rule(s)", issues.len());
    }
    Ok(())
}

pub(crate) fn reward(score: u8) -> anyhow::Result<()> {
    print_json(&json!({
        "viral_score": score,
        "credits": reward_for_score(score),
    }))
}

pub(crate) fn adjust_preview(
    previous: Option<u8>,
    new_score: u8,
    balance: i64,
) -> anyhow::Result<()> {
    let adjustment = adjust_credits(previous, new_score, balance);
    print_json(&serde_json::to_value(adjustment)?)
}

pub(crate) fn showcase(score: u8, license: bool, status: SubmissionStatus) -> anyhow::Result<()> {
    print_json(&json!({
        "viral_score": score,
        "license_agreed": license,
        "status": status,
        "eligible": should_showcase(score, license, status),
    }))
}
