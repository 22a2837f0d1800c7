// src/config/prompt.rs
//! First-run questions for settings missing from the config document.

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use std::io::{BufRead, Write};

use crate::config::file::StoredConfig;
use crate::ingest::validate::normalize_region;

/// Which keys are already supplied from somewhere other than the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct Provided {
    pub webhook: bool,
    pub user_agent: bool,
    pub role_to_ping: bool,
}

/// Ask for every missing key. Returns `true` if the document changed.
pub fn fill_missing<R: BufRead, W: Write>(
    doc: &mut StoredConfig,
    provided: Provided,
    input: &mut R,
    out: &mut W,
) -> Result<bool> {
    let mut changed = false;

    if !provided.webhook && is_blank(&doc.webhook) {
        doc.webhook = Some(ask(input, out, "Enter your Discord Webhook URL: ")?);
        changed = true;
    }
    if !provided.user_agent && is_blank(&doc.user_agent) {
        doc.user_agent = Some(ask(input, out, "Enter your NationStates User Agent: ")?);
        changed = true;
    }
    if doc.blacklist.is_none() {
        let raw = ask(input, out, "Enter region names to blacklist (comma-separated): ")?;
        doc.blacklist = Some(parse_region_list(&raw));
        changed = true;
    }
    if doc.templates.is_none() {
        writeln!(
            out,
            "Enter template:name pairs (comma-separated, format = templateID:Button Name)"
        )?;
        writeln!(
            out,
            "Example: 35972625:Welcome,12345678:Recruitment (or leave blank for no templates)"
        )?;
        let raw = ask(input, out, "Templates: ")?;
        doc.templates = Some(parse_template_pairs(&raw)?);
        changed = true;
    }
    if !provided.role_to_ping && doc.role_to_ping.is_none() {
        doc.role_to_ping = Some(ask(
            input,
            out,
            "Enter the Discord Role ID to ping on new foundings (or leave blank for none): ",
        )?);
        changed = true;
    }

    Ok(changed)
}

fn is_blank(v: &Option<String>) -> bool {
    v.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> Result<String> {
    write!(out, "{question}")?;
    out.flush()?;
    let mut line = String::new();
    let n = input.read_line(&mut line).context("reading answer from stdin")?;
    if n == 0 {
        return Err(anyhow!("stdin closed while answering: {}", question.trim()));
    }
    Ok(line.trim().to_string())
}

/// `The West Pacific, lazarus` -> `["the_west_pacific", "lazarus"]`
pub fn parse_region_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize_region)
        .filter(|r| !r.is_empty())
        .collect()
}

/// `35972625:Welcome,12345678:Recruitment` -> `{Welcome: 35972625, Recruitment: 12345678}`
pub fn parse_template_pairs(raw: &str) -> Result<IndexMap<String, String>> {
    let mut map = IndexMap::new();
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(map);
    }
    for pair in raw.split(',') {
        let (id, label) = pair
            .split_once(':')
            .ok_or_else(|| anyhow!("template entry {:?} is not templateID:Button Name", pair.trim()))?;
        map.insert(label.trim().to_string(), id.trim().to_string());
    }
    Ok(map)
}
