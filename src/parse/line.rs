use log::debug;

use super::split::{ends_with_unescaped_backslash, find_unquoted_char, split_by_unquoted_char};
use super::tokenize::tokenize;
use super::types::{ParseResult, PipelineStage};
use crate::error::ParseError;

/// Fold raw text into logical lines.
///
/// Blank lines and lines starting with `#` are dropped. A line ending in an
/// unescaped backslash is joined with the following line; a comment line
/// flushes any pending continuation first. A continuation still open at the
/// end of the input becomes the last logical line.
pub fn logical_lines(raw: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();

    for physical in raw.lines() {
        let line = physical.trim();

        if line.starts_with('#') {
            if !pending.is_empty() {
                lines.push(std::mem::take(&mut pending));
            }
            continue;
        }

        if ends_with_unescaped_backslash(line) {
            pending.push_str(&line[..line.len() - 1]);
            pending.push(' ');
            continue;
        }

        pending.push_str(line);
        let logical = std::mem::take(&mut pending);
        if !logical.trim().is_empty() {
            lines.push(logical);
        }
    }

    if !pending.trim().is_empty() {
        lines.push(pending);
    }

    lines
}

/// Parse raw input into command groups and an optional redirect target.
///
/// Parsing is purely textual. Blank or comment-only input yields an empty
/// [`ParseResult`].
pub fn parse(raw: &str) -> Result<ParseResult, ParseError> {
    let mut result = ParseResult::default();

    for logical in logical_lines(raw) {
        let body = match find_unquoted_char(&logical, '>') {
            Some(pos) => {
                let target = logical[pos + 1..].trim();
                if result.redirect.is_some() || find_unquoted_char(target, '>').is_some() {
                    return Err(ParseError::MultipleRedirects);
                }
                if target.is_empty() {
                    return Err(ParseError::MissingRedirectTarget);
                }
                result.redirect = Some(target.to_string());
                &logical[..pos]
            }
            None => logical.as_str(),
        };

        for group in split_by_unquoted_char(body, ';') {
            if group.trim().is_empty() {
                continue;
            }
            let stages = split_by_unquoted_char(&group, '|')
                .into_iter()
                .map(|text| parse_stage(&text))
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(head) = PipelineStage::chain(stages) {
                result.groups.push(head);
            }
        }
    }

    debug!(
        "parsed {} group(s), redirect={:?}",
        result.groups.len(),
        result.redirect
    );
    Ok(result)
}

fn parse_stage(text: &str) -> Result<PipelineStage, ParseError> {
    let mut words = tokenize(text).into_iter();
    match words.next() {
        Some(name) => Ok(PipelineStage::new(name, words.collect())),
        None => Err(ParseError::InvalidSyntax(text.trim().to_string())),
    }
}
