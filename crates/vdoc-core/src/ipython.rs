//! Built-in IPython magic overrides.
//!
//! Rewrites IPython-only syntax into the calls IPython itself would execute, so a plain Python
//! language server sees valid code:
//!
//! | host syntax             | virtual document text                                  |
//! |-------------------------|--------------------------------------------------------|
//! | `%%name args\nbody`     | `get_ipython().run_cell_magic("name", "args", """body""")` |
//! | `%name args`            | `get_ipython().run_line_magic("name", "args")`         |
//! | `!cmd`                  | `get_ipython().getoutput("cmd")`                       |
//!
//! Line rules keep leading indentation and a `target = ` assignment prefix.

use crate::overrides::{OverrideError, OverrideSet, ReversibleRule, SubstitutionRule};
use regex::Captures;

/// Language id the rules are meant for.
pub const IPYTHON_LANGUAGE: &str = "python";

const LINE_PREFIX: &str = r"(\s*|\s*\S+\s*=\s*)";

fn group<'a>(caps: &'a Captures<'_>, index: usize) -> &'a str {
    caps.get(index).map_or("", |m| m.as_str())
}

fn escape_quotes(text: &str) -> String {
    text.replace('\\', r"\\").replace('"', r#"\""#)
}

/// Triple-quoted bodies only need quote runs escaped, but backslashes still have to be.
fn escape_body(text: &str) -> String {
    text.replace('\\', r"\\").replace(r#"""""#, r#"\"\"\""#)
}

/// Inverse of both escapes: `\\` and `\"` lose their backslash, anything else is kept.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some(next @ ('\\' | '"')) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn cell_magic() -> Result<ReversibleRule, OverrideError> {
    let forward = SubstitutionRule::function(r"\A%%(\S+)(.*)\n((?s:.*))\z", |caps| {
        format!(
            r#"get_ipython().run_cell_magic("{}", "{}", """{}""")"#,
            group(caps, 1),
            escape_quotes(group(caps, 2)),
            escape_body(group(caps, 3)),
        )
    })?;
    let reverse = SubstitutionRule::function(
        r#"\Aget_ipython\(\)\.run_cell_magic\("(.*?)", "(.*?)", """((?s:.*))"""\)\z"#,
        |caps| {
            format!(
                "%%{}{}\n{}",
                group(caps, 1),
                unescape(group(caps, 2)),
                unescape(group(caps, 3)),
            )
        },
    )?;
    Ok(ReversibleRule::new(forward, reverse))
}

fn line_magic() -> Result<ReversibleRule, OverrideError> {
    let forward = SubstitutionRule::function(&format!(r"\A{LINE_PREFIX}%(\S+)(.*)\z"), |caps| {
        format!(
            r#"{}get_ipython().run_line_magic("{}", "{}")"#,
            group(caps, 1),
            group(caps, 2),
            escape_quotes(group(caps, 3)),
        )
    })?;
    let reverse = SubstitutionRule::function(
        &format!(r#"\A{LINE_PREFIX}get_ipython\(\)\.run_line_magic\("(.*?)", "(.*)"\)\z"#),
        |caps| {
            format!(
                "{}%{}{}",
                group(caps, 1),
                group(caps, 2),
                unescape(group(caps, 3)),
            )
        },
    )?;
    Ok(ReversibleRule::new(forward, reverse))
}

fn shell_escape() -> Result<ReversibleRule, OverrideError> {
    let forward = SubstitutionRule::function(&format!(r"\A{LINE_PREFIX}!(.*)\z"), |caps| {
        format!(
            r#"{}get_ipython().getoutput("{}")"#,
            group(caps, 1),
            escape_quotes(group(caps, 2)),
        )
    })?;
    let reverse = SubstitutionRule::function(
        &format!(r#"\A{LINE_PREFIX}get_ipython\(\)\.getoutput\("(.*)"\)\z"#),
        |caps| format!("{}!{}", group(caps, 1), unescape(group(caps, 2))),
    )?;
    Ok(ReversibleRule::new(forward, reverse))
}

/// The IPython rule set.
pub fn ipython_overrides() -> Result<OverrideSet, OverrideError> {
    Ok(OverrideSet {
        cell: vec![cell_magic()?],
        line: vec![line_magic()?, shell_escape()?],
    })
}
