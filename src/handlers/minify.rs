//! Whitespace and comment collapsing for text assets

use super::{OptionKind, OptionSpec, StepHandler, StepInput, StepOptions};
use crate::core::error::StepError;
use crate::core::resource::Artifact;
use async_trait::async_trait;
use tracing::debug;

const OPTIONS: &[OptionSpec] = &[OptionSpec::new(
    "comments",
    OptionKind::Bool,
    "Keep comments (license comments starting with /*! are always kept)",
)];

const CSS_QUOTES: &[char] = &['"', '\''];
const JS_QUOTES: &[char] = &['"', '\'', '`'];

/// Collapse whitespace and drop comments in css, js and html
pub struct MinifyHandler;

#[async_trait]
impl StepHandler for MinifyHandler {
    fn name(&self) -> &str {
        "minify"
    }

    fn options(&self) -> &[OptionSpec] {
        OPTIONS
    }

    async fn execute(&self, input: StepInput<'_>, options: &StepOptions) -> Result<Artifact, StepError> {
        let mut artifact = input.artifact;
        let keep_comments = options.get_bool("comments").unwrap_or(false);

        let minified = match artifact.extension() {
            Some("css") => minify_css(artifact.text()?, keep_comments),
            Some("js") | Some("mjs") => minify_js(artifact.text()?, keep_comments),
            Some("html") | Some("htm") => minify_html(artifact.text()?, keep_comments),
            _ => {
                debug!(artifact = %artifact.name, "No minifier for file type, passing through");
                return Ok(artifact);
            }
        };

        artifact.contents = minified.into_bytes();
        Ok(artifact)
    }
}

/// Drop block comments outside string literals opened by one of `quotes`.
/// Single and double quoted strings end at a line break.
fn strip_block_comments(text: &str, open: &str, close: &str, keep_prefix: &str, quotes: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut index = 0;

    while let Some(c) = text[index..].chars().next() {
        let rest = &text[index..];

        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q || (c == '\n' && q != '`') {
                quote = None;
            }
            index += c.len_utf8();
            continue;
        }

        if rest.starts_with(open) {
            match rest[open.len()..].find(close) {
                Some(end) => {
                    let end = open.len() + end + close.len();
                    if rest.starts_with(keep_prefix) {
                        out.push_str(&rest[..end]);
                    }
                    index += end;
                }
                None => {
                    // Unterminated comment, keep the tail verbatim
                    out.push_str(rest);
                    break;
                }
            }
            continue;
        }

        if quotes.contains(&c) {
            quote = Some(c);
        }
        out.push(c);
        index += c.len_utf8();
    }
    out
}

fn minify_css(text: &str, keep_comments: bool) -> String {
    let text = if keep_comments {
        text.to_string()
    } else {
        strip_block_comments(text, "/*", "*/", "/*!", CSS_QUOTES)
    };

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len());
    let mut chars = collapsed.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ' ' {
            let prev = out.chars().last();
            let next = chars.peek().copied();
            let around_punct = |ch: Option<char>| matches!(ch, Some('{' | '}' | ':' | ';' | ','));
            if around_punct(prev) || around_punct(next) {
                continue;
            }
        }
        out.push(c);
    }

    out.replace(";}", "}")
}

fn minify_js(text: &str, keep_comments: bool) -> String {
    let text = if keep_comments {
        text.to_string()
    } else {
        strip_block_comments(text, "/*", "*/", "/*!", JS_QUOTES)
    };

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| keep_comments || !line.starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn minify_html(text: &str, keep_comments: bool) -> String {
    let text = if keep_comments {
        text.to_string()
    } else {
        strip_block_comments(text, "<!--", "-->", "<!--!", &[])
    };

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
