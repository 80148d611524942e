//! Link extraction from markdown bodies.
//!
//! Two kinds are recognised:
//!
//! - image embeds: `![[name.png]]` and `![alt](path)`
//! - document links: `[[Target]]`, `[[Target|Alias]]`, `[[Target#Anchor]]`
//!   and `[[Target#Anchor|Alias]]`; only `Target` is kept.

use std::sync::LazyLock;

use regex::Regex;

static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid wiki link regex"));
static MARKDOWN_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").expect("valid image regex"));

fn is_embed(content: &str, start: usize) -> bool {
    content[..start].ends_with('!')
}

/// Image references, wiki embeds first then markdown images.
pub fn image_links(content: &str) -> Vec<String> {
    let mut links = Vec::new();
    for caps in WIKI_LINK.captures_iter(content) {
        let (Some(whole), Some(target)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if is_embed(content, whole.start()) {
            links.push(target.as_str().to_string());
        }
    }
    for caps in MARKDOWN_IMAGE.captures_iter(content) {
        if let Some(target) = caps.get(1) {
            links.push(target.as_str().to_string());
        }
    }
    links
}

/// Targets of wiki links that are not embeds, with alias and anchor removed.
pub fn document_links(content: &str) -> Vec<String> {
    WIKI_LINK
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if is_embed(content, whole.start()) {
                return None;
            }
            let inner = caps.get(1)?.as_str();
            let target = inner.split(['|', '#']).next().unwrap_or(inner).trim();
            (!target.is_empty()).then(|| target.to_string())
        })
        .collect()
}

/// Key used by the backlink graph: lowercased, `.md` / `.mdx` dropped.
pub fn normalize_target(link: &str) -> String {
    let lower = link.to_lowercase();
    lower
        .strip_suffix(".mdx")
        .or_else(|| lower.strip_suffix(".md"))
        .unwrap_or(&lower)
        .to_string()
}
