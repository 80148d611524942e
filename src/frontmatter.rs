//! YAML frontmatter handling.
//!
//! A document may open with a `---` delimited YAML block. [`parse`] splits it
//! off and extracts the typed [`FrontMatter`] fields; fields with the wrong
//! type are dropped one by one. When the block is not valid YAML, or is not a
//! mapping, the whole text is treated as body and the problem is logged.

use serde_yaml::{Mapping, Value};

use crate::models::{Category, FrontMatter};

const DELIMITER: &str = "---";

/// Result of splitting a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMatter {
    pub frontmatter: FrontMatter,
    /// Text following the frontmatter block (the whole text if there was none).
    pub body: String,
}

/// Split `text` into its raw YAML block and body. `None` when the text has
/// no complete `---` block at the very top.
pub fn split(text: &str) -> Option<(&str, &str)> {
    let first_end = text.find('\n')?;
    if text[..first_end].trim_end() != DELIMITER {
        return None;
    }

    let yaml_start = first_end + 1;
    let mut offset = yaml_start;
    for line in text[yaml_start..].split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let yaml = &text[yaml_start..offset];
            let body = &text[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

/// Parse frontmatter and body. Never fails.
pub fn parse(text: &str) -> ParsedMatter {
    let Some((yaml, body)) = split(text) else {
        return ParsedMatter {
            frontmatter: FrontMatter::default(),
            body: text.to_string(),
        };
    };

    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(map)) => ParsedMatter {
            frontmatter: from_mapping(&map),
            body: body.to_string(),
        },
        Ok(Value::Null) => ParsedMatter {
            frontmatter: FrontMatter::default(),
            body: body.to_string(),
        },
        Ok(_) => {
            tracing::warn!("frontmatter is not a mapping; treating whole file as body");
            body_only(text)
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse frontmatter; treating whole file as body");
            body_only(text)
        }
    }
}

fn body_only(text: &str) -> ParsedMatter {
    ParsedMatter {
        frontmatter: FrontMatter::default(),
        body: text.to_string(),
    }
}

fn from_mapping(map: &Mapping) -> FrontMatter {
    let string = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

    let tags = map.get("tags").and_then(Value::as_sequence).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    });

    FrontMatter {
        title: string("title"),
        date: string("date"),
        tags,
        summary: string("summary"),
        slug: string("slug"),
        category: map
            .get("category")
            .and_then(Value::as_str)
            .and_then(Category::parse),
        completed: map.get("completed").and_then(Value::as_bool),
    }
}

/// Remove a leading `---` block from `content` without parsing it. Content
/// with no closing delimiter is returned unchanged.
pub fn strip_block(content: &str) -> &str {
    if !content.starts_with(DELIMITER) {
        return content;
    }
    match content[DELIMITER.len()..].find("\n---") {
        Some(pos) => content[DELIMITER.len() + pos + 4..].trim_start(),
        None => content,
    }
}

/// Overlay `updates` onto the frontmatter of `existing` and render the
/// document again. Keys already present keep their position; the body is
/// preserved byte for byte. An unparseable existing block is replaced.
pub fn merge(existing: &str, updates: &Mapping) -> Result<String, serde_yaml::Error> {
    let (mut data, body) = match split(existing) {
        Some((yaml, body)) => match serde_yaml::from_str::<Value>(yaml) {
            Ok(Value::Mapping(map)) => (map, body),
            _ => (Mapping::new(), body),
        },
        None => (Mapping::new(), existing),
    };

    for (key, value) in updates {
        data.insert(key.clone(), value.clone());
    }

    stringify(&data, body)
}

/// Render a mapping and a body as a frontmatter document.
pub fn stringify(data: &Mapping, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = if data.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(data)?
    };
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}
