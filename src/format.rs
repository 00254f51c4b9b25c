//! Turns plain-text experience content into display markup.

/// Tags that mark content as already formatted.
const BLOCK_TAGS: &[&str] = &[
    "<ul", "<ol", "<li", "<p>", "<p ", "<h1", "<h2", "<h3", "<h4", "<h5", "<h6", "<div", "<br",
];

#[derive(Clone, Copy, Debug, PartialEq)]
enum Block {
    Bullets,
    Numbers,
}

impl Block {
    fn open(self) -> &'static str {
        match self {
            Block::Bullets => "<ul>",
            Block::Numbers => "<ol>",
        }
    }

    fn close(self) -> &'static str {
        match self {
            Block::Bullets => "</ul>",
            Block::Numbers => "</ol>",
        }
    }
}

/// Converts line-oriented content into markup.
///
/// Lines starting with `* ` or `- ` become bullet items, lines starting
/// with `1. ` or `1) ` become numbered items, contiguous items share one
/// list, and every other line is followed by a line break. Content that
/// already contains block-level markup is returned unchanged. Nested
/// lists and escaping aren't handled.
///
/// ```
/// use experiences::format::format_content;
///
/// assert_eq!(
///     format_content("* first\n* second\nplain line"),
///     "<ul><li>first</li><li>second</li></ul>plain line<br>",
/// );
/// ```
pub fn format_content(content: &str) -> String {
    if has_block_markup(content) {
        return content.to_owned();
    }

    let mut output = String::with_capacity(content.len() * 2);
    let mut open: Option<Block> = None;

    for line in content.split('\n') {
        let line = line.trim();

        let (block, text) = match classify(line) {
            Some((block, text)) => (Some(block), text),
            None => (None, line),
        };

        if open.is_some() && open != block {
            if let Some(previous) = open.take() {
                output.push_str(previous.close());
            }
        }

        match block {
            Some(block) => {
                if open.is_none() {
                    output.push_str(block.open());
                    open = Some(block);
                }

                output.push_str("<li>");
                output.push_str(text);
                output.push_str("</li>");
            }
            None => {
                output.push_str(text);
                output.push_str("<br>");
            }
        }
    }

    if let Some(block) = open {
        output.push_str(block.close());
    }

    output
}

fn has_block_markup(content: &str) -> bool {
    let lowered = content.to_lowercase();

    BLOCK_TAGS.iter().any(|tag| lowered.contains(tag))
}

fn classify(line: &str) -> Option<(Block, &str)> {
    if let Some(rest) = line.strip_prefix("* ").or_else(|| line.strip_prefix("- ")) {
        return Some((Block::Bullets, rest.trim()));
    }

    let digits = line.find(|c: char| !c.is_ascii_digit())?;

    if digits == 0 {
        return None;
    }

    let rest = &line[digits..];

    rest.strip_prefix(". ")
        .or_else(|| rest.strip_prefix(") "))
        .map(|text| (Block::Numbers, text.trim()))
}
