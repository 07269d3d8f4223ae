//! Plain-text extraction from fetched HTML pages.

use std::sync::OnceLock;

use regex::Regex;

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

/// Strip tags, script and style blocks, then decode entities and tidy whitespace.
pub fn strip_html_tags(html: &str) -> String {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static STYLE: OnceLock<Regex> = OnceLock::new();
    static BREAK: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();

    let text = cached(&SCRIPT, r"(?is)<script[^>]*>.*?</script>").replace_all(html, "");
    let text = cached(&STYLE, r"(?is)<style[^>]*>.*?</style>").replace_all(&text, "");
    let text = cached(&BREAK, r"(?i)<br\s*/?>|</(p|div|li|h[1-6])>")
        .replace_all(&text, "\n");
    let text = cached(&TAG, r"<[^>]+>").replace_all(&text, "");
    let text = decode_entities(&text);
    let text = cached(&SPACES, r"[ \t]+\n").replace_all(&text, "\n");
    let text = cached(&BLANK_LINES, r"\n{3,}").replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Decode the named entities pages actually use plus numeric references.
pub fn decode_entities(text: &str) -> String {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();

    let numeric = cached(&NUMERIC, r"&#(x[0-9a-fA-F]+|[0-9]+);");
    let text = numeric.replace_all(text, |caps: &regex::Captures| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Value of the `content` attribute of the first `<meta>` tag whose
/// `property` or `name` is `key`. Entities are decoded.
pub fn meta_content(html: &str, key: &str) -> Option<String> {
    static META: OnceLock<Regex> = OnceLock::new();
    static ATTR: OnceLock<Regex> = OnceLock::new();

    let attr = cached(&ATTR, r#"([a-zA-Z:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#);
    for tag in cached(&META, r"(?i)<meta\s[^>]*>").find_iter(html) {
        let mut matches_key = false;
        let mut content = None;
        for caps in attr.captures_iter(tag.as_str()) {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            match caps[1].to_ascii_lowercase().as_str() {
                "property" | "name" if value == key => matches_key = true,
                "content" => content = Some(value),
                _ => {}
            }
        }
        if matches_key {
            return content.map(decode_entities);
        }
    }
    None
}

/// Bodies of every `<script type="application/ld+json">` block.
pub fn json_ld_blocks(html: &str) -> Vec<&str> {
    static LD: OnceLock<Regex> = OnceLock::new();

    cached(
        &LD,
        r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#,
    )
    .captures_iter(html)
    .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim()))
    .collect()
}
