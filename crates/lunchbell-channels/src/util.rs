/// Slack rejects `text` fields much longer than this.
pub const SLACK_TEXT_LIMIT: usize = 4000;

/// Split a message into chunks of at most `max_chars` characters.
///
/// Splits on newline boundaries when possible, falling back to hard splits
/// at `max_chars` if a single line exceeds the limit. Never cuts inside a
/// multi-byte character.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for line in text.split('\n') {
        let line_chars = line.chars().count();
        let needed = if current.is_empty() {
            line_chars
        } else {
            current_chars + 1 + line_chars
        };

        if needed > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }

            if line_chars > max_chars {
                let chars: Vec<char> = line.chars().collect();
                let mut pieces = chars.chunks(max_chars).peekable();
                while let Some(piece) = pieces.next() {
                    if pieces.peek().is_some() {
                        chunks.push(piece.iter().collect());
                    } else {
                        current = piece.iter().collect();
                        current_chars = piece.len();
                    }
                }
            } else {
                current = line.to_string();
                current_chars = line_chars;
            }
        } else if current.is_empty() {
            current = line.to_string();
            current_chars = line_chars;
        } else {
            current.push('\n');
            current.push_str(line);
            current_chars = needed;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Show only the last four characters of a secret.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{tail}", "*".repeat(20))
}
