//! Text-level cleanup applied to each side of an equation before tokenizing.

/// Runs every text-level normalization step in order.
pub(crate) fn normalize(raw: &str) -> String {
    let text = map_glyphs(raw);
    let text = separate_xy(&text);
    balance_parentheses(text)
}

/// Drops whitespace, maps typographic glyphs to their ASCII spelling and
/// lowercases.
pub(crate) fn map_glyphs(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            c if c.is_whitespace() => {}
            '[' => out.push('('),
            ']' => out.push(')'),
            '\u{2212}' => out.push('-'),
            '\u{00F7}' => out.push('/'),
            '\u{00D7}' => out.push('*'),
            '\u{00B2}' => out.push_str("^2"),
            '\u{00B3}' => out.push_str("^3"),
            '\u{221A}' => out.push_str("sqrt"),
            c => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// `xy` becomes `x*y`, and a digit or `a` directly before `x` gains a `*`.
pub(crate) fn separate_xy(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if let Some(p) = prev {
            let xy = p == 'x' && c == 'y';
            let coefficient = c == 'x' && (p == 'a' || p.is_ascii_digit());
            if xy || coefficient {
                out.push('*');
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Pads missing `(` at the front and missing `)` at the back until the counts
/// agree. Never fails, even when the order of the parentheses is wrong.
pub(crate) fn balance_parentheses(mut text: String) -> String {
    let opening = text.chars().filter(|&c| c == '(').count();
    let closing = text.chars().filter(|&c| c == ')').count();
    if closing > opening {
        let mut padded = "(".repeat(closing - opening);
        padded.push_str(&text);
        text = padded;
    } else {
        text.push_str(&")".repeat(opening - closing));
    }
    text
}
