/// Replace tabs with spaces up to the next multiple of `tab_width`
pub(crate) fn expand_tabs(text: &str, tab_width: u8) -> String {
    if !text.contains('\t') {
        return text.to_string();
    }
    let width = usize::from(tab_width.max(1));
    let mut out = String::with_capacity(text.len() + width);
    let mut col = 0;
    for ch in text.chars() {
        if ch == '\t' {
            let pad = width - col % width;
            out.extend(std::iter::repeat(' ').take(pad));
            col += pad;
        } else {
            out.push(ch);
            col += 1;
        }
    }
    out
}

/// Cut `text` to `max_width` characters, marking the cut with `…`.
/// Measured in characters, not bytes.
pub(crate) fn truncate(text: &str, max_width: usize) -> String {
    if text.chars().count() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max_width - 1).collect();
    out.push('…');
    out
}
