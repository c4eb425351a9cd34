/// Removes tag markup from `input`, keeping only text.
///
/// Naive by intent: no entity decoding, no script/style awareness. A `<` only
/// opens a tag when followed by a letter, `/`, `!` or `?`; any other `<` is
/// text. Quoted attribute values may contain `<` and `>`. When a tag turns
/// out not to be one (another `<` before its `>`, or end of input), the
/// buffered bytes are emitted verbatim.
pub fn strip_markup(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut in_tag = false;
    let mut in_quotes = false;
    let mut tag_start = 0;

    for (i, &ch) in input.iter().enumerate() {
        if in_tag {
            match ch {
                b'>' if !in_quotes => in_tag = false,
                b'<' if !in_quotes => {
                    // false start
                    out.extend_from_slice(&input[tag_start..i]);
                    if opens_tag(input, i) {
                        tag_start = i;
                    } else {
                        in_tag = false;
                        out.push(ch);
                    }
                }
                b'"' => in_quotes = !in_quotes,
                _ => {}
            }
            continue;
        }
        if ch == b'<' && opens_tag(input, i) {
            in_tag = true;
            in_quotes = false;
            tag_start = i;
            continue;
        }
        out.push(ch);
    }

    if in_tag {
        out.extend_from_slice(&input[tag_start..]);
    }
    out
}

fn opens_tag(input: &[u8], lt: usize) -> bool {
    input
        .get(lt + 1)
        .is_some_and(|&next| next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'?'))
}
