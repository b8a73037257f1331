//! A scanner for delimited tokens such as `${name}` embedded in free text.

/// Finds `open ... close` tokens in a string and replaces each one with the
/// output of a handler.
///
/// A backslash directly before the open delimiter escapes the token: the
/// backslash is removed and the delimiter is kept as literal text. Inside a
/// token, a backslash directly before the close delimiter escapes that
/// delimiter. An open delimiter without a matching close delimiter leaves the
/// rest of the input untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenScanner<'t> {
    open: &'t str,
    close: &'t str,
}

impl<'t> TokenScanner<'t> {
    pub const fn new(open: &'t str, close: &'t str) -> Self {
        Self { open, close }
    }

    /// Replaces every token in `text` with `handler(content)`.
    pub fn replace<F>(&self, text: &str, mut handler: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let Some(mut start) = text.find(self.open) else {
            return text.to_string();
        };

        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut offset = 0;
        let mut expression = String::new();

        loop {
            if start > 0 && bytes[start - 1] == b'\\' {
                out.push_str(&text[offset..start - 1]);
                out.push_str(self.open);
                offset = start + self.open.len();
            } else {
                expression.clear();
                out.push_str(&text[offset..start]);
                offset = start + self.open.len();

                let mut end = find_from(text, self.close, offset);
                while let Some(close_at) = end {
                    if close_at > offset && bytes[close_at - 1] == b'\\' {
                        expression.push_str(&text[offset..close_at - 1]);
                        expression.push_str(self.close);
                        offset = close_at + self.close.len();
                        end = find_from(text, self.close, offset);
                    } else {
                        expression.push_str(&text[offset..close_at]);
                        break;
                    }
                }

                match end {
                    Some(close_at) => {
                        out.push_str(&handler(&expression));
                        offset = close_at + self.close.len();
                    }
                    None => {
                        out.push_str(&text[start..]);
                        offset = text.len();
                    }
                }
            }

            match find_from(text, self.open, offset) {
                Some(next) => start = next,
                None => break,
            }
        }

        if offset < text.len() {
            out.push_str(&text[offset..]);
        }
        out
    }
}

fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack
        .get(from..)
        .and_then(|rest| rest.find(needle))
        .map(|pos| pos + from)
}
