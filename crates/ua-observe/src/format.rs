//! Composite message formatting.
//!
//! Templates use positional placeholders: `{0}`, `{1,8}` (right-aligned in
//! eight columns), `{1,-8}` (left-aligned) and `{0:format}`. Literal braces
//! are written as `{{` and `}}`.
//!
//! The format part is syntax-checked and then dropped: every argument renders
//! through its `Display` impl, so `{0:X8}` applied to `255` yields `255`,
//! not `000000FF`. Callers wanting a numeric format must pre-format the
//! argument. Alignments of a million columns or more are rejected.

use std::fmt::{Display, Write as _};

/// Widest accepted alignment, exclusive.
const ALIGNMENT_LIMIT: usize = 1_000_000;

/// Reasons a template cannot be applied to its arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// A `{` or `}` without its partner.
    #[error("unmatched brace at byte {0}")]
    UnmatchedBrace(usize),

    /// A placeholder whose index or alignment is not a number, or whose
    /// alignment is out of range.
    #[error("invalid placeholder at byte {0}")]
    InvalidPlaceholder(usize),

    /// A placeholder refers to an argument that was not supplied.
    #[error("placeholder index {index} out of range for {count} argument(s)")]
    IndexOutOfRange {
        /// The index named in the template.
        index: usize,
        /// The number of arguments supplied.
        count: usize,
    },

    /// An argument's `Display` implementation reported an error.
    #[error("argument {0} failed to format")]
    Argument(usize),
}

/// Applies `args` to `template`.
///
/// # Errors
///
/// Returns a [`FormatError`] when the template is malformed or refers to a
/// missing argument. No partial output is returned.
pub fn format(template: &str, args: &[&dyn Display]) -> Result<String, FormatError> {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len() + args.len() * 8);
    let mut literal_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'{' if bytes.get(pos + 1) == Some(&b'{') => {
                out.push_str(&template[literal_start..pos]);
                out.push('{');
                pos += 2;
                literal_start = pos;
            }
            b'}' if bytes.get(pos + 1) == Some(&b'}') => {
                out.push_str(&template[literal_start..pos]);
                out.push('}');
                pos += 2;
                literal_start = pos;
            }
            b'}' => return Err(FormatError::UnmatchedBrace(pos)),
            b'{' => {
                out.push_str(&template[literal_start..pos]);
                let close = template[pos..]
                    .find('}')
                    .map(|offset| pos + offset)
                    .ok_or(FormatError::UnmatchedBrace(pos))?;
                let placeholder = Placeholder::parse(&template[pos + 1..close], pos)?;
                let arg = args.get(placeholder.index).ok_or(FormatError::IndexOutOfRange {
                    index: placeholder.index,
                    count: args.len(),
                })?;
                placeholder.write(&mut out, *arg)?;
                pos = close + 1;
                literal_start = pos;
            }
            _ => pos += 1,
        }
    }

    out.push_str(&template[literal_start..]);
    Ok(out)
}

/// Applies `args` to `template`, returning the raw template on failure.
pub fn format_or_raw(template: &str, args: &[&dyn Display]) -> String {
    match format(template, args) {
        Ok(message) => message,
        Err(e) => {
            tracing::trace!(error = %e, template, "format failed, using raw template");
            template.to_string()
        }
    }
}

struct Placeholder {
    index: usize,
    alignment: isize,
}

impl Placeholder {
    /// Parses the text between the braces: `index[,alignment][:format]`.
    fn parse(body: &str, at: usize) -> Result<Self, FormatError> {
        let without_spec = match body.find(':') {
            Some(colon) => &body[..colon],
            None => body,
        };
        if without_spec.contains('{') {
            return Err(FormatError::UnmatchedBrace(at));
        }
        let (index, alignment) = match without_spec.split_once(',') {
            Some((index, alignment)) => (index, Some(alignment)),
            None => (without_spec, None),
        };

        let index = index
            .trim()
            .parse::<usize>()
            .map_err(|_| FormatError::InvalidPlaceholder(at))?;
        let alignment = match alignment {
            Some(a) => a
                .trim()
                .parse::<isize>()
                .ok()
                .filter(|a| a.unsigned_abs() < ALIGNMENT_LIMIT)
                .ok_or(FormatError::InvalidPlaceholder(at))?,
            None => 0,
        };

        Ok(Self { index, alignment })
    }

    fn write(&self, out: &mut String, arg: &dyn Display) -> Result<(), FormatError> {
        if self.alignment == 0 {
            return write!(out, "{arg}").map_err(|_| FormatError::Argument(self.index));
        }

        let mut rendered = String::new();
        write!(rendered, "{arg}").map_err(|_| FormatError::Argument(self.index))?;
        let width = self.alignment.unsigned_abs();
        let pad = width.saturating_sub(rendered.chars().count());
        if self.alignment > 0 {
            out.extend(std::iter::repeat(' ').take(pad));
            out.push_str(&rendered);
        } else {
            out.push_str(&rendered);
            out.extend(std::iter::repeat(' ').take(pad));
        }
        Ok(())
    }
}
