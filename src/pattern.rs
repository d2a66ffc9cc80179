//! # Command and response templates
//!
//! Templates are plain strings with a small closed set of placeholders:
//!
//! | Placeholder | Send side            | Receive side                                        |
//! |-------------|----------------------|-----------------------------------------------------|
//! | `%d`        | [Arg::Int]/[Arg::Uint] | optional whitespace, sign and at least one digit  |
//! | `%s`        | [Arg::Str]           | optional whitespace and a run of non-whitespace     |
//! | `%[^...]`   | -                    | a run of bytes not contained in the set             |
//! | `%*d` etc.  | -                    | matched but not stored                              |
//! | `%%`        | literal `%`          | literal `%`                                         |
//!
//! On the receive side any whitespace in the template matches any amount of whitespace (including none),
//! all other characters match literally. Receive templates are processed line by line: a line ends after
//! each `\n` of the template, and such a line only matches once a full line was received.
use crate::parser::Error;
use heapless::{String, Vec};
use numtoa::NumToA;

/// Max. number of tokens of a single template line
const MAX_TOKENS: usize = 48;

/// Argument of a command template
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Arg<'a> {
    Int(i32),
    Uint(u32),
    Str(&'a str),
}

/// Output slot for a value matched by a response template
pub enum Capture<'a> {
    /// Receives the value of a `%d` placeholder
    Int(&'a mut i32),

    /// Receives the text of a `%s` or `%[^...]` placeholder, e.g. a [heapless::String].
    /// Holds exactly the last match, previous content is discarded.
    Str(&'a mut dyn TextTarget),
}

impl Capture<'_> {
    /// Discards text captured by an earlier matching pass
    pub(crate) fn reset(&mut self) {
        if let Capture::Str(target) = self {
            target.clear();
        }
    }

    fn assign(&mut self, value: Value<'_>) -> Result<(), Error> {
        match (self, value) {
            (Capture::Int(target), Value::Int(value)) => {
                **target = value;
                Ok(())
            }
            (Capture::Str(target), Value::Text(text)) => {
                let text = core::str::from_utf8(text).map_err(|_| Error::NoMatch)?;
                target.clear();
                target.push_str(text).map_err(|_| Error::FormatOverflow)
            }
            _ => Err(Error::InvalidTemplate),
        }
    }
}

/// Bounded text buffer receiving a string capture
pub trait TextTarget {
    /// Removes all content
    fn clear(&mut self);

    /// Appends the text, fails if the remaining capacity is too small
    fn push_str(&mut self, text: &str) -> Result<(), ()>;
}

impl<const N: usize> TextTarget for String<N> {
    fn clear(&mut self) {
        String::clear(self);
    }

    fn push_str(&mut self, text: &str) -> Result<(), ()> {
        String::push_str(self, text)
    }
}

/// Value matched by a placeholder
#[derive(Copy, Clone, Debug, PartialEq)]
enum Value<'a> {
    Int(i32),
    Text(&'a [u8]),
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Token<'t> {
    /// Matches exactly this byte
    Literal(u8),

    /// Matches zero or more whitespace bytes
    Whitespace,

    /// Decimal integer
    Int { store: bool },

    /// Run of non-whitespace bytes
    Word { store: bool },

    /// Run of bytes not contained in `stop`
    Until { stop: &'t [u8], store: bool },
}

/// Compiled part of a receive template
pub(crate) struct Line<'t> {
    tokens: Vec<Token<'t>, MAX_TOKENS>,

    /// Length of the template text covered by this line
    pub(crate) len: usize,

    /// True if the template line ends with a newline, so matching must wait for a received newline
    pub(crate) whole_line: bool,
}

impl<'t> Line<'t> {
    /// Compiles the first line of the given template
    pub(crate) fn first(template: &'t str) -> Result<Self, Error> {
        Self::compile(template, true)
    }

    /// Compiles the whole template as a single pattern, newlines included
    pub(crate) fn whole(template: &'t str) -> Result<Self, Error> {
        Self::compile(template, false)
    }

    fn compile(template: &'t str, split_lines: bool) -> Result<Self, Error> {
        let bytes = template.as_bytes();
        let mut tokens = Vec::new();
        let mut whole_line = false;
        let mut i = 0;

        while i < bytes.len() {
            let byte = bytes[i];

            if byte == b'%' {
                let (token, length) = Self::directive(&bytes[i..])?;
                tokens.push(token).map_err(|_| Error::FormatOverflow)?;
                i += length;
                continue;
            }

            i += 1;

            if is_space(byte) {
                if tokens.last() != Some(&Token::Whitespace) {
                    tokens.push(Token::Whitespace).map_err(|_| Error::FormatOverflow)?;
                }
            } else {
                tokens.push(Token::Literal(byte)).map_err(|_| Error::FormatOverflow)?;
            }

            if split_lines && byte == b'\n' {
                whole_line = true;
                break;
            }
        }

        Ok(Self {
            tokens,
            len: i,
            whole_line,
        })
    }

    /// Parses a single directive starting with `%`. Returns the token and its template length.
    fn directive(bytes: &'t [u8]) -> Result<(Token<'t>, usize), Error> {
        let mut i = 1;

        if bytes.get(i) == Some(&b'%') {
            return Ok((Token::Literal(b'%'), 2));
        }

        let store = bytes.get(i) != Some(&b'*');
        if !store {
            i += 1;
        }

        match bytes.get(i) {
            Some(b'd') => Ok((Token::Int { store }, i + 1)),
            Some(b's') => Ok((Token::Word { store }, i + 1)),
            Some(b'[') if bytes.get(i + 1) == Some(&b'^') => {
                let start = i + 2;
                let length = bytes[start..]
                    .iter()
                    .skip(1)
                    .position(|byte| *byte == b']')
                    .map(|position| position + 1)
                    .ok_or(Error::InvalidTemplate)?;

                let stop = &bytes[start..start + length];
                Ok((Token::Until { stop, store }, start + length + 1))
            }
            _ => Err(Error::InvalidTemplate),
        }
    }

    /// Matches the input against this line, discarding all values.
    /// Returns the matched length if all tokens matched, which may be shorter than the input.
    pub(crate) fn matched_len(&self, input: &[u8]) -> Option<usize> {
        self.walk(input, |_| Ok(())).ok().flatten()
    }

    /// Matches the input and stores all values in the given captures.
    /// Returns the number of used captures.
    pub(crate) fn extract(&self, input: &[u8], captures: &mut [Capture<'_>]) -> Result<usize, Error> {
        let mut index = 0;

        self.walk(input, |value| {
            let capture = captures.get_mut(index).ok_or(Error::InvalidTemplate)?;
            index += 1;
            capture.assign(value)
        })?
        .ok_or(Error::NoMatch)?;

        Ok(index)
    }

    fn walk<F>(&self, input: &[u8], mut store: F) -> Result<Option<usize>, Error>
    where
        F: FnMut(Value<'_>) -> Result<(), Error>,
    {
        let mut position = 0;

        for token in &self.tokens {
            match *token {
                Token::Literal(expected) => {
                    if input.get(position) != Some(&expected) {
                        return Ok(None);
                    }
                    position += 1;
                }
                Token::Whitespace => position = skip_space(input, position),
                Token::Int { store: keep } => {
                    let start = skip_space(input, position);
                    let Some((value, end)) = parse_int(input, start) else {
                        return Ok(None);
                    };

                    if keep {
                        store(Value::Int(value))?;
                    }
                    position = end;
                }
                Token::Word { store: keep } => {
                    let start = skip_space(input, position);
                    let end = start + input[start..].iter().take_while(|byte| !is_space(**byte)).count();
                    if end == start {
                        return Ok(None);
                    }

                    if keep {
                        store(Value::Text(&input[start..end]))?;
                    }
                    position = end;
                }
                Token::Until { stop, store: keep } => {
                    let end = position + input[position..].iter().take_while(|byte| !stop.contains(*byte)).count();
                    if end == position {
                        return Ok(None);
                    }

                    if keep {
                        store(Value::Text(&input[position..end]))?;
                    }
                    position = end;
                }
            }
        }

        Ok(Some(position))
    }
}

/// Renders a command template with the given arguments. Returns the rendered length.
pub(crate) fn format(template: &str, args: &[Arg<'_>], out: &mut [u8]) -> Result<usize, Error> {
    let mut writer = Cursor { out, position: 0 };
    let mut args = args.iter();
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            writer.push(bytes[i])?;
            i += 1;
            continue;
        }

        if bytes.get(i + 1) == Some(&b'%') {
            writer.push(b'%')?;
            i += 2;
            continue;
        }

        let mut number = [0u8; 12];
        match (bytes.get(i + 1), args.next()) {
            (Some(b'd'), Some(Arg::Int(value))) => writer.extend(value.numtoa(10, &mut number))?,
            (Some(b'd'), Some(Arg::Uint(value))) => writer.extend(value.numtoa(10, &mut number))?,
            (Some(b's'), Some(Arg::Str(value))) => writer.extend(value.as_bytes())?,
            _ => return Err(Error::InvalidTemplate),
        }

        i += 2;
    }

    if args.next().is_some() {
        return Err(Error::InvalidTemplate);
    }

    Ok(writer.position)
}

/// Bounds checked writer on a byte slice
struct Cursor<'a> {
    out: &'a mut [u8],
    position: usize,
}

impl Cursor<'_> {
    fn push(&mut self, byte: u8) -> Result<(), Error> {
        let slot = self.out.get_mut(self.position).ok_or(Error::FormatOverflow)?;
        *slot = byte;
        self.position += 1;
        Ok(())
    }

    fn extend(&mut self, bytes: &[u8]) -> Result<(), Error> {
        bytes.iter().try_for_each(|byte| self.push(*byte))
    }
}

pub(crate) fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
}

pub(crate) fn skip_space(input: &[u8], position: usize) -> usize {
    position + input[position..].iter().take_while(|byte| is_space(**byte)).count()
}

/// Parses a signed decimal at the given position. Returns the value and the end position.
pub(crate) fn parse_int(input: &[u8], start: usize) -> Option<(i32, usize)> {
    let mut position = start;
    let negative = match input.get(position) {
        Some(b'-') => {
            position += 1;
            true
        }
        Some(b'+') => {
            position += 1;
            false
        }
        _ => false,
    };

    let digits = input[position..].iter().take_while(|byte| byte.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    let value = input[position..position + digits]
        .iter()
        .fold(0i32, |sum, digit| sum.saturating_mul(10).saturating_add((digit - b'0') as i32));

    let value = if negative { -value } else { value };
    Some((value, position + digits))
}
