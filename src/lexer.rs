//! PDF lexer (tokenizer).
//!
//! Splits PDF bytes into tokens: numbers, literal and hex strings, names,
//! delimiters and keywords. Whitespace (space, \t, \r, \n, \0, \f) and
//! comments (% to EOL) between tokens are skipped.
//!
//! The lexer is only driven over object bodies and the trailer dictionary;
//! content streams are never tokenized.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, opt, recognize},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5)
    Real(f64),
    /// Raw literal string bytes, escapes not yet decoded
    LiteralString(&'a [u8]),
    /// Raw hex string digits, whitespace included
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R`
    R,
}

/// PDF whitespace characters (ISO 32000-1, Table 1).
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters (ISO 32000-1, Table 2).
pub fn is_delimiter(c: u8) -> bool {
    matches!(
        c,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

/// Skip any run of whitespace and comments.
pub fn skip_whitespace(mut input: &[u8]) -> &[u8] {
    loop {
        let trimmed_len = input.iter().take_while(|&&c| is_whitespace(c)).count();
        input = &input[trimmed_len..];
        if input.first() == Some(&b'%') {
            let comment_len = input
                .iter()
                .take_while(|&&c| c != b'\r' && c != b'\n')
                .count();
            input = &input[comment_len..];
        } else {
            return input;
        }
    }
}

fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    )))(input)?;

    let fail = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit));
    let text = std::str::from_utf8(text).map_err(|_| fail())?;

    if text.contains('.') {
        let value: f64 = text.parse().map_err(|_| fail())?;
        Ok((rest, Token::Real(value)))
    } else {
        let value: i64 = text.parse().map_err(|_| fail())?;
        Ok((rest, Token::Integer(value)))
    }
}

/// Literal string with balanced parentheses; backslash escapes are skipped
/// over but left encoded.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0usize;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)))
}

fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode `#XX` escapes in a raw name.
///
/// Malformed escapes are kept literally.
///
/// ```
/// # use pdf_inject::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B"), "A B");
/// assert_eq!(decode_name_escapes(b"A#zz"), "A#zz");
/// ```
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let decoded = std::str::from_utf8(&raw[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(is_regular), |raw: &[u8]| Token::Name(decode_name_escapes(raw))),
    )(input)
}

fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        map(tag(b"<<"), |_| Token::DictStart),
        map(tag(b">>"), |_| Token::DictEnd),
        map(tag(b"["), |_| Token::ArrayStart),
        map(tag(b"]"), |_| Token::ArrayEnd),
    ))(input)
}

/// Keywords are whole runs of regular characters, so `endobj` never lexes
/// as `end` + `obj` and `streamX` is rejected.
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, word) = take_while1(is_regular)(input)?;
    let token = match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        b"R" => Token::R,
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )))
        },
    };
    Ok((rest, token))
}

/// Parse a single token after skipping leading whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_whitespace(input);
    alt((
        parse_delimiter,
        parse_name,
        parse_literal_string,
        parse_hex_string,
        parse_keyword_or_number,
    ))(input)
}

fn parse_keyword_or_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    // A number must end at a token boundary; "12abc" is not a number.
    if let Ok((rest, tok)) = parse_number(input) {
        if rest.first().map_or(true, |&c| !is_regular(c)) {
            return Ok((rest, tok));
        }
    }
    parse_keyword(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-123"), Ok((&b""[..], Token::Integer(-123))));
        assert_eq!(token(b"+7 "), Ok((&b" "[..], Token::Integer(7))));
    }

    #[test]
    fn test_reals() {
        assert_eq!(token(b"-2.5"), Ok((&b""[..], Token::Real(-2.5))));
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"5."), Ok((&b""[..], Token::Real(5.0))));
        assert_eq!(token(b"841.89"), Ok((&b""[..], Token::Real(841.89))));
    }

    #[test]
    fn test_literal_string_nested_and_escaped() {
        assert_eq!(
            token(b"(a (b) c)"),
            Ok((&b""[..], Token::LiteralString(b"a (b) c")))
        );
        assert_eq!(
            token(b"(a \\) b) rest"),
            Ok((&b" rest"[..], Token::LiteralString(b"a \\) b")))
        );
        assert_eq!(token(b"()"), Ok((&b""[..], Token::LiteralString(b""))));
    }

    #[test]
    fn test_unterminated_literal_string_fails() {
        assert!(token(b"(abc").is_err());
    }

    #[test]
    fn test_hex_string_vs_dict_start() {
        assert_eq!(
            token(b"<48 65>"),
            Ok((&b""[..], Token::HexString(b"48 65")))
        );
        assert_eq!(token(b"<< /A 1 >>"), Ok((&b" /A 1 >>"[..], Token::DictStart)));
    }

    #[test]
    fn test_names() {
        assert_eq!(
            token(b"/Type/Page"),
            Ok((&b"/Page"[..], Token::Name("Type".to_string())))
        );
        assert_eq!(
            token(b"/A#20B"),
            Ok((&b""[..], Token::Name("A B".to_string())))
        );
        assert_eq!(token(b"/ "), Ok((&b" "[..], Token::Name(String::new()))));
    }

    #[test]
    fn test_keywords_require_word_boundary() {
        assert_eq!(token(b"endobj"), Ok((&b""[..], Token::ObjEnd)));
        assert_eq!(token(b"endstream\n"), Ok((&b"\n"[..], Token::StreamEnd)));
        assert_eq!(token(b"stream\r\n"), Ok((&b"\r\n"[..], Token::StreamStart)));
        assert_eq!(token(b"R]"), Ok((&b"]"[..], Token::R)));
        assert!(token(b"streamer").is_err());
        assert!(token(b"12abc").is_err());
    }

    #[test]
    fn test_skip_whitespace_and_comments() {
        assert_eq!(skip_whitespace(b"  % note\r\n\t 1"), b"1");
        assert_eq!(token(b"%c1\n%c2\n true"), Ok((&b""[..], Token::True)));
    }

    #[test]
    fn test_reference_sequence() {
        let (rest, a) = token(b"10 0 R").unwrap();
        let (rest, b) = token(rest).unwrap();
        let (rest, c) = token(rest).unwrap();
        assert_eq!((a, b, c), (Token::Integer(10), Token::Integer(0), Token::R));
        assert!(rest.is_empty());
    }
}
