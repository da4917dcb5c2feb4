//! Load programs from their text representation.
//!
//! A program holds one byte per line, written in base 2 (`10000010`). Anything after a `#` is a
//! comment, and lines with no byte on them are skipped. Bytes are placed at consecutive
//! addresses, starting from the beginning of memory.

use camino::{Utf8Path, Utf8PathBuf};
use miette::{NamedSource, SourceSpan};
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::{all_consuming, cut, map_res, opt, rest},
    error::ErrorKind,
    sequence::{delimited, preceded, terminated},
    Finish, IResult, Offset,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::{Word, MEMORY_SIZE};

#[derive(Debug, Error, miette::Diagnostic)]
pub enum LoadError {
    #[error("could not read program {path}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected a byte written in base 2")]
    #[diagnostic(help("each line holds a single byte like `10000010`, optionally followed by a `# comment`"))]
    InvalidLine {
        line: usize,
        #[label("here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("line {line}: value does not fit in a byte")]
    Overflow {
        line: usize,
        #[label("more than 8 bits")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("program is {len} bytes long, but memory only holds {}", MEMORY_SIZE)]
    TooLarge { len: usize },
}

fn is_bin_digit(c: char) -> bool {
    c == '0' || c == '1'
}

fn from_binary(input: &str) -> Result<Word, std::num::ParseIntError> {
    Word::from_str_radix(input, 2)
}

/// Parse a binary byte literal, without prefix
fn parse_byte(input: &str) -> IResult<&str, Word> {
    let (input, digits) = take_while1(is_bin_digit)(input)?;
    // Once there are digits, a value too large for a byte is a hard error
    let (_, word) = cut(map_res(rest::<_, nom::error::Error<&str>>, from_binary))(digits)?;
    Ok((input, word))
}

/// Parse a `#` comment up to the end of the line
fn parse_comment(input: &str) -> IResult<&str, &str> {
    preceded(char('#'), rest)(input)
}

/// Parse a single line: an optional byte, then an optional comment
fn parse_line(input: &str) -> IResult<&str, Option<Word>> {
    terminated(
        delimited(space0, opt(parse_byte), space0),
        opt(parse_comment),
    )(input)
}

fn parse_with_name(name: &str, source: &str) -> Result<Vec<Word>, LoadError> {
    let mut program = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let result = all_consuming(parse_line)(line).finish();
        match result {
            Ok((_, Some(word))) => program.push(word),
            Ok((_, None)) => {}
            Err(e) => {
                let offset = source.offset(line) + line.offset(e.input);
                // Point at the offending token, up to the next whitespace or comment
                let length = e
                    .input
                    .find(|c: char| c.is_whitespace() || c == '#')
                    .unwrap_or(e.input.len())
                    .max(1);
                let span = (offset, length).into();
                let src = NamedSource::new(name, source.to_owned());
                let line = index + 1;

                return Err(if e.code == ErrorKind::MapRes {
                    LoadError::Overflow { line, span, src }
                } else {
                    LoadError::InvalidLine { line, span, src }
                });
            }
        }
    }

    if program.len() > usize::from(MEMORY_SIZE) {
        return Err(LoadError::TooLarge { len: program.len() });
    }

    debug!(size = program.len(), "Parsed program");
    Ok(program)
}

/// Parse a program from its text representation
///
/// # Errors
///
/// Fails on a line that is not a base 2 byte, or if the program does not fit in memory.
pub fn parse_program(source: &str) -> Result<Vec<Word>, LoadError> {
    parse_with_name("<program>", source)
}

/// Read and parse a program file
///
/// # Errors
///
/// Fails if the file cannot be read, or for any reason [`parse_program`] fails.
pub fn load_program(path: &Utf8Path) -> Result<Vec<Word>, LoadError> {
    info!(%path, "Reading program");
    let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    parse_with_name(path.as_str(), &source)
}
