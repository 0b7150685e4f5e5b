//! Shell-like word splitting for directive values

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Pipe,
}

/// Split a directive value into words and unquoted `|` separators.
///
/// Single quotes are literal, double quotes honour `\"` and `\\`, and a
/// backslash outside quotes escapes the next character.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    scan(input, true)
}

/// Split a value into plain words. `|` is an ordinary character here.
pub fn words(input: &str) -> Result<Vec<String>> {
    Ok(scan(input, false)?
        .into_iter()
        .filter_map(|token| match token {
            Token::Word(word) => Some(word),
            Token::Pipe => None,
        })
        .collect())
}

fn scan(input: &str, pipes: bool) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(unterminated(input)),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(unterminated(input)),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(unterminated(input)),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(ch) = chars.next() {
                    current.push(ch);
                }
            }
            '|' if pipes => {
                flush(&mut tokens, &mut current, &mut in_word);
                tokens.push(Token::Pipe);
            }
            c if c.is_whitespace() => flush(&mut tokens, &mut current, &mut in_word),
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    flush(&mut tokens, &mut current, &mut in_word);

    Ok(tokens)
}

fn flush(tokens: &mut Vec<Token>, current: &mut String, in_word: &mut bool) {
    if *in_word {
        tokens.push(Token::Word(std::mem::take(current)));
        *in_word = false;
    }
}

fn unterminated(input: &str) -> Error {
    Error::malformed(format!("unterminated quote in '{input}'"))
}
