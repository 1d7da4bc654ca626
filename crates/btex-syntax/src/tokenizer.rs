use crate::{DefinitionKind, LineTokens, StructuralToken, TokenTag};

/// Tokenizes one line of btex source into its structural tokens.
///
/// The line is [neutralized](neutralize) first, so escaped backslashes and
/// comments never produce tokens. The caller is responsible for skipping
/// oversized lines.
///
/// ```
/// use btex_syntax::{tokenize, TokenTag};
///
/// let tags: Vec<_> = tokenize(r"$a$ % $b$").into_iter().map(|t| t.tag).collect();
/// assert_eq!(tags, vec![TokenTag::Dollar, TokenTag::Dollar]);
/// ```
pub fn tokenize(line: &str) -> LineTokens {
    let neutral = neutralize(line);
    Tokenizer::new(&neutral).collect()
}

/// Replaces every `\\` with two spaces and cuts the line at the first
/// unescaped `%`.
///
/// Both rewrites keep every column before the cut where it was.
pub fn neutralize(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => out.push_str("  "),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '%' => break,
            _ => out.push(c),
        }
    }
    out
}

/// A scanner over one neutralized line.
///
/// ## Algorithm
///
/// One decision per character or sub-match, left to right:
///
/// - `{`, `}`, `$` become single-column tokens
/// - `\(`, `\)`, `\[`, `\]` become two-column tokens
/// - `\begin{name}` / `\end{name}` become one token for the whole construct,
///   whitespace allowed before the brace; an unterminated name or one that
///   contains `{`, `}` or `\` produces no token
/// - definition openers become a [`TokenTag::Definition`] token spanning the
///   command name; their bodies are scanned like any other text
/// - `#` argument placeholders are consumed silently
/// - any other command consumes the backslash and one character, so `\{` or
///   `\$` never count as delimiters
///
/// Columns advance in UTF-16 code units.
pub struct Tokenizer<'a> {
    input: &'a str,
    /// Current byte offset into `input`.
    position: usize,
    /// 1-based UTF-16 column of `position`.
    column: u32,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            column: 1,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn bump(&mut self, bytes: usize) {
        let end = (self.position + bytes).min(self.input.len());
        self.column += self.input[self.position..end].encode_utf16().count() as u32;
        self.position = end;
    }

    fn single(&mut self, tag: TokenTag) -> StructuralToken {
        let start = self.column;
        self.bump(1);
        StructuralToken::new(tag, start, self.column)
    }

    /// Handles a backslash at the current position.
    fn command(&mut self) -> Option<StructuralToken> {
        let start = self.column;
        let rest = self.rest();
        let mut chars = rest.chars();
        chars.next();

        let Some(next) = chars.next() else {
            self.bump(1);
            return None;
        };

        let tag = match next {
            '(' => Some(TokenTag::OpenParen),
            ')' => Some(TokenTag::CloseParen),
            '[' => Some(TokenTag::OpenBracket),
            ']' => Some(TokenTag::CloseBracket),
            _ => None,
        };
        if let Some(tag) = tag {
            self.bump(2);
            return Some(StructuralToken::new(tag, start, self.column));
        }

        let name_len = rest[1..]
            .find(|c: char| !is_command_letter(c))
            .unwrap_or(rest.len() - 1);
        let name = &rest[1..1 + name_len];

        if name == "begin" || name == "end" {
            if let Some((env, len)) = environment_argument(&rest[1 + name_len..]) {
                let tag = if name == "begin" {
                    TokenTag::Begin(env.to_string())
                } else {
                    TokenTag::End(env.to_string())
                };
                self.bump(1 + name_len + len);
                return Some(StructuralToken::new(tag, start, self.column));
            }
        } else if let Some((kind, folds_name)) = classify_definition(name) {
            let after = &rest[1 + name_len..];
            let stars = after.len() - after.trim_start_matches('*').len();
            let folded = if folds_name {
                braced_command_name(&after[stars..]).unwrap_or(0)
            } else {
                0
            };
            self.bump(1 + name_len + stars + folded);
            return Some(StructuralToken::new(
                TokenTag::Definition(kind),
                start,
                self.column,
            ));
        }

        self.bump(1 + next.len_utf8());
        None
    }

    /// Skips `#`, an optional `+`/`-`, then a letter run or one digit.
    fn placeholder(&mut self) {
        self.bump(1);
        if let Some(sign @ ('+' | '-')) = self.rest().chars().next() {
            self.bump(sign.len_utf8());
        }
        let rest = self.rest();
        match rest.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => {
                let len = rest
                    .find(|c: char| !c.is_ascii_alphabetic())
                    .unwrap_or(rest.len());
                self.bump(len);
            }
            Some(c) if c.is_ascii_digit() => self.bump(1),
            _ => {}
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = StructuralToken;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(c) = self.rest().chars().next() {
            match c {
                '{' => return Some(self.single(TokenTag::LBrace)),
                '}' => return Some(self.single(TokenTag::RBrace)),
                '$' => return Some(self.single(TokenTag::Dollar)),
                '\\' => {
                    if let Some(token) = self.command() {
                        return Some(token);
                    }
                }
                '#' => self.placeholder(),
                _ => self.bump(c.len_utf8()),
            }
        }
        None
    }
}

fn is_command_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '@'
}

/// Parses `\s*{name}` and returns the name and the byte length consumed.
fn environment_argument(input: &str) -> Option<(&str, usize)> {
    let trimmed = input.trim_start();
    let skipped = input.len() - trimmed.len();
    let body = trimmed.strip_prefix('{')?;
    let close = body.find(['{', '}', '\\'])?;
    if !body[close..].starts_with('}') {
        return None;
    }
    Some((&body[..close], skipped + 1 + close + 1))
}

/// Parses `\s*{\s*\cmd\s*}` and returns the byte length consumed.
fn braced_command_name(input: &str) -> Option<usize> {
    let trimmed = input.trim_start();
    let inner = trimmed.strip_prefix('{')?.trim_start();
    let after_slash = inner.strip_prefix('\\')?;
    let first = after_slash.chars().next()?;
    let name_len = if first.is_ascii_alphabetic() {
        after_slash
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(after_slash.len())
    } else {
        first.len_utf8()
    };
    let tail = after_slash[name_len..].trim_start();
    let tail = tail.strip_prefix('}')?;
    Some(input.len() - tail.len())
}

/// Maps a command name (without the backslash) to its definition family.
///
/// The second value is true for the `\newcommand` family, whose defined name
/// may be wrapped in braces.
fn classify_definition(name: &str) -> Option<(DefinitionKind, bool)> {
    let bare = name.strip_prefix('@').unwrap_or(name);
    match bare {
        "def" | "adef" | "edef" | "gdef" | "pdef" | "tdef" | "@def" => {
            Some((DefinitionKind::Def, false))
        }
        "newcommand" | "renewcommand" => Some((DefinitionKind::Def, true)),
        "newenvironment" | "renewenvironment" => Some((DefinitionKind::NewEnv, false)),
        "envdef" | "envadef" | "envpdef" => Some((DefinitionKind::EnvDef, false)),
        _ => None,
    }
}
