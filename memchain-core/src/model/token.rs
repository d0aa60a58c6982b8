use once_cell::sync::Lazy;
use regex::{Matches, Regex};

use crate::error::{ChainError, ChainResult};
use super::look_behind::LookBehind;

/// Reserved text of the begin sentinel. Outside every token class, so
/// ordinary text can never produce it.
pub const BEGIN_MARK: &str = "\u{1}";

/// Reserved text of the end sentinel.
pub const END_MARK: &str = "\u{2}";

/// Punctuation after which the next token is capitalized.
const CAP_NEXT: &[&str] = &["?", "!", "."];

/// Tokens after which no space is inserted before a word.
const NO_SPACE_AFTER: &[&str] = &["("];

// The splitter must stay in sync with the class patterns below, so that
// every candidate it produces classifies successfully. None of the
// classes may match '|': the follower store uses it as a meta-character.
static SPLIT_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"\s+|[A-Za-z0-9'-]+|[?,!;:.()]").expect("splitter pattern"));

static PUNCTUATION_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[?,!;:.()]$").expect("punctuation pattern"));

static WORD_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[A-Za-z0-9'-]+$").expect("word pattern"));

// Matches the empty string as well, so classification of an empty
// candidate always succeeds.
static WHITESPACE_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^\s*$").expect("whitespace pattern"));

/// Class of an ordinary token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
	/// Alphanumerics plus apostrophe and hyphen.
	Word,
	/// A single sentence or clause mark.
	Punctuation,
	/// Whitespace, including the empty match. Dropped by `tokenize`.
	Whitespace,
}

/// A single unit of text, or a sequence boundary sentinel.
///
/// Sentinels are enum variants rather than subtypes; call sites
/// pattern-match instead of type-checking, and sentinels never match
/// ordinary text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
	/// Marks the start of a sequence.
	Begin,
	/// Marks the end of a sequence.
	End,
	/// An ordinary token.
	Plain {
		/// Normalized (lowercased) text.
		text: String,
		/// Class assigned at classification time.
		kind: TokenKind,
	},
}

impl Token {
	/// Builds an ordinary token from raw text.
	///
	/// The text is lowercased, then classified against the ordered
	/// class patterns: punctuation, word, whitespace.
	///
	/// # Errors
	/// `ChainError::UnknownTokenKind` if no class matches.
	pub fn plain(raw: &str) -> ChainResult<Self> {
		let text = raw.to_lowercase();
		let kind = Self::classify(&text)?;
		Ok(Self::Plain { text, kind })
	}

	fn classify(text: &str) -> ChainResult<TokenKind> {
		if PUNCTUATION_RE.is_match(text) {
			Ok(TokenKind::Punctuation)
		} else if WORD_RE.is_match(text) {
			Ok(TokenKind::Word)
		} else if WHITESPACE_RE.is_match(text) {
			Ok(TokenKind::Whitespace)
		} else {
			Err(ChainError::UnknownTokenKind(text.to_owned()))
		}
	}

	/// Normalized text of the token; sentinels yield their reserved
	/// marks.
	pub fn text(&self) -> &str {
		match self {
			Self::Begin => BEGIN_MARK,
			Self::End => END_MARK,
			Self::Plain { text, .. } => text,
		}
	}

	/// Class of an ordinary token; `None` for sentinels.
	pub fn kind(&self) -> Option<TokenKind> {
		match self {
			Self::Plain { kind, .. } => Some(*kind),
			_ => None,
		}
	}
}

/// Splits `text` into classified tokens, dropping whitespace.
///
/// # Parameters
/// - `text`: Raw input text.
/// - `with_sentinels`: Emit `Token::Begin` first and `Token::End` last.
///
/// # Behavior
/// - Candidates come from the splitter. Gaps the splitter leaves behind
///   are classified too, so unclassifiable input surfaces as
///   `ChainError::UnknownTokenKind` instead of being dropped silently.
/// - The returned iterator is lazy and finite; after yielding an error
///   it is exhausted.
pub fn tokenize(text: &str, with_sentinels: bool) -> Tokens<'_> {
	Tokens {
		text,
		matches: SPLIT_RE.find_iter(text),
		pos: 0,
		pending: None,
		stage: if with_sentinels { Stage::Begin } else { Stage::Body },
		with_sentinels,
	}
}

#[derive(Clone, Copy)]
enum Stage {
	Begin,
	Body,
	End,
	Done,
}

/// Lazy token sequence produced by [`tokenize`].
pub struct Tokens<'t> {
	text: &'t str,
	matches: Matches<'static, 't>,
	pos: usize,
	// Splitter match held back while the gap before it is processed.
	pending: Option<&'t str>,
	stage: Stage,
	with_sentinels: bool,
}

impl<'t> Tokens<'t> {
	/// Returns the next raw candidate: a splitter match, or the
	/// unmatched gap preceding one.
	fn next_candidate(&mut self) -> Option<&'t str> {
		if let Some(candidate) = self.pending.take() {
			return Some(candidate);
		}
		match self.matches.next() {
			Some(found) => {
				if found.start() > self.pos {
					let gap = &self.text[self.pos..found.start()];
					self.pending = Some(found.as_str());
					self.pos = found.end();
					Some(gap)
				} else {
					self.pos = found.end();
					Some(found.as_str())
				}
			}
			None if self.pos < self.text.len() => {
				let gap = &self.text[self.pos..];
				self.pos = self.text.len();
				Some(gap)
			}
			None => None,
		}
	}
}

impl Iterator for Tokens<'_> {
	type Item = ChainResult<Token>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			match self.stage {
				Stage::Begin => {
					self.stage = Stage::Body;
					return Some(Ok(Token::Begin));
				}
				Stage::Body => {
					let Some(candidate) = self.next_candidate() else {
						self.stage = if self.with_sentinels { Stage::End } else { Stage::Done };
						continue;
					};
					match Token::plain(candidate) {
						Ok(token) if token.kind() == Some(TokenKind::Whitespace) => continue,
						Ok(token) => return Some(Ok(token)),
						Err(e) => {
							self.stage = Stage::Done;
							return Some(Err(e));
						}
					}
				}
				Stage::End => {
					self.stage = Stage::Done;
					return Some(Ok(Token::End));
				}
				Stage::Done => return None,
			}
		}
	}
}

/// Rebuilds display text from a token stream.
///
/// One pass with a single token of lookback:
/// - Skips a leading `Begin` and truncates at the first `End`.
/// - Inserts a single space before a word unless the previous token is
///   in the no-space-after set or there is none.
/// - Capitalizes the first emitted token and any token following
///   sentence-ending punctuation.
///
/// Whitespace and original casing are not recoverable; this does not
/// invert [`tokenize`].
pub fn detokenize<I>(tokens: I) -> String
where
	I: IntoIterator<Item = Token>,
{
	let mut out = String::new();
	let mut lookbehind: LookBehind<Token> = LookBehind::new(1);

	for token in tokens {
		match token {
			Token::Begin => continue,
			Token::End => break,
			Token::Plain { .. } => (),
		}

		if let Some(prev) = lookbehind.get(0) {
			if token.kind() == Some(TokenKind::Word) && !NO_SPACE_AFTER.contains(&prev.text()) {
				out.push(' ');
			}
		}

		let capitalize = match lookbehind.get(0) {
			None => true,
			Some(prev) => CAP_NEXT.contains(&prev.text()),
		};
		if capitalize {
			let mut chars = token.text().chars();
			if let Some(first) = chars.next() {
				out.extend(first.to_uppercase());
				out.push_str(chars.as_str());
			}
		} else {
			out.push_str(token.text());
		}

		lookbehind.append(token);
	}

	out
}
