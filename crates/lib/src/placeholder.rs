//! Placeholder parsing and substitution for deferred value resolution.
//!
//! Recipes are written before any build directory or input path exists.
//! Placeholders let string fields of data actions refer to those values; they
//! are resolved right before the action runs.
//!
//! # Placeholder Formats
//!
//! - `$${out}` - the build's output root
//! - `$${source}` - the current working directory (the unpacked source)
//! - `$${input:<name>}` - default output of a declared input
//! - `$${input:<name>:<output>}` - a named output of a declared input
//!
//! # Shell Variables
//!
//! Single `$` characters pass through unchanged, so shell variables like
//! `$HOME` and `$PATH` work naturally without any escaping.
//!
//! # Escaping
//!
//! Use `$$$` before `{` to produce a literal `$${` sequence.
//!
//! # Example
//!
//! ```
//! use phasekit_lib::placeholder::{parse, Segment, Placeholder};
//!
//! let segments = parse("$${input:perl}/bin/perl -w").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Placeholder(Placeholder::Input { name: "perl".to_string(), output: None }),
//!     Segment::Literal("/bin/perl -w".to_string()),
//! ]);
//! ```

use thiserror::Error;

/// A parsed placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  /// `$${out}`
  Out,

  /// `$${source}`
  Source,

  /// `$${input:<name>}` or `$${input:<name>:<output>}`
  Input { name: String, output: Option<String> },
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A placeholder to be resolved
  Placeholder(Placeholder),
}

/// Errors that can occur during placeholder parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder type: {0}")]
  UnknownType(String),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("cannot resolve input placeholder '{name}': {message}")]
  UnresolvedInput { name: String, message: String },
}

/// Trait for resolving placeholder values during execution.
pub trait Resolver {
  /// Resolve the output root of the current build.
  fn resolve_out(&self) -> Result<String, PlaceholderError>;

  /// Resolve the current working directory.
  fn resolve_source(&self) -> Result<String, PlaceholderError>;

  /// Resolve an input path by name and optional output selector.
  fn resolve_input(&self, name: &str, output: Option<&str>) -> Result<String, PlaceholderError>;
}

/// Parse a string containing placeholders into segments.
///
/// # Errors
///
/// Returns an error if a placeholder is malformed (unclosed, unknown type, etc.)
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next(); // consume the second $

        match chars.peek() {
          Some((_, '$')) => {
            chars.next(); // consume the third $

            match chars.peek() {
              Some((_, '{')) => {
                // Escaped: $$${ -> $${ (literal)
                literal.push_str("$${");
                chars.next();
              }
              _ => literal.push_str("$$$"),
            }
          }
          Some((_, '{')) => {
            chars.next(); // consume the {

            if !literal.is_empty() {
              segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let mut content = String::new();
            let mut found_close = false;

            for (_, c) in chars.by_ref() {
              if c == '}' {
                found_close = true;
                break;
              }
              content.push(c);
            }

            if !found_close {
              return Err(PlaceholderError::Unclosed(pos));
            }

            segments.push(Segment::Placeholder(parse_placeholder_content(&content)?));
          }
          _ => literal.push_str("$$"),
        }
      }
      // A lone $ is a shell variable and passes through.
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse the content inside a placeholder (everything between `$${` and `}`).
fn parse_placeholder_content(content: &str) -> Result<Placeholder, PlaceholderError> {
  match content {
    "out" => return Ok(Placeholder::Out),
    "source" => return Ok(Placeholder::Source),
    _ => {}
  }

  let (kind, rest) = content
    .split_once(':')
    .ok_or_else(|| PlaceholderError::UnknownType(content.to_string()))?;

  match kind {
    "input" => {
      let (name, output) = match rest.split_once(':') {
        Some((name, output)) => (name, Some(output)),
        None => (rest, None),
      };
      if name.is_empty() || output.is_some_and(str::is_empty) {
        return Err(PlaceholderError::Malformed(format!("empty name in '{content}'")));
      }
      Ok(Placeholder::Input {
        name: name.to_string(),
        output: output.map(str::to_string),
      })
    }
    _ => Err(PlaceholderError::UnknownType(kind.to_string())),
  }
}

/// Substitute all placeholders in a string using the provided resolver.
///
/// # Errors
///
/// Returns an error if parsing fails or if any placeholder cannot be resolved.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

/// Substitute placeholders in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(p) => {
        let value = match p {
          Placeholder::Out => resolver.resolve_out()?,
          Placeholder::Source => resolver.resolve_source()?,
          Placeholder::Input { name, output } => resolver.resolve_input(name, output.as_deref())?,
        };
        result.push_str(&value);
      }
    }
  }

  Ok(result)
}

/// Substitute placeholders in every string of a slice.
pub fn substitute_all(inputs: &[String], resolver: &impl Resolver) -> Result<Vec<String>, PlaceholderError> {
  inputs.iter().map(|s| substitute(s, resolver)).collect()
}
