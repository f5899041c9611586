//! Shell quoting for generated scripts.

/// Quote `s` as a single POSIX shell word.
///
/// Words made only of safe characters are returned unchanged.
pub fn quote(s: &str) -> String {
  let safe = !s.is_empty()
    && s
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | '=' | ':' | ',' | '@' | '%'));
  if safe {
    return s.to_string();
  }
  format!("'{}'", s.replace('\'', r"'\''"))
}

/// Quote each word and join them with spaces.
pub fn join<I, S>(words: I) -> String
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  words.into_iter().map(|w| quote(w.as_ref())).collect::<Vec<_>>().join(" ")
}
