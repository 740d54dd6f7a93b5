//! `key = value` pair lists.
//!
//! Backs the v2.0 serialization header and the `{ stream: …, mode: … }`
//! key-value open syntax. Values may be bare (non-whitespace) or
//! single-quoted with backslash escapes.

/// One `(key, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefValue {
    pub key: String,
    pub value: String,
}

/// Ordered pair list with a recycling pool.
///
/// The pool keeps the allocations of cleared entries alive so that a
/// parser invoked once per object does not churn the allocator.
#[derive(Debug, Default)]
pub struct RefValueList {
    items: Vec<RefValue>,
    pool: Vec<RefValue>,
}

impl RefValueList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RefValue> {
        self.items.iter()
    }

    pub fn find(&self, key: &str) -> Option<&str> {
        self.items.iter().find(|rv| rv.key == key).map(|rv| rv.value.as_str())
    }

    /// Insert or replace a pair, reusing a pooled node when available.
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(rv) = self.items.iter_mut().find(|rv| rv.key == key) {
            rv.value.clear();
            rv.value.push_str(value);
            return;
        }
        let mut rv = self.pool.pop().unwrap_or(RefValue { key: String::new(), value: String::new() });
        rv.key.clear();
        rv.key.push_str(key);
        rv.value.clear();
        rv.value.push_str(value);
        self.items.push(rv);
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.items.iter().position(|rv| rv.key == key) {
            Some(idx) => {
                self.pool.push(self.items.remove(idx));
                true
            }
            None => false,
        }
    }

    /// Move all entries back to the pool.
    pub fn clear(&mut self) {
        self.pool.append(&mut self.items);
    }

    /// Parse `key = value` / `key = 'quoted value'` pairs from `input`,
    /// replacing the current contents. `key: value` is accepted as well,
    /// for the key-value channel open syntax.
    pub fn parse_pairs(&mut self, input: &str) {
        self.clear();
        let mut rest = input.trim_start();
        while !rest.is_empty() {
            let Some((key, after_key)) = take_token(rest) else { break };
            let after_key = after_key.trim_start();
            let Some(after_eq) = after_key
                .strip_prefix('=')
                .or_else(|| after_key.strip_prefix(':'))
            else {
                // A stray token without a separator; skip it.
                rest = after_key;
                continue;
            };
            let after_eq = after_eq.trim_start();
            let (value, after_value) = take_value(after_eq);
            self.set(key, &value);
            rest = after_value.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        }
    }
}

fn take_token(input: &str) -> Option<(&str, &str)> {
    let end = input
        .find(|c: char| c.is_whitespace() || c == '=' || c == ':')
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    Some((&input[..end], &input[end..]))
}

/// Take a bare or single-quoted value; returns `(value, rest)`.
fn take_value(input: &str) -> (String, &str) {
    if let Some(body) = input.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = body.char_indices();
        while let Some((idx, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                }
                '\'' => return (value, &body[idx + 1..]),
                other => value.push(other),
            }
        }
        // Unterminated quote: consume everything.
        (value, "")
    } else {
        let end = input
            .find(|c: char| c.is_whitespace() || c == ',')
            .unwrap_or(input.len());
        (input[..end].to_string(), &input[end..])
    }
}

/// Render a value in header syntax, quoting when needed.
pub fn render_value(value: &str) -> String {
    let needs_quote = value.is_empty()
        || value.contains(|c: char| c.is_whitespace() || c == '\'' || c == '=');
    if !needs_quote {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_quoted_pairs_in_any_order() {
        let mut list = RefValueList::new();
        list.parse_pairs("name = point type = 'Point' objSize =         43 format = Binary");
        assert_eq!(list.find("type"), Some("Point"));
        assert_eq!(list.find("name"), Some("point"));
        assert_eq!(list.find("objSize"), Some("43"));
        assert_eq!(list.find("format"), Some("Binary"));
        assert_eq!(list.find("opts"), None);
    }

    #[test]
    fn quoted_value_keeps_spaces_and_escapes() {
        let mut list = RefValueList::new();
        list.parse_pairs(r"opts = 'a b \' c'");
        assert_eq!(list.find("opts"), Some("a b ' c"));
    }

    #[test]
    fn set_reuses_pooled_nodes_after_clear() {
        let mut list = RefValueList::new();
        list.set("a", "1");
        list.set("b", "2");
        list.clear();
        assert!(list.is_empty());
        list.set("c", "3");
        assert_eq!(list.find("c"), Some("3"));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn render_quotes_only_when_needed() {
        assert_eq!(render_value("Binary"), "Binary");
        assert_eq!(render_value("two words"), "'two words'");
        assert_eq!(render_value(""), "''");
    }
}
