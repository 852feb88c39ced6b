/// An ordered header list with case-insensitive lookup.
///
/// Kept as a flat `Vec` rather than a `HashMap`: request header counts are
/// small, insertion order matters for re-emitting them, and a linear scan
/// with `eq_ignore_ascii_case` is simpler than carrying a normalized-key
/// wrapper type through the rest of the crate.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a header. If a header with the same name (case-insensitive)
    /// already exists, the new value is combined into it with `,` — unless
    /// the new value is empty, in which case the existing value is kept
    /// as-is (an empty duplicate is silently skipped, not joined in).
    pub fn append(&mut self, name: &str, value: &str) {
        if let Some((_, existing)) = self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            if !existing.is_empty() && !value.is_empty() {
                existing.push(',');
                existing.push_str(value);
            } else if existing.is_empty() {
                *existing = value.to_string();
            }
        } else {
            self.entries.push((name.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True if `name`'s combined value contains `needle` as a
    /// case-insensitive substring token — the pattern used to test for a
    /// token inside a comma-separated header like `Connection: Upgrade` or
    /// `Accept-Encoding: gzip, deflate`.
    pub fn contains_token(&self, name: &str, needle: &str) -> bool {
        match self.get(name) {
            Some(value) => value
                .split(',')
                .any(|part| part.trim().eq_ignore_ascii_case(needle)),
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
