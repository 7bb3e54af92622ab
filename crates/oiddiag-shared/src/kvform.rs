//! Key-value form codec (`key:value` lines) used by association responses.

use crate::error::DiagError;

/// Encode pairs as newline-terminated `key:value` lines.
pub fn encode<K, V>(pairs: &[(K, V)]) -> Result<String, DiagError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = String::new();
    for (key, value) in pairs {
        let (key, value) = (key.as_ref(), value.as_ref());
        if key.contains(':') || key.contains('\n') {
            return Err(DiagError::Protocol(format!("invalid kvform key: {:?}", key)));
        }
        if value.contains('\n') {
            return Err(DiagError::Protocol(format!(
                "invalid kvform value for {}: contains newline",
                key
            )));
        }
        out.push_str(key);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }
    Ok(out)
}

/// Parse `key:value` lines. Blank lines are skipped, whitespace around keys
/// and values is trimmed, and the first `:` splits key from value.
pub fn parse(text: &str) -> Result<Vec<(String, String)>, DiagError> {
    let mut pairs = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line.split_once(':').ok_or_else(|| {
            DiagError::Protocol(format!("kvform line {} has no ':' separator", index + 1))
        })?;
        pairs.push((key.trim().to_string(), value.trim().to_string()));
    }
    Ok(pairs)
}

/// Last value for `key`, matching how a later line overrides an earlier one.
pub fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
