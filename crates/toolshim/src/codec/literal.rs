//! Coercion of untyped argument text into JSON values.
//!
//! The tag-delimited and Markdown formats carry every argument as bare text.
//! [`coerce`] guesses the intended type, trying in order:
//!
//! 1. `true` / `false` in any case
//! 2. an integer
//! 3. a finite float
//! 4. a list or dict literal (see [`pylit`](super::pylit))
//! 5. the trimmed text itself
//!
//! Quoted text is *not* unwrapped: `'foo'` stays `'foo'`, quotes included.
//! Callers rely on this, so it is kept as is. Tuple literals such as
//! `(10, 20)` also stay text.

use serde_json::{Number, Value};

use super::pylit::{self, Literal};

pub fn coerce(fragment: &str) -> Value {
    let text = fragment.trim();

    if text.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = text.parse::<u64>() {
        return Value::from(u);
    }
    if let Some(n) = text.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    if let Ok(literal @ (Literal::List(_) | Literal::Dict(_))) = pylit::parse_literal(text)
        && let Ok(value) = literal.into_value()
    {
        return value;
    }
    Value::String(text.to_string())
}
