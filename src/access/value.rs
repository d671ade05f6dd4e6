use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Data types supported by the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Double,
    Boolean,
    /// Fixed-length text of up to `n` UTF-16 code units.
    Char(u32),
    /// Variable-length text of up to `n` UTF-16 code units.
    Varchar(u32),
}

/// Total order over the values of one declared type.
pub type KeyComparator = fn(&Value, &Value) -> Ordering;

impl DataType {
    /// Bytes one key of this type takes in a B+Tree node entry.
    pub fn key_width(&self) -> usize {
        match self {
            DataType::Integer | DataType::Boolean => 4,
            DataType::Double => 8,
            DataType::Char(len) | DataType::Varchar(len) => *len as usize * 2,
        }
    }

    /// The comparison function used for keys of this type.
    pub fn key_comparator(&self) -> KeyComparator {
        match self {
            DataType::Integer => compare_integers,
            DataType::Double => compare_doubles,
            DataType::Boolean => compare_booleans,
            DataType::Char(_) | DataType::Varchar(_) => compare_text,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "integer"),
            DataType::Double => write!(f, "double"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Char(len) => write!(f, "char({})", len),
            DataType::Varchar(len) => write!(f, "varchar({})", len),
        }
    }
}

/// Values that can be stored in the database
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i32),
    Double(f64),
    Boolean(bool),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Bytes this value occupies on disk. Nulls are not written.
    pub fn encoded_len(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Boolean(_) => 4,
            Value::Double(_) => 8,
            Value::Text(s) => 4 + s.encode_utf16().count() * 2,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// NULL sorts before every present value.
fn compare_presence(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) | (false, false) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
    }
}

fn compare_integers(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        _ => compare_presence(a, b),
    }
}

fn compare_doubles(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Double(x), Value::Double(y)) => x.total_cmp(y),
        _ => compare_presence(a, b),
    }
}

fn compare_booleans(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        _ => compare_presence(a, b),
    }
}

/// Lexicographic by UTF-16 code unit, case-sensitive.
fn compare_text(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => x.encode_utf16().cmp(y.encode_utf16()),
        _ => compare_presence(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_width() {
        assert_eq!(DataType::Integer.key_width(), 4);
        assert_eq!(DataType::Double.key_width(), 8);
        assert_eq!(DataType::Char(10).key_width(), 20);
        assert_eq!(DataType::Varchar(3).key_width(), 6);
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(Value::Null.encoded_len(), 0);
        assert_eq!(Value::Integer(7).encoded_len(), 4);
        assert_eq!(Value::Boolean(false).encoded_len(), 4);
        assert_eq!(Value::Double(2.0).encoded_len(), 8);
        assert_eq!(Value::Text("abc".to_string()).encoded_len(), 10);
        // Outside the BMP a character takes two code units
        assert_eq!(Value::Text("𝄞".to_string()).encoded_len(), 8);
    }

    #[test]
    fn test_integer_ordering() {
        let cmp = DataType::Integer.key_comparator();
        assert_eq!(cmp(&Value::Integer(-5), &Value::Integer(3)), Ordering::Less);
        assert_eq!(cmp(&Value::Integer(3), &Value::Integer(3)), Ordering::Equal);
        assert_eq!(cmp(&Value::Null, &Value::Integer(i32::MIN)), Ordering::Less);
    }

    #[test]
    fn test_double_ordering() {
        let cmp = DataType::Double.key_comparator();
        assert_eq!(cmp(&Value::Double(0.5), &Value::Double(0.25)), Ordering::Greater);
        assert_eq!(cmp(&Value::Double(-0.0), &Value::Double(0.0)), Ordering::Less);
    }

    #[test]
    fn test_text_ordering_is_case_sensitive() {
        let cmp = DataType::Varchar(10).key_comparator();
        let upper = Value::Text("Zebra".to_string());
        let lower = Value::Text("apple".to_string());
        assert_eq!(cmp(&upper, &lower), Ordering::Less);
        assert_eq!(
            cmp(&Value::Text("ab".to_string()), &Value::Text("abc".to_string())),
            Ordering::Less
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::Char(4).to_string(), "char(4)");
        assert_eq!(Value::Text("hi".to_string()).to_string(), "\"hi\"");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
