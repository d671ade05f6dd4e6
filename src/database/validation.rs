//! Checks a row must pass before it is stored.

use crate::access::{DataType, Value};
use crate::catalog::{Attribute, TableSchema};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstraintViolation {
    #[error("Table '{table}' has {expected} attributes, row has {actual} values")]
    Arity {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("Value {value} does not match type {data_type} of attribute '{attribute}'")]
    TypeMismatch {
        attribute: String,
        data_type: DataType,
        value: String,
    },

    #[error("Attribute '{attribute}' is char({expected}) but got {actual} characters")]
    CharLength {
        attribute: String,
        expected: usize,
        actual: usize,
    },

    #[error("Attribute '{attribute}' is varchar({max}) but got {actual} characters")]
    VarcharTooLong {
        attribute: String,
        max: usize,
        actual: usize,
    },

    #[error("Attribute '{0}' cannot be null")]
    NullValue(String),

    #[error("Duplicate primary key {key} in table '{table}'")]
    DuplicateKey { table: String, key: String },

    #[error("Duplicate value {value} for unique attribute '{attribute}'")]
    DuplicateUnique { attribute: String, value: String },
}

/// Check arity, types, text lengths and not-null constraints of a row.
pub fn check_row(schema: &TableSchema, row: &[Value]) -> Result<(), ConstraintViolation> {
    if row.len() != schema.attributes.len() {
        return Err(ConstraintViolation::Arity {
            table: schema.name.clone(),
            expected: schema.attributes.len(),
            actual: row.len(),
        });
    }
    for (attr, value) in schema.attributes.iter().zip(row) {
        check_value(attr, value)?;
    }
    Ok(())
}

/// Check one value against its attribute.
pub fn check_value(attr: &Attribute, value: &Value) -> Result<(), ConstraintViolation> {
    let text = match (value, attr.data_type) {
        (Value::Null, _) => {
            if attr.not_null {
                return Err(ConstraintViolation::NullValue(attr.name.clone()));
            }
            return Ok(());
        }
        (Value::Integer(_), DataType::Integer)
        | (Value::Double(_), DataType::Double)
        | (Value::Boolean(_), DataType::Boolean) => return Ok(()),
        (Value::Text(text), DataType::Char(_) | DataType::Varchar(_)) => text,
        _ => {
            return Err(ConstraintViolation::TypeMismatch {
                attribute: attr.name.clone(),
                data_type: attr.data_type,
                value: value.to_string(),
            })
        }
    };

    let actual = text.encode_utf16().count();
    match attr.data_type {
        DataType::Char(len) if actual != len as usize => Err(ConstraintViolation::CharLength {
            attribute: attr.name.clone(),
            expected: len as usize,
            actual,
        }),
        DataType::Varchar(len) if actual > len as usize => {
            Err(ConstraintViolation::VarcharTooLong {
                attribute: attr.name.clone(),
                max: len as usize,
                actual,
            })
        }
        _ => Ok(()),
    }
}
