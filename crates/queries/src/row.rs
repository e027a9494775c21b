//! Row mapping traits and utilities

use crate::driver::Value;
use crate::error::{DbError, DbResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// One row of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Raw value at position `idx`.
    pub fn get_value(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Raw value of `column`.
    pub fn value(&self, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    /// Decode `column`, returning [`DbError::Decode`] if it is missing or
    /// cannot be converted.
    pub fn try_get<T: FromValue>(&self, column: &str) -> DbResult<T> {
        self.try_get_opt(column)?
            .ok_or_else(|| DbError::decode(column, "column not found"))
    }

    /// Decode `column`, or `None` if the result has no such column.
    pub fn try_get_opt<T: FromValue>(&self, column: &str) -> DbResult<Option<T>> {
        match self.value(column) {
            Some(value) => T::from_value(value)
                .map(Some)
                .map_err(|message| DbError::decode(column, message)),
            None => Ok(None),
        }
    }

    /// Decode the value at position `idx`.
    pub fn try_get_idx<T: FromValue>(&self, idx: usize) -> DbResult<T> {
        let column = self
            .columns
            .get(idx)
            .map_or_else(|| idx.to_string(), Clone::clone);
        let value = self
            .values
            .get(idx)
            .ok_or_else(|| DbError::decode(&column, "column index out of range"))?;
        T::from_value(value).map_err(|message| DbError::decode(column, message))
    }
}

/// Conversion from a driver [`Value`] into a Rust type.
///
/// Integer conversions are range-checked. `NULL` only converts into
/// `Option<T>`.
pub trait FromValue: Sized {
    /// Convert, describing the problem on failure.
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch<T>(value: &Value, target: &str) -> Result<T, String> {
    match value {
        Value::Null => Err(format!("unexpected NULL for {target}")),
        other => Err(format!("cannot convert {} into {target}", other.kind())),
    }
}

macro_rules! impl_from_value_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self, String> {
                    match value {
                        Value::Int(i) => <$t>::try_from(*i).map_err(|_| {
                            format!("{i} is out of range for {}", stringify!($t))
                        }),
                        Value::Text(s) => s.trim().parse::<$t>().map_err(|e| e.to_string()),
                        other => mismatch(other, stringify!($t)),
                    }
                }
            }
        )*
    };
}

impl_from_value_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_from_value_float {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self, String> {
                    match value {
                        Value::Float(f) => Ok(*f as $t),
                        Value::Int(i) => Ok(*i as $t),
                        Value::Text(s) => s.trim().parse::<$t>().map_err(|e| e.to_string()),
                        other => mismatch(other, stringify!($t)),
                    }
                }
            }
        )*
    };
}

impl_from_value_float!(f32, f64);

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            Value::Text(s) => match s.as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(format!("cannot parse {s:?} as bool")),
            },
            other => mismatch(other, "bool"),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone()).map_err(|e| e.to_string()),
            Value::Null => mismatch(value, "String"),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.clone().into_bytes()),
            other => mismatch(other, "Vec<u8>"),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::Text(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| e.to_string()),
            other => mismatch(other, "DateTime<Utc>"),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Trait for types that can be constructed from a database [`Row`].
///
/// Scalars decode single-column results. Structs derive it:
///
/// ```ignore
/// use queries::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     #[sql(column = "id")]
///     id: i64,
///     #[sql(column = "name")]
///     name: String,
///     // untagged: always `Default::default()`
///     cached: Option<String>,
/// }
/// ```
///
/// A derived struct maps each result column to the field tagged with it;
/// a result column without a tagged field is [`DbError::NoStructField`],
/// and a tagged field whose column is absent keeps its default value.
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> DbResult<Self>;
}

fn from_single_column<T: FromValue>(row: &Row) -> DbResult<T> {
    match row.len() {
        0 => Err(DbError::NoColumns),
        1 => row.try_get_idx(0),
        n => Err(DbError::NonStructT(n)),
    }
}

macro_rules! impl_from_row_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromRow for $t {
                fn from_row(row: &Row) -> DbResult<Self> {
                    from_single_column(row)
                }
            }
        )*
    };
}

impl_from_row_scalar!(
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    bool,
    String,
    Vec<u8>,
    DateTime<Utc>,
    Value,
);

impl<T: FromValue> FromRow for Option<T> {
    fn from_row(row: &Row) -> DbResult<Self> {
        from_single_column(row)
    }
}

/// Check that every result column has a tagged field. Used by
/// `#[derive(FromRow)]`.
#[doc(hidden)]
pub fn check_columns(row: &Row, tagged: &[&str]) -> DbResult<()> {
    if row.is_empty() {
        return Err(DbError::NoColumns);
    }
    match row.columns().iter().find(|c| !tagged.contains(&c.as_str())) {
        Some(column) => Err(DbError::NoStructField(column.clone())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(columns: &[&str], values: Vec<Value>) -> Row {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        Row::new(columns.into(), values)
    }

    #[test]
    fn test_scalar_single_column() {
        let r = row(&["n"], vec![Value::Int(42)]);
        assert_eq!(i32::from_row(&r).unwrap(), 42);
        assert_eq!(String::from_row(&r).unwrap(), "42");
        assert_eq!(Option::<i64>::from_row(&r).unwrap(), Some(42));
    }

    #[test]
    fn test_scalar_column_count_errors() {
        let empty = row(&[], vec![]);
        assert!(matches!(i64::from_row(&empty), Err(DbError::NoColumns)));

        let two = row(&["a", "b"], vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(i64::from_row(&two), Err(DbError::NonStructT(2))));
    }

    #[test]
    fn test_integer_range_checked() {
        let r = row(&["n"], vec![Value::Int(300)]);
        let err = u8::from_row(&r).unwrap_err();
        assert!(matches!(&err, DbError::Decode { column, .. } if column == "n"));
        assert!(err.to_string().contains("out of range"));
        assert_eq!(u16::from_row(&r).unwrap(), 300);

        let negative = row(&["n"], vec![Value::Int(-1)]);
        assert!(u64::from_row(&negative).is_err());
    }

    #[test]
    fn test_null_handling() {
        let r = row(&["n"], vec![Value::Null]);
        assert_eq!(Option::<String>::from_row(&r).unwrap(), None);
        let err = String::from_row(&r).unwrap_err();
        assert!(err.to_string().contains("unexpected NULL"));
    }

    #[test]
    fn test_try_get_by_name() {
        let now = Utc::now();
        let r = row(
            &["id", "name", "created_at", "flag"],
            vec![
                Value::Int(1),
                Value::Text("alice".into()),
                Value::Time(now),
                Value::Int(1),
            ],
        );
        assert_eq!(r.try_get::<i64>("id").unwrap(), 1);
        assert_eq!(r.try_get::<String>("name").unwrap(), "alice");
        assert_eq!(r.try_get::<DateTime<Utc>>("created_at").unwrap(), now);
        assert!(r.try_get::<bool>("flag").unwrap());
        assert_eq!(r.try_get_opt::<i64>("missing").unwrap(), None);
        assert!(matches!(
            r.try_get::<i64>("missing"),
            Err(DbError::Decode { .. })
        ));
        assert!(r.try_get::<i64>("name").is_err());
    }

    #[cfg(feature = "derive")]
    #[test]
    fn test_derived_struct() {
        #[derive(Debug, PartialEq, queries_derive::FromRow)]
        struct User {
            #[sql(column = "id")]
            id: i64,
            #[sql(column = "name")]
            name: Option<String>,
            #[sql(column = "age")]
            age: i32,
            untagged: String,
        }

        let r = row(&["name", "id"], vec![Value::Text("bob".into()), Value::Int(7)]);
        assert_eq!(
            User::from_row(&r).unwrap(),
            User {
                id: 7,
                name: Some("bob".into()),
                age: 0,
                untagged: String::new(),
            }
        );

        let r = row(&["id", "email"], vec![Value::Int(7), Value::Null]);
        assert!(matches!(
            User::from_row(&r),
            Err(DbError::NoStructField(column)) if column == "email"
        ));
    }

    #[test]
    fn test_check_columns() {
        let r = row(&["id", "extra"], vec![Value::Int(1), Value::Int(2)]);
        assert!(check_columns(&r, &["id", "extra", "unused"]).is_ok());
        assert!(matches!(
            check_columns(&r, &["id"]),
            Err(DbError::NoStructField(column)) if column == "extra"
        ));
        assert!(matches!(
            check_columns(&row(&[], vec![]), &["id"]),
            Err(DbError::NoColumns)
        ));
    }
}
