//! Derive macros for queries
//!
//! Provides `#[derive(FromRow)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod from_row;

/// Derive `FromRow` trait for a struct.
///
/// # Example
///
/// ```ignore
/// use queries::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     #[sql(column = "id")]
///     id: i64,
///     #[sql(column = "email_address")]
///     email: Option<String>,
///     // Not read from the row.
///     cached_avatar: Option<Vec<u8>>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[sql(column = "name")]` - Read the field from column `name`
///
/// Untagged fields are ignored and take `Default::default()`, as does a tagged
/// field whose column is missing from the result. Every field therefore needs
/// a `Default` type. A result column with no tagged field fails the row with
/// `DbError::NoStructField`.
#[proc_macro_derive(FromRow, attributes(sql))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
