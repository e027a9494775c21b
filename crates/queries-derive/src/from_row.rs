//! FromRow derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use std::collections::HashSet;
use syn::{Data, DeriveInput, Fields, LitStr, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "FromRow can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "FromRow can only be derived for structs",
            ));
        }
    };

    let mut columns = Vec::new();
    let mut seen = HashSet::new();
    let mut field_extracts = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        match get_column_name(field)? {
            Some(column) => {
                if !seen.insert(column.value()) {
                    return Err(syn::Error::new_spanned(
                        &column,
                        format!("column {:?} is mapped by more than one field", column.value()),
                    ));
                }
                field_extracts.push(quote! {
                    #field_name: row.try_get_opt(#column)?.unwrap_or_default()
                });
                columns.push(column);
            }
            None => field_extracts.push(quote! {
                #field_name: ::core::default::Default::default()
            }),
        }
    }

    Ok(quote! {
        impl #impl_generics ::queries::FromRow for #name #ty_generics #where_clause {
            fn from_row(row: &::queries::Row) -> ::queries::DbResult<Self> {
                ::queries::row::check_columns(row, &[#(#columns),*])?;
                Ok(Self {
                    #(#field_extracts),*
                })
            }
        }
    })
}

/// The column named by `#[sql(column = "...")]`, if the field has one.
fn get_column_name(field: &syn::Field) -> Result<Option<LitStr>> {
    let mut column = None;
    for attr in &field.attrs {
        if !attr.path().is_ident("sql") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                let lit: LitStr = meta.value()?.parse()?;
                if lit.value().is_empty() {
                    return Err(meta.error("column name must not be empty"));
                }
                column = Some(lit);
                Ok(())
            } else {
                Err(meta.error("unsupported sql attribute, expected `column = \"...\"`"))
            }
        })?;
    }
    Ok(column)
}
