//! Derive macro for velvet-orm model types.
//!
//! `#[derive(Model)]` turns a named-field struct into a persistable
//! model: the macro emits the ordered column descriptors, value
//! encoding, row materialization, and identity accessors that
//! `velvet_orm::Model` requires.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Expr, Fields, Ident, Lit, Meta, Type, parse_macro_input};

/// Derives `velvet_orm::Model` for a struct with named fields.
///
/// Columns are taken from the fields in declaration order. A field whose
/// column name is `id` (compared case-insensitively) becomes the
/// auto-incrementing identity column and must be `i64` or `Option<i64>`;
/// it is excluded from INSERT and UPDATE value lists and receives the
/// database-assigned value after an insert.
///
/// # Field Attributes
///
/// - `#[column(name = "column_name")]` — overrides the column name
///   (defaults to the field name).
///
/// # Example
///
/// ```ignore
/// use velvet_orm::Model;
///
/// #[derive(Model)]
/// struct Track {
///     id: i64,
///     name: String,
///     score: f64,
/// }
/// ```
#[proc_macro_derive(Model, attributes(column))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_model_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

struct ColumnInfo {
    field_name: Ident,
    field_type: Type,
    column_name: String,
    is_identity: bool,
}

fn derive_model_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Model derive only supports structs",
            ));
        }
    };

    if fields.is_empty() {
        return Err(syn::Error::new_spanned(
            &input,
            "Model derive requires at least one field",
        ));
    }

    let mut columns: Vec<ColumnInfo> = Vec::new();
    for field in fields {
        let field_name = field.ident.clone().unwrap();
        let column_name =
            parse_column_name(&field.attrs)?.unwrap_or_else(|| field_name.to_string());

        if !is_valid_column_name(&column_name) {
            return Err(syn::Error::new_spanned(
                field,
                format!(
                    "column name `{column_name}` must start with a letter or underscore \
                     and contain only letters, digits, and underscores"
                ),
            ));
        }

        if columns
            .iter()
            .any(|existing| existing.column_name.eq_ignore_ascii_case(&column_name))
        {
            return Err(syn::Error::new_spanned(
                field,
                format!("duplicate column name `{column_name}` (names are case-insensitive)"),
            ));
        }

        let is_identity = column_name.eq_ignore_ascii_case("id");
        if is_identity && identity_shape(&field.ty).is_none() {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "identity column `id` must be of type i64 or Option<i64>",
            ));
        }

        columns.push(ColumnInfo {
            field_name,
            field_type: field.ty.clone(),
            column_name,
            is_identity,
        });
    }

    let model_name = struct_name.to_string();

    let descriptor_entries: Vec<TokenStream2> = columns
        .iter()
        .map(|column| {
            let name = &column.column_name;
            let ty = &column.field_type;
            let identity = column.is_identity;
            quote! {
                ::velvet_orm::ColumnDescriptor {
                    name: #name,
                    kind: <#ty as ::velvet_orm::ColumnValue>::KIND,
                    identity: #identity,
                }
            }
        })
        .collect();

    let value_entries: Vec<TokenStream2> = columns
        .iter()
        .map(|column| {
            let field = &column.field_name;
            let name = &column.column_name;
            quote! {
                ::velvet_orm::materialize::encode(&self.#field, #name)?
            }
        })
        .collect();

    let row_entries: Vec<TokenStream2> = columns
        .iter()
        .map(|column| {
            let field = &column.field_name;
            let name = &column.column_name;
            quote! {
                #field: ::velvet_orm::materialize::read(row, #name)?
            }
        })
        .collect();

    let identity_field = columns.iter().find(|column| column.is_identity);
    let (identity_getter, identity_setter) = match identity_field {
        Some(column) => {
            let field = &column.field_name;
            match identity_shape(&column.field_type) {
                Some(IdentityShape::Plain) => (
                    quote! { ::std::option::Option::Some(self.#field) },
                    quote! { self.#field = id; },
                ),
                _ => (
                    quote! { self.#field },
                    quote! { self.#field = ::std::option::Option::Some(id); },
                ),
            }
        }
        None => (
            quote! { ::std::option::Option::None },
            quote! { let _ = id; },
        ),
    };

    Ok(quote! {
        impl ::velvet_orm::Model for #struct_name {
            const NAME: &'static str = #model_name;

            fn columns() -> &'static [::velvet_orm::ColumnDescriptor] {
                const COLUMNS: &[::velvet_orm::ColumnDescriptor] = &[
                    #(#descriptor_entries),*
                ];
                COLUMNS
            }

            fn values(
                &self,
            ) -> ::velvet_orm::Result<::std::vec::Vec<::velvet_orm::SqlValue>> {
                ::std::result::Result::Ok(::std::vec::Vec::from([
                    #(#value_entries),*
                ]))
            }

            fn identity(&self) -> ::std::option::Option<i64> {
                #identity_getter
            }

            fn set_identity(&mut self, id: i64) {
                #identity_setter
            }

            fn from_row(
                row: &::velvet_orm::sqlx::sqlite::SqliteRow,
            ) -> ::velvet_orm::Result<Self> {
                ::std::result::Result::Ok(Self {
                    #(#row_entries),*
                })
            }
        }
    })
}

enum IdentityShape {
    Plain,
    Optional,
}

/// Recognizes the two accepted identity field types.
fn identity_shape(ty: &Type) -> Option<IdentityShape> {
    let rendered = quote!(#ty).to_string().replace(' ', "");
    match rendered.as_str() {
        "i64" => Some(IdentityShape::Plain),
        "Option<i64>"
        | "std::option::Option<i64>"
        | "core::option::Option<i64>"
        | "::std::option::Option<i64>"
        | "::core::option::Option<i64>" => Some(IdentityShape::Optional),
        _ => None,
    }
}

fn parse_column_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut name = None;
    for attr in attrs {
        if attr.path().is_ident("column") {
            // Bare `#[column]` carries no information.
            if matches!(attr.meta, Meta::Path(_)) {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: Expr = meta.value()?.parse()?;
                    if let Expr::Lit(lit) = value {
                        if let Lit::Str(s) = lit.lit {
                            name = Some(s.value());
                            return Ok(());
                        }
                    }
                    return Err(meta.error("expected a string literal column name"));
                }
                Err(meta.error("unsupported column attribute"))
            })?;
        }
    }
    Ok(name)
}

/// Column names double as statement parameter names, so they are held
/// to identifier rules.
fn is_valid_column_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
