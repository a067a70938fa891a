use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Attribute, Data, DeriveInput, Error, Field, Fields, GenericArgument, Ident, LitStr,
    PathArguments, Type,
};

// derive_entity
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };
    match expand(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

///
/// ColumnSpec
///

struct ColumnSpec<'a> {
    ident: &'a Ident,
    variant: Ident,
    logical: String,
    ty: &'a Type,
    /// `T` for `Option<T>`, the field type otherwise
    inner: &'a Type,
    optional: bool,
    primary_key: bool,
    table: Option<LitStr>,
    column: Option<LitStr>,
    join: Option<LitStr>,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(Error::new_spanned(
                &input.ident,
                "Entity can only be derived for structs with named fields",
            ));
        }
    };

    let source = entity_source(&input.attrs, &input.ident)?;
    let columns = fields
        .iter()
        .map(|field| column_spec(field, &source))
        .collect::<syn::Result<Vec<_>>>()?;

    let primary_keys: Vec<_> = columns.iter().filter(|c| c.primary_key).collect();
    if primary_keys.len() > 1 {
        return Err(Error::new_spanned(
            primary_keys[1].ident,
            "only one field can be the primary key",
        ));
    }

    let ident = &input.ident;
    let vis = &input.vis;
    let entity_name = ident.to_string();
    let field_enum = format_ident!("{}Field", ident);
    let field_enum_doc = format!("Fields of [`{ident}`].");

    let variants: Vec<&Ident> = columns.iter().map(|c| &c.variant).collect();
    let logical: Vec<&str> = columns.iter().map(|c| c.logical.as_str()).collect();

    let defs = columns.iter().map(|c| column_def(c, &field_enum, &source));
    let hydrate = columns.iter().map(|c| {
        let field = c.ident;
        let name = &c.logical;
        let inner = c.inner;
        let ty = c.ty;
        if c.optional {
            quote! { #field: row.optional::<#inner>(#name)? }
        } else {
            quote! { #field: row.required::<#ty>(#name)? }
        }
    });
    let dehydrate = columns.iter().map(|c| {
        let field = c.ident;
        let variant = &c.variant;
        if c.optional {
            quote! { #field_enum::#variant => ::quickfeather::orm::dehydrate_optional(&self.#field) }
        } else {
            quote! { #field_enum::#variant => ::quickfeather::orm::dehydrate(&self.#field) }
        }
    });
    let id = match primary_keys.first() {
        Some(pk) => {
            let field = pk.ident;
            quote! { ::quickfeather::orm::IdValue::id_value(&self.#field) }
        }
        None => quote! { None },
    };

    Ok(quote! {
        #[doc = #field_enum_doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #vis enum #field_enum {
            #(#variants),*
        }

        impl ::quickfeather::orm::EntityField for #field_enum {
            fn name(self) -> &'static str {
                match self {
                    #(#field_enum::#variants => #logical),*
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    #(#logical => Some(#field_enum::#variants),)*
                    _ => None,
                }
            }
        }

        impl ::quickfeather::orm::Entity for #ident {
            const NAME: &'static str = #entity_name;
            const SOURCE: &'static str = #source;

            type Field = #field_enum;

            fn columns() -> &'static [::quickfeather::orm::ColumnDef<#field_enum>] {
                const COLUMNS: &[::quickfeather::orm::ColumnDef<#field_enum>] = &[#(#defs),*];
                COLUMNS
            }

            fn from_row(
                mut row: ::quickfeather::orm::HydratedRow,
            ) -> ::quickfeather::error::Result<Self> {
                Ok(Self {
                    #(#hydrate),*
                })
            }

            fn field_value(&self, field: #field_enum) -> ::quickfeather::orm::SqlValue {
                match field {
                    #(#dehydrate),*
                }
            }

            fn id(&self) -> Option<i64> {
                #id
            }
        }

        impl ::quickfeather::orm::FieldType for #ident {
            const KIND: ::quickfeather::orm::FieldKind = ::quickfeather::orm::FieldKind::Entity;

            fn from_column(
                value: ::quickfeather::orm::ColumnValue,
            ) -> ::quickfeather::error::Result<Self> {
                ::quickfeather::orm::hydrate_nested_one::<Self>(value)
            }

            fn to_sql_value(&self) -> ::quickfeather::orm::SqlValue {
                match ::quickfeather::orm::Entity::id(self) {
                    Some(id) => ::quickfeather::orm::SqlValue::Int(id),
                    None => ::quickfeather::orm::SqlValue::Null,
                }
            }
        }
    })
}

fn entity_source(attrs: &[Attribute], ident: &Ident) -> syn::Result<LitStr> {
    let mut source = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("source") {
                source = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported entity attribute, expected `source`"))
            }
        })?;
    }
    match source {
        Some(source) if !source.value().is_empty() => Ok(source),
        _ => Err(Error::new_spanned(
            ident,
            "missing #[entity(source = \"...\")] attribute",
        )),
    }
}

fn column_spec<'a>(field: &'a Field, source: &LitStr) -> syn::Result<ColumnSpec<'a>> {
    let Some(ident) = field.ident.as_ref() else {
        return Err(Error::new_spanned(field, "expected a named field"));
    };
    let logical = ident.to_string();
    let logical = logical.strip_prefix("r#").unwrap_or(&logical).to_string();

    let mut spec = ColumnSpec {
        ident,
        variant: format_ident!("{}", logical.to_case(Case::Pascal)),
        logical,
        ty: &field.ty,
        inner: option_inner(&field.ty).unwrap_or(&field.ty),
        optional: option_inner(&field.ty).is_some(),
        primary_key: false,
        table: None,
        column: None,
        join: None,
    };

    for attr in field.attrs.iter().filter(|a| a.path().is_ident("column")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                spec.primary_key = true;
            } else if meta.path.is_ident("table") {
                spec.table = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("name") {
                spec.column = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("join") {
                spec.join = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error(
                    "unsupported column attribute, expected `primary_key`, `table`, `name` or `join`",
                ));
            }
            Ok(())
        })?;
    }

    let remote = spec
        .table
        .as_ref()
        .is_some_and(|table| table.value() != source.value());
    if remote && !spec.optional {
        return Err(Error::new_spanned(
            &field.ty,
            "a column from another table must be an Option",
        ));
    }
    if remote && spec.primary_key {
        return Err(Error::new_spanned(
            ident,
            "the primary key cannot live in another table",
        ));
    }
    if spec.join.is_some() && !remote {
        return Err(Error::new_spanned(
            ident,
            "`join` needs a `table` other than the entity source",
        ));
    }

    Ok(spec)
}

fn column_def(column: &ColumnSpec<'_>, field_enum: &Ident, source: &LitStr) -> TokenStream {
    let variant = &column.variant;
    let name = &column.logical;
    let table = column.table.as_ref().unwrap_or(source);
    let physical = match &column.column {
        Some(physical) => quote! { #physical },
        None => quote! { #name },
    };
    let join = match &column.join {
        Some(join) => quote! { Some(#join) },
        None => quote! { None },
    };
    let primary_key = column.primary_key;
    let nullable = column.optional;
    let inner = column.inner;

    quote! {
        ::quickfeather::orm::ColumnDef {
            field: #field_enum::#variant,
            name: #name,
            table: #table,
            column: #physical,
            primary_key: #primary_key,
            join: #join,
            nullable: #nullable,
            kind: <#inner as ::quickfeather::orm::FieldType>::KIND,
            max_length: <#inner as ::quickfeather::orm::FieldType>::MAX_LENGTH,
        }
    }
}

/// `Some(T)` when `ty` is `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_option_inner() {
        let ty: Type = parse_quote!(Option<i64>);
        let inner: Type = parse_quote!(i64);
        assert_eq!(option_inner(&ty), Some(&inner));

        let ty: Type = parse_quote!(std::option::Option<String>);
        assert!(option_inner(&ty).is_some());

        let ty: Type = parse_quote!(Vec<i64>);
        assert!(option_inner(&ty).is_none());
    }

    #[test]
    fn test_expand_generates_field_enum() {
        let input: DeriveInput = parse_quote! {
            #[entity(source = "shop.categories")]
            pub struct Category {
                #[column(primary_key)]
                pub id: Option<i64>,
                pub display_name: String,
            }
        };
        let output = expand(&input).unwrap().to_string();
        assert!(output.contains("enum CategoryField"));
        assert!(output.contains("DisplayName"));
        assert!(output.contains("\"display_name\""));
        assert!(output.contains("\"shop.categories\""));
    }

    #[test]
    fn test_expand_rejects_required_remote_column() {
        let input: DeriveInput = parse_quote! {
            #[entity(source = "shop.products")]
            pub struct Product {
                #[column(table = "shop.categories", name = "categories.name", join = "categories.id = category_id")]
                pub category_name: String,
            }
        };
        let err = expand(&input).err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("a column from another table must be an Option")
        );
    }

    #[test]
    fn test_expand_requires_source() {
        let input: DeriveInput = parse_quote! {
            pub struct Orphan {
                pub id: i64,
            }
        };
        assert!(expand(&input).is_err());
    }

    #[test]
    fn test_expand_rejects_two_primary_keys() {
        let input: DeriveInput = parse_quote! {
            #[entity(source = "t")]
            pub struct Pair {
                #[column(primary_key)]
                pub a: i64,
                #[column(primary_key)]
                pub b: i64,
            }
        };
        let err = expand(&input).err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("only one field can be the primary key")
        );
    }
}
