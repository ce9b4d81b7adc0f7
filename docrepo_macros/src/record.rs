use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{ext::IdentExt, meta::ParseNestedMeta, Data, DeriveInput, Fields, LitStr, Token};

pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

struct TypeAttrs {
    collection: Option<String>,
    compound_index: Option<LitStr>,
}

#[derive(Default)]
struct FieldAttrs {
    index: Option<LitStr>,
    compound_index: Option<LitStr>,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record derive: generic records are not supported",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record derive: only structs with named fields are supported",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Record derive: only structs are supported",
            ))
        }
    };

    let type_attrs = extract_type_attrs(input)?;
    let collection = type_attrs
        .collection
        .unwrap_or_else(|| format!("{}s", to_snake_case(&name.to_string())));
    let type_compound = option_tokens(type_attrs.compound_index.as_ref());
    let rename_all = serde_rename_all(input)?;

    let mut descriptors = Vec::new();
    let mut field_arms = Vec::new();
    let mut field_mut_arms = Vec::new();

    for (position, field) in fields.iter().enumerate() {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "Record derive: unnamed field"))?;
        let ty = &field.ty;
        let ident_str = ident.to_string();
        let stored_name = match serde_rename(field)? {
            Some(renamed) => renamed,
            None => {
                let unraw = ident.unraw().to_string();
                match rename_all {
                    Some(rule) => rule.apply_to_field(&unraw),
                    None => unraw,
                }
            }
        };
        let attrs = extract_field_attrs(field)?;
        let index = option_tokens(attrs.index.as_ref());
        let compound_index = option_tokens(attrs.compound_index.as_ref());

        descriptors.push(quote! {
            ::docrepo::FieldDescriptor {
                position: #position,
                ident: #ident_str,
                name: #stored_name,
                type_id: ::std::any::TypeId::of::<#ty>,
                type_name: ::std::any::type_name::<#ty>,
                index: #index,
                compound_index: #compound_index,
            }
        });
        field_arms.push(quote! {
            #position => ::std::option::Option::Some(&self.#ident as &dyn ::std::any::Any),
        });
        field_mut_arms.push(quote! {
            #position => ::std::option::Option::Some(&mut self.#ident as &mut dyn ::std::any::Any),
        });
    }

    Ok(quote! {
        impl ::docrepo::Record for #name {
            const COLLECTION: &'static str = #collection;

            fn fields() -> &'static [::docrepo::FieldDescriptor] {
                const FIELDS: &[::docrepo::FieldDescriptor] = &[#(#descriptors),*];
                FIELDS
            }

            fn compound_indexes() -> ::std::option::Option<&'static str> {
                #type_compound
            }

            fn field(&self, position: usize) -> ::std::option::Option<&dyn ::std::any::Any> {
                match position {
                    #(#field_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn field_mut(
                &mut self,
                position: usize,
            ) -> ::std::option::Option<&mut dyn ::std::any::Any> {
                match position {
                    #(#field_mut_arms)*
                    _ => ::std::option::Option::None,
                }
            }
        }
    })
}

fn option_tokens(value: Option<&LitStr>) -> TokenStream2 {
    match value {
        Some(lit) => quote! { ::std::option::Option::Some(#lit) },
        None => quote! { ::std::option::Option::None },
    }
}

fn extract_type_attrs(input: &DeriveInput) -> syn::Result<TypeAttrs> {
    let mut attrs = TypeAttrs {
        collection: None,
        compound_index: None,
    };

    for attr in &input.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.collection = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("compound_index") {
                attrs.compound_index = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported #[record(...)] option on a struct; expected `collection` or `compound_index`"))
            }
        })?;
    }

    Ok(attrs)
}

fn extract_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("index") {
                attrs.index = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("compound_index") {
                attrs.compound_index = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported #[record(...)] option on a field; expected `index` or `compound_index`"))
            }
        })?;
    }

    Ok(attrs)
}

/// Reads the serialized field name from `#[serde(rename = "...")]` or
/// `#[serde(rename(serialize = "..."))]`. Other serde options are skipped.
fn serde_rename(field: &syn::Field) -> syn::Result<Option<String>> {
    let mut renamed = None;

    for attr in &field.attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                if meta.input.peek(Token![=]) {
                    let value: LitStr = meta.value()?.parse()?;
                    renamed = Some(value.value());
                } else {
                    meta.parse_nested_meta(|inner| {
                        if inner.path.is_ident("serialize") {
                            let value: LitStr = inner.value()?.parse()?;
                            renamed = Some(value.value());
                            Ok(())
                        } else {
                            skip_meta(&inner)
                        }
                    })?;
                }
                Ok(())
            } else {
                skip_meta(&meta)
            }
        })?;
    }

    Ok(renamed)
}

/// Case conversion named by a container-level `#[serde(rename_all = "...")]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> syn::Result<Self> {
        match lit.value().as_str() {
            "lowercase" => Ok(RenameRule::Lower),
            "UPPERCASE" => Ok(RenameRule::Upper),
            "PascalCase" => Ok(RenameRule::Pascal),
            "camelCase" => Ok(RenameRule::Camel),
            "snake_case" => Ok(RenameRule::Snake),
            "SCREAMING_SNAKE_CASE" => Ok(RenameRule::ScreamingSnake),
            "kebab-case" => Ok(RenameRule::Kebab),
            "SCREAMING-KEBAB-CASE" => Ok(RenameRule::ScreamingKebab),
            other => Err(syn::Error::new_spanned(
                lit,
                format!("Record derive: unknown rename_all rule `{}`", other),
            )),
        }
    }

    /// Field identifiers are snake_case, so conversions start from words
    /// separated by `_`.
    fn apply_to_field(self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => {
                let mut pascal = String::with_capacity(field.len());
                let mut capitalize = true;
                for ch in field.chars() {
                    if ch == '_' {
                        capitalize = true;
                    } else if capitalize {
                        pascal.push(ch.to_ascii_uppercase());
                        capitalize = false;
                    } else {
                        pascal.push(ch);
                    }
                }
                pascal
            }
            RenameRule::Camel => {
                let pascal = RenameRule::Pascal.apply_to_field(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => pascal,
                }
            }
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }
}

/// Reads `#[serde(rename_all = "...")]` or
/// `#[serde(rename_all(serialize = "..."))]` from the struct.
fn serde_rename_all(input: &DeriveInput) -> syn::Result<Option<RenameRule>> {
    let mut rule = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                if meta.input.peek(Token![=]) {
                    let value: LitStr = meta.value()?.parse()?;
                    rule = Some(RenameRule::parse(&value)?);
                } else {
                    meta.parse_nested_meta(|inner| {
                        if inner.path.is_ident("serialize") {
                            let value: LitStr = inner.value()?.parse()?;
                            rule = Some(RenameRule::parse(&value)?);
                            Ok(())
                        } else {
                            skip_meta(&inner)
                        }
                    })?;
                }
                Ok(())
            } else {
                skip_meta(&meta)
            }
        })?;
    }

    Ok(rule)
}

fn skip_meta(meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta(&inner))?;
    }
    Ok(())
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
