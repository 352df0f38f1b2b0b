// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Model builder

extern crate proc_macro;

use proc_macro2::TokenStream;
use quote::quote;
use syn::{self, Data, DeriveInput, Fields, parse_macro_input};

/// Create a std::fmt::Display implementation for a struct with an Entity.
#[proc_macro_derive(EntityDisplay)]
pub fn entity_display(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let DeriveInput {
        ident, generics, ..
    } = parse_macro_input!(input);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let output = quote! {
        impl #impl_generics std::fmt::Display for #ident #ty_generics #where_clause {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.entity, f)
            }
        }
    };

    output.into()
}

/// Create an implementation of `GetEntity` returning the `entity` field.
#[proc_macro_derive(EntityGet)]
pub fn entity_get(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input: DeriveInput = parse_macro_input!(input);
    if let Err(e) = check_has_entity_field(&input) {
        return e.into();
    }

    let DeriveInput {
        ident, generics, ..
    } = input;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let output = quote! {
        impl #impl_generics pimfab_track::entity::GetEntity for #ident #ty_generics #where_clause {
            fn entity(&self) -> &std::rc::Rc<pimfab_track::entity::Entity> {
                &self.entity
            }
        }
    };

    output.into()
}

fn check_has_entity_field(input: &DeriveInput) -> Result<(), TokenStream> {
    if let Data::Struct(data) = &input.data
        && let Fields::Named(fields) = &data.fields
        && fields
            .named
            .iter()
            .any(|field| field.ident.as_ref().is_some_and(|id| id == "entity"))
    {
        return Ok(());
    }

    Err(syn::Error::new_spanned(
        &input.ident,
        "EntityGet requires a struct with a named `entity` field",
    )
    .to_compile_error())
}
