// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! Procedural macro deriving `hostmesh::Serializable` for user structs and
//! enums, so they can be written into message buffers and read back out of
//! them.
//!
//! Caveats:
//!
//! 1. Every field **MUST** implement `hostmesh::Serializable`. Fields are written
//!    in declaration order, so reordering fields changes the encoding.
//! 2. Enum variants are tagged with their declaration index as a `u32`. Since every
//!    host runs the same build, the tags agree without being named on the wire.
//! 3. Generic type parameters get a `hostmesh::Serializable` bound added.
//! 4. Unions are not supported.

extern crate proc_macro;
use proc_macro::TokenStream;
use quote::format_ident;
use quote::quote;
use quote::ToTokens;
use syn::spanned::Spanned;
use syn::DeriveInput;
use syn::Fields;
use syn::GenericParam;
use syn::Generics;

/// Derive `hostmesh::Serializable` for a struct or an enum
#[proc_macro_derive(Serializable)]
pub fn serializable_derive_macro(input: TokenStream) -> TokenStream {
    // Construct a representation of Rust code as a syntax tree
    // that we can manipulate
    let ast: DeriveInput = match syn::parse(input) {
        Ok(ast) => ast,
        Err(err) => return err.to_compile_error().into(),
    };

    match impl_serializable_macro(&ast) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

fn add_trait_bounds(mut generics: Generics) -> Generics {
    for param in &mut generics.params {
        if let GenericParam::Type(type_param) = param {
            type_param
                .bounds
                .push(syn::parse_quote!(::hostmesh::Serializable));
        }
    }
    generics
}

fn impl_serializable_macro(ast: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &ast.ident;
    let type_name = name.to_string();
    let generics = add_trait_bounds(ast.generics.clone());
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let (serialize_body, deserialize_body) = match &ast.data {
        syn::Data::Struct(data) => {
            let (serialize, deserialize) = impl_struct(&data.fields);
            (serialize.into_token_stream(), deserialize.into_token_stream())
        }
        syn::Data::Enum(data) => {
            let serialize_arms = data
                .variants
                .iter()
                .enumerate()
                .map(|(index, variant)| impl_variant_serialize(index as u32, variant))
                .collect::<Vec<_>>();
            let deserialize_arms = data
                .variants
                .iter()
                .enumerate()
                .map(|(index, variant)| impl_variant_deserialize(index as u32, variant))
                .collect::<Vec<_>>();
            (
                quote! {
                    match self {
                        #( #serialize_arms )*
                    }
                    Ok(())
                },
                quote! {
                    let variant = buf.read::<u32>()?;
                    match variant {
                        #( #deserialize_arms )*
                        _ => Err(::hostmesh::SerializationErr::InvalidData(#type_name)),
                    }
                },
            )
        }
        syn::Data::Union(data) => {
            return Err(syn::Error::new(
                data.union_token.span(),
                "Serializable cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::hostmesh::Serializable for #name #ty_generics #where_clause {
            fn serialize(
                &self,
                buf: &mut ::hostmesh::SerializeBuffer,
            ) -> ::std::result::Result<(), ::hostmesh::SerializationErr> {
                #serialize_body
            }

            fn deserialize(
                buf: &mut ::hostmesh::DeserializeBuffer,
            ) -> ::std::result::Result<Self, ::hostmesh::SerializationErr> {
                #deserialize_body
            }
        }
    }
    .into())
}

fn impl_struct(fields: &Fields) -> (impl ToTokens, impl ToTokens) {
    match fields {
        Fields::Named(named) => {
            let names = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .collect::<Vec<_>>();
            (
                quote! {
                    #( buf.write(&self.#names)?; )*
                    Ok(())
                },
                quote! {
                    Ok(Self {
                        #( #names: buf.read()?, )*
                    })
                },
            )
        }
        Fields::Unnamed(unnamed) => {
            let indices = (0..unnamed.unnamed.len()).map(syn::Index::from).collect::<Vec<_>>();
            let reads = indices.iter().map(|_| quote! { buf.read()? });
            (
                quote! {
                    #( buf.write(&self.#indices)?; )*
                    Ok(())
                },
                quote! {
                    Ok(Self( #( #reads ),* ))
                },
            )
        }
        Fields::Unit => (
            quote! {
                let _ = buf;
                Ok(())
            },
            quote! {
                let _ = buf;
                Ok(Self)
            },
        ),
    }
}

fn impl_variant_serialize(index: u32, variant: &syn::Variant) -> impl ToTokens {
    let variant_name = &variant.ident;
    match &variant.fields {
        Fields::Named(named) => {
            let names = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .collect::<Vec<_>>();
            quote! {
                Self::#variant_name { #( #names ),* } => {
                    buf.write(&#index)?;
                    #( buf.write(#names)?; )*
                }
            }
        }
        Fields::Unnamed(unnamed) => {
            let bindings = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("field_{}", i))
                .collect::<Vec<_>>();
            quote! {
                Self::#variant_name( #( #bindings ),* ) => {
                    buf.write(&#index)?;
                    #( buf.write(#bindings)?; )*
                }
            }
        }
        Fields::Unit => quote! {
            Self::#variant_name => {
                buf.write(&#index)?;
            }
        },
    }
}

fn impl_variant_deserialize(index: u32, variant: &syn::Variant) -> impl ToTokens {
    let variant_name = &variant.ident;
    match &variant.fields {
        Fields::Named(named) => {
            let names = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .collect::<Vec<_>>();
            quote! {
                #index => Ok(Self::#variant_name { #( #names: buf.read()?, )* }),
            }
        }
        Fields::Unnamed(unnamed) => {
            let reads = unnamed.unnamed.iter().map(|_| quote! { buf.read()? });
            quote! {
                #index => Ok(Self::#variant_name( #( #reads ),* )),
            }
        }
        Fields::Unit => quote! {
            #index => Ok(Self::#variant_name),
        },
    }
}
