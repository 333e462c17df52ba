//! # Options Derive
//!
//! Builders and a startup dump for load-time option structs.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, LitBool, parse_macro_input, spanned::Spanned};

/// For each **named** field generates
///
/// * `.set_<field>(&mut self, value: Ty) -> &mut Self`
/// * `const .with_<field>(mut self, value: Ty) -> Self`
///
/// plus one `.log_options(&self)` that writes every field at `info` level
/// through the `log` crate (the deriving crate must depend on `log`; fields
/// must implement `Debug`).
///
/// Field attributes:
/// - `#[options(skip)]`: no builders, not logged.
/// - `#[options(quiet)]`: builders, but not logged.
///
/// # Example
///
/// ```
/// use dio_options_derive::Options;
///
/// #[derive(Debug, Options)]
/// struct Opts {
///     verbose: bool,
///     #[options(quiet)]
///     secret: u32,
/// }
///
/// let mut o = Opts { verbose: false, secret: 0 };
/// o.set_verbose(true).set_secret(7);
/// let o = o.with_secret(42);
/// assert!(o.verbose);
/// assert_eq!(o.secret, 42);
/// o.log_options();
/// ```
#[proc_macro_derive(Options, attributes(options))]
pub fn derive_options(input: TokenStream) -> TokenStream {
    let DeriveInput {
        ident,
        generics,
        data,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let fields = match data {
        Data::Struct(s) => match s.fields {
            Fields::Named(n) => n.named,
            Fields::Unnamed(u) => {
                return syn::Error::new(u.span(), "Options only supports named fields")
                    .to_compile_error()
                    .into();
            }
            Fields::Unit => {
                return syn::Error::new(ident.span(), "Options does not apply to unit structs")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new(ident.span(), "Options can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let mut methods = Vec::new();
    let mut dumps = Vec::new();

    for field in fields {
        let Some(fname) = &field.ident else { continue };
        let flags = match FieldFlags::parse(&field.attrs) {
            Ok(flags) => flags,
            Err(e) => return e.to_compile_error().into(),
        };
        if flags.skip {
            continue;
        }

        let ty = &field.ty;
        let set_name = format_ident!("set_{}", fname);
        let with_name = format_ident!("with_{}", fname);

        methods.push(quote! {
            #[inline]
            pub fn #set_name(&mut self, value: #ty) -> &mut Self {
                self.#fname = value;
                self
            }

            #[inline]
            #[must_use]
            pub const fn #with_name(mut self, value: #ty) -> Self {
                self.#fname = value;
                self
            }
        });

        if !flags.quiet {
            let label = fname.to_string();
            dumps.push(quote! {
                ::log::info!("{}.{} = {:?}", stringify!(#ident), #label, self.#fname);
            });
        }
    }

    let expanded = quote! {
        impl #impl_generics #ident #ty_generics #where_clause {
            #(#methods)*

            /// Log the effective value of every option.
            pub fn log_options(&self) {
                #(#dumps)*
            }
        }
    };

    TokenStream::from(expanded)
}

#[derive(Default)]
struct FieldFlags {
    skip: bool,
    quiet: bool,
}

impl FieldFlags {
    /// Accepts `#[options(skip)]`, `#[options(quiet)]` and the `= true/false`
    /// spellings of both.
    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut flags = Self::default();
        for attr in attrs {
            if !attr.path().is_ident("options") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                let slot = if meta.path.is_ident("skip") {
                    &mut flags.skip
                } else if meta.path.is_ident("quiet") {
                    &mut flags.quiet
                } else {
                    return Err(meta.error("expected `skip` or `quiet`"));
                };
                *slot = if meta.input.is_empty() {
                    true
                } else {
                    meta.value()?.parse::<LitBool>()?.value
                };
                Ok(())
            })?;
        }
        Ok(flags)
    }
}
