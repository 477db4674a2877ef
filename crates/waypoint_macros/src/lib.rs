use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn, FnArg};

/// Time a function when the `perf_stats` feature of the calling crate is enabled.
///
/// The body is wrapped in a guard that logs the elapsed time through Bevy's
/// `info!` when the call took longer than the threshold (milliseconds,
/// default 1). Without `perf_stats` the guard is compiled out entirely.
///
/// Methods are reported as `Type::method` when the receiver is `self`, so the
/// log line stays readable for builder entry points.
///
/// # Example
/// ```ignore
/// #[profile(5)]
/// pub fn create_next_search_level(&mut self, previous_level: u32) -> bool {
///     // ... work ...
/// }
/// ```
#[proc_macro_attribute]
pub fn profile(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let threshold_ms: u128 = if attr.is_empty() {
        1
    } else {
        attr.to_string().trim().parse().unwrap_or(1)
    };

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let fn_name_str = sig.ident.to_string();

    let is_method = sig
        .inputs
        .iter()
        .any(|arg| matches!(arg, FnArg::Receiver(_)));

    let name_expr = if is_method {
        quote! {
            {
                let type_name = std::any::type_name::<Self>();
                let short = type_name.rsplit("::").next().unwrap_or(type_name);
                format!("{}::{}", short, #fn_name_str)
            }
        }
    } else {
        quote! { String::from(#fn_name_str) }
    };

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #[cfg(feature = "perf_stats")]
            let _profile_timer = {
                struct ProfileGuard {
                    name: String,
                    start: std::time::Instant,
                }
                impl Drop for ProfileGuard {
                    fn drop(&mut self) {
                        let elapsed = self.start.elapsed();
                        if elapsed.as_millis() >= #threshold_ms {
                            bevy::log::info!("[PERF] {}: {:?}", self.name, elapsed);
                        }
                    }
                }
                ProfileGuard {
                    name: #name_expr,
                    start: std::time::Instant::now(),
                }
            };

            #block
        }
    };

    output.into()
}
