use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input,
    spanned::Spanned,
    BinOp, Block, Expr, Ident, Lit, Pat, Stmt, Token, UnOp,
};

struct MacroInput {
    graph: Ident,
    block: Block,
}

impl Parse for MacroInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let graph = input.parse()?;
        input.parse::<Token![,]>()?;
        let block = input.parse()?;
        Ok(Self { graph, block })
    }
}

/// Build nodes in a graph from plain expression syntax.
///
/// ```ignore
/// let graph = Graph::new();
/// scalargrad!(graph, {
///     let x;
///     let product = x * (x.pow(2.) + 1.);
/// });
/// ```
///
/// `let x;` declares an input named `"x"`, numeric literals become constants
/// and every other binding is an expression over `+ - * /`, `.pow(..)` and
/// names bound before it.
#[proc_macro]
pub fn scalargrad(input: TokenStream) -> TokenStream {
    let MacroInput { graph, block } = parse_macro_input!(input as MacroInput);

    let mut objs = vec![];

    for stmt in &block.stmts {
        if let Err(e) = traverse_stmt(&graph, stmt, &mut objs) {
            return e.to_compile_error().into();
        }
    }

    let expanded = quote! {
        #(#objs)*
    };

    TokenStream::from(expanded)
}

fn traverse_stmt(graph: &Ident, input: &Stmt, terms: &mut Vec<TokenStream2>) -> syn::Result<()> {
    let Stmt::Local(local) = input else {
        return Err(syn::Error::new(input.span(), "expected a `let` statement"));
    };
    let Pat::Ident(id) = &local.pat else {
        return Err(syn::Error::new(
            local.pat.span(),
            "expected a plain identifier",
        ));
    };
    let name = id.ident.clone();
    let ts = match local.init.as_ref().map(|init| &*init.expr) {
        None => quote! {
            let #name = #graph.input(stringify!(#name));
        },
        Some(Expr::Path(path)) => quote! {
            let #name = #path;
        },
        Some(ex) => {
            let res = traverse_expr(graph, ex, terms)?;
            quote! {
                let #name = #res;
            }
        }
    };
    terms.push(ts);
    Ok(())
}

fn var_name(terms: &[TokenStream2], span: proc_macro2::Span) -> Ident {
    Ident::new(&format!("_a{}", terms.len()), span)
}

fn format_constant(
    graph: &Ident,
    ex: &Expr,
    lit: &Lit,
    negate: bool,
    terms: &mut Vec<TokenStream2>,
) -> syn::Result<Ident> {
    if !matches!(lit, Lit::Float(_) | Lit::Int(_)) {
        return Err(syn::Error::new(lit.span(), "expected a numeric literal"));
    }
    let name = var_name(terms, ex.span());
    let sign = if negate { quote! { - } } else { quote! {} };
    terms.push(quote! {
        let #name = #graph.constant(#sign #lit as f64);
    });
    Ok(name)
}

fn traverse_expr(
    graph: &Ident,
    input: &Expr,
    terms: &mut Vec<TokenStream2>,
) -> syn::Result<Ident> {
    match input {
        Expr::Binary(ex) => {
            let lhs = traverse_expr(graph, &ex.left, terms)?;
            let rhs = traverse_expr(graph, &ex.right, terms)?;
            let binop = match ex.op {
                BinOp::Add(_) => quote! { #lhs + #rhs },
                BinOp::Sub(_) => quote! { #lhs - #rhs },
                BinOp::Mul(_) => quote! { #lhs * #rhs },
                BinOp::Div(_) => quote! { #lhs / #rhs },
                _ => return Err(syn::Error::new(ex.op.span(), "unsupported operator")),
            };
            let name = var_name(terms, ex.span());
            terms.push(quote! {
                let #name = #binop;
            });
            Ok(name)
        }
        Expr::MethodCall(call) if call.method == "pow" && call.args.len() == 1 => {
            let base = traverse_expr(graph, &call.receiver, terms)?;
            let exponent = traverse_expr(graph, &call.args[0], terms)?;
            let name = var_name(terms, call.span());
            terms.push(quote! {
                let #name = #base.pow(#exponent);
            });
            Ok(name)
        }
        Expr::Paren(ex) => traverse_expr(graph, &ex.expr, terms),
        Expr::Lit(lit) => format_constant(graph, input, &lit.lit, false, terms),
        Expr::Unary(ex) if matches!(ex.op, UnOp::Neg(_)) => match &*ex.expr {
            Expr::Lit(lit) => format_constant(graph, input, &lit.lit, true, terms),
            _ => Err(syn::Error::new(
                ex.span(),
                "negation is only supported on literals",
            )),
        },
        Expr::Path(path) => path
            .path
            .get_ident()
            .cloned()
            .ok_or_else(|| syn::Error::new(path.span(), "expected a node name")),
        _ => Err(syn::Error::new(input.span(), "unsupported expression")),
    }
}
