//! x * (x^2 + 1) at x = 3, built with explicit constructors and with operators.

use std::collections::HashMap;

use scalargrad::{BinaryOp, Graph, NodeKind};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_product() {
    init_logger();
    let graph = Graph::new();
    let x = graph.input("x");
    let two = graph.constant(2.);
    let x2 = graph.pow(x, two);
    let one = graph.constant(1.);
    let sum = graph.add(x2, one);
    let product = graph.mul(x, sum);

    let feed = HashMap::from([("x".to_string(), 3.)]);
    assert_eq!(product.forward(&feed).unwrap(), 30.);
    assert_eq!(product.value(), Some(30.));
    assert_eq!(x.value(), Some(3.));
    assert_eq!(two.value(), Some(2.));
    assert_eq!(one.value(), Some(1.));
    assert_eq!(sum.value(), Some(10.));
    assert_eq!(x2.value(), Some(9.));

    assert_eq!(product.backward().unwrap(), 1.);
    assert_eq!(x.grad(), Some(28.));
    assert_eq!(product.grad(), Some(1.));
    assert_eq!(sum.grad(), Some(3.));
    assert_eq!(one.grad(), Some(3.));
    assert_eq!(x2.grad(), Some(3.));
    let dtwo = two.grad().unwrap();
    assert!((dtwo - 27. * 3f64.ln()).abs() < 1e-9);

    product.clear_grad_recursive();
    for node in [x, two, x2, one, sum, product] {
        assert_eq!(node.grad(), None);
    }
    assert_eq!(x.value(), Some(3.));
    assert_eq!(product.value(), Some(30.));

    product.backward().unwrap();
    assert_eq!(x.grad(), Some(28.));
    assert_eq!(product.grad(), Some(1.));
    assert_eq!(sum.grad(), Some(3.));
    assert_eq!(two.grad(), Some(dtwo));

    product.clear_grad_recursive();
    product.clear_grad_recursive();
    assert_eq!(x.grad(), None);
}

#[test]
fn test_product_operators() {
    init_logger();
    let graph = Graph::new();
    let x = graph.input("x");
    let one = graph.constant(1.);
    let two = graph.constant(2.);
    let product = x * (x.pow(two) + one);

    assert_eq!(product.forward(&[("x", 3.)]).unwrap(), 30.);
    assert_eq!(x.value(), Some(3.));
    product.backward().unwrap();
    assert_eq!(x.grad(), Some(28.));
    assert_eq!(product.grad(), Some(1.));

    assert_eq!(product.kind(), NodeKind::Binary(BinaryOp::Mul));
    let children = product.children();
    assert_eq!(children[0], x);
    assert_eq!(children[1].kind(), NodeKind::Binary(BinaryOp::Add));
}

#[test]
fn test_operators_match_constructors() {
    let explicit = Graph::new();
    let x = explicit.input("x");
    let one = explicit.constant(1.);
    let two = explicit.constant(2.);
    let product = explicit.mul(x, explicit.add(explicit.pow(x, two), one));

    let sugar = Graph::new();
    let sx = sugar.input("x");
    let sone = sugar.constant(1.);
    let stwo = sugar.constant(2.);
    let sproduct = sx * (sx.pow(stwo) + sone);

    assert_eq!(explicit.len(), sugar.len());
    product.forward(&[("x", 3.)]).unwrap();
    sproduct.forward(&[("x", 3.)]).unwrap();
    product.backward().unwrap();
    sproduct.backward().unwrap();

    // Both graphs are laid out in the same order in their arenas.
    let mut trace = vec![];
    product
        .forward_cb(&[("x", 3.)], |node| trace.push((node.label(), node.value(), node.grad())))
        .unwrap();
    let mut strace = vec![];
    sproduct
        .forward_cb(&[("x", 3.)], |node| strace.push((node.label(), node.value(), node.grad())))
        .unwrap();
    assert_eq!(trace, strace);
    assert_eq!(trace.len(), 6);
}

#[test]
fn test_forward_idempotent() {
    let graph = Graph::new();
    let x = graph.input("x");
    let y = graph.input("y");
    let f = (x - y) / (x * y);
    let nodes = [x, y, f];

    let feed = [("x", 2.), ("y", 4.), ("unused", 100.)];
    f.forward(&feed).unwrap();
    let first: Vec<_> = nodes.iter().map(|node| node.value()).collect();
    f.forward(&feed).unwrap();
    let second: Vec<_> = nodes.iter().map(|node| node.value()).collect();
    assert_eq!(first, second);
    assert_eq!(f.value(), Some(-0.25));

    // A new feed simply overwrites the values.
    f.forward(&[("x", 4.), ("y", 2.)]).unwrap();
    assert_eq!(f.value(), Some(0.25));
}

#[test]
fn test_subtract_divide_grads() {
    let graph = Graph::new();
    let x = graph.input("x");
    let y = graph.input("y");
    let f = (x - y) / y;

    assert_eq!(f.forward(&[("x", 6.), ("y", 2.)]).unwrap(), 2.);
    f.backward().unwrap();
    // df/dx = 1 / y, df/dy = -x / y^2
    assert_eq!(x.grad(), Some(0.5));
    assert_eq!(y.grad(), Some(-1.5));
}

#[test]
fn test_backward_accumulates_without_clear() {
    let graph = Graph::new();
    let x = graph.input("x");
    let three = graph.constant(3.);
    let y = x * three + x;
    y.forward(&[("x", 1.)]).unwrap();

    y.backward().unwrap();
    assert_eq!(x.grad(), Some(4.));
    y.backward().unwrap();
    assert_eq!(x.grad(), Some(8.));
    assert_eq!(y.grad(), Some(1.));

    y.clear_grad_recursive();
    y.backward().unwrap();
    assert_eq!(x.grad(), Some(4.));
}

#[test]
fn test_backward_from_inner_node() {
    let graph = Graph::new();
    let x = graph.input("x");
    let x2 = x * x;
    let y = x2 + x;
    y.forward(&[("x", 5.)]).unwrap();

    assert_eq!(x2.backward().unwrap(), 1.);
    assert_eq!(x.grad(), Some(10.));
    assert_eq!(y.grad(), None);

    y.clear_grad_recursive();
    x2.clear_grad();
    assert_eq!(x2.grad(), None);
    y.backward().unwrap();
    assert_eq!(x.grad(), Some(11.));
}
