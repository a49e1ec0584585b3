use scalargrad::Graph;

fn main() -> Result<(), scalargrad::GraphError> {
    let graph = Graph::new();
    let x = graph.input("x");
    let one = graph.constant(1.);
    let two = graph.constant(2.);
    let product = x * (x.pow(two) + one);

    for xval in [-2., -1., 0., 1., 2., 3.] {
        let value = product.forward(&[("x", xval)])?;
        product.clear_grad_recursive();
        product.backward()?;
        println!("x = {xval}: f(x) = {value}, f'(x) = {:?}", x.grad());
    }
    Ok(())
}
