use scalargrad::Graph;
use scalargrad_macro::scalargrad;

fn main() {
    let graph = Graph::new();
    scalargrad!(graph, {
        let x;
        let y;
        let f = (x * y + 1.) / (x - y).pow(2);
    });

    let value = f.forward(&[("x", 3.), ("y", 1.)]).unwrap();
    f.backward().unwrap();
    println!("f = {value}");
    println!("df/dx = {}", x.grad().unwrap());
    println!("df/dy = {}", y.grad().unwrap());
    f.dot_builder().dot(&mut std::io::stdout()).unwrap();
}
