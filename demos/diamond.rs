//! Dependency graph in diamond shape. It evaluates the same node twice, so the derivative should add up.

use scalargrad::Graph;

fn main() {
    let graph = Graph::new();
    let a = graph.input("a");
    let b = graph.input("b");
    let c = graph.input("c");
    let ab = a + b;
    let ac = a + c;
    let abac = ab + ac;

    let counter = std::cell::Cell::new(0);
    let callback = |node| {
        let i = counter.get();
        let mut file =
            std::io::BufWriter::new(std::fs::File::create(format!("dot{i}.dot")).unwrap());
        abac.dot_builder()
            .show_values(true)
            .highlights(node)
            .dot(&mut file)
            .unwrap();
        counter.set(i + 1);
    };

    abac.forward_cb(&[("a", 1.), ("b", 3.), ("c", 5.)], &callback)
        .unwrap();
    abac.backward_cb(&callback).unwrap();
    println!("abac: {}", abac.grad().unwrap());
    println!("a: {}", a.grad().unwrap());
    println!("b: {}", b.grad().unwrap());
    println!("c: {}", c.grad().unwrap());
    abac.dot_builder()
        .show_values(true)
        .dot(&mut std::io::stdout())
        .unwrap();
}
