use crate::Invocation;
use colored::Colorize;
use fleetstack_core::load_stack;

pub fn handle(invocation: &Invocation) -> anyhow::Result<()> {
    let stack = load_stack(&invocation.stack_file, &invocation.options)?;
    let graph = stack.synth()?;

    for (index, node) in graph.dependency_order()?.into_iter().enumerate() {
        println!(
            "{:>3}. {} {}",
            index + 1,
            node.logical_id.cyan(),
            format!("({})", node.resource_type).dimmed()
        );
        let dependencies = node.dependencies();
        if !dependencies.is_empty() {
            let list: Vec<&str> = dependencies.iter().map(String::as_str).collect();
            println!("       after: {}", list.join(", "));
        }
    }

    Ok(())
}
