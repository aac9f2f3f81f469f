use crate::Invocation;
use colored::Colorize;
use fleetstack_core::load_stack;

pub fn handle(invocation: &Invocation) -> anyhow::Result<()> {
    let stack = load_stack(&invocation.stack_file, &invocation.options)?;
    let graph = stack.synth()?;

    if graph.outputs.is_empty() {
        println!("{}", "No outputs declared".yellow());
        return Ok(());
    }

    for output in graph.outputs.values() {
        println!("{} = {}", output.name.cyan().bold(), output.value);
        if let Some(description) = &output.description {
            println!("    {}", description.dimmed());
        }
    }

    Ok(())
}
