use crate::Invocation;
use colored::Colorize;
use fleetstack_core::{Stack, load_stack};

pub fn handle(invocation: &Invocation) {
    println!("{}", "Validating stack...".blue());
    println!(
        "Stack file: {}",
        invocation.stack_file.display().to_string().cyan()
    );

    let result = load_stack(&invocation.stack_file, &invocation.options)
        .and_then(|stack| stack.synth().map(|graph| (stack, graph)));

    match result {
        Ok((stack, graph)) => {
            println!("{}", "✓ Stack is valid".green().bold());
            println!();
            print_summary(&stack);
            println!(
                "  resources: {} ({} outputs)",
                graph.resources.len(),
                graph.outputs.len()
            );
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Invalid stack".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

fn print_summary(stack: &Stack) {
    println!("Summary of {}:", stack.name().cyan());

    println!("  networks: {}", stack.networks().count());
    for network in stack.networks() {
        println!(
            "    - {} ({}, {} subnets over {} AZs)",
            network.id().as_str().cyan(),
            network.props().cidr,
            network.all_subnets().len(),
            network.availability_zone_count()
        );
    }

    println!("  roles: {}", stack.roles().count());
    for role in stack.roles() {
        println!(
            "    - {} ({} policies)",
            role.id().as_str().cyan(),
            role.props().managed_policies.len()
        );
    }

    println!("  clusters: {}", stack.clusters().count());
    for cluster in stack.clusters() {
        println!(
            "    - {} (version {}, {} node groups, {} Fargate profiles, {} addons)",
            cluster.id().as_str().cyan(),
            cluster.props().version,
            cluster.node_groups().count(),
            cluster.fargate_profiles().count(),
            cluster.addons().count()
        );
    }

    println!("  buckets: {}", stack.buckets().count());
    println!("  distributions: {}", stack.distributions().count());

    println!("  databases: {}", stack.databases().count());
    for database in stack.databases() {
        println!(
            "    - {} ({}, teardown: {})",
            database.id().as_str().cyan(),
            database.props().engine,
            database.teardown()
        );
    }

    println!("  outputs: {}", stack.outputs().count());
}
