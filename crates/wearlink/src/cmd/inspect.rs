use serde::Serialize;
use wearlink_route::NodeKind;
use wearlink_state::{BoardSnapshot, NodeRecord, StoreConfig};

use crate::cmd::InspectArgs;
use crate::exit::{state_error, CliResult, SUCCESS};
use crate::output::{print_json, table, OutputFormat};

#[derive(Serialize)]
struct DescriptorOutput {
    index: usize,
    descriptor: String,
}

#[derive(Serialize)]
struct NodeOutput {
    index: usize,
    route: u64,
    kind: &'static str,
    transform: Option<String>,
    children: Vec<usize>,
    environment_slots: usize,
    environment_used: usize,
}

#[derive(Serialize)]
struct RouteOutput {
    id: u64,
    descriptor: usize,
    nodes: usize,
    subscribers: usize,
}

#[derive(Serialize)]
struct InspectOutput {
    version: u32,
    descriptors: Vec<DescriptorOutput>,
    routes: Vec<RouteOutput>,
    nodes: Vec<NodeOutput>,
}

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let defaults = StoreConfig::default();
    let config = StoreConfig {
        validate_schema: !args.no_validate,
        max_snapshot_size: args.max_size.unwrap_or(defaults.max_snapshot_size),
        ..defaults
    };

    let snapshot = wearlink_state::read_snapshot(&args.path, &config)
        .map_err(|err| state_error(&format!("failed to read {}", args.path.display()), err))?;
    tracing::debug!(
        routes = snapshot.routes.len(),
        nodes = snapshot.nodes.len(),
        "snapshot read"
    );

    let out = summarize(&snapshot);
    match format {
        OutputFormat::Json => print_json(&out)?,
        OutputFormat::Table => print_tables(&out),
        OutputFormat::Pretty => print_tree(&snapshot),
    }
    Ok(SUCCESS)
}

fn summarize(snapshot: &BoardSnapshot) -> InspectOutput {
    let descriptors = snapshot
        .descriptors
        .iter()
        .enumerate()
        .map(|(index, d)| DescriptorOutput {
            index,
            descriptor: d.to_string(),
        })
        .collect();

    let mut routes = Vec::with_capacity(snapshot.routes.len());
    let mut nodes = Vec::with_capacity(snapshot.nodes.len());
    for route in &snapshot.routes {
        let records = &snapshot.nodes[route.node_range()];
        routes.push(RouteOutput {
            id: route.id,
            descriptor: route.descriptor,
            nodes: records.len(),
            subscribers: records
                .iter()
                .filter(|n| n.kind == NodeKind::Subscriber)
                .count(),
        });
        for (offset, node) in records.iter().enumerate() {
            nodes.push(node_output(route.first_node + offset, route.id, node));
        }
    }

    InspectOutput {
        version: snapshot.version,
        descriptors,
        routes,
        nodes,
    }
}

fn node_output(index: usize, route: u64, node: &NodeRecord) -> NodeOutput {
    let transform = match node.kind {
        NodeKind::Transform { transform } => Some(transform.to_string()),
        _ => None,
    };
    NodeOutput {
        index,
        route,
        kind: node.kind.name(),
        transform,
        children: node.children.clone(),
        environment_slots: node.environment_slot_count,
        environment_used: node.environment.slots().iter().flatten().count(),
    }
}

fn print_tables(out: &InspectOutput) {
    println!("snapshot version {}", out.version);

    let mut descriptors = table(vec!["#", "DESCRIPTOR"]);
    for d in &out.descriptors {
        descriptors.add_row(vec![d.index.to_string(), d.descriptor.clone()]);
    }
    println!("{descriptors}");

    let mut routes = table(vec!["ROUTE", "DESCRIPTOR", "NODES", "SUBSCRIBERS"]);
    for r in &out.routes {
        routes.add_row(vec![
            r.id.to_string(),
            r.descriptor.to_string(),
            r.nodes.to_string(),
            r.subscribers.to_string(),
        ]);
    }
    println!("{routes}");

    let mut nodes = table(vec!["#", "ROUTE", "KIND", "CHILDREN", "SLOTS"]);
    for n in &out.nodes {
        let kind = match &n.transform {
            Some(t) => t.clone(),
            None => n.kind.to_string(),
        };
        let children = n
            .children
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        nodes.add_row(vec![
            n.index.to_string(),
            n.route.to_string(),
            kind,
            children,
            format!("{}/{}", n.environment_used, n.environment_slots),
        ]);
    }
    println!("{nodes}");
}

fn print_tree(snapshot: &BoardSnapshot) {
    for route in &snapshot.routes {
        println!("route {} {}", route.id, snapshot.descriptors[route.descriptor]);
        print_node(snapshot, route.first_node, 1);
    }
}

fn print_node(snapshot: &BoardSnapshot, index: usize, depth: usize) {
    let node = &snapshot.nodes[index];
    let label = match node.kind {
        NodeKind::Transform { transform } => transform.to_string(),
        other => other.name().to_string(),
    };
    println!(
        "{:indent$}{index} {label} ({} slots)",
        "",
        node.environment_slot_count,
        indent = depth * 2
    );
    for &child in &node.children {
        print_node(snapshot, child, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use wearlink_codec::ValueDescriptor;
    use wearlink_route::{Comparison, RouteGraph};

    use super::*;

    #[test]
    fn summary_counts_subscribers_per_route() {
        let graph = RouteGraph::new();
        let source = ValueDescriptor::new(5, 0x0e, 2, false).unwrap();
        graph
            .build_route(source, |root| {
                root.filter(Comparison::Gt, 3).placeholder();
                root.placeholder();
            })
            .unwrap();

        let out = summarize(&wearlink_state::serialize(&graph));
        assert_eq!(out.version, wearlink_state::CURRENT_VERSION);
        assert_eq!(out.descriptors[0].descriptor, "05:0e u16");
        assert_eq!(out.routes[0].nodes, 4);
        assert_eq!(out.routes[0].subscribers, 2);
        assert_eq!(out.nodes[1].kind, "transform");
        assert!(out.nodes[1].transform.is_some());
    }
}
