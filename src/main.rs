use std::path::Path;
use std::process::ExitCode;

use apiscout::{Endpoint, FsProject, ProjectContext, Provenance};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut json_output = false;
    let mut details = false;
    let mut roots = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json_output = true,
            "--details" => details = true,
            "--help" | "-h" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            other => roots.push(other.to_string()),
        }
    }
    if roots.is_empty() {
        roots.push(".".to_string());
    }

    let mut context = ProjectContext::new();
    for root in roots {
        let project = match FsProject::open(Path::new(&root)) {
            Ok(project) => project,
            Err(error) => {
                eprintln!("Error opening project {}: {}", root, error);
                return ExitCode::FAILURE;
            }
        };

        let outcome = context.scan(&project);
        let endpoints = outcome.endpoints;

        if json_output {
            print_json(&mut context, &project, &endpoints, details);
            continue;
        }

        println!("---> Scanning Java/Kotlin sources in: {}", root);
        let base = outcome.base_url;
        match (&base.url, base.provenance) {
            (Some(url), Provenance::Config) => println!("Base URL (from apiscout.yaml): {}", url),
            (Some(url), _) => println!("Base URL (inferred from source): {}", url),
            (None, _) => println!("Base URL: not resolved"),
        }
        println!("Found {} endpoints\n", endpoints.len());

        for endpoint in &endpoints {
            println!("{:7} {}", endpoint.http_method, endpoint.display_url());
            println!(
                "        {}#{}",
                endpoint.service_fqn, endpoint.function_name
            );
            if details {
                print_details(&mut context, &project, endpoint);
            }
        }
    }
    ExitCode::SUCCESS
}

fn print_json(
    context: &mut ProjectContext,
    project: &FsProject,
    endpoints: &[Endpoint],
    details: bool,
) {
    if details {
        let enriched: Vec<_> = endpoints
            .iter()
            .map(|endpoint| {
                let doc = context.resolve_details(project, endpoint);
                serde_json::json!({ "endpoint": endpoint, "details": doc })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&enriched).unwrap());
    } else {
        println!("{}", serde_json::to_string_pretty(endpoints).unwrap());
    }
}

fn print_details(context: &mut ProjectContext, project: &FsProject, endpoint: &Endpoint) {
    let doc = context.resolve_details(project, endpoint);
    if !doc.path_params.is_empty() {
        println!("        path params: {}", param_names(&doc.path_params));
    }
    if !doc.query_params.is_empty() {
        println!("        query params: {}", param_names(&doc.query_params));
    }
    if !doc.header_params.is_empty() {
        println!("        headers: {}", param_names(&doc.header_params));
    }
    println!("        auth: {:?}", doc.auth);
}

fn param_names(list: &apiscout::ParamList) -> String {
    let mut names: Vec<&str> = list.entries.iter().map(|p| p.name.as_str()).collect();
    if list.has_dynamic_entries {
        names.push("<dynamic>");
    }
    names.join(", ")
}

fn print_usage() {
    println!("Usage: apiscout [OPTIONS] [DIR]...");
    println!();
    println!("Scan Java/Kotlin sources for HTTP API endpoints.");
    println!();
    println!("Options:");
    println!("  --json      Emit results as JSON");
    println!("  --details   Include per-endpoint parameter and auth details");
    println!("  -h, --help  Show this help");
}
