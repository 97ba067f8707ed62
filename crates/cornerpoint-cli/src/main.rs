use clap::{Parser, Subcommand};
use cornerpoint_lang::SolveRequest;
use cornerpoint_solver::{RegionDescription, Solution, Vertex, Viewport};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cornerpoint")]
#[command(about = "Graph two-variable linear programs by their corner points", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a set of constraints, optionally optimizing an objective
    Solve {
        /// A constraint such as "2x + 3y <= 12" (repeatable)
        #[arg(short, long = "constraint")]
        constraints: Vec<String>,
        /// Objective such as "15x + 20y" or "Z = 3x + 2y"
        #[arg(short, long)]
        objective: Option<String>,
        /// max or min
        #[arg(short, long, default_value = "max")]
        sense: String,
        /// Do not add x >= 0 and y >= 0
        #[arg(long)]
        no_nonnegative: bool,
        /// Display window as xmin,xmax,ymin,ymax
        #[arg(long)]
        viewport: Option<String>,
        /// Read the whole request from a JSON file instead
        #[arg(long, conflicts_with_all = ["constraints", "objective"])]
        request: Option<PathBuf>,
        /// Output format (json, pretty)
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
    /// Check that constraints parse and print their canonical form
    Check {
        /// The constraints to check
        constraints: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            constraints,
            objective,
            sense,
            no_nonnegative,
            viewport,
            request,
            format,
        } => {
            let mut request = match request {
                Some(path) => read_request(&path),
                None => SolveRequest {
                    constraints,
                    objective,
                    sense,
                    assume_nonnegative: !no_nonnegative,
                    viewport: None,
                },
            };
            if let Some(text) = viewport {
                match parse_viewport(&text) {
                    Ok(v) => request.viewport = Some(v),
                    Err(e) => {
                        eprintln!("Invalid viewport: {}", e);
                        std::process::exit(1);
                    }
                }
            }

            let description = match request.solve() {
                Ok(d) => d,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };

            if format == "json" {
                match serde_json::to_string_pretty(&description) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error writing JSON: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                print_description(&description);
            }
        }
        Commands::Check { constraints } => {
            let mut failed = false;
            for (i, source) in constraints.iter().enumerate() {
                match cornerpoint_lang::Parser::parse_constraint(source) {
                    Ok(c) => println!("✓ {}: {}x + {}y {} {}", i + 1, c.a(), c.b(), c.relation(), c.c()),
                    Err(e) => {
                        println!("✗ {}: {}", i + 1, e);
                        failed = true;
                    }
                }
            }
            if failed {
                std::process::exit(1);
            }
        }
    }
}

fn read_request(path: &Path) -> SolveRequest {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            std::process::exit(1);
        }
    };
    match serde_json::from_str(&source) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid request {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn parse_viewport(text: &str) -> Result<Viewport, String> {
    let bounds = text
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|e| format!("'{}': {}", part.trim(), e)))
        .collect::<Result<Vec<_>, _>>()?;
    match bounds.as_slice() {
        &[xmin, xmax, ymin, ymax] => Viewport::new(xmin, xmax, ymin, ymax).map_err(|e| e.to_string()),
        _ => Err(format!("expected 4 numbers, got {}", bounds.len())),
    }
}

fn point(v: &Vertex) -> String {
    format!("({}, {})", round(v.x), round(v.y))
}

fn round(value: f64) -> f64 {
    (value * 1e6).round() / 1e6 + 0.0
}

fn print_vertices(description: &RegionDescription, values: &[f64]) {
    println!("Corner points:");
    for (i, v) in description.solution.vertices().iter().enumerate() {
        let tight: Vec<&str> = v
            .tight
            .iter()
            .filter_map(|&t| description.constraints.get(t))
            .map(|c| c.source.as_str())
            .collect();
        let value = values
            .get(i)
            .map(|z| format!("  z = {}", round(*z)))
            .unwrap_or_default();
        let flag = if v.degenerate { "  (degenerate)" } else { "" };
        println!("  {:<24}{}  [{}]{}", point(v), value, tight.join(", "), flag);
    }
}

fn print_description(description: &RegionDescription) {
    println!("Constraints:");
    for c in &description.constraints {
        let note = if c.implicit { "  (default)" } else { "" };
        println!("  {}. {}{}", c.index + 1, c.source, note);
    }
    println!();

    match &description.solution {
        Solution::Infeasible { conflicts } => {
            println!("Status: INFEASIBLE");
            println!("No point satisfies every constraint.");
            for conflict in conflicts {
                let sources: Vec<String> = conflict
                    .constraints
                    .iter()
                    .filter_map(|&i| description.constraints.get(i))
                    .map(|c| format!("'{}'", c.source))
                    .collect();
                println!("  {} cannot all hold", sources.join(", "));
            }
        }
        Solution::UnboundedObjective { direction, .. } => {
            println!("Status: UNBOUNDED OBJECTIVE");
            print_vertices(description, &[]);
            println!(
                "The objective improves without limit along ({}, {}).",
                round(direction.x),
                round(direction.y)
            );
        }
        Solution::Unbounded {
            witnesses,
            values,
            optimum,
            ..
        } => {
            println!("Status: UNBOUNDED REGION");
            if description.solution.vertices().is_empty() {
                println!("The region has no corner points. Sample points:");
                for (i, w) in witnesses.iter().enumerate() {
                    let value = values
                        .get(i)
                        .map(|z| format!("  z = {}", round(*z)))
                        .unwrap_or_default();
                    println!("  {}{}", point(w), value);
                }
            } else {
                print_vertices(description, values);
            }
            println!("Open directions:");
            for d in description.solution.open_directions() {
                println!("  ({}, {})", round(d.x), round(d.y));
            }
            if let Some(opt) = optimum {
                println!();
                println!("Optimum: z = {} at {}", round(opt.value), point(&opt.vertex));
                if let Some(ray) = opt.optimal_ray {
                    println!("  also along ({}, {}) from there", round(ray.x), round(ray.y));
                }
            }
        }
        Solution::Bounded {
            values, optimum, ..
        } => {
            println!("Status: BOUNDED");
            print_vertices(description, values);
            if let Some(opt) = optimum {
                println!();
                println!("Optimum: z = {} at {}", round(opt.value), point(&opt.vertex));
                if opt.is_tied() {
                    let tied: Vec<String> = opt.tied.iter().map(point).collect();
                    println!("  every point on the edge {} is optimal", tied.join(" - "));
                }
            }
        }
    }
}
