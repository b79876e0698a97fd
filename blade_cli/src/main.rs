//! # Blade Geometry CLI
//!
//! Command line driver for the blade geometry engine: validate an ontology
//! document, run the full remapping pipeline and write the resolved model,
//! or print a human-readable summary.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use blade_core::{BladeModel, BladeOntology, BladeResult, GeometryConfig, NoCorrection, XfoilRunner};

#[derive(Parser)]
#[command(name = "blade_cli", version, about = "Wind turbine blade geometry engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Spanwise grid size.
    #[arg(long, global = true)]
    n_span: Option<usize>,

    /// Points per airfoil profile.
    #[arg(long, global = true)]
    n_profile_pts: Option<usize>,

    /// Path to the external boundary-layer solver executable.
    #[arg(long, global = true)]
    solver: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and sanity-check an ontology document.
    Validate {
        /// Ontology YAML file.
        input: String,
    },
    /// Run the full pipeline and write the resolved model as JSON.
    Process {
        /// Ontology YAML file.
        input: String,
        /// Output path for the resolved model.
        #[arg(short, long, default_value = "blade_model.json")]
        output: String,
        /// Also compute flap-deflected polars with the external solver.
        #[arg(long)]
        flap_polars: bool,
    },
    /// Run the pipeline and print a summary of the resolved model.
    Inspect {
        /// Ontology YAML file.
        input: String,
    },
}

impl Cli {
    fn config(&self) -> GeometryConfig {
        let mut config = GeometryConfig::default();
        if let Some(n) = self.n_span {
            config.n_span = n;
        }
        if let Some(n) = self.n_profile_pts {
            config.n_profile_pts = n;
        }
        if let Some(path) = &self.solver {
            config.flow_solver_path = path.clone();
        }
        config
    }
}

fn run(cli: &Cli) -> BladeResult<i32> {
    match &cli.command {
        Command::Validate { input } => {
            let ontology = BladeOntology::from_file(input)?;
            let blade = &ontology.components.blade;
            println!(
                "'{}' is valid: {} airfoils, {} layers, {} webs, {} materials",
                ontology.name,
                ontology.airfoils.len(),
                blade.internal_structure_2d_fem.layers.len(),
                blade.internal_structure_2d_fem.webs.len(),
                ontology.materials.len()
            );
            Ok(0)
        }
        Command::Process {
            input,
            output,
            flap_polars,
        } => {
            let config = cli.config();
            let mut model = BladeModel::from_file(input, config.clone())?;
            if *flap_polars {
                if config.flow_solver_path.is_empty() {
                    return Err(blade_core::BladeError::invalid_input(
                        "solver",
                        "<empty>",
                        "flap polars need --solver pointing at the flow solver executable",
                    ));
                }
                let solver = XfoilRunner::new(config.flow_solver_path);
                model.compute_flap_polars(&solver, &NoCorrection)?;
            }
            let json = serde_json::to_string_pretty(&model).map_err(blade_core::BladeError::from)?;
            std::fs::write(output, json).map_err(|e| {
                blade_core::BladeError::file_error("write", output.clone(), e.to_string())
            })?;
            println!("wrote resolved model for '{}' to {}", model.name, output);
            Ok(0)
        }
        Command::Inspect { input } => {
            let model = BladeModel::from_file(input, cli.config())?;
            print_summary(&model);
            Ok(0)
        }
    }
}

fn print_summary(model: &BladeModel) {
    let pf = &model.planform;
    let max_chord = pf.chord.iter().cloned().fold(f64::MIN, f64::max);
    println!("blade '{}'", model.name);
    println!("  span stations:   {}", model.n_span());
    println!("  tip radius:      {:.2} m", pf.tip_radius());
    println!("  max chord:       {:.3} m", max_chord);
    println!(
        "  root twist:      {:.2} deg",
        pf.twist_deg.first().copied().unwrap_or(0.0)
    );
    println!("  layers:          {}", model.structure.layers.len());
    println!("  webs:            {}", model.structure.webs.len());
    println!(
        "  polar table:     {} angles x {} span x {} Re x {} deflections",
        model.polars.alpha.len(),
        model.polars.n_span(),
        model.polars.re.len(),
        model.polars.delta.len()
    );
    println!("  control radii:  ");
    for (i, r) in model.ctrl_pts.r.iter().enumerate() {
        println!(
            "    r={r:.4}  chord={:.3} m  twist={:.2} deg",
            model.ctrl_pts.chord[i], model.ctrl_pts.twist_deg[i]
        );
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
