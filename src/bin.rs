use clap::Parser;
use stratlog::{pretty::Pretty, Diagnostic, EvalConfig, EVAL_CONFIG};
use std::io::Read as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Evaluates a Datalog program and prints every fact it implies.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Program source; standard input when omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Upper bound on the number of facts
    #[arg(long, value_name = "N", default_value_t = EVAL_CONFIG.max_facts)]
    max_facts: usize,

    /// Upper bound on passes per stratum
    #[arg(long, value_name = "N", default_value_t = EVAL_CONFIG.max_iterations)]
    max_iterations: usize,

    /// Only print these relations
    #[arg(long = "relation", value_name = "NAME")]
    relations: Vec<String>,

    /// Also print the stratification
    #[arg(long)]
    strata: bool,
}

impl Args {
    fn config(&self) -> EvalConfig {
        EvalConfig::default()
            .with_max_facts(self.max_facts)
            .with_max_iterations(self.max_iterations)
    }
    fn source_name(&self) -> String {
        match &self.file {
            Some(path) => path.display().to_string(),
            None => "<stdin>".to_owned(),
        }
    }
    fn read_source(&self) -> std::io::Result<String> {
        match &self.file {
            Some(path) => std::fs::read_to_string(path),
            None => {
                let mut buffer = String::new();
                std::io::stdin().lock().read_to_string(&mut buffer)?;
                Ok(buffer)
            }
        }
    }
}

fn timed<R>(func: impl FnOnce() -> R) -> (Duration, R) {
    let start = Instant::now();
    let r = func();
    (start.elapsed(), r)
}

fn report(name: &str, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic.position {
            Some(position) => eprintln!("{name}:{position}: {}", diagnostic.message),
            None => eprintln!("{name}: {}", diagnostic.message),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let name = args.source_name();
    let source = match args.read_source() {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{name}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (dur, compiled) = timed(|| stratlog::compile(&source));
    tracing::info!(?dur, "compiled {name}");
    let rule_set = match compiled {
        Ok(rule_set) => rule_set,
        Err(e) => {
            report(&name, &e.diagnostics());
            return ExitCode::FAILURE;
        }
    };

    if args.strata {
        // compilation already checked stratifiability
        if let Ok(stratification) = stratlog::stratify(&rule_set) {
            println!("{}", Pretty { t: &stratification, rule_set: &rule_set });
        }
    }

    let (dur, evaluated) = timed(|| stratlog::evaluate_with(&rule_set, &args.config()));
    let store = match evaluated {
        Ok(store) => store,
        Err(e) => {
            report(&name, &e.diagnostics());
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(?dur, facts = store.len(), "evaluated {name}");

    if args.relations.is_empty() {
        print!("{store}");
    } else {
        for relation in &args.relations {
            print!("{}", store.display_relation(relation));
        }
    }
    ExitCode::SUCCESS
}
