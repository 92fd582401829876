use lits::analyzer::{calculate_outcomes, find_unresolved_symbols};
use lits::parser::parse;
use lits::{Context, Error, Params, Value, data_type_of_source, run_source};
use log::{LevelFilter, Log, Metadata, Record};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::cell::RefCell;
use std::panic;
use std::process;
use std::rc::Rc;

/// Writes `time` measurements and evaluator tracing to stderr
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() {
    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }

    println!("Lits expression evaluator");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let global = Rc::new(RefCell::new(Context::new()));
    let params = Params {
        global_context: Some(Rc::clone(&global)),
        ..Params::default()
    };
    let mut json_mode = false;

    loop {
        match rl.readline("lits> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
                match command {
                    ":help" => print_help(),
                    ":env" => print_environment(&global.borrow()),
                    ":json" => {
                        json_mode = !json_mode;
                        println!("JSON output {}", if json_mode { "enabled" } else { "disabled" });
                    }
                    ":debug" => {
                        let level = if log::max_level() == LevelFilter::Debug {
                            LevelFilter::Info
                        } else {
                            LevelFilter::Debug
                        };
                        log::set_max_level(level);
                        println!("Log level: {level}");
                    }
                    ":type" => match data_type_of_source(rest, &params) {
                        Ok(t) => println!("{t}"),
                        Err(e) => println!("Error: {e}"),
                    },
                    ":unresolved" => print_unresolved(rest, &params),
                    ":outcomes" => print_outcomes(rest, &params),
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => match run_source(line, &params) {
                        Ok(value) => print_value(&value, json_mode),
                        Err(e) => println!("Error: {e}"),
                    },
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_value(value: &Value, json_mode: bool) {
    if json_mode {
        match serde_json::Value::try_from(value) {
            Ok(json) => println!("{json}"),
            Err(Error::TypeError(msg)) => println!("{value} (not representable as JSON: {msg})"),
            Err(e) => println!("Error: {e}"),
        }
    } else {
        println!("{value}");
    }
}

fn print_unresolved(source: &str, params: &Params) {
    match parse(source) {
        Ok(ast) => {
            let unresolved = find_unresolved_symbols(&ast, params);
            if unresolved.is_empty() {
                println!("All symbols resolve.");
            }
            for symbol in unresolved {
                println!("  {}", symbol.symbol);
            }
        }
        Err(e) => println!("Error: {e}"),
    }
}

fn print_outcomes(source: &str, params: &Params) {
    match parse(source) {
        Ok(ast) => {
            for node in &ast.body {
                match calculate_outcomes(node, params) {
                    Some(outcomes) => {
                        for outcome in outcomes {
                            println!("  {outcome}");
                        }
                    }
                    None => println!("  (too many outcomes)"),
                }
            }
        }
        Err(e) => println!("Error: {e}"),
    }
}

fn print_help() {
    println!("Lits REPL:");
    println!("  :help              - Show this help message");
    println!("  :env               - Show definitions made with def and defn");
    println!("  :json              - Toggle JSON output of results");
    println!("  :debug             - Toggle evaluator debug logging");
    println!("  :type <expr>       - Show the type of the values <expr> may produce");
    println!("  :unresolved <expr> - List symbols <expr> uses but never binds");
    println!("  :outcomes <expr>   - List the forms <expr> may reduce to");
    println!("  :quit, :exit       - Exit the interpreter");
    println!("  Ctrl+C             - Exit the interpreter");
    println!();
    println!("Examples:");
    println!("  (+ 1 2 3)");
    println!("  (defn square [x] (* x x))");
    println!("  (map square [1 2 3])");
    println!("  :type (map inc [1 2])");
    println!("  (time! (reduce + (range 1000)))");
    println!();
}

fn print_environment(global: &Context) {
    if global.is_empty() {
        println!("Nothing defined yet.");
        return;
    }

    let mut bindings: Vec<_> = global.iter().collect();
    bindings.sort_by(|a, b| a.0.cmp(b.0));
    println!("Definitions ({} total):", bindings.len());
    for (name, value) in bindings {
        println!("  {name} = {value}");
    }
}
