use crossterm::style::Stylize;
use fasttext_core::{EngineConfig, InferenceEngine};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

const DEFAULT_NEIGHBOURS: usize = 10;
const PREVIEW_WORDS: usize = 20;

fn print_help() {
    println!("{}", "fastText query shell".bold());
    println!("  load <name> <path>     load a model (replaces an existing one)");
    println!("  unload <name>          drop a model");
    println!("  use <name>             select the model for the commands below");
    println!("  models                 list loaded models");
    println!("  predict <k> <text>     top-k labels");
    println!("  intent <text>          top intents (at most six)");
    println!("  vec <word>             word vector");
    println!("  sentence <text>        sentence vector");
    println!("  nn <word> [k]          nearest neighbours");
    println!("  words | labels | dim   vocabulary and shape");
    println!("  exit");
}

fn print_ranked(rows: &[(String, f32)]) {
    if rows.is_empty() {
        println!("{}", "(no result)".dark_grey());
    }
    for (i, (name, score)) in rows.iter().enumerate() {
        println!("  {:>2}. {} {:.5}", i + 1, name.as_str().green(), score);
    }
}

fn print_vector(values: &[f32]) {
    let text: Vec<String> = values.iter().map(|v| format!("{v:.5}")).collect();
    println!("{}", text.join(" "));
}

/// Runs one command line. Returns false when the shell should stop.
fn handle(engine: &InferenceEngine, current: &mut Option<String>, line: &str) -> fasttext_core::Result<bool> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let selected = current.clone();
    let model = || {
        selected
            .clone()
            .ok_or_else(|| fasttext_core::FastTextError::invalid_argument("no model selected, try `use <name>`"))
    };

    match command {
        "" => {}
        "exit" | "quit" => return Ok(false),
        "help" => print_help(),
        "load" => {
            let (name, path) = rest
                .split_once(' ')
                .ok_or_else(|| fasttext_core::FastTextError::invalid_argument("usage: load <name> <path>"))?;
            engine.load_model(name, path.trim())?;
            *current = Some(name.to_string());
            println!("{} {}", "loaded".green(), name);
        }
        "unload" => {
            if engine.unload_model(rest) {
                if current.as_deref() == Some(rest) {
                    *current = None;
                }
                println!("{} {}", "unloaded".green(), rest);
            } else {
                return Err(fasttext_core::FastTextError::ModelNotFound(rest.to_string()));
            }
        }
        "use" => {
            engine.model(rest)?;
            *current = Some(rest.to_string());
        }
        "models" => {
            for name in engine.model_names() {
                let marker = if current.as_deref() == Some(name.as_str()) { "*" } else { " " };
                println!("{marker} {name}");
            }
        }
        "predict" => {
            let (k, text) = rest.split_once(' ').unwrap_or((rest, ""));
            let k: usize = k
                .parse()
                .map_err(|_| fasttext_core::FastTextError::invalid_argument("usage: predict <k> <text>"))?;
            print_ranked(&engine.predict(&model()?, text, k)?);
        }
        "intent" => {
            let (labels, scores) = engine.predict_max_intention(&model()?, rest)?;
            let rows: Vec<(String, f32)> = labels.into_iter().zip(scores).collect();
            print_ranked(&rows);
        }
        "vec" => print_vector(&engine.get_word_vector(&model()?, rest)?),
        "sentence" => print_vector(&engine.get_sentence_vector(&model()?, rest)?),
        "nn" => {
            let (word, k) = rest.split_once(' ').unwrap_or((rest, ""));
            let k = k.trim().parse().unwrap_or(DEFAULT_NEIGHBOURS);
            print_ranked(&engine.get_most_similar(&model()?, word, k)?);
        }
        "words" => {
            let name = model()?;
            let words = engine.get_words(&name)?;
            println!("{} words", engine.get_word_n(&name)?);
            println!("{}", words.iter().take(PREVIEW_WORDS).cloned().collect::<Vec<_>>().join(" "));
        }
        "labels" => println!("{}", engine.get_labels(&model()?)?.join(" ")),
        "dim" => println!("{}", engine.get_dimension(&model()?)?),
        other => println!("{} '{}', type `help`", "unknown command".yellow(), other),
    }
    Ok(true)
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let engine = InferenceEngine::new();
    let mut current = None;

    match EngineConfig::load_from_env() {
        Ok(config) => {
            if let Err(e) = engine.apply_config(&config) {
                eprintln!("{} {}", "config:".red(), e);
            }
            current = config.models.first().map(|m| m.name.clone());
        }
        Err(e) => eprintln!("{} {}", "config:".red(), e),
    }

    // Extra models as `name=path` arguments.
    for arg in std::env::args().skip(1) {
        let Some((name, path)) = arg.split_once('=') else {
            eprintln!("{} expected name=path, got '{}'", "args:".red(), arg);
            continue;
        };
        match engine.load_model(name, path) {
            Ok(()) => current = Some(name.to_string()),
            Err(e) => eprintln!("{} {}", format!("{name}:").red(), e),
        }
    }

    print_help();
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("{} ", format!("[{}]>", current.as_deref().unwrap_or("-")).cyan());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match handle(&engine, &mut current, line.trim()) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("{} {}", "error:".red(), e),
        }
    }
    Ok(())
}
