use std::{env, fs};

use obdagate_mapping::parse_mapping_document;

fn main() {
    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: obdagate_parse_mapping <file.obda>");
        std::process::exit(2);
    };
    if args.next().is_some() {
        eprintln!("usage: obdagate_parse_mapping <file.obda>");
        std::process::exit(2);
    }

    let text = match fs::read_to_string(&path) {
        Ok(v) => v,
        Err(err) => {
            eprintln!("failed to read `{path}`: {err}");
            std::process::exit(2);
        }
    };

    match parse_mapping_document(&text) {
        Ok(document) => {
            println!(
                "ok(obda): blocks={} failures={}",
                document.blocks.len(),
                document.failures.len()
            );
            for failure in &document.failures {
                eprintln!(
                    "line {}: {} ({})",
                    failure.line,
                    failure.message,
                    failure.mapping_id.as_deref().unwrap_or("?")
                );
            }
            if !document.is_complete() {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
