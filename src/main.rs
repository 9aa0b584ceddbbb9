use harvest::loader::{load_document, load_document_concurrent};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut concurrent = false;
    let mut workers = 0usize;
    let mut path: Option<String> = None;

    let mut i = 0usize;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--concurrent" => concurrent = true,
            "--workers" => {
                if i + 1 >= args.len() {
                    eprintln!("missing value for --workers");
                    std::process::exit(2);
                }
                workers = parse_workers(&args[i + 1]);
                i += 1;
            }
            _ if arg.starts_with("--workers=") => {
                workers = parse_workers(&arg["--workers=".len()..]);
            }
            _ => {
                path = Some(arg.clone());
            }
        }
        i += 1;
    }

    let path = match path {
        Some(path) => path,
        None => {
            eprintln!("Usage: harvest [--concurrent] [--workers N] <path-to-pdf>");
            std::process::exit(2);
        }
    };

    let result = if concurrent {
        load_document_concurrent(&path, workers)
    } else {
        load_document(&path)
    };
    let doc = match result {
        Ok(doc) => doc,
        Err(err) => {
            eprintln!("Failed to load PDF: {}", err);
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&doc) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            eprintln!("Failed to encode JSON: {}", err);
            std::process::exit(1);
        }
    }
}

fn parse_workers(value: &str) -> usize {
    match value.parse() {
        Ok(workers) => workers,
        Err(_) => {
            eprintln!("invalid value for --workers: {}", value);
            std::process::exit(2);
        }
    }
}
