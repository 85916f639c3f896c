//! `glyph` — execute, disassemble or step through a `GLYP` bytecode file.

use bytecode::Chunk;
use clap::Parser;
use debugger::Debugger;
use glyph_cli::runtime::{format_result, parse_location, Runtime};
use glyph_cli::{Args, CliError};
use jit::JitConfig;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let args = Args::parse();

    let mut runtime = Runtime::new();
    runtime.set_max_steps(args.max_steps);

    if args.repl {
        return glyph_cli::repl::run_repl(&mut runtime);
    }

    let file = args
        .file
        .as_ref()
        .ok_or_else(|| CliError::BadArgument("a bytecode file is required unless --repl is given".to_string()))?;
    let bytes = std::fs::read(file)?;

    if args.disassemble {
        print_disassembly(&bytes)?;
        return Ok(());
    }

    if args.debug {
        let mut dbg = Debugger::new();
        for loc in &args.breakpoints {
            let location =
                parse_location(loc).ok_or_else(|| CliError::BadArgument(format!("'{loc}' is not a valid location")))?;
            dbg.set(location);
        }
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let result = runtime.execute_with_debugger(&bytes, &mut dbg, stdin.lock(), stdout.lock())?;
        println!("{}", format_result(&result));
        return Ok(());
    }

    if let Some(route) = &args.route {
        let config = match &args.jit_config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str(&text).map_err(CliError::JitConfig)?
            }
            None => JitConfig::default(),
        };
        runtime = runtime.with_jit(config);
        let (result, tier) = runtime.execute_via_route(route, &bytes)?;
        println!("{}", format_result(&result));
        eprintln!("route {route:?} compiled at tier {tier:?}");
        if let Some(jit) = runtime.jit() {
            println!("{}", serde_json::to_string_pretty(&jit.detailed_stats()).unwrap());
        }
        return Ok(());
    }

    let result = runtime.execute_bytes(&bytes)?;
    println!("{}", format_result(&result));
    Ok(())
}

fn print_disassembly(bytes: &[u8]) -> Result<(), CliError> {
    let chunk = Chunk::load(bytes)?;
    println!("constants:");
    for (i, c) in chunk.constants.iter().enumerate() {
        println!("  [{i}] {c:?}");
    }
    println!("code:");
    let mut pc = 0u32;
    while let Some((line, next)) = bytecode::disassemble_one(&chunk.code, pc) {
        println!("  {:#06x}  {}", pc, line);
        if next <= pc {
            break;
        }
        pc = next;
    }
    Ok(())
}
