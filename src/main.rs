use quadjit::bytecode::{ExceptionHandler, Method};
use quadjit::compile::{self, QuadListing, Settings};
use quadjit::regalloc::{RegisterClass, RegisterPool, RegisterSet};

use clap::{value_parser, Arg, ArgAction, Command};
use std::fs;

fn main() -> Result<(), compile::Error> {
    env_logger::init();

    let matches = Command::new("JVM method compiler")
        .version(clap::crate_version!())
        .about("Compile the bytecode of a JVM method into register-allocated quads")
        .arg(
            Arg::new("INPUT")
                .help("File containing the method's bytecode")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("hex")
                .long("hex")
                .action(ArgAction::SetTrue)
                .help("Input file is hexadecimal text instead of raw bytes"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .default_value("method")
                .help("Method name used in the output"),
        )
        .arg(
            Arg::new("args")
                .long("args")
                .value_name("SLOTS")
                .value_parser(value_parser!(u16))
                .default_value("0")
                .help("Local variable slots taken by arguments (including `this`)"),
        )
        .arg(
            Arg::new("locals")
                .long("locals")
                .value_name("SLOTS")
                .value_parser(value_parser!(u16))
                .default_value("0")
                .help("Local variable slots (at least the argument slots)"),
        )
        .arg(
            Arg::new("max stack")
                .long("max-stack")
                .value_name("SLOTS")
                .value_parser(value_parser!(u16))
                .default_value("16")
                .help("Maximum operand stack depth"),
        )
        .arg(
            Arg::new("handler")
                .long("handler")
                .value_name("START:END:HANDLER")
                .action(ArgAction::Append)
                .help("Exception handler covering [START, END) and jumping to HANDLER"),
        )
        .arg(
            Arg::new("general registers")
                .long("general-registers")
                .value_name("COUNT")
                .value_parser(value_parser!(usize))
                .default_value("14")
                .help("General purpose registers available to the allocator"),
        )
        .arg(
            Arg::new("float registers")
                .long("float-registers")
                .value_name("COUNT")
                .value_parser(value_parser!(usize))
                .default_value("16")
                .help("Floating point registers available to the allocator"),
        )
        .arg(
            Arg::new("no fold")
                .long("no-fold")
                .action(ArgAction::SetTrue)
                .help("Don't fold constants"),
        )
        .arg(
            Arg::new("no dce")
                .long("no-dce")
                .action(ArgAction::SetTrue)
                .help("Don't eliminate dead assignments"),
        )
        .arg(
            Arg::new("no coalesce")
                .long("no-coalesce")
                .action(ArgAction::SetTrue)
                .help("Don't coalesce copies into locals"),
        )
        .get_matches();

    let input = matches
        .get_one::<String>("INPUT")
        .ok_or_else(|| compile::Error::InvalidInput(String::from("missing input file")))?;
    log::info!("Reading '{}'", input);
    let code = if matches.get_flag("hex") {
        parse_hex(&fs::read_to_string(input)?)?
    } else {
        fs::read(input)?
    };

    let slots = |id: &str| matches.get_one::<u16>(id).copied().unwrap_or(0);
    let name = matches
        .get_one::<String>("name")
        .cloned()
        .unwrap_or_default();
    let mut method = Method::new(
        name,
        slots("args"),
        slots("locals"),
        slots("max stack"),
        code,
    );
    if let Some(handlers) = matches.get_many::<String>("handler") {
        for handler in handlers {
            method = method.with_exception_handler(parse_handler(handler)?);
        }
    }

    let mut settings = Settings::new();
    let count = |id: &str| matches.get_one::<usize>(id).copied().unwrap_or(0);
    settings.registers = RegisterSet::first(RegisterClass::General, count("general registers"))
        | RegisterSet::first(RegisterClass::Floating, count("float registers"));
    settings.fold_constants = !matches.get_flag("no fold");
    settings.eliminate_dead_code = !matches.get_flag("no dce");
    settings.coalesce_copies = !matches.get_flag("no coalesce");

    let mut pool = RegisterPool::new(settings.registers);
    let compiled = compile::compile_method(&method, &settings, &mut pool)?;

    println!("{}", compiled.cfg);
    let mut listing = QuadListing::new();
    compiled.generate_code(&mut listing)?;
    println!("{}", listing.output);
    println!("live ranges:");
    for range in &compiled.live_ranges {
        match range.location(&compiled.ir) {
            Some(location) => println!("  {} -> {}", range, location),
            None => println!("  {}", range),
        }
    }

    Ok(())
}

/// Parse hexadecimal text (whitespace is ignored) into bytes
fn parse_hex(text: &str) -> Result<Vec<u8>, compile::Error> {
    let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(compile::Error::InvalidInput(String::from(
            "odd number of hex digits",
        )));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let byte: String = pair.iter().collect();
            u8::from_str_radix(&byte, 16).map_err(|_| {
                compile::Error::InvalidInput(format!("invalid hex byte '{}'", byte))
            })
        })
        .collect()
}

/// Parse `START:END:HANDLER`
fn parse_handler(text: &str) -> Result<ExceptionHandler, compile::Error> {
    let invalid = || compile::Error::InvalidInput(format!("invalid handler '{}'", text));
    let parts = text
        .split(':')
        .map(|part| part.trim().parse::<usize>().map_err(|_| invalid()))
        .collect::<Result<Vec<usize>, _>>()?;
    match parts[..] {
        [start_pc, end_pc, handler_pc] => Ok(ExceptionHandler {
            start_pc,
            end_pc,
            handler_pc,
        }),
        _ => Err(invalid()),
    }
}
