use crate::cli::RenderArgs;
use crate::mappers::load;
use crate::output::print_section;
use colored::Colorize;
use dynsql::{Context, PlaceholderStyle, RenderResult};
use serde_json::Value;

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let placeholder = args.dollar.then_some(PlaceholderStyle::Dollar);
    let mappers = load(&args.sources, placeholder)?;
    if let Some((path, err)) = mappers.failures.first() {
        anyhow::bail!("failed to load {}: {err}", path.display());
    }

    let ctx = Context::from_value(read_params(args.params.as_deref())?);
    let result = mappers
        .engine
        .render(&args.statement, &ctx)
        .map_err(|e| anyhow::anyhow!("{}: {e}", args.statement))?;

    print_result(&result, args.inline);
    Ok(())
}

/// `--params` value: inline JSON, `@file` holding JSON, or nothing.
pub fn read_params(raw: Option<&str>) -> anyhow::Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(Default::default()));
    };
    let (text, origin) = match raw.strip_prefix('@') {
        Some(path) => (
            std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read params file {path}: {e}"))?,
            path,
        ),
        None => (raw.to_string(), "--params"),
    };
    serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("invalid JSON in {origin}: {e}"))
}

fn print_result(result: &RenderResult, inline: bool) {
    print_section("SQL");
    println!("{}", result.sql);

    if !result.params.is_empty() {
        print_section("Params");
        for (i, value) in result.params.iter().enumerate() {
            let token = result.style.token(i + 1);
            println!("  {} {value}", format!("{token:>4}").bright_black());
        }
    }

    if inline {
        print_section("Inlined (not for execution)");
        println!("{}", result.to_inline_sql());
    }
}
