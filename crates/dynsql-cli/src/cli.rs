use std::path::PathBuf;

pub const DEFAULT_CONFIG: &str = "dynsql.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Check,
    List,
    Render,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Check(CheckArgs),
    List(ListArgs),
    Render(RenderArgs),
}

/// Where mapper documents come from: explicit files, or the config's globs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArgs {
    pub config: PathBuf,
    pub files: Vec<PathBuf>,
}

impl Default for SourceArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from(DEFAULT_CONFIG),
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckArgs {
    pub sources: SourceArgs,
    pub deny_warnings: bool,
}

#[derive(Debug, Clone)]
pub struct ListArgs {
    pub sources: SourceArgs,
}

#[derive(Debug, Clone)]
pub struct RenderArgs {
    pub sources: SourceArgs,
    pub statement: String,
    /// Inline JSON, or `@path` to read it from a file.
    pub params: Option<String>,
    pub dollar: bool,
    pub inline: bool,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help(HelpTopic::Root)),
        "check" => parse_check(it.map(|s| s.as_str())),
        "list" => parse_list(it.map(|s| s.as_str())),
        "render" => parse_render(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

/// Handle `--config`; returns false when `token` is not a config flag.
fn parse_config_flag<'a>(
    token: &str,
    it: &mut impl Iterator<Item = &'a str>,
    sources: &mut SourceArgs,
) -> anyhow::Result<bool> {
    if token == "--config" {
        let Some(v) = it.next() else {
            anyhow::bail!("--config requires a value");
        };
        sources.config = PathBuf::from(v);
        return Ok(true);
    }
    if let Some(v) = token.strip_prefix("--config=") {
        sources.config = PathBuf::from(v);
        return Ok(true);
    }
    Ok(false)
}

fn parse_check<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut sources = SourceArgs::default();
    let mut deny_warnings = false;

    while let Some(token) = it.next() {
        if parse_config_flag(token, &mut it, &mut sources)? {
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Check)),
            "--deny-warnings" => deny_warnings = true,
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other => sources.files.push(PathBuf::from(other)),
        }
    }

    Ok(Command::Check(CheckArgs {
        sources,
        deny_warnings,
    }))
}

fn parse_list<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut sources = SourceArgs::default();

    while let Some(token) = it.next() {
        if parse_config_flag(token, &mut it, &mut sources)? {
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::List)),
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other => sources.files.push(PathBuf::from(other)),
        }
    }

    Ok(Command::List(ListArgs { sources }))
}

fn parse_render<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut sources = SourceArgs::default();
    let mut statement: Option<String> = None;
    let mut params: Option<String> = None;
    let mut dollar = false;
    let mut inline = false;

    while let Some(token) = it.next() {
        if parse_config_flag(token, &mut it, &mut sources)? {
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Render)),
            "--params" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--params requires a value");
                };
                params = Some(v.to_string());
            }
            _ if token.starts_with("--params=") => {
                params = Some(token.trim_start_matches("--params=").to_string());
            }
            "--dollar" => dollar = true,
            "--inline" => inline = true,
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other if statement.is_none() => statement = Some(other.to_string()),
            other => sources.files.push(PathBuf::from(other)),
        }
    }

    let Some(statement) = statement else {
        anyhow::bail!("missing statement id: expected `dynsql render <STATEMENT>`");
    };

    Ok(Command::Render(RenderArgs {
        sources,
        statement,
        params,
        dollar,
        inline,
    }))
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
dynsql - check, list and render MyBatis-style mapper files

USAGE:
  dynsql <COMMAND> [OPTIONS] [FILES...]

COMMANDS:
  check         Parse mappers and report errors and unresolved includes
  list          List the statements and fragments mappers define
  render        Render one statement with JSON parameters

Mapper files come from FILES when given, otherwise from `mappers` in the config.
Run `dynsql <command> --help` for more."
            );
        }
        HelpTopic::Check => {
            println!(
                "\
USAGE:
  dynsql check [OPTIONS] [FILES...]

OPTIONS:
  --config <FILE>       Config file path (default: dynsql.toml)
  --deny-warnings       Treat unresolved includes as errors
  -h, --help            Print help"
            );
        }
        HelpTopic::List => {
            println!(
                "\
USAGE:
  dynsql list [OPTIONS] [FILES...]

OPTIONS:
  --config <FILE>       Config file path (default: dynsql.toml)
  -h, --help            Print help"
            );
        }
        HelpTopic::Render => {
            println!(
                "\
USAGE:
  dynsql render <STATEMENT> [OPTIONS] [FILES...]

OPTIONS:
  --config <FILE>       Config file path (default: dynsql.toml)
  --params <JSON|@FILE> Parameter object as JSON, or @path to a JSON file
  --dollar              Use $1, $2, ... placeholders
  --inline              Also print the SQL with parameters inlined (for reading only)
  -h, --help            Print help"
            );
        }
    }
}
