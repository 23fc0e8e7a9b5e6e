use crate::cli::CheckArgs;
use crate::mappers::{LoadedMappers, load};
use crate::output::{print_error, print_success, print_warning};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub errors: usize,
    pub warnings: usize,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let mappers = load(&args.sources, None)?;
    let summary = report(&mappers);

    if summary.errors > 0 || (args.deny_warnings && summary.warnings > 0) {
        anyhow::bail!(
            "mapper check failed: {} error(s), {} warning(s)",
            summary.errors,
            summary.warnings
        );
    }

    print_success(&format!(
        "{} mapper file(s), {} statement(s), {} fragment(s), {} warning(s)",
        mappers.loaded.len(),
        mappers.engine.statement_ids().len(),
        mappers.engine.fragments().len(),
        summary.warnings
    ));
    Ok(())
}

/// Print load failures as errors and unresolved includes as warnings.
pub fn report(mappers: &LoadedMappers) -> CheckSummary {
    let mut summary = CheckSummary::default();

    for (path, err) in &mappers.failures {
        summary.errors += 1;
        print_error(&path.display().to_string(), err);
    }

    for (statement, missing) in mappers.engine.unresolved_includes() {
        let header = match mappers.file_of(statement) {
            Some(path) => format!("{}:{statement}", path.display()),
            None => statement.to_string(),
        };
        for refid in missing {
            summary.warnings += 1;
            print_warning(&header, format!("include target '{refid}' is not registered"));
        }
    }

    summary
}
