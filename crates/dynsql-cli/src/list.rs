use crate::cli::ListArgs;
use crate::mappers::load;
use crate::output::{print_error, print_section, table};

pub fn run(args: ListArgs) -> anyhow::Result<()> {
    let mappers = load(&args.sources, None)?;
    for (path, err) in &mappers.failures {
        print_error(&path.display().to_string(), err);
    }

    let engine = &mappers.engine;

    let mut statements = table(&["Statement", "Kind", "Includes", "Nodes"]);
    for statement in engine.statements() {
        let template = statement.template();
        statements.add_row(vec![
            statement.id().to_string(),
            statement.kind().to_string(),
            template.include_refs().join(", "),
            template.node_count().to_string(),
        ]);
    }
    print_section(&format!("Statements ({})", engine.statement_ids().len()));
    println!("{statements}");

    let fragments = engine.fragments();
    if !fragments.is_empty() {
        let mut rows = table(&["Fragment", "Includes"]);
        for id in fragments.ids() {
            let includes = fragments
                .get(id)
                .map(|f| f.include_refs().join(", "))
                .unwrap_or_default();
            rows.add_row(vec![id.to_string(), includes]);
        }
        print_section(&format!("Fragments ({})", fragments.len()));
        println!("{rows}");
    }

    if !mappers.failures.is_empty() {
        anyhow::bail!("{} mapper file(s) failed to load", mappers.failures.len());
    }
    Ok(())
}
