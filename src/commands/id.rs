use anyhow::Result;

use crate::Context;
use crate::cli::IdCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: IdCommand) -> Result<()> {
    match cmd {
        IdCommand::Encode {
            database,
            schema,
            name,
        } => {
            println!("{}", policykit::encode(&database, &schema, &name)?);
        }
        IdCommand::Decode { token } => {
            let id = policykit::decode(&token)?;
            if ctx.quiet {
                println!("{id}");
            } else {
                ui::kv("database", id.database());
                ui::kv("schema", id.schema());
                ui::kv("name", id.name());
                ui::kv("qualified_name", &id.qualified_name());
            }
        }
    }
    Ok(())
}
