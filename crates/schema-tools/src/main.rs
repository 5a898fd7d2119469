use schema_tools::runtime::boot;
use schema_tools::schema;
use schema_tools::toolbox::Toolbox;

const USAGE: &str = "usage: schema-tools scan <file.jsonl> | validate <schema.json> [--overwrite]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let toolbox = boot::boot()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = run(&toolbox, &args);
    toolbox.shutdown();
    result
}

fn run(toolbox: &Toolbox, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    match args {
        [cmd, path] if cmd == "scan" => {
            let report = toolbox.scan_jsonl(path)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        [cmd, path, rest @ ..] if cmd == "validate" => {
            let overwrite = match rest {
                [] => false,
                [flag] if flag == "--overwrite" => true,
                _ => return Err(USAGE.into()),
            };
            let text = std::fs::read_to_string(toolbox.guard().check_read(path)?)?;
            let document = schema::parse_and_validate(&text).map_err(|e| {
                tracing::error!("{}: {}", path, e);
                e
            })?;
            let written = schema::persist_schema(
                toolbox.guard(),
                &document,
                &toolbox.config().output_dir(),
                overwrite,
            )?;
            println!("{}", written.display());
            Ok(())
        }
        _ => Err(USAGE.into()),
    }
}
