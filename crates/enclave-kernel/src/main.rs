use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use enclave_kernel::prelude::*;
use enclave_kernel::{telemetry, DOMAIN_ID_OUTPUT, REPOSITORY_URL_OUTPUT};
use std::path::PathBuf;

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .short('c')
        .default_value("enclave.toml")
        .value_parser(value_parser!(PathBuf))
        .help("Path to the workspace configuration");

    Command::new("enclave")
        .version(enclave_kernel::VERSION)
        .about("Studio enclave: synthesize an isolated notebook workspace")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("synth")
                .about("Emit the resource graph document")
                .arg(config_arg.clone())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("json")
                        .value_parser(["json", "yaml"])
                        .help("Document format"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write to a file instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Validate the configuration and print a summary")
                .arg(config_arg.clone()),
        )
        .subcommand(
            Command::new("order")
                .about("Print the creation order")
                .arg(config_arg)
                .arg(
                    Arg::new("teardown")
                        .long("teardown")
                        .action(ArgAction::SetTrue)
                        .help("Print the teardown order instead"),
                ),
        )
}

fn load(args: &clap::ArgMatches) -> anyhow::Result<Synthesis> {
    let path = args
        .get_one::<PathBuf>("config")
        .context("missing --config")?;
    let config = EnclaveConfig::load(path)?;
    let synthesis = synthesize(&config, &DerivedIdentifiers::new())
        .with_context(|| format!("synthesis of {} failed", path.display()))?;
    Ok(synthesis)
}

fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    telemetry::init(matches.get_flag("log-json"))?;

    match matches.subcommand() {
        Some(("synth", args)) => {
            let synthesis = load(args)?;
            let document = synthesis.graph.to_document();
            let rendered = match args.get_one::<String>("format").map(String::as_str) {
                Some("yaml") => document.to_yaml()?,
                _ => document.to_json()?,
            };
            match args.get_one::<PathBuf>("output") {
                Some(path) => std::fs::write(path, rendered)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{rendered}"),
            }
        }
        Some(("check", args)) => {
            let synthesis = load(args)?;
            let graph = &synthesis.graph;
            println!("Workspace graph: VALID");
            println!("  Resources: {}", graph.len());
            for kind in [
                ResourceKind::EncryptionKey,
                ResourceKind::Endpoint,
                ResourceKind::Bucket,
                ResourceKind::Role,
                ResourceKind::ManagedPolicy,
            ] {
                println!("  {kind}: {}", graph.of_kind(kind).count());
            }
            println!("  Digest: {}", graph.digest());
            for (name, output) in graph.outputs() {
                if name == REPOSITORY_URL_OUTPUT || name == DOMAIN_ID_OUTPUT {
                    println!("  {name}: {}", output.value);
                }
            }
        }
        Some(("order", args)) => {
            let synthesis = load(args)?;
            let order = if args.get_flag("teardown") {
                synthesis.graph.teardown_order()
            } else {
                synthesis.graph.creation_order().to_vec()
            };
            for (index, id) in order.iter().enumerate() {
                let kind = synthesis
                    .graph
                    .get(id)
                    .map(|n| n.kind.to_string())
                    .unwrap_or_default();
                println!("{:>3}  {id}  ({kind})", index + 1);
            }
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}
