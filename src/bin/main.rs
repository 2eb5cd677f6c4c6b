//! twosql CLI - Compile two-way SQL templates
//!
//! Usage:
//!   twosql compile <file.sql> [--params <json>] [--dialect <dialect>]
//!   twosql check <file.sql>
//!
//! Examples:
//!   twosql compile sql/users/find.sql --params '{"dept_id": 10}'
//!   twosql compile sql/users/find.sql --dialect oracle --output json
//!   twosql check sql/users/find.sql

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use twosql::parser::{CompileOptions, SqlTemplate};
use twosql::value::{params_from_json, Params};
use twosql::Dialect;

#[derive(Parser)]
#[command(name = "twosql")]
#[command(about = "twosql - compile two-way SQL templates into driver-ready statements")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a template with a JSON parameter object
    Compile {
        /// Path to the .sql template
        file: PathBuf,

        /// Parameters as a JSON object
        #[arg(short, long, default_value = "{}")]
        params: String,

        /// SQL dialect to compile for
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Base directory for %include resolution (defaults to the
        /// template's directory)
        #[arg(short, long)]
        base_dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// Compile a template with an empty parameter map and report errors
    Check {
        /// Path to the .sql template
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Sqlite,
    Postgresql,
    Mysql,
    Oracle,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Dialect {
        match arg {
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Postgresql => Dialect::PostgreSql,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Oracle => Dialect::Oracle,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// The compiled SQL, with bound parameters in a trailing comment
    Sql,
    /// A JSON object with sql, params, and named_params
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Compile {
            file,
            params,
            dialect,
            base_dir,
            output,
        } => {
            let params = parse_params(&params)?;
            let result = compile_file(&file, &params, dialect.map(Into::into), base_dir)?;
            match output {
                OutputFormat::Sql => {
                    println!("{}", result.sql);
                    if !result.params.is_empty() {
                        let rendered: Vec<serde_json::Value> =
                            result.params.into_iter().map(Into::into).collect();
                        println!("-- params: {}", serde_json::Value::Array(rendered));
                    } else if !result.named_params.is_empty() {
                        let rendered: serde_json::Map<String, serde_json::Value> = result
                            .named_params
                            .into_iter()
                            .map(|(k, v)| (k, v.into()))
                            .collect();
                        println!("-- params: {}", serde_json::Value::Object(rendered));
                    }
                }
                OutputFormat::Json => {
                    let positional: Vec<serde_json::Value> =
                        result.params.into_iter().map(Into::into).collect();
                    let named: serde_json::Map<String, serde_json::Value> = result
                        .named_params
                        .into_iter()
                        .map(|(k, v)| (k, v.into()))
                        .collect();
                    let object = serde_json::json!({
                        "sql": result.sql,
                        "params": positional,
                        "named_params": named,
                    });
                    println!("{}", serde_json::to_string_pretty(&object).unwrap_or_default());
                }
            }
            Ok(())
        }
        Commands::Check { file } => {
            compile_file(&file, &Params::new(), None, None)?;
            println!("OK: {}", file.display());
            Ok(())
        }
    }
}

fn parse_params(raw: &str) -> Result<Params, String> {
    let json: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid --params JSON: {e}"))?;
    if !json.is_object() {
        return Err("--params must be a JSON object".to_string());
    }
    Ok(params_from_json(json))
}

fn compile_file(
    file: &PathBuf,
    params: &Params,
    dialect: Option<Dialect>,
    base_dir: Option<PathBuf>,
) -> Result<twosql::CompileResult, String> {
    let source =
        fs::read_to_string(file).map_err(|e| format!("cannot read {}: {e}", file.display()))?;

    let base_dir = base_dir.or_else(|| file.parent().map(PathBuf::from));
    let mut options = CompileOptions::default();
    if let Some(dialect) = dialect {
        options = options.with_dialect(dialect);
    }
    if let Some(dir) = base_dir {
        options = options.with_base_dir(dir);
    }

    let template = SqlTemplate::with_options(source, options).map_err(|e| e.to_string())?;
    template.compile(params).map_err(|e| e.to_string())
}
