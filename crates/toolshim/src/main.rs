//! Convert chat requests to text-format tool calling and parse model replies.
//!
//! Every subcommand reads JSON or text from `--input` (or stdin) and writes
//! JSON or text to stdout. Logs go to stderr.
//!
//! # Examples
//!
//! ```sh
//! # Flatten a chat request for a model without native tool calling
//! toolshim convert --input request.json --format markdown
//!
//! # Parse a raw model reply into an assistant message
//! echo 'Sure.<tool_call><name>ping</name></tool_call>' | toolshim extract
//!
//! # Check a tool call against its schema, including every JSON Schema rule
//! toolshim validate --tools tools.json --input call.json --strict
//!
//! # Show the tool documentation the model will see
//! toolshim schema --tools tools.json --format python
//! ```

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use toolshim::config::{PipelineConfig, ToolFormat};
use toolshim::pipeline::ToolPipeline;
use toolshim::reflection::{format_extraction_failure, format_validation_failure};
use toolshim::validator::ToolValidator;
use toolshim::ToolDef;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Text-format tool calling for models without native function calling.
#[derive(Parser)]
#[command(name = "toolshim", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    // ── Format ─────────────────────────────────────────────────
    /// Tool format: xml, json, markdown or python
    #[arg(long, global = true)]
    format: Option<ToolFormat>,

    /// Start marker override (requires --end)
    #[arg(long, global = true, requires = "end")]
    start: Option<String>,

    /// End marker override (requires --start)
    #[arg(long, global = true, requires = "start")]
    end: Option<String>,

    // ── Conversion ─────────────────────────────────────────────
    /// Placeholder replaced by the tool documentation
    #[arg(long, global = true)]
    placeholder: Option<String>,

    /// Only inject tool documentation into system messages
    #[arg(long, global = true)]
    system_only: bool,

    /// JSON config file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    // ── Logging ────────────────────────────────────────────────
    /// Log filter, e.g. "debug" or "toolshim=trace"
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Flatten a chat request (JSON) into plain-text form
    Convert {
        /// Request file; stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Parse a raw model reply into an assistant message
    Extract {
        /// Reply file; stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Validate a tool call (or an array of calls) against tool definitions
    Validate {
        /// JSON array of tool definitions
        #[arg(long)]
        tools: PathBuf,
        /// Tool call file; stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
        /// Also apply every JSON Schema rule of the tool parameters
        #[arg(long)]
        strict: bool,
    },
    /// Print the tool documentation the model will see
    Schema {
        /// JSON array of tool definitions
        #[arg(long)]
        tools: PathBuf,
    },
}

/// What a subcommand printed and whether it succeeded.
struct Outcome {
    output: String,
    ok: bool,
}

impl Outcome {
    fn ok(output: String) -> Self {
        Self { output, ok: true }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_input(path: Option<&Path>) -> Result<String, String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read input file '{}': {e}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            Ok(buf)
        }
    }
}

fn parse_json(text: &str, what: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|e| format!("failed to parse {what}: {e}"))
}

fn load_tools(path: &Path) -> Result<Vec<ToolDef>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read tools file '{}': {e}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("failed to parse tools file '{}': {e}", path.display()))
}

fn pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to format output: {e}"))
}

/// Config file (or defaults) with command-line overrides applied.
fn build_config(cli: &Cli) -> Result<PipelineConfig, String> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(format) = cli.format {
        config = config.with_format(format);
    }
    if let (Some(start), Some(end)) = (&cli.start, &cli.end) {
        config = config.with_markers(start, end);
    }
    if let Some(placeholder) = &cli.placeholder {
        config = config.with_placeholder(placeholder);
    }
    if cli.system_only {
        config = config.with_replace_schema_all(false);
    }
    debug!(format = %config.format, markers = ?config.markers(), "Pipeline configured");
    Ok(config)
}

// ── Subcommands ────────────────────────────────────────────────────

fn convert(pipeline: &ToolPipeline, input: Option<&Path>) -> Result<Outcome, String> {
    let request = parse_json(&read_input(input)?, "chat request")?;
    let converted = pipeline
        .convert_value(&request)
        .map_err(|e| e.to_string())?;
    Ok(Outcome::ok(pretty(&converted)?))
}

fn extract(
    pipeline: &ToolPipeline,
    config: &PipelineConfig,
    input: Option<&Path>,
) -> Result<Outcome, String> {
    let raw = read_input(input)?;
    let (response, errors) = pipeline.extract_response(raw.trim_end_matches('\n'));
    let mut report = json!({ "message": response, "errors": errors });
    if !errors.is_empty() {
        report["correction"] = json!(format_extraction_failure(
            config.format,
            &config.markers(),
            &errors
        ));
    }
    Ok(Outcome::ok(pretty(&report)?))
}

fn validate(tools: &Path, input: Option<&Path>, strict: bool) -> Result<Outcome, String> {
    let tools = load_tools(tools)?;
    let calls = match parse_json(&read_input(input)?, "tool call")? {
        Value::Array(calls) => calls,
        call => vec![call],
    };

    let validator = ToolValidator;
    let mut ok = true;
    let mut reports = Vec::with_capacity(calls.len());
    for call in &calls {
        let violations = if strict {
            validator.validate_strict(call, &tools)
        } else {
            validator.validate(call, &tools)
        };
        let mut report = json!({ "valid": violations.is_empty(), "violations": violations });
        if !violations.is_empty() {
            ok = false;
            let function = call.get("function");
            let name = function
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let arguments = match function.and_then(|f| f.get("arguments")) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            report["correction"] = json!(format_validation_failure(name, &arguments, &violations));
        }
        reports.push(report);
    }

    let output = match reports.len() {
        1 => pretty(&reports[0])?,
        _ => pretty(&reports)?,
    };
    Ok(Outcome { output, ok })
}

fn schema(pipeline: &ToolPipeline, tools: &Path) -> Result<Outcome, String> {
    let tools = load_tools(tools)?;
    Ok(Outcome::ok(pipeline.schema_text(&tools)))
}

fn run(cli: &Cli) -> Result<Outcome, String> {
    let config = build_config(cli)?;
    let pipeline = ToolPipeline::new(config.clone());
    match &cli.command {
        Command::Convert { input } => convert(&pipeline, input.as_deref()),
        Command::Extract { input } => extract(&pipeline, &config, input.as_deref()),
        Command::Validate {
            tools,
            input,
            strict,
        } => validate(tools, input.as_deref(), *strict),
        Command::Schema { tools } => schema(&pipeline, tools),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(&cli) {
        Ok(outcome) => {
            println!("{}", outcome.output);
            if !outcome.ok {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
