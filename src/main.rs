use sqlpilot::batch::{load_questions, BatchRunner};
use sqlpilot::config::{
    ApiStyle, CorrectionInput, LinterConfig, LlmConfig, PipelineConfig, DEFAULT_DDL_PATH,
    DEFAULT_OUTPUT_PATH,
};
use sqlpilot::ddl::DdlDocument;
use sqlpilot::linter::{Sqlfluff, SqlLinter};
use sqlpilot::llm::LlmClient;
use sqlpilot::pipeline::Text2SqlPipeline;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlpilot")]
#[command(about = "Turn natural-language questions into linted SQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate SQL for a single question and print it
    Ask {
        /// The question in natural language
        question: String,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Generate SQL for every line of a questions file and write a CSV
    Batch {
        /// File with one question per line
        questions: PathBuf,

        /// Output CSV path (overwritten)
        #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH)]
        output: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Fix and lint a SQL file with sqlfluff
    Lint {
        /// SQL file to check
        sql_file: PathBuf,

        #[command(flatten)]
        linter: LinterArgs,
    },
}

#[derive(Args)]
struct PipelineArgs {
    /// Path to the DDL file used as schema context
    #[arg(short, long, default_value = DEFAULT_DDL_PATH)]
    ddl: PathBuf,

    /// API key (or set OPENAI_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Model name (or set OPENAI_MODEL env var)
    #[arg(long)]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible API (or set OPENAI_BASE_URL env var)
    #[arg(long)]
    base_url: Option<String>,

    /// "chat" or "completions"
    #[arg(long)]
    api_style: Option<ApiStyle>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Fix the model's verification answer instead of the first candidate
    #[arg(long)]
    apply_verification: bool,

    #[command(flatten)]
    linter: LinterArgs,
}

#[derive(Args)]
struct LinterArgs {
    /// sqlfluff executable (or set SQLFLUFF_BIN env var)
    #[arg(long)]
    sqlfluff_bin: Option<String>,

    /// SQL dialect passed to sqlfluff (or set SQLFLUFF_DIALECT env var)
    #[arg(long)]
    dialect: Option<String>,
}

impl LinterArgs {
    fn config(&self) -> LinterConfig {
        let mut config = LinterConfig::from_env();
        if let Some(ref bin) = self.sqlfluff_bin {
            config.binary = bin.clone();
        }
        if let Some(ref dialect) = self.dialect {
            config.dialect = dialect.clone();
        }
        config
    }
}

impl PipelineArgs {
    fn llm_config(&self) -> LlmConfig {
        let mut config = LlmConfig::from_env();
        if let Some(ref key) = self.api_key {
            config.api_key = key.clone();
        }
        if let Some(ref model) = self.model {
            config.model = model.clone();
        }
        if let Some(ref url) = self.base_url {
            config.base_url = url.clone();
        }
        if let Some(style) = self.api_style {
            config.api_style = style;
        }
        config.timeout_secs = self.timeout_secs;
        config
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            ddl_path: self.ddl.clone(),
            correction_input: if self.apply_verification {
                CorrectionInput::Verified
            } else {
                CorrectionInput::Scratch
            },
        }
    }

    fn build(&self) -> Result<Text2SqlPipeline> {
        let config = self.pipeline_config();
        let ddl = DdlDocument::load(&config.ddl_path)
            .map_err(|e| anyhow::anyhow!("Failed to load DDL from {:?}: {}", config.ddl_path, e))?;

        let llm_config = self.llm_config();
        info!("Using model {} at {}", llm_config.model, llm_config.base_url);
        let llm = LlmClient::new(llm_config)?;
        let linter = Sqlfluff::new(self.linter.config());

        let pipeline = Text2SqlPipeline::new(Arc::new(llm), Arc::new(linter), ddl)?
            .with_correction_input(config.correction_input);
        Ok(pipeline)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask { question, pipeline } => {
            let pipeline = pipeline.build()?;
            let sql = pipeline.text_to_sql(&question).await?;
            println!("{}", sql);
        }
        Commands::Batch {
            questions,
            output,
            pipeline,
        } => {
            let questions = load_questions(&questions).map_err(|e| {
                anyhow::anyhow!("Failed to read questions from {:?}: {}", questions, e)
            })?;
            let pipeline = pipeline.build()?;
            let summary = BatchRunner::new(&pipeline)
                .run_to_path(&questions, &output)
                .await?;
            println!(
                "Wrote {} rows to {} ({} corrected, {} no match, {} failed)",
                summary.rows_written,
                output.display(),
                summary.corrected,
                summary.no_match,
                summary.failed
            );
        }
        Commands::Lint { sql_file, linter } => {
            let sql = std::fs::read_to_string(&sql_file)?;
            let linter = Sqlfluff::new(linter.config());
            let checked = linter.check(&sql).await;
            if checked.verdict.passed {
                println!("PASS {}", sql_file.display());
            } else {
                println!("FAIL {}", sql_file.display());
                for line in &checked.verdict.diagnostics {
                    println!("  {}", line);
                }
                anyhow::bail!("lint failed for {}", sql_file.display());
            }
        }
    }

    Ok(())
}
