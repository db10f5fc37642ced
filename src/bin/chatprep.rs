use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chatprep::codec::{decode_line, write_id_line};
use chatprep::config::DEFAULT_MAX_VOCAB_SIZE;
use chatprep::corpus::read_lines;
use chatprep::store::{should_skip, write_atomically};
use chatprep::{
    decode_corpus, decode_ids, encode_corpus, load_vocabulary, prepare_corpus, run_pipeline,
    CleanerConfig, IngestConfig, PipelineOptions, PipelinePaths, PrepError, ReservedBudget,
    RoleFilter, SegmentingTokenizer, SentenceCleaner, Stage, Staging, TokenId, Tokenizer,
    TokenizerKind, VocabBuilder, VocabConfig, RESERVED_COUNT,
};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde_json::json;

const DEFAULT_VOCAB: &str = "vocab.txt";
const DEFAULT_TOP: usize = 10;

#[derive(Parser, Debug)]
#[command(author, version, about = "Question/answer corpus preparation toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clean a tagged chat log into a segmented training corpus
    Prepare(PrepareArgs),
    /// Build a frequency-ranked vocabulary from text inputs
    BuildVocab(BuildVocabArgs),
    /// Encode a corpus into token id lines
    Encode(EncodeArgs),
    /// Decode token ids back into tokens
    Decode(DecodeArgs),
    /// Inspect a vocabulary file
    Info(InfoArgs),
    /// Run prepare, build-vocab, and encode in one go
    Pipeline(PipelineArgs),
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TokenizerArg {
    Whitespace,
    Segmenting,
}

impl From<TokenizerArg> for TokenizerKind {
    fn from(value: TokenizerArg) -> Self {
        match value {
            TokenizerArg::Whitespace => TokenizerKind::Whitespace,
            TokenizerArg::Segmenting => TokenizerKind::Segmenting,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RoleArg {
    Questions,
    Answers,
    All,
}

impl From<RoleArg> for RoleFilter {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Questions => RoleFilter::Questions,
            RoleArg::Answers => RoleFilter::Answers,
            RoleArg::All => RoleFilter::All,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BudgetArg {
    Inclusive,
    Exclusive,
}

impl From<BudgetArg> for ReservedBudget {
    fn from(value: BudgetArg) -> Self {
        match value {
            BudgetArg::Inclusive => ReservedBudget::Inclusive,
            BudgetArg::Exclusive => ReservedBudget::Exclusive,
        }
    }
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Keep lines of this role
    #[arg(long, value_enum, default_value_t = RoleArg::Questions)]
    role: RoleArg,

    /// Marker identifying question lines
    #[arg(long, value_name = "TEXT", default_value = "question:")]
    question_marker: String,

    /// Marker identifying answer lines
    #[arg(long, value_name = "TEXT", default_value = "answer:")]
    answer_marker: String,

    /// Keep ASCII spaces inside the payload instead of deleting them
    #[arg(long)]
    keep_spaces: bool,

    /// Keep lines that carry neither marker
    #[arg(long)]
    keep_untagged: bool,

    /// Tokenizer used to segment cleaned lines
    #[arg(long, value_enum, default_value_t = TokenizerArg::Segmenting)]
    segmenter: TokenizerArg,

    /// Extra segmentation dictionary (one `word [freq] [tag]` per line)
    #[arg(long, value_name = "PATH")]
    user_dict: Option<PathBuf>,
}

impl CleanArgs {
    fn cleaner_config(&self) -> CleanerConfig {
        CleanerConfig {
            question_marker: self.question_marker.clone(),
            answer_marker: self.answer_marker.clone(),
            squash_spaces: !self.keep_spaces,
            keep_untagged: self.keep_untagged,
        }
    }

    fn segmenter(&self) -> Result<Box<dyn Tokenizer>> {
        match (&self.user_dict, self.segmenter) {
            (Some(path), TokenizerArg::Segmenting) => {
                let mut segmenter = SegmentingTokenizer::new();
                segmenter
                    .load_user_dict(path)
                    .with_context(|| format!("failed to load user dictionary {}", path.display()))?;
                Ok(Box::new(segmenter))
            }
            (Some(_), TokenizerArg::Whitespace) => {
                bail!("--user-dict requires --segmenter segmenting")
            }
            (None, kind) => Ok(TokenizerKind::from(kind).build()),
        }
    }
}

#[derive(Args, Debug)]
struct VocabArgs {
    /// Maximum vocabulary entries
    #[arg(long, value_name = "SIZE", default_value_t = DEFAULT_MAX_VOCAB_SIZE)]
    max_vocab_size: usize,

    /// Whether reserved symbols count towards --max-vocab-size
    #[arg(long, value_enum, default_value_t = BudgetArg::Inclusive)]
    reserved_budget: BudgetArg,

    /// Replace every digit with 0 before counting and lookup
    #[arg(long)]
    normalize_digits: bool,

    /// Tokenizer applied to corpus lines
    #[arg(long, value_enum, default_value_t = TokenizerArg::Whitespace)]
    tokenizer: TokenizerArg,
}

impl VocabArgs {
    fn config(&self, show_progress: bool) -> Result<VocabConfig> {
        let cfg = VocabConfig::builder()
            .max_vocab_size(self.max_vocab_size)
            .reserved_budget(self.reserved_budget.into())
            .normalize_digits(self.normalize_digits)
            .show_progress(show_progress)
            .build()?;
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
struct PrepareArgs {
    /// Raw tagged input
    input: PathBuf,

    /// Output path for the cleaned corpus
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    #[command(flatten)]
    clean: CleanArgs,

    /// Regenerate the output even if it exists
    #[arg(long)]
    rebuild: bool,

    /// Disable the progress spinner
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct BuildVocabArgs {
    /// Files or directories to ingest
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output path for the vocabulary
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_VOCAB)]
    output: PathBuf,

    #[command(flatten)]
    vocab: VocabArgs,

    /// Regenerate the output even if it exists
    #[arg(long)]
    rebuild: bool,

    /// Disable the progress spinner and periodic progress logs
    #[arg(long)]
    no_progress: bool,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Vocabulary file to load
    #[arg(short = 'm', long, value_name = "PATH", default_value = DEFAULT_VOCAB)]
    vocab: PathBuf,

    /// Corpus to encode, one sentence per line
    #[arg(value_name = "INPUT", required_unless_present = "text")]
    input: Option<PathBuf>,

    /// Output path for the id corpus (required with INPUT)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Encode a single sentence and print its ids
    #[arg(long, value_name = "SENTENCE", conflicts_with = "input")]
    text: Option<String>,

    /// Tokenizer applied to each line
    #[arg(long, value_enum, default_value_t = TokenizerArg::Whitespace)]
    tokenizer: TokenizerArg,

    /// Replace every digit with 0 before lookup
    #[arg(long)]
    normalize_digits: bool,

    /// Regenerate the output even if it exists
    #[arg(long)]
    rebuild: bool,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Vocabulary file to load
    #[arg(short = 'm', long, value_name = "PATH", default_value = DEFAULT_VOCAB)]
    vocab: PathBuf,

    /// Path to an id corpus, one sequence per line
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Token ids to decode when --input is omitted
    #[arg(value_name = "ID", required_unless_present = "input")]
    ids: Vec<TokenId>,

    /// Output file for decoded text (defaults to stdout)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Regenerate --output even if it exists
    #[arg(long)]
    rebuild: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Vocabulary file to inspect
    #[arg(short = 'm', long, value_name = "PATH", default_value = DEFAULT_VOCAB)]
    vocab: PathBuf,

    /// Number of most frequent corpus tokens to list
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TOP)]
    top: usize,

    /// Emit machine-readable JSON summary
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Raw tagged input
    input: PathBuf,

    /// Directory receiving train.txt, vocab.txt, and train.ids
    #[arg(short = 'd', long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    #[command(flatten)]
    clean: CleanArgs,

    #[command(flatten)]
    vocab: VocabArgs,

    /// Regenerate every artefact even if it exists
    #[arg(long)]
    rebuild: bool,

    /// Disable the progress spinner and periodic progress logs
    #[arg(long)]
    no_progress: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Prepare(args) => run_prepare(args),
        Commands::BuildVocab(args) => run_build_vocab(args),
        Commands::Encode(args) => run_encode(args),
        Commands::Decode(args) => run_decode(args),
        Commands::Info(args) => run_info(args),
        Commands::Pipeline(args) => run_pipeline_cmd(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn staging(rebuild: bool) -> Staging {
    if rebuild {
        Staging::Rebuild
    } else {
        Staging::SkipExisting
    }
}

fn spinner(enabled: bool, message: &'static str) -> Result<Option<ProgressBar>> {
    if !enabled {
        return Ok(None);
    }
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {msg} {elapsed}")?
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(Some(pb))
}

fn finish_spinner(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    let cleaner = SentenceCleaner::new(args.clean.cleaner_config())?;
    let segmenter = args.clean.segmenter()?;
    let pb = spinner(!args.no_progress, "cleaning corpus...")?;
    let outcome = prepare_corpus(
        &args.input,
        &args.output,
        &cleaner,
        segmenter.as_ref(),
        args.clean.role.into(),
        staging(args.rebuild),
    );
    finish_spinner(pb);
    let outcome = outcome.with_context(|| {
        format!(
            "failed to prepare {} from {}",
            args.output.display(),
            args.input.display()
        )
    })?;

    match outcome {
        Stage::Written(metrics) => println!(
            "wrote {} of {} lines to {} ({} rejected, {} filtered)",
            metrics.kept,
            metrics.lines_read,
            args.output.display(),
            metrics.rejected,
            metrics.filtered_out
        ),
        Stage::Skipped => println!("{} exists, skipped", args.output.display()),
    }
    Ok(())
}

fn run_build_vocab(args: BuildVocabArgs) -> Result<()> {
    let cfg = args.vocab.config(!args.no_progress)?;
    let ingest = IngestConfig {
        recursive: !args.no_recursive,
        follow_symlinks: args.follow_symlinks,
    };
    let tokenizer = TokenizerKind::from(args.vocab.tokenizer).build();
    let builder = VocabBuilder::new(cfg);

    let pb = spinner(!args.no_progress, "counting tokens...")?;
    let outcome = builder.build_to_file(
        &args.inputs,
        &ingest,
        &args.output,
        tokenizer.as_ref(),
        staging(args.rebuild),
    );
    finish_spinner(pb);
    let outcome = outcome
        .with_context(|| format!("failed to build vocabulary {}", args.output.display()))?;

    match outcome {
        Stage::Written(artifacts) => {
            let metrics = &artifacts.metrics;
            info!(
                "vocabulary built: lines={} tokens={} distinct={} duration={:.2?}",
                metrics.lines_read, metrics.tokens_seen, metrics.distinct_tokens, metrics.duration
            );
            println!(
                "wrote vocabulary with {} entries ({} dropped) to {}",
                metrics.vocab_size,
                metrics.dropped_tokens,
                args.output.display()
            );
        }
        Stage::Skipped => println!("{} exists, skipped", args.output.display()),
    }
    Ok(())
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    let tokenizer = TokenizerKind::from(args.tokenizer).build();

    if let Some(text) = &args.text {
        let vocabulary = load_vocabulary(&args.vocab)
            .with_context(|| format!("failed to load vocabulary {}", args.vocab.display()))?;
        let ids = chatprep::encode_sentence(
            text,
            &vocabulary,
            tokenizer.as_ref(),
            args.normalize_digits,
        );
        write_id_line(&mut io::stdout().lock(), &ids)?;
        return Ok(());
    }

    let input = args
        .input
        .as_deref()
        .ok_or_else(|| anyhow!("an INPUT file or --text is required"))?;
    let output = args
        .output
        .as_deref()
        .ok_or_else(|| anyhow!("--output is required when encoding a file"))?;
    let outcome = encode_corpus(
        input,
        output,
        &args.vocab,
        tokenizer,
        args.normalize_digits,
        staging(args.rebuild),
    )
    .with_context(|| format!("failed to encode {}", input.display()))?;

    match outcome {
        Stage::Written(metrics) => println!(
            "encoded {} lines ({} tokens, {:.2}% unknown) to {}",
            metrics.lines,
            metrics.tokens,
            metrics.unknown_rate() * 100.0,
            output.display()
        ),
        Stage::Skipped => println!("{} exists, skipped", output.display()),
    }
    Ok(())
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    let vocabulary = load_vocabulary(&args.vocab)
        .with_context(|| format!("failed to load vocabulary {}", args.vocab.display()))?;

    match (&args.input, &args.output) {
        (Some(input), Some(output)) => {
            let outcome = decode_corpus(input, output, &vocabulary, staging(args.rebuild))
                .with_context(|| format!("failed to decode {}", input.display()))?;
            match outcome {
                Stage::Written(metrics) => println!(
                    "decoded {} lines ({} tokens) to {}",
                    metrics.lines,
                    metrics.tokens,
                    output.display()
                ),
                Stage::Skipped => println!("{} exists, skipped", output.display()),
            }
        }
        (Some(input), None) => {
            let reader = read_lines(input)
                .with_context(|| format!("failed to open {}", input.display()))?;
            let mut stdout = io::stdout().lock();
            for (idx, line) in reader.enumerate() {
                let text = line
                    .and_then(|line| decode_line(&line, &vocabulary, idx + 1))
                    .with_context(|| format!("failed to decode {}", input.display()))?;
                writeln!(stdout, "{text}")?;
            }
        }
        (None, Some(output)) => {
            if should_skip(output, staging(args.rebuild), "decode") {
                println!("{} exists, skipped", output.display());
                return Ok(());
            }
            let text = decode_ids(&args.ids, &vocabulary).context("failed to decode ids")?;
            write_atomically(output, |writer| {
                writeln!(writer, "{text}").map_err(|err| PrepError::io(err, Some(output.clone())))
            })
            .with_context(|| format!("failed to write {}", output.display()))?;
            println!("decoded {} ids to {}", args.ids.len(), output.display());
        }
        (None, None) => {
            let text = decode_ids(&args.ids, &vocabulary).context("failed to decode ids")?;
            println!("{text}");
        }
    }
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let vocabulary = load_vocabulary(&args.vocab)
        .with_context(|| format!("failed to load vocabulary {}", args.vocab.display()))?;
    let tokens = vocabulary.tokens();
    let reserved: Vec<&str> = tokens
        .iter()
        .take(RESERVED_COUNT)
        .map(String::as_str)
        .collect();
    let top: Vec<&str> = tokens
        .iter()
        .skip(RESERVED_COUNT)
        .take(args.top)
        .map(String::as_str)
        .collect();

    if args.json {
        let summary = json!({
            "path": args.vocab.display().to_string(),
            "vocab_size": vocabulary.len(),
            "reserved": reserved,
            "top_tokens": top,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Vocab size   : {}", vocabulary.len());
    println!("Reserved     : {}", reserved.join(", "));
    if top.is_empty() {
        println!("Top tokens   : (none)");
    } else {
        println!("Top tokens   :");
        for (offset, token) in top.iter().enumerate() {
            println!("  {:>6}  {token}", offset + RESERVED_COUNT);
        }
    }
    Ok(())
}

fn run_pipeline_cmd(args: PipelineArgs) -> Result<()> {
    if !args.output_dir.exists() {
        fs::create_dir_all(&args.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                args.output_dir.display()
            )
        })?;
    }
    if args.clean.user_dict.is_some() {
        bail!("--user-dict is only supported by the prepare subcommand");
    }
    let paths = PipelinePaths {
        raw: args.input.clone(),
        staged: args.output_dir.join("train.txt"),
        vocab: args.output_dir.join(DEFAULT_VOCAB),
        encoded: args.output_dir.join("train.ids"),
    };
    let options = PipelineOptions {
        cleaner: args.clean.cleaner_config(),
        segmenter: args.clean.segmenter.into(),
        tokenizer: args.vocab.tokenizer.into(),
        role_filter: args.clean.role.into(),
        vocab: args.vocab.config(!args.no_progress)?,
        staging: staging(args.rebuild),
    };

    let pb = spinner(!args.no_progress, "running pipeline...")?;
    let report = run_pipeline(&paths, &options);
    finish_spinner(pb);
    let report = report.with_context(|| format!("pipeline failed for {}", args.input.display()))?;

    report_stage("prepare", &paths.staged, report.prepare.is_skipped());
    report_stage("vocabulary", &paths.vocab, report.vocabulary.is_skipped());
    report_stage("encode", &paths.encoded, report.encode.is_skipped());
    if let Stage::Written(artifacts) = &report.vocabulary {
        println!("   vocab size {}", artifacts.vocabulary.len());
    }
    if let Stage::Written(metrics) = &report.encode {
        println!(
            "   {} lines | {} tokens | {:.2}% unknown",
            metrics.lines,
            metrics.tokens,
            metrics.unknown_rate() * 100.0
        );
    }
    Ok(())
}

fn report_stage(name: &str, path: &Path, skipped: bool) {
    let verb = if skipped { "kept existing" } else { "wrote" };
    println!("{name:<10} {verb} {}", path.display());
}
