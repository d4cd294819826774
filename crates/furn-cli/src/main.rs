mod config;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use furn_corpus::{FileMode, LabelSet, LabelStore};
use furn_crawler::{crawl_site, Fetcher, HeadingScraper, HeadingScraperConfig, Scrapable};
use furn_ner::{bootstrap, train, Annotator, Checkpoint};
use furn_serve::AppState;
use tokio::runtime;

use crate::config::PipelineConfig;

/// Furniture product-name tagging pipeline
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    #[clap(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[clap(name = "crawl")]
    Crawl(CrawlArgs),
    #[clap(name = "annotate")]
    Annotate(AnnotateArgs),
    #[clap(name = "train")]
    Train(TrainArgs),
    #[clap(name = "serve")]
    Serve(ServeArgs),
    #[clap(name = "status")]
    Status(StatusArgs),
    #[clap(hide = true)]
    Completion,
}

/// Options shared by every stage
#[derive(Debug, clap::Args)]
pub struct CommonArgs {
    /// Optional pipeline yaml configuration file
    #[clap(env = "FURN_CONFIG", parse(from_os_str), long)]
    pub config: Option<PathBuf>,
    /// Override the unlabeled queue (csv)
    #[clap(parse(from_os_str), long)]
    pub queue: Option<PathBuf>,
    /// Override the labeled file (conll)
    #[clap(parse(from_os_str), long)]
    pub labeled: Option<PathBuf>,
    /// Override the checkpoint directory
    #[clap(parse(from_os_str), long)]
    pub checkpoint: Option<PathBuf>,
    /// When quiet no logs are outputted
    #[clap(long, short)]
    pub quiet: bool,
}

impl TryFrom<&CommonArgs> for PipelineConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CommonArgs) -> Result<Self, Self::Error> {
        let mut conf = PipelineConfig::load(args.config.as_deref())?;
        if let Some(queue) = &args.queue {
            conf.queue = queue.clone();
        }
        if let Some(labeled) = &args.labeled {
            conf.labeled = labeled.clone();
        }
        if let Some(checkpoint) = &args.checkpoint {
            conf.checkpoint = checkpoint.clone();
        }
        Ok(conf)
    }
}

/// Crawl the seed sites and queue the words of their headings
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    #[clap(flatten)]
    pub common: CommonArgs,
    /// Override crawler's seeds, can be repeated
    #[clap(long = "seed")]
    pub seeds: Vec<String>,
    /// Override crawler's user agent
    #[clap(long)]
    pub user_agent: Option<String>,
    /// Override crawler's delay between requests, in seconds
    #[clap(long)]
    pub delay: Option<f32>,
    /// Override crawler's request timeout, in seconds
    #[clap(long)]
    pub timeout: Option<f32>,
    /// Override crawler's maximum number of pages per seed
    #[clap(long)]
    pub max_pages: Option<usize>,
    /// Fetch pages disallowed by robots.txt
    #[clap(long)]
    pub ignore_robots: bool,
    /// Override how an existing queue is opened
    #[clap(arg_enum, long)]
    pub file_mode: Option<FileMode>,
}

impl TryFrom<&CrawlArgs> for PipelineConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut conf = PipelineConfig::try_from(&args.common)?;
        let crawler = &mut conf.crawler.crawler;
        if !args.seeds.is_empty() {
            crawler.seeds = args.seeds.clone();
        }
        if let Some(user_agent) = &args.user_agent {
            crawler.user_agent = user_agent.to_string();
        }
        if let Some(delay) = args.delay {
            crawler.delay = delay;
        }
        if let Some(timeout) = args.timeout {
            crawler.timeout = timeout;
        }
        if let Some(max_pages) = args.max_pages {
            crawler.max_pages_per_seed = Some(max_pages);
        }
        if args.ignore_robots {
            crawler.obey_robots = false;
        }
        if let Some(file_mode) = args.file_mode {
            conf.crawler.file_mode = file_mode;
        }
        Ok(conf)
    }
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let conf = PipelineConfig::try_from(&args)?;
    if LabelStore::new(&conf.queue, &conf.labeled).recover()? {
        log::warn!("Recovered an interrupted annotation pass before crawling");
    }
    let scraper_conf = HeadingScraperConfig {
        queue: conf.queue.clone(),
        file_mode: conf.crawler.file_mode,
    };
    let mut scraper = HeadingScraper::new(&scraper_conf)?;
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let report = rt.block_on(crawl_site(&conf.crawler.crawler, &mut scraper))?;
    println!(
        "{} pages fetched, {} failed, {} disallowed, {} words queued to {}",
        report.fetched,
        report.failed,
        report.skipped,
        scraper.rows_written(),
        conf.queue.display()
    );
    Ok(())
}

/// Pre-label queued rows with the current checkpoint
#[derive(Debug, clap::Args)]
pub struct AnnotateArgs {
    #[clap(flatten)]
    pub common: CommonArgs,
    /// Override the number of rows labeled in this pass
    #[clap(long)]
    pub limit: Option<usize>,
    /// Label every queued row
    #[clap(long, conflicts_with = "limit")]
    pub all: bool,
}

impl TryFrom<&AnnotateArgs> for PipelineConfig {
    type Error = anyhow::Error;

    fn try_from(args: &AnnotateArgs) -> Result<Self, Self::Error> {
        let mut conf = PipelineConfig::try_from(&args.common)?;
        if let Some(limit) = args.limit {
            conf.annotator.limit = Some(limit);
        }
        if args.all {
            conf.annotator.limit = None;
        }
        Ok(conf)
    }
}

pub fn annotate(args: AnnotateArgs) -> anyhow::Result<()> {
    let conf = PipelineConfig::try_from(&args)?;
    let store = LabelStore::new(&conf.queue, &conf.labeled);
    let annotator = Annotator::load(&Checkpoint::new(&conf.checkpoint), &conf.annotator)?;
    let report = bootstrap(&store, &annotator, conf.annotator.limit)?;
    println!(
        "{} rows labeled into {} sequences, {} rows left in {}",
        report.consumed,
        report.sequences,
        report.remaining,
        conf.queue.display()
    );
    Ok(())
}

/// Fine-tune a checkpoint on the labeled file
#[derive(Debug, clap::Args)]
pub struct TrainArgs {
    #[clap(flatten)]
    pub common: CommonArgs,
    /// Override the pretrained encoder to start from
    #[clap(parse(from_os_str), long)]
    pub base: Option<PathBuf>,
    /// Continue from the current checkpoint, keeping its label ids
    #[clap(long, conflicts_with = "base")]
    pub resume: bool,
    #[clap(long)]
    pub epochs: Option<usize>,
    #[clap(long)]
    pub batch_size: Option<usize>,
    #[clap(long)]
    pub learning_rate: Option<f64>,
}

impl TryFrom<&TrainArgs> for PipelineConfig {
    type Error = anyhow::Error;

    fn try_from(args: &TrainArgs) -> Result<Self, Self::Error> {
        let mut conf = PipelineConfig::try_from(&args.common)?;
        if let Some(base) = &args.base {
            conf.trainer.base = base.clone();
        }
        if args.resume {
            conf.trainer.base = conf.checkpoint.clone();
        }
        if let Some(epochs) = args.epochs {
            conf.trainer.epochs = epochs;
        }
        if let Some(batch_size) = args.batch_size {
            conf.trainer.batch_size = batch_size;
        }
        if let Some(learning_rate) = args.learning_rate {
            conf.trainer.learning_rate = learning_rate;
        }
        Ok(conf)
    }
}

pub fn run_training(args: TrainArgs) -> anyhow::Result<()> {
    let conf = PipelineConfig::try_from(&args)?;
    let base = Checkpoint::new(&conf.trainer.base);
    let report = train(&conf.labeled, &base, &conf.checkpoint, &conf.trainer)?;
    println!(
        "Trained on {} sequences with labels {:?}, saved to {}",
        report.sequences,
        report.labels.tags(),
        conf.checkpoint.display()
    );
    if let Some(loss) = report.losses.last() {
        println!("Final epoch loss: {loss:.4}");
    }
    Ok(())
}

/// Serve the product extraction form
#[derive(Debug, clap::Args)]
pub struct ServeArgs {
    #[clap(flatten)]
    pub common: CommonArgs,
    /// Override the listening address
    #[clap(long)]
    pub bind: Option<String>,
    /// Override the product tags, can be repeated
    #[clap(long = "product-tag")]
    pub product_tags: Vec<String>,
}

impl TryFrom<&ServeArgs> for PipelineConfig {
    type Error = anyhow::Error;

    fn try_from(args: &ServeArgs) -> Result<Self, Self::Error> {
        let mut conf = PipelineConfig::try_from(&args.common)?;
        if let Some(bind) = &args.bind {
            conf.server.bind = bind.to_string();
        }
        if !args.product_tags.is_empty() {
            conf.server.product_tags = args.product_tags.clone();
        }
        Ok(conf)
    }
}

pub fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let conf = PipelineConfig::try_from(&args)?;
    let annotator = Annotator::load(&Checkpoint::new(&conf.checkpoint), &conf.annotator)?;
    let fetcher = Fetcher::new(&conf.crawler.crawler)?;
    let state = AppState::new(Arc::new(annotator), fetcher, conf.server.product_tags);
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(furn_serve::serve(&conf.server.bind, state))
}

/// Show the state of the queue, labeled file and checkpoint
#[derive(Debug, clap::Args)]
pub struct StatusArgs {
    #[clap(flatten)]
    pub common: CommonArgs,
}

pub fn status(args: StatusArgs) -> anyhow::Result<()> {
    let conf = PipelineConfig::try_from(&args.common)?;
    let store = LabelStore::new(&conf.queue, &conf.labeled);
    if store.recover()? {
        println!("Recovered an interrupted annotation pass");
    }

    println!("Queue:      {} ({} rows)", conf.queue.display(), store.queue().len()?);
    let sequences = store.labeled_sequences()?;
    let corpus_labels = LabelSet::from_sequences(&sequences);
    println!(
        "Labeled:    {} ({} sequences, tags {:?})",
        conf.labeled.display(),
        sequences.len(),
        corpus_labels.tags()
    );

    let checkpoint = Checkpoint::new(&conf.checkpoint);
    if !checkpoint.is_complete() {
        println!("Checkpoint: {} (missing)", conf.checkpoint.display());
        return Ok(());
    }
    let labels = checkpoint.labels()?;
    println!(
        "Checkpoint: {} (labels {:?})",
        conf.checkpoint.display(),
        labels.tags()
    );
    let extended = labels.extended_with(&sequences);
    let new_tags = &extended.tags()[labels.len()..];
    if !new_tags.is_empty() {
        println!("New tags since checkpoint: {new_tags:?}, run `furn train --resume`");
    }
    Ok(())
}

fn init_logger(quiet: bool) {
    if !quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
            "furn_crawler=info,furn_corpus=info,furn_ner=info,furn_serve=info",
        ))
        .init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            init_logger(args.common.quiet);
            crawl(args)
        }
        SubCommand::Annotate(args) => {
            init_logger(args.common.quiet);
            annotate(args)
        }
        SubCommand::Train(args) => {
            init_logger(args.common.quiet);
            run_training(args)
        }
        SubCommand::Serve(args) => {
            init_logger(args.common.quiet);
            serve(args)
        }
        SubCommand::Status(args) => {
            init_logger(args.common.quiet);
            status(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "furn", &mut io::stdout());
            Ok(())
        }
    }
}
