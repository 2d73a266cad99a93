use anyhow::Result;
use clap::{Parser, Subcommand};

use bwt_mapper::align::{self, MapOpt};
use bwt_mapper::index::fm::{encode_reference, FMIndex, IndexMeta};
use bwt_mapper::io::fasta::FastaReader;
use bwt_mapper::util::dna::Alphabet;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "bwt-mapper", author, version, about = "BWT/FM-index based short-read mapper", arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the FM index of a reference FASTA
    Index {
        /// Reference FASTA file
        reference: String,
        /// Output index directory
        #[arg(short, long, default_value = "ref_index")]
        out: String,
        /// Checkpoint stride for Occ and SA sampling
        #[arg(long, default_value_t = 32)]
        stride: u32,
    },
    /// Map reads (FASTQ) against a prebuilt index
    Map {
        /// Reads FASTQ file
        reads: String,
        /// Index directory (built with 'index')
        index_dir: String,
        /// Output report path (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,
        #[arg(long = "seed-len", default_value_t = 19)]
        seed_len: usize,
        /// Maximum tolerated edit distance
        #[arg(long = "max-dist", default_value_t = 4)]
        max_dist: u32,
        /// Seed hits in wider SA intervals are dropped as repetitive
        #[arg(long = "max-interval", default_value_t = 64)]
        max_interval: usize,
        /// Maximum reported alignments per read
        #[arg(long = "max-hits", default_value_t = 64)]
        max_hits: usize,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Index { reference, out, stride } => run_index(&reference, &out, stride),
        Commands::Map {
            reads,
            index_dir,
            out,
            seed_len,
            max_dist,
            max_interval,
            max_hits,
            threads,
        } => {
            let opt = MapOpt {
                seed_len,
                max_dist,
                max_interval,
                max_hits,
                threads,
            };
            let stats = align::map_fastq(&index_dir, &reads, out.as_deref(), &opt)?;
            log::info!(
                "done: {} reads, {} mapped, {} alignments, {} failed",
                stats.reads,
                stats.mapped,
                stats.alignments,
                stats.failed
            );
            Ok(())
        }
    }
}

fn run_index(reference: &str, out: &str, stride: u32) -> Result<()> {
    if stride == 0 {
        anyhow::bail!("--stride must be positive");
    }
    let file = std::fs::File::open(reference)
        .map_err(|e| anyhow::anyhow!("cannot open reference FASTA '{}': {}", reference, e))?;
    let reader = FastaReader::new(std::io::BufReader::new(file));

    let abc = Alphabet::new();
    let mut records = Vec::new();
    let mut total_len = 0usize;
    for rec in reader {
        let rec = rec?;
        total_len += rec.seq.len();
        records.push((rec.id, rec.seq));
    }
    if records.is_empty() || total_len == 0 {
        // 退化参考照样构建平凡索引
        log::warn!("reference '{}' is empty, building a trivial index", reference);
    }
    log::info!(
        "reference '{}': {} sequences, {} bp",
        reference,
        records.len(),
        total_len
    );

    let (text, contigs) = encode_reference(records, &abc);
    let mut fm = FMIndex::from_text(text, contigs, stride);
    fm.set_meta(IndexMeta {
        reference_file: Some(reference.to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });

    fm.save_to_dir(out)?;
    log::info!("FM index saved to '{}'", out);
    Ok(())
}
