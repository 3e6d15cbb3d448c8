mod cli;

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use rescore_rs::variants::{VariantSource, load_vcf};
use rescore_rs::pipeline;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.to_config();
    config.validate()?;

    let variants = match &args.known_variants {
        Some(path) => Some(load_vcf(path, config.allele_freq_tag.as_deref())?),
        None => None,
    };

    tracing::info!(
        input = %args.in_bam.display(),
        paired = config.paired,
        realign = config.realign,
        sort_order = config.sort_order.as_str(),
        "rescore-rs: starting"
    );
    let stats = pipeline::run(
        &args.in_bam,
        &args.out_bam,
        &config,
        variants.as_ref().map(|v| v as &dyn VariantSource),
    )?;
    tracing::info!(
        total_records = stats.total_records,
        unmapped_records = stats.unmapped_records,
        degenerate_records = stats.degenerate_records,
        realigned_records = stats.realigned_records,
        variant_explained = stats.variant_explained,
        read_groups = stats.read_groups,
        ambiguous_groups = stats.ambiguous_groups,
        emitted_records = stats.emitted_records,
        "rescore-rs: processing complete"
    );
    Ok(())
}
