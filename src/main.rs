use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::time::Instant;

use lookalike::cli::{Cli, Command, FindArgs, ThumbArgs};
use lookalike::json_output::JsonMessage;
use lookalike::similarity::{
    collect_matches, CancelToken, ImageSignature, SearchConfig, SearchEngine,
};
use lookalike::thumbnail::{ThumbnailConfig, ThumbnailEngine};
use lookalike::utils::{create_progress_bar, format_duration, verbose_println, warn_println};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Find(args) => run_find(args),
        Command::Thumb(args) => run_thumb(args),
    }
}

fn print_banner() {
    println!(
        "{}",
        style("lookalike - perceptual image search").bold().blue()
    );
    println!(
        "{}",
        style("multi-hash similarity + content-aware thumbnails").dim()
    );
    println!();
}

fn validate_find(args: &FindArgs) -> Result<()> {
    if !args.reference.is_file() {
        return Err(anyhow::anyhow!(
            "Reference image does not exist: {}",
            args.reference.display()
        ));
    }
    if !args.directory.is_dir() {
        return Err(anyhow::anyhow!(
            "Search directory does not exist: {}",
            args.directory.display()
        ));
    }
    if !(0.0..=64.0).contains(&args.threshold) {
        return Err(anyhow::anyhow!(
            "Distance threshold must be between 0 and 64, got: {}",
            args.threshold
        ));
    }
    if !(0.0..=100.0).contains(&args.floor) {
        return Err(anyhow::anyhow!(
            "Similarity floor must be between 0 and 100, got: {}",
            args.floor
        ));
    }
    if args.jobs > 32 {
        return Err(anyhow::anyhow!("Job count too high (max 32), got: {}", args.jobs));
    }
    if args.parse_extensions().is_empty() {
        return Err(anyhow::anyhow!("No valid extensions specified"));
    }
    Ok(())
}

fn run_find(mut args: FindArgs) -> Result<()> {
    let start_time = Instant::now();
    args.load_and_merge_config()?;

    if !args.json {
        print_banner();
    }
    validate_find(&args)?;

    // The whole operation is pointless without a usable reference, so a
    // decode failure here aborts with a single message instead of a skip.
    let reference_img = image::open(&args.reference).with_context(|| {
        format!(
            "No usable reference image at {}",
            args.reference.display()
        )
    })?;
    let reference = ImageSignature::from_image(&reference_img)
        .context("Failed to hash reference image")?;

    let verbose = args.verbose && !args.json;
    if verbose {
        println!("{}", style("Configuration:").bold());
        println!("  Reference: {}", args.reference.display());
        println!("  Directory: {}", args.directory.display());
        println!("  Distance threshold: {}", args.threshold);
        println!("  Similarity floor: {}%", args.floor);
        println!("  Extensions: {:?}", args.parse_extensions());
        println!(
            "  Parallel jobs: {}",
            if args.jobs == 0 {
                num_cpus::get()
            } else {
                args.jobs
            }
        );
        println!(
            "  Reference bucket: {}",
            if reference.is_small { "small" } else { "large" }
        );
        println!();
    }

    let engine = SearchEngine::new(SearchConfig {
        distance_threshold: args.threshold,
        jobs: args.jobs,
        extensions: args.parse_extensions(),
        verbose,
    })?;

    let candidates = engine.discover_candidates(&args.directory)?;
    verbose_println(
        verbose,
        &format!("Found {} candidate files", candidates.len()),
    );

    if candidates.is_empty() {
        if args.json {
            JsonMessage::SearchSummary {
                scanned: 0,
                skipped: 0,
                matched: 0,
                displayed: 0,
                duration_secs: start_time.elapsed().as_secs_f64(),
            }
            .emit();
        } else {
            println!(
                "{}",
                style("No images found with specified extensions").red()
            );
        }
        return Ok(());
    }

    let total = candidates.len();
    let progress_bar = if args.json {
        None
    } else {
        let pb = create_progress_bar(total as u64);
        pb.set_message("Hashing candidates");
        Some(pb)
    };

    let outcome = engine.score_candidates(
        &candidates,
        &reference,
        &CancelToken::new(),
        |completed| match &progress_bar {
            Some(pb) => pb.set_position(completed as u64),
            None => JsonMessage::progress(completed, total, "Hashing candidates"),
        },
    )?;

    if let Some(pb) = &progress_bar {
        pb.finish_with_message("Scan complete");
        println!();
    }

    // The display floor filters the stored results; changing it later never
    // requires another scan.
    let displayed = outcome.above_similarity(args.floor);

    if args.json {
        for m in &displayed {
            JsonMessage::match_found(&m.path, m.distance, m.similarity(), m.is_small);
        }
    } else if displayed.is_empty() {
        println!("{}", style("No similar images found").yellow());
    } else {
        println!(
            "{}",
            style(format!("Found {} similar image(s):", displayed.len()))
                .bold()
                .green()
        );
        for m in &displayed {
            let small_mark = if m.is_small { " [small]" } else { "" };
            println!(
                "  {}{} - {}",
                style(format!("{:6.2}%", m.similarity())).cyan(),
                small_mark,
                m.path.display()
            );
        }
    }

    if let Some(base_dir) = &args.collect_dir {
        if displayed.is_empty() {
            verbose_println(verbose, "Nothing to collect");
        } else {
            let report = collect_matches(&displayed, base_dir)
                .context("Failed to create results directory")?;
            for (path, err) in &report.failed {
                warn_println(&format!("Failed to copy {}: {}", path.display(), err));
            }
            if !args.json {
                println!();
                println!(
                    "Copied {} file(s) to {}",
                    report.copied.len(),
                    report.destination.display()
                );
            }
        }
    }

    let duration = start_time.elapsed();
    if args.json {
        JsonMessage::SearchSummary {
            scanned: outcome.scanned,
            skipped: outcome.skipped,
            matched: outcome.matches.len(),
            displayed: displayed.len(),
            duration_secs: duration.as_secs_f64(),
        }
        .emit();
    } else {
        println!();
        println!(
            "{} {} scanned, {} skipped, {} matched in {}",
            style("Summary:").bold(),
            outcome.scanned,
            outcome.skipped,
            outcome.matches.len(),
            format_duration(duration)
        );
    }

    Ok(())
}

fn validate_thumb(args: &ThumbArgs) -> Result<()> {
    for input_path in &args.input_paths {
        if !input_path.exists() {
            return Err(anyhow::anyhow!(
                "Input path does not exist: {}",
                input_path.display()
            ));
        }
        if !input_path.is_dir() && !input_path.is_file() {
            return Err(anyhow::anyhow!(
                "Input path is neither a file nor a directory: {}",
                input_path.display()
            ));
        }
    }
    if args.size == 0 || args.size > 4000 {
        return Err(anyhow::anyhow!(
            "Thumbnail size must be between 1 and 4000 pixels, got: {}",
            args.size
        ));
    }
    if args.quality == 0 || args.quality > 100 {
        return Err(anyhow::anyhow!(
            "JPEG quality must be between 1 and 100, got: {}",
            args.quality
        ));
    }
    if args.jobs > 32 {
        return Err(anyhow::anyhow!("Job count too high (max 32), got: {}", args.jobs));
    }
    if args.parse_extensions().is_empty() {
        return Err(anyhow::anyhow!("No valid extensions specified"));
    }
    Ok(())
}

fn run_thumb(mut args: ThumbArgs) -> Result<()> {
    let start_time = Instant::now();
    args.load_and_merge_config()?;

    if !args.json {
        print_banner();
    }
    validate_thumb(&args)?;

    let verbose = args.verbose && !args.json;
    if verbose {
        println!("{}", style("Configuration:").bold());
        println!("  Thumbnail size: {}x{}", args.size, args.size);
        println!("  JPEG quality: {}", args.quality);
        println!("  Extensions: {:?}", args.parse_extensions());
        println!(
            "  Parallel jobs: {}",
            if args.jobs == 0 {
                num_cpus::get()
            } else {
                args.jobs
            }
        );
        println!();
    }

    let engine = ThumbnailEngine::new(ThumbnailConfig {
        target_size: args.size,
        jpeg_quality: args.quality,
        jobs: args.jobs,
        extensions: args.parse_extensions(),
        verbose,
    })?;

    let sources = engine.discover_sources(&args.input_paths)?;
    if sources.is_empty() {
        if args.json {
            JsonMessage::ThumbSummary {
                total_files: 0,
                processed: 0,
                failed: 0,
                duration_secs: start_time.elapsed().as_secs_f64(),
            }
            .emit();
        } else {
            println!(
                "{}",
                style("No images found with specified extensions").red()
            );
        }
        return Ok(());
    }

    let total = sources.len();
    let progress_bar = if args.json {
        None
    } else {
        let pb = create_progress_bar(total as u64);
        pb.set_message("Generating thumbnails");
        Some(pb)
    };

    let results = engine.process_batch(&sources, |completed| match &progress_bar {
        Some(pb) => pb.set_position(completed as u64),
        None => JsonMessage::progress(completed, total, "Generating thumbnails"),
    });

    if let Some(pb) = &progress_bar {
        pb.finish_with_message("Processing complete");
        println!();
    }

    let mut processed = 0;
    let mut failed = 0;
    for (source, result) in sources.iter().zip(&results) {
        match result {
            Ok(thumb) => {
                processed += 1;
                if args.json {
                    JsonMessage::file_completed(
                        &thumb.input_path,
                        &thumb.output_path,
                        thumb.subject_found,
                    );
                }
            }
            Err(err) => {
                failed += 1;
                if args.json {
                    JsonMessage::file_failed(source, err.to_string());
                } else {
                    warn_println(&format!("Failed to process {}: {}", source.display(), err));
                }
            }
        }
    }

    let duration = start_time.elapsed();
    if args.json {
        JsonMessage::ThumbSummary {
            total_files: total,
            processed,
            failed,
            duration_secs: duration.as_secs_f64(),
        }
        .emit();
    } else {
        println!(
            "{} {} of {} thumbnail(s) written, {} failed in {}",
            style("Summary:").bold(),
            processed,
            total,
            failed,
            format_duration(duration)
        );
    }

    Ok(())
}
