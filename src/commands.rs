//! CLI command implementations.

use cindir::io::read_point_cloud;
use cindir::pipeline::{Job, ProcessRequest, WorkerConfig, WorkerEvent};
use cindir::{PipelineConfig, PipelineWorker};
use clap::Args;
use std::path::{Path, PathBuf};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Args)]
pub struct ProcessArgs {
    /// Point cloud to import.
    input: PathBuf,

    /// Pipeline configuration (TOML). Flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    no_outliers: bool,

    #[arg(long)]
    no_normals: bool,

    /// Enable voxel downsampling.
    #[arg(long)]
    downsample: bool,

    #[arg(long)]
    no_mesh: bool,

    /// Voxel size for downsampling; implies --downsample.
    #[arg(long)]
    voxel_size: Option<f64>,

    /// Poisson reconstruction depth.
    #[arg(long)]
    depth: Option<usize>,

    /// Write ASCII instead of binary PLY files.
    #[arg(long)]
    ascii: bool,

    /// Worker threads for the per-point stages.
    #[arg(long)]
    threads: Option<usize>,
}

impl ProcessArgs {
    fn into_config(self) -> Result<(PathBuf, PipelineConfig), cindir::Error> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if self.no_outliers {
            config.outliers.enabled = false;
        }
        if self.no_normals {
            config.normals.enabled = false;
        }
        if self.downsample || self.voxel_size.is_some() {
            config.downsample.enabled = true;
        }
        if let Some(v) = self.voxel_size {
            config.downsample.params.voxel_size = v;
        }
        if self.no_mesh {
            config.mesh.enabled = false;
        }
        if let Some(depth) = self.depth {
            config.mesh.poisson.depth = depth;
        }
        if self.ascii {
            config.output.ply_encoding = cindir::io::PlyEncoding::Ascii;
        }
        if let Some(dir) = self.output {
            config.output.directory = dir;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }

        Ok((self.input, config))
    }
}

/// Prints events of the running job. Returns whether the job succeeded.
fn follow_job(worker: &PipelineWorker) -> bool {
    while let Some(event) = worker.recv_event() {
        match event {
            WorkerEvent::JobStarted(_) => {}
            WorkerEvent::StageStarted(stage) => println!("  {stage} ..."),
            WorkerEvent::StageCompleted { stage, outcome } => println!("  {stage}: {outcome}"),
            WorkerEvent::StageFailed { stage, error } => println!("  {stage} FAILED: {error}"),
            WorkerEvent::JobFinished { success, .. } => return success,
        }
    }
    false
}

/// Import and process a point cloud.
pub fn process(args: ProcessArgs) -> CommandResult {
    let (input, config) = args.into_config()?;

    println!("cindir processing");
    println!("─────────────────");
    println!("Input:  {}", input.display());
    println!("Output: {}", config.output.directory.display());
    println!(
        "Stages: {}",
        config
            .stages()
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();

    let worker = PipelineWorker::new(WorkerConfig::from_config(&config));

    worker.submit(Job::Import(input))?;
    if !follow_job(&worker) {
        return Err("import failed".into());
    }

    worker.submit(Job::Process(ProcessRequest::from_config(&config)))?;
    if !follow_job(&worker) {
        return Err("processing finished with errors".into());
    }

    println!();
    println!("Processing completed successfully!");
    Ok(())
}

/// Print a summary of a point cloud file.
pub fn info(input: &Path) -> CommandResult {
    let cloud = read_point_cloud(input)?;

    println!("File:    {}", input.display());
    println!("Points:  {}", cloud.len());
    println!("Colors:  {}", if cloud.has_colors() { "yes" } else { "no" });
    println!("Normals: {}", if cloud.has_normals() { "yes" } else { "no" });
    if let Some((min, max)) = cloud.bounds() {
        println!("Min:     [{:.4}, {:.4}, {:.4}]", min.x, min.y, min.z);
        println!("Max:     [{:.4}, {:.4}, {:.4}]", max.x, max.y, max.z);
    }
    Ok(())
}

/// Write the default configuration file.
pub fn init_config(path: &Path) -> CommandResult {
    PipelineConfig::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
