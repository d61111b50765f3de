use anyhow::Context;
use clap::Parser;
use gui_bridge::bridge::GuiBridge;
use gui_bridge::model::VisualizationModel;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Scenario driver for the pulse-Doppler radar core")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Use the reduced 128 x 32 geometry and quick scenario
    #[arg(long, default_value_t = false)]
    quick: bool,
    /// Number of CPIs to generate
    #[arg(long)]
    frames: Option<usize>,
    /// Directory receiving the detection and track logs
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Run the scenario once and write the logs
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Keep the GUI bridge alive for posted scenarios
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = match args.workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::from_args(
            args.quick,
            WorkflowConfig::default().frames,
            WorkflowConfig::default().output_dir,
        ),
    };
    if let Some(frames) = args.frames {
        workflow_config.frames = frames;
    }
    if let Some(dir) = args.out_dir {
        workflow_config.output_dir = dir;
    }

    let geometry = workflow_config.core.geometry;
    let runner = Arc::new(Runner::new(workflow_config));
    let gui_bridge = GuiBridge::new(runner.clone());

    if args.offline || !args.serve {
        let result = runner.execute().context("running offline scenario")?;
        let (det_path, trk_path) = runner.write_logs(&result)?;

        println!(
            "Offline run -> frames {}, detections {}, scans {}, track reports {}, active tracks {}",
            result.frames,
            result.detection_count(),
            result.scans.len(),
            result.track_reports,
            result.status.active_tracks
        );
        println!("  {}", det_path.display());
        println!("  {}", trk_path.display());

        let model = VisualizationModel::from_result(&result, geometry, gui_bridge.units());
        for note in &model.notes {
            println!("  note: {}", note);
        }
        gui_bridge.publish(&model)?;
        gui_bridge.publish_status("Offline workflow results ready.");
    }
    if args.serve {
        gui_bridge.serve();
        gui_bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
