//! Minimal headless harness: opens the default output device, loads
//! whatever plugins were named on the command line, and runs until
//! interrupted. Modeled on the teacher's `headless_test.rs` bin, widened
//! from a fixed sine/gain demo to driving [`rigel_engine::Engine`] against
//! real plugin adapters.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rigel_engine::driver::CpalDriver;
use rigel_engine::{Engine, EngineOptions};

/// `path:label:unique_id` for LADSPA/DSSI, `path:uri` for LV2.
fn split_n<'a>(spec: &'a str, n: usize) -> Option<Vec<&'a str>> {
    let parts: Vec<&str> = spec.splitn(n, ':').collect();
    (parts.len() == n).then_some(parts)
}

#[derive(Parser, Debug)]
#[command(name = "rigel_host", about = "Headless Rigel plugin host")]
struct Args {
    #[arg(long, default_value = "rigel")]
    engine_name: String,

    #[arg(long, value_name = "PATH:LABEL:UNIQUE_ID")]
    ladspa: Vec<String>,

    #[arg(long, value_name = "PATH:LABEL:UNIQUE_ID")]
    dssi: Vec<String>,

    #[arg(long, value_name = "PATH:URI")]
    lv2: Vec<String>,

    #[arg(long, value_name = "PATH")]
    vst2: Vec<String>,

    #[arg(long, value_name = "PATH")]
    soundkit: Vec<String>,

    #[arg(long, default_value_t = 5)]
    run_seconds: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let engine = Engine::new(&args.engine_name, EngineOptions::default())?;

    for spec in &args.ladspa {
        let Some(parts) = split_n(spec, 3) else {
            log::warn!("skipping malformed --ladspa spec '{spec}'");
            continue;
        };
        let unique_id: u64 = parts[2].parse().unwrap_or(0);
        match engine.add_ladspa_plugin(parts[0], parts[1], unique_id, engine.sample_rate()) {
            Ok(id) => log::info!("loaded LADSPA '{}' as plugin {id}", parts[1]),
            Err(e) => log::error!("failed to load LADSPA '{spec}': {e}"),
        }
    }

    for spec in &args.dssi {
        let Some(parts) = split_n(spec, 3) else {
            log::warn!("skipping malformed --dssi spec '{spec}'");
            continue;
        };
        let unique_id: u64 = parts[2].parse().unwrap_or(0);
        match engine.add_dssi_plugin(parts[0], parts[1], unique_id) {
            Ok(id) => log::info!("loaded DSSI '{}' as plugin {id}", parts[1]),
            Err(e) => log::error!("failed to load DSSI '{spec}': {e}"),
        }
    }

    for spec in &args.lv2 {
        let Some(parts) = split_n(spec, 2) else {
            log::warn!("skipping malformed --lv2 spec '{spec}'");
            continue;
        };
        match engine.add_lv2_plugin(parts[0], parts[1], engine.sample_rate(), 2, 2) {
            Ok(id) => log::info!("loaded LV2 '{}' as plugin {id}", parts[1]),
            Err(e) => log::error!("failed to load LV2 '{spec}': {e}"),
        }
    }

    for path in &args.vst2 {
        match engine.add_vst2_plugin(path, path) {
            Ok(id) => log::info!("loaded VST2 '{path}' as plugin {id}"),
            Err(e) => log::error!("failed to load VST2 '{path}': {e}"),
        }
    }

    for path in &args.soundkit {
        match engine.add_soundkit_plugin(path, engine.sample_rate() as i32) {
            Ok(id) => log::info!("loaded sound kit '{path}' as plugin {id}"),
            Err(e) => log::error!("failed to load sound kit '{path}': {e}"),
        }
    }

    engine.init();
    let driver = CpalDriver::open_default_output(Arc::clone(&engine))?;

    log::info!("running for {} seconds", args.run_seconds);
    std::thread::sleep(Duration::from_secs(args.run_seconds));

    drop(driver);
    engine.close();
    Ok(())
}
