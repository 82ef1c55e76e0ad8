//! Out-of-process bridge sub-process (§4.6). Generalizes the teacher's
//! stdin/stdout+bincode `PluginNode` sub-process to the shmem-audio +
//! OSC-control split `rigel_engine::plugin::bridge` expects: this binary
//! loads the real format adapter (LADSPA/DSSI/LV2/VST2/sound-kit) itself,
//! via the same adapters the in-process host uses, and drives it from two
//! threads — one servicing the shared-memory process ring, one servicing
//! OSC commands.

use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use rigel_engine::plugin::dssi::DssiPlugin;
use rigel_engine::plugin::ladspa::LadspaPlugin;
use rigel_engine::plugin::lv2::Lv2Plugin;
use rigel_engine::plugin::soundkit::SoundKitPlugin;
use rigel_engine::plugin::vst2::Vst2Plugin;
use rigel_engine::plugin::{Plugin, PluginCapability};
use rigel_shared::bridge::{BridgeCommand, BridgeEvent, BridgePluginInfo};
use rigel_shared::shmem::{ShmemHeader, CMD_PROCESS, DEFAULT_CHANNEL_COUNT, RSP_DONE, RSP_IDLE};
use rigel_shared::PluginType;
use shared_memory::ShmemConf;

const OSC_ADDR_CMD: &str = "/bridge/cmd";
const OSC_ADDR_EVT: &str = "/bridge/evt";

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    osc_host: String,
    #[arg(long)]
    binary_type: String,
    #[arg(long)]
    plugin_type: String,
    #[arg(long)]
    filename: String,
    #[arg(long)]
    label: String,
    #[arg(long)]
    engine_name: String,
}

struct SafeShmem(shared_memory::Shmem);
unsafe impl Send for SafeShmem {}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    log::info!("bridge starting for '{}' ({}), engine '{}', binary type {}", args.label, args.filename, args.engine_name, args.binary_type);

    let socket = UdpSocket::bind("127.0.0.1:0")?;
    let host_addr: std::net::SocketAddr = args.osc_host.parse()?;

    // §4.6 handshake: speak first so the host's blocking recv_from learns
    // our address; the payload itself is ignored by the host at this step.
    send_event(&socket, host_addr, &BridgeEvent::Updated)?;

    let plugin: Arc<Mutex<Option<Plugin>>> = Arc::new(Mutex::new(None));
    let shmem: Arc<Mutex<Option<SafeShmem>>> = Arc::new(Mutex::new(None));

    let process_plugin = plugin.clone();
    let process_shmem = shmem.clone();
    std::thread::spawn(move || run_process_loop(process_plugin, process_shmem));

    loop {
        let mut buf = [0u8; 65536];
        let (len, peer) = socket.recv_from(&mut buf)?;
        let Ok((_, packet)) = rosc::decoder::decode_udp(&buf[..len]) else {
            log::warn!("malformed OSC packet from {peer}");
            continue;
        };
        let rosc::OscPacket::Message(msg) = packet else { continue };
        if msg.addr != OSC_ADDR_CMD {
            continue;
        }
        let Some(rosc::OscType::Blob(payload)) = msg.args.into_iter().next() else { continue };
        let Ok(command) = bincode::deserialize::<BridgeCommand>(&payload) else {
            log::warn!("failed to decode bridge command from {peer}");
            continue;
        };

        if matches!(command, BridgeCommand::Quit) {
            log::info!("received Quit, exiting");
            return Ok(());
        }

        let reply = handle_command(&args, command, &plugin, &shmem);
        if let Some(event) = reply {
            let _ = send_event(&socket, host_addr, &event);
        }
    }
}

fn handle_command(
    args: &Args,
    command: BridgeCommand,
    plugin: &Arc<Mutex<Option<Plugin>>>,
    shmem: &Arc<Mutex<Option<SafeShmem>>>,
) -> Option<BridgeEvent> {
    match command {
        BridgeCommand::Announce { shmem_name, shmem_size, sample_rate, .. } => {
            let opened = ShmemConf::new().os_id(&shmem_name).size(shmem_size).open();
            let mapped = match opened {
                Ok(m) => m,
                Err(e) => return Some(BridgeEvent::Error { reason: format!("failed to open shmem '{shmem_name}': {e}") }),
            };
            *shmem.lock().unwrap() = Some(SafeShmem(mapped));

            match load_plugin(args, sample_rate) {
                Ok(loaded) => {
                    let info = BridgePluginInfo {
                        kind: loaded.common().plugin_type,
                        category: rigel_shared::PluginCategory::Other,
                        hints: loaded.common().hints,
                        name: loaded.common().name.clone(),
                        label: loaded.common().label.clone(),
                        maker: String::new(),
                        copyright: String::new(),
                        unique_id: 0,
                    };
                    *plugin.lock().unwrap() = Some(loaded);
                    Some(BridgeEvent::PluginInfo(info))
                }
                Err(e) => Some(BridgeEvent::Error { reason: e.to_string() }),
            }
        }
        BridgeCommand::SetParameterValue { index, value } => {
            with_plugin(plugin, |p| p.set_parameter_value(index, value));
            Some(BridgeEvent::ParameterValueChanged { index, value })
        }
        BridgeCommand::SetProgram { index } => {
            with_plugin(plugin, |p| p.set_program(index));
            Some(BridgeEvent::ProgramChanged { index })
        }
        BridgeCommand::SetMidiProgram { index } => {
            with_plugin(plugin, |p| p.set_midi_program(index));
            Some(BridgeEvent::MidiProgramChanged { index })
        }
        BridgeCommand::SetCustomData { kind, key, value } => {
            with_plugin(plugin, |p| {
                let _ = p.set_custom_data(&kind, &key, &value);
            });
            Some(BridgeEvent::Updated)
        }
        BridgeCommand::SetChunkData { data_b64 } => {
            if let Ok(bytes) = STANDARD.decode(data_b64) {
                with_plugin(plugin, |p| p.set_chunk_data(&bytes));
            }
            Some(BridgeEvent::Updated)
        }
        BridgeCommand::ShowGui { show } => {
            with_plugin(plugin, |p| p.show_gui(show));
            Some(BridgeEvent::Updated)
        }
        BridgeCommand::SaveNow => {
            let chunk_b64 = plugin.lock().unwrap().as_ref().and_then(|p| p.chunk_data()).map(|bytes| STANDARD.encode(bytes));
            Some(BridgeEvent::SavedNow { chunk_b64 })
        }
        BridgeCommand::LoadPlugin { .. } | BridgeCommand::SetDefaultValue { .. } | BridgeCommand::Quit => None,
    }
}

fn with_plugin(plugin: &Arc<Mutex<Option<Plugin>>>, f: impl FnOnce(&mut Plugin)) {
    if let Some(p) = plugin.lock().unwrap().as_mut() {
        f(p);
    }
}

fn load_plugin(args: &Args, sample_rate: f64) -> anyhow::Result<Plugin> {
    let plugin_type: PluginType = match args.plugin_type.as_str() {
        "Ladspa" => PluginType::Ladspa,
        "Dssi" => PluginType::Dssi,
        "Lv2" => PluginType::Lv2,
        "Vst2" => PluginType::Vst2,
        "Sf2" => PluginType::Sf2,
        other => anyhow::bail!("bridge cannot load plugin type '{other}'"),
    };

    let mut plugin = match plugin_type {
        PluginType::Ladspa => Plugin::Ladspa(LadspaPlugin::load(0, &args.filename, &args.label, 0, sample_rate)?),
        PluginType::Dssi => Plugin::Dssi(DssiPlugin::load(0, &args.filename, &args.label, 0)?),
        PluginType::Lv2 => Plugin::Lv2(Lv2Plugin::load(0, &args.filename, &args.label, sample_rate, 2, 2)?),
        PluginType::Vst2 => Plugin::Vst2(Vst2Plugin::load(0, &args.filename, &args.label)?),
        PluginType::Sf2 => Plugin::SoundKit(SoundKitPlugin::load(0, &args.filename, sample_rate as i32)?),
        _ => anyhow::bail!("unreachable plugin type"),
    };
    plugin.reload()?;
    plugin.activate();
    Ok(plugin)
}

/// Services the shmem process ring (§4.6/§3 shmem header): spins on
/// `command == CMD_PROCESS`, runs one `native_process` call, and flips
/// `response` — the same handshake the host side spins on in
/// `BridgePlugin::native_process`.
fn run_process_loop(plugin: Arc<Mutex<Option<Plugin>>>, shmem: Arc<Mutex<Option<SafeShmem>>>) {
    loop {
        std::thread::sleep(Duration::from_micros(200));
        let shmem_guard = shmem.lock().unwrap();
        let Some(mapped) = shmem_guard.as_ref() else { continue };
        let base = mapped.0.as_ptr();

        unsafe {
            let header = &mut *(base as *mut ShmemHeader);
            if std::ptr::read_volatile(&header.command) != CMD_PROCESS {
                continue;
            }

            let frames = header.sample_count as usize;
            let channels = (header.channel_count as usize).max(DEFAULT_CHANNEL_COUNT);
            let input_ptr = base.add(header.input_offset as usize) as *const f32;
            let output_ptr = base.add(header.output_offset as usize) as *mut f32;

            let input_bufs: Vec<Vec<f32>> = (0..channels)
                .map(|ch| std::slice::from_raw_parts(input_ptr.add(ch * frames), frames).to_vec())
                .collect();
            let input_refs: Vec<&[f32]> = input_bufs.iter().map(|b| b.as_slice()).collect();
            let mut output_bufs: Vec<Vec<f32>> = (0..channels).map(|_| vec![0.0f32; frames]).collect();

            {
                let mut guard = plugin.lock().unwrap();
                if let Some(p) = guard.as_mut() {
                    let mut output_refs: Vec<&mut [f32]> = output_bufs.iter_mut().map(|b| b.as_mut_slice()).collect();
                    p.native_process(&input_refs, &mut output_refs, frames);
                }
            }

            for (ch, buf) in output_bufs.iter().enumerate() {
                std::ptr::copy_nonoverlapping(buf.as_ptr(), output_ptr.add(ch * frames), frames);
            }

            std::ptr::write_volatile(&mut header.response, RSP_DONE);
            while std::ptr::read_volatile(&header.command) == CMD_PROCESS {
                std::hint::spin_loop();
            }
            std::ptr::write_volatile(&mut header.response, RSP_IDLE);
        }
    }
}

fn send_event(socket: &UdpSocket, to: std::net::SocketAddr, event: &BridgeEvent) -> anyhow::Result<()> {
    let payload = bincode::serialize(event)?;
    let packet = rosc::encoder::encode(&rosc::OscPacket::Message(rosc::OscMessage {
        addr: OSC_ADDR_EVT.into(),
        args: vec![rosc::OscType::Blob(payload)],
    }))?;
    socket.send_to(&packet, to)?;
    Ok(())
}
