//! Bridge adapter (§4.6): the host side of an out-of-process plugin,
//! spawned as a `rigel_bridge` sub-process and driven over a shared-
//! memory audio ring plus an OSC control channel. Generalizes the
//! teacher's stdin/stdout+bincode-framed `PluginNode` to a UDP/OSC
//! transport carrying the same bincode-encoded command/event payloads
//! (§3 design note: rosc replaces the line-oriented pipe framing).

use std::net::{SocketAddr, UdpSocket};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rigel_shared::bridge::{BridgeCommand, BridgeEvent};
use rigel_shared::error::{RigelError, RigelResult};
use rigel_shared::shmem::{ShmemConfig, ShmemHeader, CMD_IDLE, CMD_PROCESS, DEFAULT_CHANNEL_COUNT, RSP_DONE, SPIN_TIMEOUT_ITERATIONS};
use rigel_shared::{BinaryType, PluginType, ProcessMode};
use shared_memory::{Shmem, ShmemConf};

use crate::plugin::{PluginCapability, PluginCommon};
use crate::postevent::PostEvent;

/// §4.6: a bridge that doesn't announce within this window is treated as
/// fatal, not retried.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const OSC_ADDR_CMD: &str = "/bridge/cmd";
const OSC_ADDR_EVT: &str = "/bridge/evt";

pub struct BridgePlugin {
    common: PluginCommon,
    child: Child,
    socket: UdpSocket,
    sub_addr: SocketAddr,
    shmem: Shmem,
    shmem_config: ShmemConfig,
}

// SAFETY: only the RT thread owning this adapter touches `shmem`'s audio
// region; the control socket and child handle are non-RT concerns only
// ever touched from the thread that loaded the plugin or the idle thread.
unsafe impl Send for BridgePlugin {}

impl BridgePlugin {
    #[allow(clippy::too_many_arguments)]
    pub fn load(
        id: u32,
        engine_name: &str,
        bridge_binary: &str,
        binary_type: BinaryType,
        bridged_type: PluginType,
        filename: &str,
        label: &str,
        sample_rate: f64,
        buffer_size: u32,
    ) -> RigelResult<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .map_err(|e| RigelError::Configuration(format!("failed to bind bridge control socket: {e}")))?;
        let host_addr = socket.local_addr().map_err(|e| RigelError::Configuration(e.to_string()))?;
        socket.set_read_timeout(Some(HANDSHAKE_TIMEOUT)).ok();

        let shmem_config = ShmemConfig { os_id: format!("/rigel_{}", uuid::Uuid::new_v4()), size: 1 << 20 };
        let shmem = ShmemConf::new()
            .size(shmem_config.size)
            .os_id(&shmem_config.os_id)
            .create()
            .map_err(|e| RigelError::Configuration(format!("failed to create bridge shmem: {e}")))?;
        unsafe {
            let header = shmem.as_ptr() as *mut ShmemHeader;
            std::ptr::write(header, ShmemHeader::zeroed());
        }

        let child = Command::new(bridge_binary)
            .arg("--osc-host").arg(host_addr.to_string())
            .arg("--binary-type").arg(format!("{binary_type:?}"))
            .arg("--plugin-type").arg(format!("{bridged_type:?}"))
            .arg("--filename").arg(filename)
            .arg("--label").arg(label)
            .arg("--engine-name").arg(engine_name)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| RigelError::PluginLoadFailure { path: filename.into(), label: label.into(), reason: e.to_string() })?;

        // The sub-process speaks first: its datagram both confirms it's
        // alive and tells us the address to reply to.
        let mut buf = [0u8; 4096];
        let (_len, sub_addr) = socket.recv_from(&mut buf).map_err(|_| RigelError::BridgeTimeout {
            label: label.into(),
            timeout_ms: HANDSHAKE_TIMEOUT.as_millis() as u64,
        })?;

        let mut common = PluginCommon::new(id, PluginType::Bridge, ProcessMode::ContinuousRack);
        common.filename = filename.into();
        common.label = label.into();
        common.name = label.into();

        let mut bridge = Self { common, child, socket, sub_addr, shmem, shmem_config };

        bridge.send_command(&BridgeCommand::Announce {
            shmem_name: bridge.shmem_config.os_id.clone(),
            shmem_size: bridge.shmem_config.size,
            sample_rate,
            buffer_size,
        })?;

        match bridge.recv_event()? {
            BridgeEvent::PluginInfo(info) => {
                bridge.common.name = info.name;
                bridge.common.hints = info.hints;
            }
            BridgeEvent::Updated => {}
            BridgeEvent::Error { reason } => {
                return Err(RigelError::BridgeCrash { label: bridge.common.label.clone(), reason });
            }
            other => {
                return Err(RigelError::OscProtocol {
                    path: OSC_ADDR_EVT.into(),
                    reason: format!("unexpected handshake reply: {other:?}"),
                });
            }
        }

        Ok(bridge)
    }

    fn send_command(&self, command: &BridgeCommand) -> RigelResult<()> {
        let payload = bincode::serialize(command).map_err(|e| RigelError::OscProtocol { path: OSC_ADDR_CMD.into(), reason: e.to_string() })?;
        let packet = rosc::encoder::encode(&rosc::OscPacket::Message(rosc::OscMessage {
            addr: OSC_ADDR_CMD.into(),
            args: vec![rosc::OscType::Blob(payload)],
        }))
        .map_err(|e| RigelError::OscProtocol { path: OSC_ADDR_CMD.into(), reason: format!("{e:?}") })?;
        self.socket
            .send_to(&packet, self.sub_addr)
            .map_err(|e| RigelError::BridgeCrash { label: self.common.label.clone(), reason: e.to_string() })?;
        Ok(())
    }

    fn recv_event(&self) -> RigelResult<BridgeEvent> {
        let mut buf = [0u8; 65536];
        let (len, _peer) = self.socket.recv_from(&mut buf).map_err(|_| RigelError::BridgeTimeout {
            label: self.common.label.clone(),
            timeout_ms: HANDSHAKE_TIMEOUT.as_millis() as u64,
        })?;
        let (_, packet) =
            rosc::decoder::decode_udp(&buf[..len]).map_err(|e| RigelError::OscProtocol { path: OSC_ADDR_EVT.into(), reason: format!("{e:?}") })?;
        let rosc::OscPacket::Message(msg) = packet else {
            return Err(RigelError::OscProtocol { path: OSC_ADDR_EVT.into(), reason: "expected OSC message, got bundle".into() });
        };
        let Some(rosc::OscType::Blob(payload)) = msg.args.into_iter().next() else {
            return Err(RigelError::OscProtocol { path: OSC_ADDR_EVT.into(), reason: "missing blob argument".into() });
        };
        bincode::deserialize(&payload).map_err(|e| RigelError::OscProtocol { path: OSC_ADDR_EVT.into(), reason: e.to_string() })
    }

    /// §4.6: lets the idle loop notice a dead sub-process between process
    /// calls rather than spinning out the RT timeout every callback.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn send_show_gui(&self, show: bool) -> RigelResult<()> {
        self.send_command(&BridgeCommand::ShowGui { show })
    }
}

impl PluginCapability for BridgePlugin {
    fn common(&self) -> &PluginCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PluginCommon {
        &mut self.common
    }

    fn reload(&mut self) -> RigelResult<()> {
        self.common.resize_latency_rings(DEFAULT_CHANNEL_COUNT, 0);
        Ok(())
    }

    fn native_process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) {
        if !self.is_alive() {
            self.common.post_events.post(PostEvent::Debug);
            return;
        }

        let base = self.shmem.as_ptr();
        let channel_count = DEFAULT_CHANNEL_COUNT.max(inputs.len()).max(outputs.len());
        let audio_bytes = channel_count * frames * std::mem::size_of::<f32>();

        unsafe {
            let input_offset = std::mem::size_of::<ShmemHeader>();
            let output_offset = input_offset + audio_bytes;
            let input_ptr = base.add(input_offset) as *mut f32;
            let output_ptr = base.add(output_offset) as *mut f32;

            for (ch, buf) in inputs.iter().enumerate() {
                let dst = input_ptr.add(ch * frames);
                std::ptr::copy_nonoverlapping(buf.as_ptr(), dst, frames.min(buf.len()));
            }

            let header = &mut *(base as *mut ShmemHeader);
            header.input_offset = input_offset as u32;
            header.output_offset = output_offset as u32;
            header.sample_count = frames as u32;
            header.channel_count = channel_count as u32;

            std::ptr::write_volatile(&mut header.command, CMD_PROCESS);

            let mut spins = 0u32;
            while std::ptr::read_volatile(&header.response) != RSP_DONE {
                spins += 1;
                if spins < 2000 {
                    std::hint::spin_loop();
                } else {
                    std::thread::yield_now();
                }
                if spins > SPIN_TIMEOUT_ITERATIONS {
                    self.common.post_events.post(PostEvent::Debug);
                    return;
                }
            }

            for (ch, buf) in outputs.iter_mut().enumerate() {
                let src = output_ptr.add(ch * frames);
                std::ptr::copy_nonoverlapping(src, buf.as_mut_ptr(), frames.min(buf.len()));
            }

            std::ptr::write_volatile(&mut header.command, CMD_IDLE);
        }
    }

    fn set_parameter_value(&mut self, index: u32, value: f32) {
        let _ = self.send_command(&BridgeCommand::SetParameterValue { index, value });
        self.common.parameters.set_value(index as usize, value);
    }

    fn set_program(&mut self, index: i32) {
        let _ = self.send_command(&BridgeCommand::SetProgram { index });
        self.common.programs.set_current(index);
    }

    fn set_midi_program(&mut self, index: i32) {
        let _ = self.send_command(&BridgeCommand::SetMidiProgram { index });
        self.common.midi_programs.set_current(index);
    }

    fn set_custom_data(&mut self, type_uri: &str, key: &str, value: &str) -> RigelResult<()> {
        self.send_command(&BridgeCommand::SetCustomData { kind: type_uri.into(), key: key.into(), value: value.into() })?;
        self.common.custom_data.set(type_uri, key, value);
        Ok(())
    }

    fn set_chunk_data(&mut self, data: &[u8]) {
        let _ = self.send_command(&BridgeCommand::SetChunkData { data_b64: STANDARD.encode(data) });
    }

    fn show_gui(&mut self, show: bool) {
        let _ = self.send_show_gui(show);
    }
}

impl Drop for BridgePlugin {
    fn drop(&mut self) {
        let _ = self.send_command(&BridgeCommand::Quit);
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
