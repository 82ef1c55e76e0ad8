//! OSC dispatcher (§4.7 "OSC dispatcher", §6 "OSC method table"): a UDP
//! server listening for `/<engineName>/<id>/<method>` and the top-level
//! `/register`/`/unregister` peers. Mirrors `carla_engine_osc.cpp`'s path
//! grammar and per-method type-signature table exactly; every method
//! validates its OSC argument types before mutating the engine and never
//! panics into the caller — a malformed message is logged and dropped
//! (§7 "errors at this boundary are reported, never unwound").

use std::net::UdpSocket;
use std::sync::Arc;

use rosc::{OscMessage, OscMidiMessage, OscPacket, OscType};

use crate::engine::Engine;
use crate::midiqueue::ExternalMidiNote;
use crate::plugin::PluginCapability;

const RECV_BUFFER_SIZE: usize = 8192;

pub struct OscServer {
    socket: UdpSocket,
    engine: Arc<Engine>,
}

impl OscServer {
    pub fn bind(engine: Arc<Engine>, addr: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self { socket, engine })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }

    /// Blocks for one datagram and dispatches it. The caller loops this
    /// on its own thread; there is no RT-thread involvement anywhere in
    /// this path (§6 "the host callback and this dispatcher never touch
    /// the audio thread").
    pub fn serve_one(&self) -> std::io::Result<()> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let (size, from) = self.socket.recv_from(&mut buf)?;
        match rosc::decoder::decode_udp(&buf[..size]) {
            Ok((_, packet)) => self.dispatch(packet, &from.to_string()),
            Err(e) => log::warn!(target: "rigel::osc", "malformed OSC packet from {from}: {e}"),
        }
        Ok(())
    }

    fn dispatch(&self, packet: OscPacket, peer: &str) {
        match packet {
            OscPacket::Message(msg) => self.dispatch_message(&msg, peer),
            OscPacket::Bundle(bundle) => {
                for inner in bundle.content {
                    self.dispatch(inner, peer);
                }
            }
        }
    }

    fn dispatch_message(&self, msg: &OscMessage, peer: &str) {
        let parts: Vec<&str> = msg.addr.trim_start_matches('/').split('/').collect();

        match parts.as_slice() {
            ["register"] => {
                self.engine.register_osc_peer(peer);
                log::info!(target: "rigel::osc", "peer {peer} registered");
            }
            ["unregister"] => {
                self.engine.unregister_osc_peer();
                log::info!(target: "rigel::osc", "peer {peer} unregistered");
            }
            [engine_name, id_str, method] if *engine_name == self.engine.name() => {
                if id_str.is_empty() || id_str.len() > 3 {
                    log::warn!(target: "rigel::osc", "plugin id '{id_str}' on {} is not 1-3 digits", msg.addr);
                    return;
                }
                let Ok(id) = id_str.parse::<u32>() else {
                    log::warn!(target: "rigel::osc", "non-numeric plugin id '{id_str}' on {}", msg.addr);
                    return;
                };
                self.dispatch_plugin_method(id, method, &msg.args);
            }
            _ => log::warn!(target: "rigel::osc", "unroutable OSC path '{}'", msg.addr),
        }
    }

    /// Validates the per-method type signature (§6 table) before calling
    /// into the engine; an argument-shape mismatch is a protocol error,
    /// not a panic.
    fn dispatch_plugin_method(&self, id: u32, method: &str, args: &[OscType]) {
        let outcome = match method {
            "set_parameter_value" => with_args2_if(args, |index, value| {
                self.engine.with_plugin(id, |p| p.set_parameter_value(index as u32, value));
            }),
            "set_active" => with_args1_i(args, |active| {
                self.engine.with_plugin(id, |p| {
                    if active != 0 {
                        p.activate();
                    } else {
                        p.deactivate();
                    }
                });
            }),
            "set_drywet" => with_args1_f(args, |v| {
                self.engine.with_plugin(id, |p| p.common_mut().set_dry_wet(v));
            }),
            "set_volume" => with_args1_f(args, |v| {
                self.engine.with_plugin(id, |p| p.common_mut().set_volume(v));
            }),
            "set_balance_left" => with_args1_f(args, |v| {
                self.engine.with_plugin(id, |p| p.common_mut().set_balance_left(v));
            }),
            "set_balance_right" => with_args1_f(args, |v| {
                self.engine.with_plugin(id, |p| p.common_mut().set_balance_right(v));
            }),
            "set_program" => with_args1_i(args, |v| {
                self.engine.with_plugin(id, |p| p.set_program(v));
            }),
            "set_midi_program" => with_args1_i(args, |v| {
                self.engine.with_plugin(id, |p| p.set_midi_program(v));
            }),
            "set_custom_data" => with_args3_sss(args, |type_uri, key, value| {
                self.engine.with_plugin(id, |p| {
                    if let Err(e) = p.set_custom_data(&type_uri, &key, &value) {
                        log::warn!(target: "rigel::osc", "set_custom_data rejected for plugin {id}: {e}");
                    }
                });
            }),
            "set_chunk_data" => with_args1_s(args, |data_b64| {
                use base64::{engine::general_purpose::STANDARD, Engine as _};
                if let Ok(bytes) = STANDARD.decode(data_b64) {
                    self.engine.with_plugin(id, |p| p.set_chunk_data(&bytes));
                }
            }),
            "show_gui" => with_args1_i(args, |show| {
                self.engine.with_plugin(id, |p| p.show_gui(show != 0));
            }),
            "note_on" => with_args3_iii(args, |channel, note, velocity| {
                // Injected notes go through the external MIDI queue
                // rather than straight to the plugin (§4.4 step 3); the
                // non-RT producer side lives on `PluginCommon`.
                self.engine.with_plugin(id, |p| {
                    p.common_mut().external_midi.push(ExternalMidiNote {
                        channel: channel as i8,
                        note: note as u8,
                        velocity: velocity as u8,
                    });
                });
            }),
            "midi" => with_args1_m(args, |midi| {
                let channel = midi.status & 0x0F;
                let status = midi.status & 0xF0;
                if status != 0x90 && status != 0x80 {
                    log::debug!(target: "rigel::osc", "midi status {:#x} for plugin {id} ignored (not note on/off)", midi.status);
                    return;
                }
                self.engine.with_plugin(id, |p| {
                    p.common_mut().external_midi.push(ExternalMidiNote {
                        channel: channel as i8,
                        note: midi.data1 as u8,
                        velocity: if status == 0x80 { 0 } else { midi.data2 as u8 },
                    });
                });
            }),
            other => {
                log::warn!(target: "rigel::osc", "unknown OSC method '{other}' for plugin {id}");
                None
            }
        };

        if outcome.is_none() {
            log::warn!(target: "rigel::osc", "argument type mismatch for '{method}' on plugin {id}");
        }
    }
}

fn with_args1_f(args: &[OscType], f: impl FnOnce(f32)) -> Option<()> {
    match args {
        [OscType::Float(v)] => {
            f(*v);
            Some(())
        }
        _ => None,
    }
}

fn with_args1_i(args: &[OscType], f: impl FnOnce(i32)) -> Option<()> {
    match args {
        [OscType::Int(v)] => {
            f(*v);
            Some(())
        }
        _ => None,
    }
}

fn with_args1_s(args: &[OscType], f: impl FnOnce(&str)) -> Option<()> {
    match args {
        [OscType::String(v)] => {
            f(v);
            Some(())
        }
        _ => None,
    }
}

fn with_args2_if(args: &[OscType], f: impl FnOnce(i32, f32)) -> Option<()> {
    match args {
        [OscType::Int(i), OscType::Float(v)] => {
            f(*i, *v);
            Some(())
        }
        _ => None,
    }
}

fn with_args3_iii(args: &[OscType], f: impl FnOnce(i32, i32, i32)) -> Option<()> {
    match args {
        [OscType::Int(a), OscType::Int(b), OscType::Int(c)] => {
            f(*a, *b, *c);
            Some(())
        }
        _ => None,
    }
}

fn with_args1_m(args: &[OscType], f: impl FnOnce(&OscMidiMessage)) -> Option<()> {
    match args {
        [OscType::Midi(v)] => {
            f(v);
            Some(())
        }
        _ => None,
    }
}

fn with_args3_sss(args: &[OscType], f: impl FnOnce(String, String, String)) -> Option<()> {
    match args {
        [OscType::String(a), OscType::String(b), OscType::String(c)] => {
            f(a.clone(), b.clone(), c.clone());
            Some(())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_arg_types_are_rejected_not_panicked() {
        assert!(with_args1_f(&[OscType::Int(3)], |_| {}).is_none());
        assert!(with_args2_if(&[OscType::Int(0), OscType::Float(0.5)], |_, _| {}).is_some());
    }

    #[test]
    fn register_path_is_recognized() {
        let parts: Vec<&str> = "/register".trim_start_matches('/').split('/').collect();
        assert_eq!(parts, ["register"]);
    }

    #[test]
    fn midi_arg_is_decoded_and_non_midi_is_rejected() {
        let midi = OscMidiMessage { port: 0, status: 0x90, data1: 60, data2: 100 };
        let mut seen = None;
        assert!(with_args1_m(&[OscType::Midi(midi)], |m| seen = Some(m.clone())).is_some());
        assert_eq!(seen.map(|m| m.status), Some(0x90));
        assert!(with_args1_m(&[OscType::Int(0)], |_| {}).is_none());
    }

    #[test]
    fn plugin_id_over_three_digits_is_rejected() {
        let over_length = |id_str: &str| id_str.is_empty() || id_str.len() > 3;
        assert!(!over_length("42"));
        assert!(over_length("1234"));
        assert!(over_length(""));
    }
}
