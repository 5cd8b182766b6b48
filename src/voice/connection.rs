//! Mumble connection lifecycle and the owning connection task.
//!
//! `connect` performs the whole startup sequence inline — TCP, TLS,
//! version/authenticate handshake, channel sync, join, self-deafen — and
//! only then spawns the long-lived task. Startup failures (reject,
//! unresolvable channel path) therefore surface as plain errors to `main`,
//! which exits with status 1. After startup the task owns the socket;
//! everything else talks to it through [`VoiceHandle`].
//!
//! Audio frames travel through the TCP tunnel (`UDPTunnel` control
//! packets), which sidesteps the UDP crypt setup entirely.

use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use mumble_protocol::control::{msgs, ClientControlCodec, ControlPacket};
use mumble_protocol::voice::{VoicePacket, VoicePacketPayload};
use mumble_protocol::{Clientbound, Serverbound};
use std::marker::PhantomData;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{Decoder, Framed};
use tracing::{debug, error, info};

use crate::config::MumbleConfig;
use crate::voice::channel::ChannelTree;
use crate::voice::VoiceOutput;

type ControlStream = Framed<tokio_native_tls::TlsStream<TcpStream>, ClientControlCodec>;

/// Keepalive interval; murmur drops clients silent for 30 s.
const PING_INTERVAL: Duration = Duration::from_secs(10);

enum VoiceCommand {
    SetSelfMute(bool),
    SetSelfDeaf(bool),
    Audio { frame: Bytes, end: bool },
}

/// Cheap, cloneable handle into the connection task.
#[derive(Clone)]
pub struct VoiceHandle {
    tx: mpsc::UnboundedSender<VoiceCommand>,
}

impl VoiceOutput for VoiceHandle {
    fn set_self_mute(&self, mute: bool) {
        let _ = self.tx.send(VoiceCommand::SetSelfMute(mute));
    }

    fn set_self_deaf(&self, deaf: bool) {
        let _ = self.tx.send(VoiceCommand::SetSelfDeaf(deaf));
    }

    fn send_audio(&self, frame: Bytes, end: bool) {
        let _ = self.tx.send(VoiceCommand::Audio { frame, end });
    }
}

pub struct VoiceConnection {
    pub handle: VoiceHandle,
    /// Flips to `true` exactly once, when the server connection is gone.
    pub disconnected: watch::Receiver<bool>,
}

/// Connect, authenticate, join the configured channel and self-deafen.
pub async fn connect(config: &MumbleConfig, channel_path: &str) -> Result<VoiceConnection> {
    let addr = format!("{}:{}", config.host, config.port);
    info!(server = %addr, username = %config.username, "connecting to mumble server");

    let tcp = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("cannot reach {}", addr))?;
    tcp.set_nodelay(true)?;

    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()?;
    let tls = tokio_native_tls::TlsConnector::from(tls);
    let stream = tls
        .connect(&config.host, tcp)
        .await
        .context("TLS handshake failed")?;

    let mut control = ClientControlCodec::new().framed(stream);

    let mut version = msgs::Version::new();
    version.set_version(encode_version(1, 3, 0));
    version.set_release(format!("mumble-soundboard {}", env!("CARGO_PKG_VERSION")));
    control.send(ControlPacket::Version(Box::new(version))).await?;

    let mut auth = msgs::Authenticate::new();
    auth.set_username(config.username.clone());
    if !config.password.is_empty() {
        auth.set_password(config.password.clone());
    }
    auth.set_opus(true);
    control.send(ControlPacket::Authenticate(Box::new(auth))).await?;

    // The server streams channel and user state, then ServerSync tells us
    // we are in.
    let mut channels = ChannelTree::default();
    let session_id = loop {
        let packet = control
            .next()
            .await
            .ok_or_else(|| anyhow!("server closed the connection during handshake"))?
            .context("control channel error during handshake")?;
        match packet {
            ControlPacket::ChannelState(state) => {
                if state.has_channel_id() {
                    let parent = if state.has_parent() {
                        Some(state.get_parent())
                    } else {
                        None
                    };
                    channels.insert(state.get_channel_id(), state.get_name().to_owned(), parent);
                }
            }
            ControlPacket::ChannelRemove(state) => channels.remove(state.get_channel_id()),
            ControlPacket::Reject(reject) => {
                bail!("server rejected connection: {}", reject.get_reason())
            }
            ControlPacket::ServerSync(sync) => break sync.get_session(),
            _ => {}
        }
    };
    info!(session = session_id, channels = channels.len(), "connected");

    let target = channels
        .resolve_path(channel_path)
        .ok_or_else(|| anyhow!("cannot find channel named {}", channel_path))?;

    let mut state = msgs::UserState::new();
    state.set_channel_id(target);
    state.set_self_deaf(true);
    control.send(ControlPacket::UserState(Box::new(state))).await?;
    info!(channel = %channel_path, channel_id = target, "joined channel, self-deafened");

    let (tx, rx) = mpsc::unbounded_channel();
    let (disconnected_tx, disconnected_rx) = watch::channel(false);
    tokio::spawn(run(control, rx, disconnected_tx));

    Ok(VoiceConnection {
        handle: VoiceHandle { tx },
        disconnected: disconnected_rx,
    })
}

/// The connection task: services commands, keeps the session alive with
/// pings, and drains inbound control traffic until the server goes away.
async fn run(
    mut control: ControlStream,
    mut commands: mpsc::UnboundedReceiver<VoiceCommand>,
    disconnected: watch::Sender<bool>,
) {
    // Sequence numbers count 10 ms frames; each of our packets is 20 ms.
    let mut seq_num: u64 = 0;
    let mut ping = tokio::time::interval(PING_INTERVAL);

    loop {
        tokio::select! {
            _ = ping.tick() => {
                let mut msg = msgs::Ping::new();
                msg.set_timestamp(unix_timestamp());
                if control.send(ControlPacket::Ping(Box::new(msg))).await.is_err() {
                    error!("failed to ping the server");
                    break;
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(cmd) => {
                        if let Err(e) = handle_command(&mut control, cmd, &mut seq_num).await {
                            error!(error = %e, "failed to send to the server");
                            break;
                        }
                    }
                    // All handles dropped; the process is shutting down.
                    None => break,
                }
            }
            packet = control.next() => {
                match packet {
                    Some(Ok(packet)) => handle_packet(packet),
                    Some(Err(e)) => {
                        error!(error = %e, "control channel error");
                        break;
                    }
                    None => {
                        error!("server closed the connection");
                        break;
                    }
                }
            }
        }
    }

    let _ = disconnected.send(true);
}

async fn handle_command(
    control: &mut ControlStream,
    cmd: VoiceCommand,
    seq_num: &mut u64,
) -> Result<()> {
    match cmd {
        VoiceCommand::SetSelfMute(mute) => {
            let mut state = msgs::UserState::new();
            state.set_self_mute(mute);
            control.send(ControlPacket::UserState(Box::new(state))).await?;
        }
        VoiceCommand::SetSelfDeaf(deaf) => {
            let mut state = msgs::UserState::new();
            state.set_self_deaf(deaf);
            control.send(ControlPacket::UserState(Box::new(state))).await?;
        }
        VoiceCommand::Audio { frame, end } => {
            let packet: VoicePacket<Serverbound> = VoicePacket::Audio {
                _dst: PhantomData,
                target: 0, // normal talking
                session_id: (),
                seq_num: *seq_num,
                payload: VoicePacketPayload::Opus(frame, end),
                position_info: None,
            };
            *seq_num += 2;
            control.send(ControlPacket::UDPTunnel(Box::new(packet))).await?;
        }
    }
    Ok(())
}

fn handle_packet(packet: ControlPacket<Clientbound>) {
    match packet {
        ControlPacket::Ping(_) => {}
        ControlPacket::TextMessage(msg) => {
            debug!(message = %msg.get_message(), "text message received");
        }
        // We are self-deafened; any tunneled audio is dropped.
        ControlPacket::UDPTunnel(_) => {}
        _ => {}
    }
}

fn encode_version(major: u16, minor: u8, patch: u8) -> u32 {
    ((major as u32) << 16) | ((minor as u32) << 8) | patch as u32
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
