//! Constructs the requested adapters and wires their events into a shared
//! health monitor, grounded on the teacher's `conductor-daemon` binary
//! spawning a `Conductor` and forwarding `SurfaceEvent`s/`ConductorMessage`s
//! between channel and registry. Here delivery is the adapter's own
//! synchronous [`chatrt_core::EventEmitter`] rather than an `mpsc` channel,
//! so "wiring" means registering a listener closure, not spawning a
//! forwarding task.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use chatrt_behavior::{BehaviouralStateMachine, ResponseProfile};
use chatrt_botapi::BotApiAdapter;
use chatrt_browser::BrowserAdapter;
use chatrt_core::{Adapter, AdapterEvent};
use chatrt_health::{ActionResult, HealthMonitor};
use chatrt_rpc::SubprocessAdapter;
use chatrt_types::Platform;

use crate::config::{self, DaemonConfig};

/// One constructed, not-yet-connected adapter plus the platform it speaks
/// for, kept together so the shutdown path can log which platform a
/// `disconnect()` belongs to.
pub struct Constructed {
    /// The platform this adapter was built for.
    pub platform: Platform,
    /// The adapter itself, type-erased behind the unified contract.
    pub adapter: Arc<dyn Adapter>,
}

/// A persona driving a browser adapter's action timing, started alongside
/// it and stopped on shutdown.
pub struct PersonaHandle {
    /// The running state machine.
    pub machine: Arc<BehaviouralStateMachine>,
}

/// Current wall-clock time in epoch milliseconds, the clock every
/// `chatrt-health`/`chatrt-behavior` timestamp in this binary is stamped
/// with.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Build every adapter named by `platforms`, using `config`'s sections
/// (falling back to each adapter crate's `from_env` where a section is
/// absent or a field is unset).
pub fn build_adapters(
    config: &mut DaemonConfig,
    platforms: &[Platform],
    default_data_dir: Option<&std::path::Path>,
) -> Result<(Vec<Constructed>, Vec<PersonaHandle>)> {
    let mut constructed = Vec::new();
    let mut personas = Vec::new();

    for &platform in platforms {
        match platform {
            Platform::BotApi => {
                let section = config.bot_api.take().unwrap_or_default();
                let bot_config = config::resolve_bot_api(section).context("resolving [bot_api] configuration")?;
                let adapter = BotApiAdapter::new(bot_config);
                constructed.push(Constructed { platform, adapter });
            }
            Platform::Subprocess => {
                let section = config.subprocess.take().unwrap_or_default();
                let rpc_config =
                    config::resolve_subprocess(section, default_data_dir).context("resolving [subprocess] configuration")?;
                let adapter: Arc<dyn Adapter> = Arc::new(SubprocessAdapter::new(rpc_config));
                constructed.push(Constructed { platform, adapter });
            }
            Platform::Browser => {
                let section = config.browser.take().unwrap_or_default();
                let browser_config =
                    config::resolve_browser(section, default_data_dir).context("resolving [browser] configuration")?;
                let profile = browser_config.session_profile;
                let adapter = BrowserAdapter::new(browser_config);
                if let Some(profile) = profile {
                    let persona = start_persona(profile);
                    adapter.set_behavior(Arc::clone(&persona.machine));
                    personas.push(persona);
                }
                constructed.push(Constructed { platform, adapter });
            }
            Platform::Mobile => {
                anyhow::bail!(
                    "the mobile-protocol platform requires an application-supplied \
                     SessionTransport (the paired-WebSocket client library is an \
                     external collaborator, not something this binary links in); \
                     construct a MobileAdapter directly in an embedding application instead"
                );
            }
        }
    }

    Ok((constructed, personas))
}

/// A more active persona dwells in each state for less time; an idle-prone
/// one dwells longer. Both knobs move the scale the same direction, so a
/// persona that is both highly active and highly idle-prone lands near the
/// unscaled default rather than cancelling out in a surprising way.
fn start_persona(profile: ResponseProfile) -> PersonaHandle {
    let scale = (1.2 - 0.5 * profile.activity_level + 0.3 * profile.idle_tendency).clamp(0.4, 1.6);
    let machine = BehaviouralStateMachine::new(scale, Arc::new(|| rand::random::<f64>()), Arc::new(now_ms));
    machine.start();
    PersonaHandle { machine }
}

/// Attach a listener to `adapter` that feeds every `connected`/`error`
/// event into `monitor` as an [`ActionResult`], and registers its collector
/// eagerly so it shows up in `snapshot_all` even before the first event.
pub fn wire_health(monitor: &Arc<HealthMonitor>, platform: Platform, adapter: &Arc<dyn Adapter>) {
    monitor.register_platform(platform);
    let monitor = Arc::clone(monitor);
    adapter.events().on(move |event: &AdapterEvent| match event {
        AdapterEvent::Connected { .. } => {
            monitor.record(platform, ActionResult::success(now_ms(), 0));
        }
        AdapterEvent::Error { message, .. } => {
            monitor.record(platform, ActionResult::failure(now_ms(), 0, classify_error(message)));
        }
        AdapterEvent::Disconnected { reason, .. } => {
            if let Some(reason) = reason {
                warn!(%platform, reason, "adapter disconnected");
            } else {
                info!(%platform, "adapter disconnected");
            }
        }
        _ => {}
    });
}

/// A coarse error classification for the `errorTypes` map, grouping on the
/// first word of the message rather than inspecting adapter-internal error
/// types the daemon doesn't depend on.
fn classify_error(message: &str) -> String {
    message.split_whitespace().next().unwrap_or("unknown").to_lowercase()
}

/// Connect every constructed adapter, logging (not failing the whole
/// startup on) any single adapter's connection failure.
pub async fn connect_all(adapters: &[Constructed]) {
    for Constructed { platform, adapter } in adapters {
        match adapter.connect().await {
            Ok(()) => info!(%platform, "connected"),
            Err(err) => error!(%platform, %err, "failed to connect"),
        }
    }
}

/// Disconnect every constructed adapter and stop every persona, in
/// construction order.
pub async fn shutdown_all(adapters: &[Constructed], personas: &[PersonaHandle]) {
    for Constructed { platform, adapter } in adapters {
        adapter.disconnect().await;
        info!(%platform, "disconnected");
    }
    for persona in personas {
        persona.machine.stop();
    }
}
