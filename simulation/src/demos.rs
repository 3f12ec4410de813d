//! Built-in demo scenarios
//!
//! Small hand-wired worlds for trying the simulator without a settings
//! file. Each prints the delivered messages at the end.

use anyhow::bail;
use tracing::info;

use drift_core::{
    ConnectionListener, Coord, HostId, Interface, Message, MessageListener, Movement, Report,
    Router, RouterConfig, SimResult, UpdateListener, World, WorldConfig,
};

/// Prints deliveries as they happen and a summary at the end
#[derive(Debug, Default)]
struct ConsoleReport {
    delivered: Vec<(String, f64, usize)>,
}

impl MessageListener for ConsoleReport {
    fn message_transferred(
        &mut self,
        m: &Message,
        _from: HostId,
        to: HostId,
        time: f64,
        delivered: bool,
    ) {
        if delivered {
            println!(
                "  t={time:8.1}  {} delivered to host {} after {} hops",
                m.id,
                to.0,
                m.hop_count()
            );
            self.delivered.push((m.id.clone(), time, m.hop_count()));
        }
    }
}

impl ConnectionListener for ConsoleReport {}
impl UpdateListener for ConsoleReport {}

impl Report for ConsoleReport {
    fn done(&mut self, _world: &World) -> SimResult<()> {
        println!("{} message(s) delivered", self.delivered.len());
        Ok(())
    }
}

pub fn run(name: &str) -> anyhow::Result<()> {
    match name {
        "two-hosts" => two_hosts(),
        "relay-line" => relay_line(),
        "spray" => spray(),
        other => bail!("unknown demo '{other}' (try: two-hosts, relay-line, spray)"),
    }
}

/// Two hosts in range; a single message crosses directly
fn two_hosts() -> anyhow::Result<()> {
    info!("demo: two hosts, epidemic, direct delivery");
    let mut world = World::new(WorldConfig::default());
    for i in 0..2 {
        world.add_host(
            "n",
            Some(Coord::new(10.0 * i as f64, 0.0)),
            Movement::Stationary,
            vec![Interface::new(20.0, 250_000.0)],
            Router::new(&RouterConfig::Epidemic, 1_000_000, None),
        );
    }
    world.add_report(Box::new(ConsoleReport::default()));
    world.create_message(HostId(0), HostId(1), "M1", 500_000)?;
    world.run_until(30.0)?;
    world.finalize()?;
    Ok(())
}

/// Five hosts on a line; only adjacent pairs ever connect
fn relay_line() -> anyhow::Result<()> {
    info!("demo: relay line, epidemic flooding");
    let mut world = World::new(WorldConfig::default());
    for i in 0..5 {
        world.add_host(
            "n",
            Some(Coord::new(15.0 * i as f64, 0.0)),
            Movement::Stationary,
            vec![Interface::new(20.0, 250_000.0)],
            Router::new(&RouterConfig::Epidemic, 1_000_000, None),
        );
    }
    world.add_report(Box::new(ConsoleReport::default()));
    world.create_message(HostId(0), HostId(4), "M1", 100_000)?;
    world.run_until(120.0)?;
    world.finalize()?;
    Ok(())
}

/// Random-waypoint walkers with binary Spray-and-Wait
fn spray() -> anyhow::Result<()> {
    info!("demo: random waypoint, binary spray-and-wait");
    let mut world = World::new(WorldConfig {
        update_interval: 1.0,
        seed: 7,
        ..Default::default()
    });
    let config = RouterConfig::SprayAndWait(Default::default());
    for _ in 0..20 {
        world.add_host(
            "w",
            None,
            Movement::RandomWaypoint(drift_core::RandomWaypoint::new(
                (300.0, 300.0),
                (1.0, 2.5),
                (0.0, 10.0),
            )),
            vec![Interface::new(30.0, 250_000.0)],
            Router::new(&config, 5_000_000, Some(60.0)),
        );
    }
    world.add_report(Box::new(ConsoleReport::default()));
    world.create_message(HostId(0), HostId(19), "M1", 100_000)?;
    world.run_until(1_800.0)?;
    world.finalize()?;
    Ok(())
}
