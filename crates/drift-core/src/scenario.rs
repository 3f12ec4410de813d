//! Scenario construction
//!
//! Translates a parsed settings store into a ready-to-run world: host
//! groups with their interfaces, routers and movement models, plus event
//! sources. Every problem found here is a fatal configuration error
//! raised before the first tick.

use tracing::info;

use crate::coord::Coord;
use crate::error::{SimError, SimResult};
use crate::events::EventSource;
use crate::interface::Interface;
use crate::movement::{Movement, RandomWaypoint};
use crate::routing::{Router, RouterConfig};
use crate::settings::Settings;
use crate::world::{World, WorldConfig};

/// A configured simulation run
#[derive(Debug)]
pub struct Scenario {
    pub name: String,
    pub end_time: f64,
    pub world: World,
}

impl Scenario {
    pub fn from_settings(settings: &Settings) -> SimResult<Self> {
        let name = settings
            .get_or("Scenario.name", "default_scenario")
            .to_string();
        let end_time = settings.get_f64("Scenario.endTime")?;
        let nrof_groups = settings.get_usize("Scenario.nrofHostGroups")?;

        let config = WorldConfig {
            update_interval: settings.get_f64_or("Scenario.updateInterval", 0.1)?,
            simulate_connections: settings.get_bool_or("Scenario.simulateConnections", true)?,
            randomize_update_order: settings
                .get_bool_or("Optimization.randomizeUpdateOrder", false)?,
            cell_size_mult: settings.get_f64_or("Optimization.cellSizeMult", 5.0)?,
            seed: settings.get_u64_or("MovementModel.rngSeed", 0)?,
        };
        let world_size = if settings.contains("MovementModel.worldSize") {
            Some(settings.get_coord("MovementModel.worldSize")?)
        } else {
            None
        };
        let warmup = settings.get_f64_or("MovementModel.warmup", 0.0)?;

        let mut world = World::new(config);

        for g in 1..=nrof_groups {
            let scoped = settings.scoped(&format!("Group{g}"), "Group");
            let prefix = scoped.get("groupID")?;
            let nrof_hosts = scoped.get_usize("nrofHosts")?;
            let buffer_size = scoped.get_size("bufferSize")?;
            let ttl = if scoped.contains("msgTtl") {
                Some(scoped.get_f64("msgTtl")?)
            } else {
                None
            };
            let router_config = RouterConfig::from_settings(scoped.get("router")?, settings)?;

            let nrof_interfaces = scoped.get_usize_or("nrofInterfaces", 1)?;
            let mut interfaces = Vec::with_capacity(nrof_interfaces);
            for k in 1..=nrof_interfaces {
                let iface = scoped.get(&format!("interface{k}"))?;
                let speed = settings.get_size(&format!("{iface}.transmitSpeed"))? as f64;
                let range = settings.get_f64(&format!("{iface}.transmitRange"))?;
                interfaces.push(Interface::new(range, speed));
            }

            let model = scoped.get_or("movementModel", "RandomWaypoint");
            for _ in 0..nrof_hosts {
                let (movement, location) = match model {
                    "StationaryMovement" => {
                        let (x, y) = scoped.get_coord("nodeLocation")?;
                        (Movement::Stationary, Some(Coord::new(x, y)))
                    }
                    "RandomWaypoint" => {
                        let Some(size) = world_size else {
                            return Err(SimError::config(
                                "MovementModel.worldSize",
                                "required by RandomWaypoint",
                            ));
                        };
                        let speed = scoped.get_range_f64_or("speed", (0.5, 1.5))?;
                        let wait = scoped.get_range_f64_or("waitTime", (0.0, 0.0))?;
                        (
                            Movement::RandomWaypoint(RandomWaypoint::new(size, speed, wait)),
                            None,
                        )
                    }
                    other => {
                        return Err(SimError::config(
                            format!("Group{g}.movementModel"),
                            format!("unknown movement model '{other}'"),
                        ));
                    }
                };
                world.add_host(
                    prefix,
                    location,
                    movement,
                    interfaces.clone(),
                    Router::new(&router_config, buffer_size, ttl),
                );
            }
        }

        let nrof_events = settings.get_usize_or("Events.nrof", 0)?;
        for e in 1..=nrof_events {
            let scoped = settings.scoped(&format!("Events{e}"), "Events");
            world.add_event_source(EventSource::from_settings(&scoped)?);
        }

        world.warmup_movement(warmup);
        info!(
            scenario = %name,
            hosts = world.host_count(),
            groups = world.group_count(),
            "scenario built"
        );

        Ok(Self {
            name,
            end_time,
            world,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_settings() -> Settings {
        Settings::parse(
            "Scenario.name = unit\n\
             Scenario.endTime = 100\n\
             Scenario.updateInterval = 1\n\
             Scenario.nrofHostGroups = 1\n\
             MovementModel.worldSize = 1000, 1000\n\
             wlan.transmitSpeed = 250k\n\
             wlan.transmitRange = 10\n\
             Group.groupID = p\n\
             Group.nrofHosts = 4\n\
             Group.bufferSize = 5M\n\
             Group.router = EpidemicRouter\n\
             Group.nrofInterfaces = 1\n\
             Group.interface1 = wlan\n\
             Group.msgTtl = 300\n",
        )
        .unwrap()
    }

    #[test]
    fn test_build_minimal_scenario() {
        let scenario = Scenario::from_settings(&minimal_settings()).unwrap();
        assert_eq!(scenario.name, "unit");
        assert_eq!(scenario.end_time, 100.0);
        assert_eq!(scenario.world.host_count(), 4);
        assert_eq!(scenario.world.host(crate::host::HostId(0)).name, "p0");
        assert_eq!(scenario.world.host(crate::host::HostId(3)).name, "p3");
    }

    #[test]
    fn test_missing_required_key_is_fatal() {
        let mut settings = minimal_settings();
        settings.set("Group.router", "NoSuchRouter");
        let err = Scenario::from_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("NoSuchRouter"));
    }

    #[test]
    fn test_two_groups_share_fallbacks() {
        let mut settings = minimal_settings();
        settings.set("Scenario.nrofHostGroups", "2");
        settings.set("Group1.groupID", "a");
        settings.set("Group2.groupID", "b");
        settings.set("Group2.nrofHosts", "2");
        let scenario = Scenario::from_settings(&settings).unwrap();
        assert_eq!(scenario.world.host_count(), 6);
        assert_eq!(scenario.world.group_count(), 2);
        assert_eq!(scenario.world.group_members(1).len(), 2);
    }

    #[test]
    fn test_stationary_group_requires_location() {
        let mut settings = minimal_settings();
        settings.set("Group.movementModel", "StationaryMovement");
        let err = Scenario::from_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("nodeLocation"));

        settings.set("Group.nodeLocation", "10, 20");
        let scenario = Scenario::from_settings(&settings).unwrap();
        let loc = scenario.world.host(crate::host::HostId(0)).location;
        assert_eq!((loc.x, loc.y), (10.0, 20.0));
    }
}
