//! The motion loop: cosmetic micro-motions for thinking agents.
//!
//! Runs beside the tick engine at a sub-tick cadence. Any agent whose
//! internal thinking flag is set -- or who is in the client's explicit
//! thinking set -- gets one randomly chosen micro-motion per pulse so
//! the 3D client has something to animate while reasoning is in flight.
//! No thinking agents, no frame.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use minitown_core::SharedAgents;
use minitown_types::wire::{MicroMotion, MotionData};
use minitown_types::ServerFrame;

use crate::session::SharedSink;

/// Pulse interval of the motion loop.
pub const MOTION_INTERVAL: Duration = Duration::from_millis(150);

/// Names the client explicitly flagged via `start_thinking`.
pub type ExplicitThinking = Arc<StdMutex<BTreeSet<String>>>;

/// Pick one micro-motion for an agent.
fn pick_motion<R: Rng>(rng: &mut R, agent: &str, place: &str) -> MicroMotion {
    match rng.gen_range(0..3) {
        0 => MicroMotion {
            agent: agent.to_owned(),
            mode: "wander".to_owned(),
            radius: rng.gen_range(2.0..4.0),
            period: rng.gen_range(1.5..2.5),
            speed: rng.gen_range(0.8..1.4),
            temp_target: None,
            arrive_tolerance: None,
        },
        1 => MicroMotion {
            agent: agent.to_owned(),
            mode: "lookaround".to_owned(),
            radius: 0.0,
            period: rng.gen_range(1.5..2.5),
            speed: 0.0,
            temp_target: None,
            arrive_tolerance: None,
        },
        _ => MicroMotion {
            agent: agent.to_owned(),
            mode: "slow_walk_to_temp".to_owned(),
            radius: rng.gen_range(3.0..6.0),
            period: rng.gen_range(2.0..3.0),
            speed: rng.gen_range(0.5..0.9),
            temp_target: Some(place.to_owned()),
            arrive_tolerance: Some(0.5),
        },
    }
}

/// Run the motion loop until the socket dies or the task is aborted.
pub async fn motion_loop(agents: SharedAgents, explicit: ExplicitThinking, sink: SharedSink) {
    let mut interval = tokio::time::interval(MOTION_INTERVAL);
    loop {
        interval.tick().await;

        let mut motions = Vec::new();
        for handle in agents.iter() {
            let agent = handle.lock().await;
            let flagged = explicit
                .lock()
                .map(|set| set.contains(&agent.name))
                .unwrap_or(false);
            if !(agent.is_thinking() || flagged) {
                continue;
            }
            let motion = {
                let mut rng = rand::thread_rng();
                pick_motion(&mut rng, &agent.name, &agent.curr_place)
            };
            motions.push(motion);
        }

        if motions.is_empty() {
            continue;
        }

        let frame = ServerFrame::Motion {
            data: MotionData {
                micro_motions: motions,
            },
        };
        if crate::session::send_frame(&sink, &frame).await.is_err() {
            debug!("motion loop stopping: client gone");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn all_three_modes_are_reachable() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut seen = BTreeSet::new();
        for _ in 0..100 {
            let motion = pick_motion(&mut rng, "ISTJ", "School");
            match motion.mode.as_str() {
                "wander" => {
                    assert!(motion.radius > 0.0);
                    assert!(motion.temp_target.is_none());
                }
                "lookaround" => {
                    assert_eq!(motion.radius, 0.0);
                    assert_eq!(motion.speed, 0.0);
                }
                "slow_walk_to_temp" => {
                    assert_eq!(motion.temp_target.as_deref(), Some("School"));
                    assert_eq!(motion.arrive_tolerance, Some(0.5));
                }
                other => panic!("unknown mode {other}"),
            }
            seen.insert(motion.mode);
        }
        assert_eq!(seen.len(), 3);
    }
}
