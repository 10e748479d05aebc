//! object_sim.rs — Emitter motion
//!
//! A single object cruising inside the station bounding box:
//! - constant speed (km/h, changeable at runtime through POST /config)
//! - heading 0 = north (+y), 90 = east (+x)
//! - small random heading wander per tick
//! - specular bounce off the bounding box edges

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tdoa_types::{Point2D, Station};
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectConfig {
    pub start: [f64; 2],
    pub heading_deg: f64,
    pub speed_kmh: f64,
    /// σ of the per-tick heading change, degrees
    pub heading_wander_deg: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ObjectState {
    pub pos: Point2D,
    pub heading_deg: f64,
    pub speed_kmh: f64,
}

impl ObjectState {
    pub fn speed_mps(&self) -> f64 { self.speed_kmh / 3.6 }
}

pub struct ObjectSim {
    pub object: ObjectState,
    pub stations: Vec<Station>,
    pub t_elapsed: f64,
    min: Point2D,
    max: Point2D,
    wander: Option<Normal<f64>>,
}

impl ObjectSim {
    pub fn new(cfg: &ObjectConfig, stations: Vec<Station>) -> Self {
        let (min, max) = bounding_box(&stations);
        let wander = if cfg.heading_wander_deg > 0.0 {
            match Normal::new(0.0, cfg.heading_wander_deg) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("heading wander disabled: {e}");
                    None
                }
            }
        } else {
            None
        };

        let start = Point2D::new(
            cfg.start[0].clamp(min.x, max.x),
            cfg.start[1].clamp(min.y, max.y),
        );

        Self {
            object: ObjectState {
                pos: start,
                heading_deg: cfg.heading_deg.rem_euclid(360.0),
                speed_kmh: cfg.speed_kmh.max(0.0),
            },
            stations,
            t_elapsed: 0.0,
            min,
            max,
            wander,
        }
    }

    pub fn set_speed_kmh(&mut self, speed_kmh: f64) {
        self.object.speed_kmh = speed_kmh.max(0.0);
    }

    /// Advance by `dt` seconds
    pub fn tick(&mut self, dt: f64, rng: &mut impl Rng) {
        self.t_elapsed += dt;

        if let Some(wander) = &self.wander {
            self.object.heading_deg = (self.object.heading_deg + wander.sample(rng)).rem_euclid(360.0);
        }

        let hdg = self.object.heading_deg.to_radians();
        let step = self.object.speed_mps() * dt;
        let mut x = self.object.pos.x + step * hdg.sin();
        let mut y = self.object.pos.y + step * hdg.cos();
        let mut heading = self.object.heading_deg;

        // Bounce: mirror position and heading about the crossed edge
        if x < self.min.x || x > self.max.x {
            x = reflect(x, self.min.x, self.max.x);
            heading = 360.0 - heading;
        }
        if y < self.min.y || y > self.max.y {
            y = reflect(y, self.min.y, self.max.y);
            heading = 180.0 - heading;
        }

        self.object.pos = Point2D::new(x, y);
        self.object.heading_deg = heading.rem_euclid(360.0);
    }
}

fn bounding_box(stations: &[Station]) -> (Point2D, Point2D) {
    stations.iter().fold(
        (Point2D::new(f64::INFINITY, f64::INFINITY), Point2D::new(f64::NEG_INFINITY, f64::NEG_INFINITY)),
        |(lo, hi), s| (
            Point2D::new(lo.x.min(s.x), lo.y.min(s.y)),
            Point2D::new(hi.x.max(s.x), hi.y.max(s.y)),
        ),
    )
}

/// Fold `v` back into [lo, hi]
fn reflect(v: f64, lo: f64, hi: f64) -> f64 {
    let span = hi - lo;
    if span <= 0.0 {
        return lo;
    }
    let period = 2.0 * span;
    let t = (v - lo).rem_euclid(period);
    lo + if t > span { period - t } else { t }
}
