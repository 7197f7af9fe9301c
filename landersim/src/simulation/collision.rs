//! Craft/terrain contact resolution and ground clearance.
//!
//! Contact detection runs in two phases against the terrain octree:
//! `box_overlap` with the craft's bounding box (broad phase), then the nearest
//! terrain vertex to the craft's position among the overlapping leaves
//! (narrow phase). Closer than `contact_epsilon` means contact, and the craft's
//! speed decides what the contact is:
//!
//! | speed                                   | outcome                          |
//! |-----------------------------------------|----------------------------------|
//! | `>= crash_speed`                        | destroyed, reported once         |
//! | `landing_speed < speed < crash_speed`   | bounce force for the next tick   |
//! | `<= landing_speed`                      | landed, inside/outside recorded  |
//!
//! Destroyed and landed are terminal: the resolver reports them once and then
//! stays quiet until [`CollisionResolver::reset`].

use crate::error::{Error, Result};
use crate::simulation::geometry::{Aabb, Ray};
use crate::simulation::integrator::effective_timestep;
use crate::simulation::octree::SpatialIndex;
use crate::simulation::states::{NVec3, Particle};

#[derive(Debug, Clone, Copy)]
pub struct ContactThresholds {
    pub contact_epsilon: f64, // nearest-vertex distance that counts as touching
    pub crash_speed: f64, // at or above: destroyed
    pub landing_speed: f64, // at or below: landed
    pub restitution: f64, // fraction of normal speed returned on a bounce
}

impl Default for ContactThresholds {
    fn default() -> Self {
        Self {
            contact_epsilon: 1.0,
            crash_speed: 5.0,
            landing_speed: 0.5,
            restitution: 0.5,
        }
    }
}

impl ContactThresholds {
    pub fn validate(&self) -> Result<()> {
        if !(self.contact_epsilon.is_finite() && self.contact_epsilon > 0.0) {
            return Err(Error::config("contact_epsilon must be finite and > 0"));
        }
        if !(self.landing_speed.is_finite() && self.crash_speed.is_finite())
            || self.landing_speed < 0.0
            || self.landing_speed >= self.crash_speed
        {
            return Err(Error::config(format!(
                "need 0 <= landing_speed < crash_speed, got {} and {}",
                self.landing_speed, self.crash_speed
            )));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(Error::config(format!("restitution must be in [0, 1], got {}", self.restitution)));
        }
        Ok(())
    }
}

/// What a single [`CollisionResolver::check`] found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactEvent {
    /// No contact, or the resolver already reached a terminal outcome.
    None,
    /// Contact too fast; reported exactly once.
    Destroyed { speed: f64 },
    /// Contact in the bounce band. `force` has been added to the craft's
    /// accumulator (zero when the craft already moves away from the surface).
    Bounced { force: NVec3 },
    /// Contact slow enough to settle; reported exactly once.
    Landed { inside: bool },
}

/// Terminal or running state of the current flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    Airborne,
    Destroyed,
    Landed { inside: bool },
}

#[derive(Debug, Clone)]
pub struct CollisionResolver {
    thresholds: ContactThresholds,
    outcome: ContactOutcome,
    in_contact: bool, // contact condition held on the previous check
    episodes: usize, // number of contact episodes seen
    last_distance: Option<f64>,
}

impl CollisionResolver {
    pub fn new(thresholds: ContactThresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            outcome: ContactOutcome::Airborne,
            in_contact: false,
            episodes: 0,
            last_distance: None,
        })
    }

    /// Test the craft against the terrain and resolve any contact.
    ///
    /// # Parameters
    /// - `index`      : Terrain octree.
    /// - `craft_box`  : World-space bounding box of the craft.
    /// - `craft`      : Craft particle; receives the bounce force, if any.
    /// - `dt`         : Timestep of the coming tick, turns the bounce impulse into a force.
    /// - `target_zone`: Landing pad; decides `inside` for a landing.
    pub fn check(
        &mut self,
        index: &SpatialIndex,
        craft_box: &Aabb,
        craft: &mut Particle,
        dt: f64,
        target_zone: &Aabb,
    ) -> ContactEvent {
        if self.outcome != ContactOutcome::Airborne {
            return ContactEvent::None;
        }

        let nearest = index.nearest_point(craft_box, &craft.position);
        self.last_distance = nearest.map(|n| n.distance);

        let Some(nearest) = nearest.filter(|n| n.distance < self.thresholds.contact_epsilon) else {
            if self.in_contact {
                tracing::debug!(episode = self.episodes, "contact episode cleared");
            }
            self.in_contact = false;
            return ContactEvent::None;
        };

        if !self.in_contact {
            self.episodes += 1;
            self.in_contact = true;
            tracing::debug!(episode = self.episodes, vertex = nearest.vertex, distance = nearest.distance, "contact");
        }

        let speed = craft.speed();
        if speed >= self.thresholds.crash_speed {
            self.outcome = ContactOutcome::Destroyed;
            tracing::info!(speed, "craft destroyed on impact");
            return ContactEvent::Destroyed { speed };
        }

        if speed > self.thresholds.landing_speed {
            let normal = index.vertex_normal(nearest.vertex);
            let force = bounce_force(craft, normal, self.thresholds.restitution, dt);
            craft.force += force;
            return ContactEvent::Bounced { force };
        }

        let inside = target_zone.contains(&craft.position);
        self.outcome = ContactOutcome::Landed { inside };
        tracing::info!(speed, inside, "craft landed");
        ContactEvent::Landed { inside }
    }

    /// Back to airborne; the next contact starts a fresh episode.
    pub fn reset(&mut self) {
        self.outcome = ContactOutcome::Airborne;
        self.in_contact = false;
        self.last_distance = None;
    }

    pub fn outcome(&self) -> ContactOutcome {
        self.outcome
    }

    pub fn is_destroyed(&self) -> bool {
        self.outcome == ContactOutcome::Destroyed
    }

    pub fn is_resting(&self) -> bool {
        matches!(self.outcome, ContactOutcome::Landed { .. })
    }

    pub fn in_contact(&self) -> bool {
        self.in_contact
    }

    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// Nearest terrain distance from the last check, if the broad phase found any.
    pub fn last_distance(&self) -> Option<f64> {
        self.last_distance
    }

    pub fn thresholds(&self) -> ContactThresholds {
        self.thresholds
    }
}

/// Force that, applied for one tick of length `dt`, reflects the normal
/// component of the craft's velocity with coefficient `restitution`:
/// `J = -(1 + e) m (v . n) n`, `F = J / dt`. Zero when the craft is not moving
/// into the surface.
fn bounce_force(craft: &Particle, normal: NVec3, restitution: f64, dt: f64) -> NVec3 {
    let vn = craft.velocity.dot(&normal);
    if vn >= 0.0 {
        return NVec3::zeros();
    }
    let impulse = -(1.0 + restitution) * craft.mass() * vn * normal;
    impulse / effective_timestep(dt)
}

/// Ground clearance from a ray cast straight down.
///
/// A miss keeps the previous reading; before the first hit there is no data.
#[derive(Debug, Clone, Default)]
pub struct AltitudeRadar {
    altitude: Option<f64>,
}

impl AltitudeRadar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cast from `position` along -Y and update the reading.
    pub fn update(&mut self, index: &SpatialIndex, position: NVec3) -> Option<f64> {
        if let Some(hit) = index.ray_intersect(&Ray::down(position)) {
            self.altitude = Some(hit.t);
        }
        self.altitude
    }

    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }
}
