//! Numerical and physical parameters for a lander run
//!
//! `Parameters` holds runtime settings:
//! - step size and end time of the tick loop,
//! - lunar gravity and craft thrust strength,
//! - fuel budget and burn rate,
//! - contact thresholds handed to the collision resolver

use crate::error::{Error, Result};
use crate::simulation::collision::ContactThresholds;

#[derive(Debug, Clone)]
pub struct Parameters {
    pub t_end: f64, // time end
    pub h0: f64, // step size
    pub gravity: f64, // downward field strength
    pub thrust_magnitude: f64, // thrust force per commanded axis
    pub fuel: f64, // starting fuel
    pub fuel_burn_rate: f64, // fuel used per second of thrust
    pub contact: ContactThresholds,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            t_end: 60.0,
            h0: 1.0 / 60.0,
            gravity: 1.62,
            thrust_magnitude: 100.0,
            fuel: 2500.0,
            fuel_burn_rate: 60.0,
            contact: ContactThresholds::default(),
        }
    }
}

impl Parameters {
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("t_end", self.t_end),
            ("h0", self.h0),
            ("gravity", self.gravity),
            ("thrust_magnitude", self.thrust_magnitude),
            ("fuel", self.fuel),
            ("fuel_burn_rate", self.fuel_burn_rate),
        ];
        if let Some((name, v)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::config(format!("{name} must be finite, got {v}")));
        }
        if self.h0 <= 0.0 || self.t_end <= 0.0 {
            return Err(Error::config(format!(
                "h0 and t_end must be > 0, got {} and {}",
                self.h0, self.t_end
            )));
        }
        if self.fuel < 0.0 || self.fuel_burn_rate < 0.0 {
            return Err(Error::config("fuel and fuel_burn_rate must be >= 0"));
        }
        self.contact.validate()
    }
}
