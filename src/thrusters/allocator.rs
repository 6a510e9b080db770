//! # Thrust Allocator
//!
//! Maps motion requests onto raw per-thruster power in [-1, 1].
//!
//! ## Lateral mix
//!
//! ```text
//! FR = -x + y + r
//! FL = +x + y - r
//! RR = -x + y + r
//! RL = +x + y - r
//! ```
//!
//! with `x` sway, `y` surge and `r` yaw. All four are divided by
//! `max(|FR|, |FL|, |RR|, |RL|, 1)`: combined requests are scaled back into
//! range, while a single-axis request keeps its full magnitude.
//!
//! ## Vertical mix
//!
//! ```text
//! FV = z - p
//! RV = z + p
//! ```
//!
//! with `z` heave and `p` pitch, normalized by `max(|FV|, |RV|, 1)`.
//!
//! Polarity, multipliers and pulse ranges are applied downstream by
//! [`Thruster`](super::thruster::Thruster); nothing here has state.

use serde::Deserialize;

/// Horizontal motion request, each component in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LateralRequest {
    /// Sideways, positive to the right.
    pub sway: f32,
    /// Forward/back.
    pub surge: f32,
    /// Rotation about the vertical axis.
    pub yaw: f32,
}

/// Vertical motion request, each component in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VerticalRequest {
    pub heave: f32,
    pub pitch: f32,
}

/// Raw power for the four corner thrusters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LateralPower {
    pub fr: f32,
    pub fl: f32,
    pub rr: f32,
    pub rl: f32,
}

impl LateralPower {
    /// Largest magnitude across the four thrusters.
    #[must_use]
    pub fn peak(&self) -> f32 {
        self.fr.abs().max(self.fl.abs()).max(self.rr.abs()).max(self.rl.abs())
    }
}

/// Raw power for the two vertical thrusters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VerticalPower {
    pub fv: f32,
    pub rv: f32,
}

/// How stick input is shaped before the lateral mix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shaping {
    /// Requests are mixed as given.
    #[default]
    Square,
    /// Sway/surge are mapped from the square stick domain onto the unit
    /// disc and yaw is scaled by 1/sqrt(2), so diagonal stick travel does not
    /// ask for more than straight travel.
    Circular,
}

impl Shaping {
    /// Applies the shaping to a lateral request.
    #[must_use]
    pub fn apply(self, request: LateralRequest) -> LateralRequest {
        match self {
            Shaping::Square => request,
            Shaping::Circular => {
                let (sway, surge) = map_to_circle(request.sway, request.surge);
                LateralRequest {
                    sway,
                    surge,
                    yaw: request.yaw * std::f32::consts::FRAC_1_SQRT_2,
                }
            }
        }
    }
}

/// Maps a point of the square [-1, 1]² onto the unit disc.
///
/// # Examples
///
/// ```
/// use rov_pilot::thrusters::allocator::map_to_circle;
///
/// let (x, y) = map_to_circle(1.0, 1.0);
/// assert!(((x * x + y * y).sqrt() - 1.0).abs() < 1e-6);
/// assert_eq!(map_to_circle(1.0, 0.0), (1.0, 0.0));
/// ```
#[must_use]
pub fn map_to_circle(x: f32, y: f32) -> (f32, f32) {
    let x = sanitize(x);
    let y = sanitize(y);
    (
        x * (1.0 - y * y / 2.0).sqrt(),
        y * (1.0 - x * x / 2.0).sqrt(),
    )
}

/// Clamps a request component into [-1, 1]; NaN and infinities become 0.
#[inline]
fn sanitize(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Lateral mix for the four corner thrusters.
///
/// # Examples
///
/// ```
/// use rov_pilot::thrusters::allocator::{mix_lateral, LateralRequest};
///
/// let power = mix_lateral(LateralRequest { sway: 0.0, surge: 1.0, yaw: 1.0 });
/// assert_eq!(power.fr, 1.0);
/// assert_eq!(power.fl, 0.0);
/// ```
#[must_use]
pub fn mix_lateral(request: LateralRequest) -> LateralPower {
    let x = sanitize(request.sway);
    let y = sanitize(request.surge);
    let r = sanitize(request.yaw);

    let fr = -x + y + r;
    let fl = x + y - r;
    let rr = -x + y + r;
    let rl = x + y - r;

    let divisor = fr.abs().max(fl.abs()).max(rr.abs()).max(rl.abs()).max(1.0);

    LateralPower {
        fr: fr / divisor,
        fl: fl / divisor,
        rr: rr / divisor,
        rl: rl / divisor,
    }
}

/// Vertical mix for the two vertical thrusters.
///
/// # Examples
///
/// ```
/// use rov_pilot::thrusters::allocator::{mix_vertical, VerticalRequest};
///
/// let power = mix_vertical(VerticalRequest { heave: 0.0, pitch: 1.0 });
/// assert_eq!((power.fv, power.rv), (-1.0, 1.0));
/// ```
#[must_use]
pub fn mix_vertical(request: VerticalRequest) -> VerticalPower {
    let z = sanitize(request.heave);
    let p = sanitize(request.pitch);

    let fv = z - p;
    let rv = z + p;

    let divisor = fv.abs().max(rv.abs()).max(1.0);

    VerticalPower {
        fv: fv / divisor,
        rv: rv / divisor,
    }
}

/// Stateless allocator combining shaping with both mixes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrustAllocator {
    shaping: Shaping,
}

impl ThrustAllocator {
    /// Creates an allocator with the given input shaping.
    #[must_use]
    pub fn new(shaping: Shaping) -> Self {
        Self { shaping }
    }

    /// Input shaping in use.
    #[must_use]
    pub fn shaping(&self) -> Shaping {
        self.shaping
    }

    /// Runs both mixes.
    #[must_use]
    pub fn allocate(
        &self,
        lateral: LateralRequest,
        vertical: VerticalRequest,
    ) -> (LateralPower, VerticalPower) {
        (
            mix_lateral(self.shaping.apply(lateral)),
            mix_vertical(vertical),
        )
    }
}
