//! Computational-to-physical coordinate maps.
//!
//! Each axis maps a uniform computational coordinate ξ ∈ [0, 1] onto the
//! physical interval [0, L]. The solver's stencils only ever see the map
//! through the metric terms ξ_x, (ξ_x)² and ξ_xx evaluated per grid index.

/// Coordinate stretching along one axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Stretching {
    /// x = L·ξ
    Uniform,
    /// Tangent-hyperbolic clustering towards both walls:
    /// x = (L/2)·(1 − tanh(β(1 − 2ξ))/tanh β). Larger β packs more points
    /// near the walls.
    Tanh { beta: f64 },
}

impl Stretching {
    /// Physical coordinate and metric terms (x, ξ_x, ξ_xx) at ξ.
    pub fn eval(&self, xi: f64, len: f64) -> (f64, f64, f64) {
        match *self {
            Stretching::Uniform => (len * xi, 1.0 / len, 0.0),
            Stretching::Tanh { beta } => {
                let tb = beta.tanh();
                let u = beta * (1.0 - 2.0 * xi);
                let sech2 = 1.0 - u.tanh() * u.tanh();
                let x = 0.5 * len * (1.0 - u.tanh() / tb);
                // dx/dξ and d²x/dξ², inverted to the ξ derivatives the
                // stencils consume
                let x_xi = len * beta * sech2 / tb;
                let x_xixi = 4.0 * len * beta * beta * sech2 * u.tanh() / tb;
                let xi_x = 1.0 / x_xi;
                let xi_xx = -x_xixi / (x_xi * x_xi * x_xi);
                (x, xi_x, xi_xx)
            }
        }
    }
}
