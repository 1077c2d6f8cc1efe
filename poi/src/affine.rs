//! World → map-space affine transform fitted from reference pairs.

use nav::MapSpacePoint;

/// `map = A · world + t`, fitted by least squares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMap {
	a: [[f64; 2]; 2],
	t: [f64; 2],
}

impl AffineMap {
	/// Least-squares fit over `(world, map)` pairs.
	///
	/// Returns `None` with fewer than three pairs or when the world points are
	/// collinear (the fit would be underdetermined).
	pub fn fit(pairs: &[((f64, f64), (f64, f64))]) -> Option<Self> {
		if pairs.len() < 3 {
			return None;
		}
		let n = pairs.len() as f64;
		let (mut wx, mut wy, mut mx, mut my) = (0.0, 0.0, 0.0, 0.0);
		for &((x, y), (u, v)) in pairs {
			wx += x;
			wy += y;
			mx += u;
			my += v;
		}
		let (wx, wy, mx, my) = (wx / n, wy / n, mx / n, my / n);

		// Centered normal equations: A = (Σ dm·dwᵀ)(Σ dw·dwᵀ)⁻¹.
		let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
		let mut cross = [[0.0f64; 2]; 2];
		for &((x, y), (u, v)) in pairs {
			let (dx, dy, du, dv) = (x - wx, y - wy, u - mx, v - my);
			sxx += dx * dx;
			sxy += dx * dy;
			syy += dy * dy;
			cross[0][0] += du * dx;
			cross[0][1] += du * dy;
			cross[1][0] += dv * dx;
			cross[1][1] += dv * dy;
		}
		let det = sxx * syy - sxy * sxy;
		if !det.is_normal() || det.abs() <= 1e-12 * (sxx * syy).max(f64::MIN_POSITIVE) {
			return None;
		}
		let inv = [[syy / det, -sxy / det], [-sxy / det, sxx / det]];

		let mut a = [[0.0f64; 2]; 2];
		for r in 0..2 {
			for c in 0..2 {
				a[r][c] = cross[r][0] * inv[0][c] + cross[r][1] * inv[1][c];
			}
		}
		let t = [mx - (a[0][0] * wx + a[0][1] * wy), my - (a[1][0] * wx + a[1][1] * wy)];
		Some(Self { a, t })
	}

	pub fn apply(&self, world_x: f64, world_y: f64) -> MapSpacePoint {
		MapSpacePoint::new(
			(self.a[0][0] * world_x + self.a[0][1] * world_y + self.t[0]) as f32,
			(self.a[1][0] * world_x + self.a[1][1] * world_y + self.t[1]) as f32,
		)
	}
}
